//! Framework-aware text injection.
//!
//! Modern chat frontends ignore plain value assignment: React-style inputs
//! track their own state through the native value setter, and rich-text
//! editors only react to `beforeinput`/`input` pairs. The injector picks the
//! event choreography the element actually listens to.

use crate::surface::{DocumentSurface, InputIntent, NodeHandle, SurfaceError};

pub struct InputInjector<'a> {
    surface: &'a dyn DocumentSurface,
}

impl<'a> InputInjector<'a> {
    pub fn new(surface: &'a dyn DocumentSurface) -> Self {
        InputInjector { surface }
    }

    /// Write `text` into the element so its framework observes the change.
    /// Replaces any existing content; safe to call repeatedly.
    pub async fn set_value(&self, node: NodeHandle, text: &str) -> Result<(), SurfaceError> {
        self.surface.scroll_into_view(node).await?;
        self.surface.focus(node).await?;

        if self.surface.is_editable_region(node).await? {
            // Clear-then-insert, each step announced as an editing intent so
            // editor state machines stay in sync with the DOM.
            self.surface.set_text_content(node, "").await?;
            self.surface
                .dispatch_input(node, &InputIntent::DeleteContentBackward)
                .await?;
            self.surface.set_text_content(node, text).await?;
            self.surface
                .dispatch_input(node, &InputIntent::InsertText(text.to_string()))
                .await?;
        } else {
            self.surface.set_native_value(node, text).await?;
            self.surface.dispatch_generic(node, "input").await?;
            self.surface.dispatch_generic(node, "change").await?;
        }

        Ok(())
    }
}
