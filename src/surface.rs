//! The capability seam between the engine and a document.
//!
//! Everything the engine knows how to do is expressed through the
//! [`DocumentSurface`] trait: locate elements, inject text, dispatch
//! synthetic events, and observe mutations. The live implementation drives a
//! real page over CDP ([`crate::page::ChromiumSurface`]); tests drive a
//! simulated page. All decision logic stays on the engine side of this trait,
//! so the surface only ever answers narrow questions about individual nodes.
//!
//! Node handles are opaque and may dangle: the page can destroy an element at
//! any moment. Implementations report that as an error rather than panicking,
//! and callers treat per-node failures as "this candidate is gone".

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque reference to an element on the surface.
///
/// Valid until the page removes the element or [`DocumentSurface::reset_handles`]
/// is called. Never dereferenced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Kind of DOM change reported through the mutation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Children added or removed somewhere under the observed root.
    ChildList,
    /// Text content of an existing node changed.
    CharacterData,
}

/// One observed DOM change. Deliberately coarse: the completion detector
/// re-resolves the response element on every event instead of trusting the
/// mutation target to still exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEvent {
    pub kind: MutationKind,
}

/// Editing intent carried by a synthetic `beforeinput`/`input` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputIntent {
    DeleteContentBackward,
    InsertText(String),
    InsertParagraph,
}

impl InputIntent {
    /// The `inputType` string frameworks switch on.
    pub fn input_type(&self) -> &'static str {
        match self {
            InputIntent::DeleteContentBackward => "deleteContentBackward",
            InputIntent::InsertText(_) => "insertText",
            InputIntent::InsertParagraph => "insertParagraph",
        }
    }

    /// The `data` payload, when the intent carries one.
    pub fn data(&self) -> Option<&str> {
        match self {
            InputIntent::InsertText(text) => Some(text),
            _ => None,
        }
    }
}

/// A key press with modifiers, dispatched as keydown/keypress/keyup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyCombo {
    pub fn plain(key: impl Into<String>) -> Self {
        KeyCombo {
            key: key.into(),
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

/// Which programmatic submission mechanisms a form element supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormCapabilities {
    /// `form.requestSubmit` exists (runs validation and submit handlers).
    pub request_submit: bool,
    /// `form.submit` exists (bypasses handlers).
    pub raw_submit: bool,
}

/// Errors surfaced by a document implementation.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The handle no longer refers to a live element.
    #[error("stale node handle {0:?}")]
    StaleNode(NodeHandle),
    /// The underlying transport (CDP evaluate, script error) failed.
    #[error("surface evaluation failed: {0}")]
    Evaluation(String),
    /// The browser connection is gone.
    #[error("surface detached: {0}")]
    Detached(String),
}

/// Capabilities a document must provide for the engine to drive it.
///
/// Methods are deliberately fine-grained so the engine owns all fallback and
/// ordering decisions. Implementations must be safe to call concurrently.
#[async_trait]
pub trait DocumentSurface: Send + Sync {
    /// All elements matching `selector`, in document order, descending into
    /// open shadow roots.
    async fn query_all_deep(&self, selector: &str) -> Result<Vec<NodeHandle>, SurfaceError>;

    /// Elements matching `selector` under `root` (the whole document when
    /// `root` is `None`). Does not descend into shadow roots.
    async fn query_within(
        &self,
        root: Option<NodeHandle>,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, SurfaceError>;

    /// Whether the element takes up layout space and is not hidden.
    async fn is_visible(&self, node: NodeHandle) -> Result<bool, SurfaceError>;

    /// The element's rendered text content.
    async fn inner_text(&self, node: NodeHandle) -> Result<String, SurfaceError>;

    /// Whether the element is a rich-text editing region rather than a form
    /// control with a value property.
    async fn is_editable_region(&self, node: NodeHandle) -> Result<bool, SurfaceError>;

    async fn scroll_into_view(&self, node: NodeHandle) -> Result<(), SurfaceError>;

    async fn focus(&self, node: NodeHandle) -> Result<(), SurfaceError>;

    /// Replace the element's text content (editable regions).
    async fn set_text_content(&self, node: NodeHandle, text: &str) -> Result<(), SurfaceError>;

    /// Write the element's value through the native setter, bypassing any
    /// framework wrapper that swallows plain assignments.
    async fn set_native_value(&self, node: NodeHandle, value: &str) -> Result<(), SurfaceError>;

    /// Dispatch a `beforeinput`/`input` pair carrying the given intent.
    async fn dispatch_input(
        &self,
        node: NodeHandle,
        intent: &InputIntent,
    ) -> Result<(), SurfaceError>;

    /// Dispatch a simple bubbling event by name (`input`, `change`).
    async fn dispatch_generic(&self, node: NodeHandle, event: &str) -> Result<(), SurfaceError>;

    /// Dispatch keydown, keypress, and keyup for the combo, in that order.
    async fn dispatch_key_triplet(
        &self,
        node: NodeHandle,
        combo: &KeyCombo,
    ) -> Result<(), SurfaceError>;

    async fn click(&self, node: NodeHandle) -> Result<(), SurfaceError>;

    /// The nearest enclosing form element, if any.
    async fn enclosing_form(&self, node: NodeHandle)
        -> Result<Option<NodeHandle>, SurfaceError>;

    async fn form_capabilities(&self, form: NodeHandle)
        -> Result<FormCapabilities, SurfaceError>;

    /// Invoke `form.requestSubmit()`.
    async fn request_submit(&self, form: NodeHandle) -> Result<(), SurfaceError>;

    /// Invoke `form.submit()`.
    async fn raw_submit(&self, form: NodeHandle) -> Result<(), SurfaceError>;

    /// Dispatch a cancelable `submit` event. Returns `true` when no handler
    /// cancelled it.
    async fn dispatch_submit_event(&self, form: NodeHandle) -> Result<bool, SurfaceError>;

    /// Whether the element or any ancestor carries the streaming marker class.
    async fn has_streaming_ancestor(
        &self,
        node: NodeHandle,
        marker_class: &str,
    ) -> Result<bool, SurfaceError>;

    /// Begin observing DOM mutations; events arrive on the returned channel.
    /// Observation stops when the receiver is dropped.
    async fn subscribe_mutations(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<MutationEvent>, SurfaceError>;

    /// Forget all outstanding handles. Called at the start of each cycle.
    async fn reset_handles(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
}
