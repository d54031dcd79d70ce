//! Priority-ordered element resolution with a visibility fallback.

use crate::config::SelectorSet;
use crate::surface::{DocumentSurface, NodeHandle, SurfaceError};

/// Resolves page elements from ordered candidate descriptor lists.
///
/// Resolution is stateless: handles are never cached between calls, because
/// the page may tear down and recreate any element at any time.
pub struct ElementLocator<'a> {
    surface: &'a dyn DocumentSurface,
}

impl<'a> ElementLocator<'a> {
    pub fn new(surface: &'a dyn DocumentSurface) -> Self {
        ElementLocator { surface }
    }

    /// The first *visible* match across the candidate list, in candidate
    /// order. When nothing visible matches anywhere, falls back to the first
    /// match of the earliest candidate that matched at all; detached-but-live
    /// elements are still worth trying. `None` only when no candidate
    /// matches anything.
    pub async fn find_visible(
        &self,
        candidates: &[String],
    ) -> Result<Option<NodeHandle>, SurfaceError> {
        let mut first_match: Option<NodeHandle> = None;

        for selector in candidates {
            let matches = self.surface.query_all_deep(selector).await?;
            if first_match.is_none() {
                first_match = matches.first().copied();
            }
            for node in matches {
                // A stale handle between query and visibility check just
                // means the candidate is gone; move on.
                match self.surface.is_visible(node).await {
                    Ok(true) => return Ok(Some(node)),
                    Ok(false) => {}
                    Err(SurfaceError::StaleNode(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(first_match)
    }

    /// The most recent response item: the last match, in document order, of
    /// the first item descriptor that matches anything, scoped to the first
    /// matching container (or the whole document when no container matches).
    pub async fn last_response_item(
        &self,
        selectors: &SelectorSet,
    ) -> Result<Option<NodeHandle>, SurfaceError> {
        let container = self.find_container(&selectors.response_container).await?;

        for selector in &selectors.response_item {
            let matches = self.surface.query_within(container, selector).await?;
            if let Some(last) = matches.last() {
                return Ok(Some(*last));
            }
        }

        Ok(None)
    }

    async fn find_container(
        &self,
        candidates: &[String],
    ) -> Result<Option<NodeHandle>, SurfaceError> {
        for selector in candidates {
            let matches = self.surface.query_all_deep(selector).await?;
            if let Some(first) = matches.first() {
                return Ok(Some(*first));
            }
        }
        Ok(None)
    }
}
