//! Layered submission: button, then form, then keyboard.
//!
//! No single submission mechanism works across chat frontends. A visible
//! submit button is the most reliable signal when present; forms vary in
//! which programmatic submit APIs they expose; and some pages only listen
//! for Enter. The protocol tries each path in order and reports which one
//! fired.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time;

use crate::config::SelectorSet;
use crate::locator::ElementLocator;
use crate::logging::RunnerLogger;
use crate::surface::{DocumentSurface, InputIntent, KeyCombo, NodeHandle, SurfaceError};

/// Which mechanism actually fired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionPath {
    Button,
    Form,
    Keyboard,
}

/// Outcome of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// A path fired with positive confirmation.
    Submitted { path: SubmissionPath },
    /// The keyboard path ran to completion but nothing confirmed the page
    /// accepted it. Callers proceed to the completion wait anyway; the
    /// detector's timeout covers the case where nothing was really sent.
    SubmittedUnconfirmed { path: SubmissionPath },
    /// The input disappeared before any path could run.
    InputNotFound,
}

pub struct SubmissionProtocol<'a> {
    surface: &'a dyn DocumentSurface,
    logger: &'a RunnerLogger,
    /// Pause before the keyboard path's follow-up button attempt, leaving
    /// the page a beat to render a button enabled by the injected text.
    followup_delay: Duration,
}

impl<'a> SubmissionProtocol<'a> {
    pub fn new(
        surface: &'a dyn DocumentSurface,
        logger: &'a RunnerLogger,
        followup_delay: Duration,
    ) -> Self {
        SubmissionProtocol {
            surface,
            logger,
            followup_delay,
        }
    }

    /// Try each submission path in order until one fires. A stale input
    /// handle means the page replaced the element mid-cycle; that is reported
    /// as [`SubmissionOutcome::InputNotFound`] rather than a hard error.
    pub async fn submit(
        &self,
        input: NodeHandle,
        selectors: &SelectorSet,
    ) -> Result<SubmissionOutcome, SurfaceError> {
        if let Some(path) = self.try_button(selectors).await? {
            return Ok(SubmissionOutcome::Submitted { path });
        }

        match self.try_form(input, selectors).await {
            Ok(Some(path)) => return Ok(SubmissionOutcome::Submitted { path }),
            Ok(None) => {}
            Err(SurfaceError::StaleNode(node)) if node == input => {
                return Ok(SubmissionOutcome::InputNotFound);
            }
            Err(err) => return Err(err),
        }

        match self.try_keyboard(input, selectors).await {
            Err(SurfaceError::StaleNode(node)) if node == input => {
                Ok(SubmissionOutcome::InputNotFound)
            }
            other => other,
        }
    }

    /// Click the first visible submit control.
    async fn try_button(
        &self,
        selectors: &SelectorSet,
    ) -> Result<Option<SubmissionPath>, SurfaceError> {
        for selector in &selectors.submit_control {
            let matches = self.surface.query_all_deep(selector).await?;
            for node in matches {
                match self.surface.is_visible(node).await {
                    Ok(true) => {
                        self.surface.click(node).await?;
                        self.logger
                            .debug(format!("submitted via button '{selector}'"), Some("submit"), None);
                        return Ok(Some(SubmissionPath::Button));
                    }
                    Ok(false) => {}
                    Err(SurfaceError::StaleNode(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(None)
    }

    /// Submit the input's enclosing form, falling back to a page-level form
    /// candidate. Prefers `requestSubmit`, then `submit`, then a cancelable
    /// `submit` event; a cancelled event yields control to the next path.
    async fn try_form(
        &self,
        input: NodeHandle,
        selectors: &SelectorSet,
    ) -> Result<Option<SubmissionPath>, SurfaceError> {
        let form = match self.surface.enclosing_form(input).await? {
            Some(form) => Some(form),
            None => {
                let locator = ElementLocator::new(self.surface);
                locator.find_visible(&selectors.form).await?
            }
        };
        let Some(form) = form else {
            return Ok(None);
        };

        let caps = self.surface.form_capabilities(form).await?;
        if caps.request_submit {
            self.surface.request_submit(form).await?;
            self.logger
                .debug("submitted via form.requestSubmit", Some("submit"), None);
            return Ok(Some(SubmissionPath::Form));
        }
        if caps.raw_submit {
            self.surface.raw_submit(form).await?;
            self.logger
                .debug("submitted via form.submit", Some("submit"), None);
            return Ok(Some(SubmissionPath::Form));
        }

        if self.surface.dispatch_submit_event(form).await? {
            self.logger
                .debug("submitted via submit event", Some("submit"), None);
            return Ok(Some(SubmissionPath::Form));
        }

        // A handler cancelled the event; the page wants something else.
        Ok(None)
    }

    /// Last resort: announce an Enter keypress every way a page might listen
    /// for it, then retry the button once in case the injected text enabled
    /// one meanwhile.
    async fn try_keyboard(
        &self,
        input: NodeHandle,
        selectors: &SelectorSet,
    ) -> Result<SubmissionOutcome, SurfaceError> {
        self.surface
            .dispatch_input(input, &InputIntent::InsertParagraph)
            .await?;

        let combos = [
            KeyCombo::plain("Enter"),
            KeyCombo::plain("Enter").with_ctrl(),
            KeyCombo::plain("Enter").with_meta(),
        ];
        for combo in &combos {
            self.surface.dispatch_key_triplet(input, combo).await?;
        }

        time::sleep(self.followup_delay).await;

        if self.try_button(selectors).await?.is_some() {
            self.logger
                .debug("keyboard path confirmed by follow-up click", Some("submit"), None);
            return Ok(SubmissionOutcome::Submitted {
                path: SubmissionPath::Keyboard,
            });
        }

        self.logger.debug(
            "keyboard path finished without confirmation",
            Some("submit"),
            None,
        );
        Ok(SubmissionOutcome::SubmittedUnconfirmed {
            path: SubmissionPath::Keyboard,
        })
    }
}
