//! One full automation cycle: locate, inject, submit, await.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{EngineConfig, SelectorSet};
use crate::detect::CompletionDetector;
use crate::inject::InputInjector;
use crate::locator::ElementLocator;
use crate::logging::RunnerLogger;
use crate::submit::{SubmissionOutcome, SubmissionProtocol};
use crate::surface::{DocumentSurface, SurfaceError};
use crate::types::{AutomationResult, FailureReason};

/// Per-run state threaded explicitly through the engine and runner: where we
/// are in the batch, and whether a stop was requested.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Index of the next question to run.
    pub cursor: usize,
    stop: watch::Receiver<bool>,
}

/// Handle used to request a graceful stop. The current wait resolves with
/// whatever text it has; no further cycles start.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

impl RunContext {
    pub fn new() -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);
        (RunContext { cursor: 0, stop: rx }, StopHandle { tx })
    }

    /// Resume a batch from a given question index.
    pub fn resume_at(cursor: usize) -> (Self, StopHandle) {
        let (ctx, handle) = Self::new();
        (RunContext { cursor, ..ctx }, handle)
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// A fresh receiver for the stop flag, for waits that outlive `self`.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.clone()
    }
}

/// Drives one prompt through a document surface and captures the answer.
pub struct AutomationEngine {
    surface: Arc<dyn DocumentSurface>,
    logger: Arc<RunnerLogger>,
    config: EngineConfig,
}

impl AutomationEngine {
    pub fn new(
        surface: Arc<dyn DocumentSurface>,
        logger: Arc<RunnerLogger>,
        config: EngineConfig,
    ) -> Self {
        AutomationEngine {
            surface,
            logger,
            config,
        }
    }

    pub fn logger(&self) -> &RunnerLogger {
        &self.logger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one cycle: find the input, inject `prompt`, submit, and wait for
    /// the answer to stabilize. Element resolution starts from scratch; no
    /// handle from a previous cycle is trusted.
    pub async fn run(
        &self,
        prompt: &str,
        selectors: &SelectorSet,
        ctx: &RunContext,
    ) -> Result<AutomationResult, SurfaceError> {
        self.surface.reset_handles().await?;

        let locator = ElementLocator::new(self.surface.as_ref());
        let Some(input) = locator.find_visible(&selectors.input).await? else {
            self.logger
                .error("no prompt input found on page", Some("engine"), None);
            return Ok(AutomationResult::failure(FailureReason::InputNotFound));
        };

        let injector = InputInjector::new(self.surface.as_ref());
        if let Err(err) = injector.set_value(input, prompt).await {
            self.logger.error(
                format!("failed to inject prompt text: {err}"),
                Some("engine"),
                None,
            );
            return Ok(AutomationResult::failure(FailureReason::InjectionFailure));
        }

        let protocol = SubmissionProtocol::new(
            self.surface.as_ref(),
            &self.logger,
            Duration::from_millis(self.config.keyboard_followup_delay_ms),
        );
        let outcome = protocol.submit(input, selectors).await?;
        let submitted_via = match outcome {
            SubmissionOutcome::Submitted { path } => Some(path),
            SubmissionOutcome::SubmittedUnconfirmed { path } => Some(path),
            SubmissionOutcome::InputNotFound => {
                self.logger
                    .error("input vanished before submission", Some("engine"), None);
                return Ok(AutomationResult::failure(FailureReason::InputNotFound));
            }
        };

        let detector = CompletionDetector::new(self.surface.as_ref(), &self.logger);
        let completion = detector
            .await_stable(selectors, Some(ctx.stop_signal()))
            .await?;

        self.logger.info(
            format!(
                "cycle complete ({} chars{})",
                completion.text.len(),
                if completion.timed_out { ", timed out" } else { "" }
            ),
            Some("engine"),
            None,
        );

        Ok(AutomationResult {
            ok: true,
            answer_text: completion.text,
            failure_reason: None,
            timed_out: completion.timed_out,
            submitted_via,
        })
    }
}
