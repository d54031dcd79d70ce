//! Completion detection for streamed responses.
//!
//! There is no reliable "done" signal on a chat page, so completion is
//! defined as silence: the response text has stopped changing for a quiet
//! period. Mutation events drive a debounce timer that restarts on every
//! qualifying text change; a hard timeout bounds the whole wait so the
//! engine always returns whatever text it has.

use std::pin::Pin;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Sleep};

use crate::config::SelectorSet;
use crate::locator::ElementLocator;
use crate::logging::RunnerLogger;
use crate::surface::{DocumentSurface, MutationEvent, SurfaceError};
use crate::types::CompletionResult;

pub struct CompletionDetector<'a> {
    surface: &'a dyn DocumentSurface,
    logger: &'a RunnerLogger,
}

impl<'a> CompletionDetector<'a> {
    pub fn new(surface: &'a dyn DocumentSurface, logger: &'a RunnerLogger) -> Self {
        CompletionDetector { surface, logger }
    }

    /// Wait until the last response item's text holds still for the quiet
    /// period, the hard timeout fires, or `stop` flips to true. Always
    /// returns the best text seen so far.
    ///
    /// The mutation subscription starts before the first text read so a
    /// change landing between the two is never missed.
    pub async fn await_stable(
        &self,
        selectors: &SelectorSet,
        mut stop: Option<watch::Receiver<bool>>,
    ) -> Result<CompletionResult, SurfaceError> {
        let quiet_window = Duration::from_millis(selectors.quiet_period_ms);
        let mut rx = self.surface.subscribe_mutations().await?;

        // Baseline only. The quiet window arms on the first observed change,
        // so a previous answer still sitting in the response item is never
        // returned as this cycle's result. A page that never mutates resolves
        // through the hard timeout instead.
        let mut last_text = self.qualifying_text(selectors).await;
        let mut quiet_timer: Option<Pin<Box<Sleep>>> = None;
        let mut timeout_timer =
            Box::pin(time::sleep(Duration::from_millis(selectors.hard_timeout_ms)));

        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.handle_mutation(
                                event,
                                selectors,
                                &mut last_text,
                                &mut quiet_timer,
                                quiet_window,
                            ).await;
                        }
                        None => {
                            // The mutation stream died; whatever we have is
                            // the best answer we will get.
                            self.logger.debug(
                                "mutation stream closed before stabilization",
                                Some("detect"),
                                None,
                            );
                            return Ok(self.finish(selectors, last_text, true).await);
                        }
                    }
                }
                _ = async {
                    if let Some(timer) = quiet_timer.as_mut() {
                        timer.as_mut().await;
                    }
                }, if quiet_timer.is_some() => {
                    return Ok(self.finish(selectors, last_text, false).await);
                }
                _ = &mut timeout_timer => {
                    self.logger.info(
                        "response did not stabilize before the hard timeout",
                        Some("detect"),
                        None,
                    );
                    return Ok(self.finish(selectors, last_text, true).await);
                }
                _ = stopped(&mut stop) => {
                    self.logger.info("stop requested mid-wait", Some("detect"), None);
                    return Ok(self.finish(selectors, last_text, true).await);
                }
            }
        }
    }

    async fn handle_mutation(
        &self,
        _event: MutationEvent,
        selectors: &SelectorSet,
        last_text: &mut Option<String>,
        quiet_timer: &mut Option<Pin<Box<Sleep>>>,
        quiet_window: Duration,
    ) {
        let Some(text) = self.qualifying_text(selectors).await else {
            // Streaming marker present or element gone: hold the current
            // timer rather than treating it as a change.
            return;
        };

        if last_text.as_deref() != Some(text.as_str()) {
            *last_text = Some(text);
            start_quiet_timer(quiet_timer, quiet_window);
        }
    }

    /// The current response text, unless the element is missing or inside a
    /// region still marked as streaming. Per-read surface failures are
    /// treated as "no qualifying text"; the wait itself never dies to a
    /// transient evaluation error.
    async fn qualifying_text(&self, selectors: &SelectorSet) -> Option<String> {
        let locator = ElementLocator::new(self.surface);
        let node = match locator.last_response_item(selectors).await {
            Ok(Some(node)) => node,
            Ok(None) => return None,
            Err(err) => {
                self.logger
                    .debug(format!("response lookup failed: {err}"), Some("detect"), None);
                return None;
            }
        };

        if !selectors.streaming_marker.is_empty() {
            match self
                .surface
                .has_streaming_ancestor(node, &selectors.streaming_marker)
                .await
            {
                Ok(true) => return None,
                Ok(false) => {}
                Err(_) => return None,
            }
        }

        self.surface.inner_text(node).await.ok()
    }

    async fn finish(
        &self,
        selectors: &SelectorSet,
        last_text: Option<String>,
        timed_out: bool,
    ) -> CompletionResult {
        // Re-read once at the end; the final mutation may have landed after
        // our last snapshot.
        let text = match self.qualifying_text(selectors).await {
            Some(text) => text,
            None => last_text.unwrap_or_default(),
        };
        CompletionResult {
            text: text.trim().to_string(),
            timed_out,
        }
    }
}

fn start_quiet_timer(timer: &mut Option<Pin<Box<Sleep>>>, window: Duration) {
    *timer = Some(Box::pin(time::sleep(window)));
}

/// Resolves when the stop flag flips to true; pends forever when no stop
/// channel was supplied or the sender is gone.
async fn stopped(stop: &mut Option<watch::Receiver<bool>>) {
    match stop {
        Some(rx) => {
            if *rx.borrow() {
                return;
            }
            loop {
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
                if *rx.borrow() {
                    return;
                }
            }
        }
        None => std::future::pending().await,
    }
}
