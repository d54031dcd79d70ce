//! Sequential batch execution over a list of questions.

use std::time::Duration;

use tokio::time;

use crate::config::SelectorSet;
use crate::engine::{AutomationEngine, RunContext};
use crate::types::AnswerRecord;

/// Runs questions one at a time through an [`AutomationEngine`], pacing
/// between cycles and honoring stop requests at cycle boundaries.
pub struct BatchRunner<'a> {
    engine: &'a AutomationEngine,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a AutomationEngine) -> Self {
        BatchRunner { engine }
    }

    /// Run every question from `ctx.cursor` onward, returning one record per
    /// attempted question. A stop request ends the batch after the in-flight
    /// cycle resolves; its partial answer is still recorded.
    pub async fn run_all(
        &self,
        questions: &[String],
        selectors: &SelectorSet,
        ctx: &mut RunContext,
    ) -> Vec<AnswerRecord> {
        let logger = self.engine.logger();
        let config = self.engine.config();
        let mut records = Vec::new();

        while ctx.cursor < questions.len() {
            if ctx.stop_requested() {
                logger.info(
                    format!("stopped before question {}", ctx.cursor + 1),
                    Some("runner"),
                    None,
                );
                break;
            }

            let question = questions[ctx.cursor].trim();
            if question.is_empty() {
                logger.debug(
                    format!("skipping blank question {}", ctx.cursor + 1),
                    Some("runner"),
                    None,
                );
                ctx.cursor += 1;
                continue;
            }

            logger.info(
                format!(
                    "question {}/{}: {}",
                    ctx.cursor + 1,
                    questions.len(),
                    preview(question)
                ),
                Some("runner"),
                None,
            );

            // Let the page settle after the previous answer before touching it.
            time::sleep(Duration::from_millis(config.settle_delay_ms)).await;

            let record = match self.engine.run(question, selectors, ctx).await {
                Ok(result) => {
                    if result.ok {
                        logger.info(
                            format!("answer: {}", preview(&result.answer_text)),
                            Some("runner"),
                            None,
                        );
                    } else {
                        logger.error(
                            format!("question {} failed: {:?}", ctx.cursor + 1, result.failure_reason),
                            Some("runner"),
                            None,
                        );
                    }
                    AnswerRecord::new(question, result.answer_text)
                }
                Err(err) => {
                    logger.error(
                        format!("question {} errored: {err}", ctx.cursor + 1),
                        Some("runner"),
                        None,
                    );
                    AnswerRecord::new(question, "")
                }
            };
            records.push(record);
            ctx.cursor += 1;

            if ctx.cursor < questions.len() && !ctx.stop_requested() {
                time::sleep(Duration::from_millis(config.cycle_delay_ms)).await;
            }
        }

        records
    }
}

/// A short single-line preview for log output.
fn preview(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() > 160 {
        let truncated: String = flat.chars().take(160).collect();
        format!("{truncated}…")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\nb\rc"), "a b c");
        let long = "x".repeat(200);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), 161);
        assert!(shown.ends_with('…'));
    }
}
