//! Shared result and record types.

pub mod engine;
pub mod records;

pub use engine::{AutomationResult, CompletionResult, FailureReason};
pub use records::AnswerRecord;
