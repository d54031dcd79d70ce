use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/answer pair captured by the batch runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl AnswerRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        AnswerRecord {
            question: question.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
        }
    }
}
