use serde::{Deserialize, Serialize};

use crate::submit::SubmissionPath;

/// Why a cycle produced no usable answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    /// No visible prompt input could be found on the page.
    InputNotFound,
    /// The input was found but the prompt text could not be written into it.
    InjectionFailure,
}

/// Outcome of one full submit-and-await cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutomationResult {
    /// Whether the cycle reached the completion wait at all.
    pub ok: bool,
    /// The captured answer text, trimmed. Empty after failures.
    pub answer_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    /// Whether the answer was cut off by the hard timeout or a stop request.
    pub timed_out: bool,
    /// Which submission path was ultimately attempted, when one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_via: Option<SubmissionPath>,
}

impl AutomationResult {
    pub(crate) fn failure(reason: FailureReason) -> Self {
        AutomationResult {
            ok: false,
            answer_text: String::new(),
            failure_reason: Some(reason),
            timed_out: false,
            submitted_via: None,
        }
    }
}

/// Outcome of waiting for a streamed response to stabilize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    /// Best text seen so far, trimmed. May be empty.
    pub text: String,
    /// True when the hard timeout or a stop request ended the wait.
    pub timed_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_serialize_camel_case() {
        let json = serde_json::to_string(&FailureReason::InputNotFound).unwrap();
        assert_eq!(json, "\"inputNotFound\"");
        let json = serde_json::to_string(&FailureReason::InjectionFailure).unwrap();
        assert_eq!(json, "\"injectionFailure\"");
    }

    #[test]
    fn results_omit_absent_fields() {
        let result = AutomationResult {
            ok: true,
            answer_text: "42".to_string(),
            failure_reason: None,
            timed_out: false,
            submitted_via: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("failureReason").is_none());
        assert!(json.get("submittedVia").is_none());
        assert_eq!(json["answerText"], "42");
    }
}
