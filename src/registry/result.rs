//! The uniform envelope every capability invocation returns.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one capability invocation.
///
/// The output is carried as a dynamic value; callers that want a concrete
/// type parse at their own edge via [`CapabilityResult::parsed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub success: bool,
    pub output: Option<Value>,
    pub tokens_used: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl CapabilityResult {
    pub fn succeeded(output: Value, tokens_used: u32, duration_ms: u64) -> Self {
        CapabilityResult {
            success: true,
            output: Some(output),
            tokens_used,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, tokens_used: u32, duration_ms: u64) -> Self {
        CapabilityResult {
            success: false,
            output: None,
            tokens_used,
            duration_ms,
            error: Some(error.into()),
        }
    }

    /// Deserialize the output into a caller-chosen type.
    ///
    /// Returns `None` on failure results and on shape mismatches alike; the
    /// caller decides whether a missing value is fatal.
    pub fn parsed<T: DeserializeOwned>(&self) -> Option<T> {
        self.output
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Caption {
        caption: String,
        hashtags: Vec<String>,
    }

    #[test]
    fn test_succeeded() {
        let result = CapabilityResult::succeeded(json!({"ok": true}), 150, 820);
        assert!(result.success);
        assert_eq!(result.tokens_used, 150);
        assert_eq!(result.duration_ms, 820);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_failed_carries_error_and_no_output() {
        let result = CapabilityResult::failed("rate limit exceeded", 0, 45);
        assert!(!result.success);
        assert!(result.output.is_none());
        assert_eq!(result.error.as_deref(), Some("rate limit exceeded"));
    }

    #[test]
    fn test_parsed_typed_accessor() {
        let result = CapabilityResult::succeeded(
            json!({"caption": "Spring is here", "hashtags": ["#spring"]}),
            10,
            5,
        );

        let caption: Caption = result.parsed().unwrap();
        assert_eq!(caption.caption, "Spring is here");
        assert_eq!(caption.hashtags, vec!["#spring"]);
    }

    #[test]
    fn test_parsed_shape_mismatch_is_none() {
        let result = CapabilityResult::succeeded(json!({"unexpected": 1}), 10, 5);
        assert_eq!(result.parsed::<Caption>(), None);

        let failed = CapabilityResult::failed("boom", 0, 0);
        assert_eq!(failed.parsed::<Caption>(), None);
    }
}
