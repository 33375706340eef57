//! Outcome of running one piece of generated code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a single sandboxed execution. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the code ran to completion without throwing or timing out.
    pub success: bool,
    /// Value the code evaluated to, if it produced a serializable one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error message for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time in milliseconds.
    pub execution_time_ms: u64,
    /// Lines written through the sandbox's console shim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl ExecutionResult {
    /// Creates a successful result.
    pub fn success(output: Option<serde_json::Value>, elapsed: Duration) -> Self {
        Self {
            success: true,
            output,
            error: None,
            execution_time_ms: elapsed.as_millis() as u64,
            logs: Vec::new(),
        }
    }

    /// Creates a failed result.
    pub fn failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            execution_time_ms: elapsed.as_millis() as u64,
            logs: Vec::new(),
        }
    }

    /// Attaches captured console output.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors() {
        let ok = ExecutionResult::success(Some(json!(3)), Duration::from_millis(42));
        assert!(ok.success);
        assert_eq!(ok.execution_time_ms, 42);
        assert!(ok.error.is_none());

        let failed = ExecutionResult::failure("boom", Duration::from_secs(1))
            .with_logs(vec!["log line".to_string()]);
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.execution_time_ms, 1000);
        assert_eq!(failed.logs.len(), 1);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let ok = ExecutionResult::success(None, Duration::from_millis(5));
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, r#"{"success":true,"execution_time_ms":5}"#);
    }
}
