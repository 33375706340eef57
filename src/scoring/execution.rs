//! Execution success check.

use async_trait::async_trait;

use super::{ScoreCategory, ScoreResult, Scorer, ScoringContext};

pub const SUCCEEDS: &str = "Succeeds";

/// Scores `Execution_Succeeds` from the sandbox result.
pub struct ExecutionScorer;

#[async_trait]
impl Scorer for ExecutionScorer {
    fn name(&self) -> &str {
        "execution"
    }

    async fn score(&self, ctx: &ScoringContext<'_>) -> Vec<ScoreResult> {
        if !ctx.expected.execution_requested() {
            return vec![ScoreResult::not_applicable(ScoreCategory::Execution, SUCCEEDS)];
        }

        let result = match ctx.execution {
            None => ScoreResult::fail(ScoreCategory::Execution, SUCCEEDS)
                .with_metadata("reason", "code was not executed"),
            Some(execution) if execution.success => {
                ScoreResult::pass(ScoreCategory::Execution, SUCCEEDS)
                    .with_metadata("execution_time_ms", execution.execution_time_ms)
            }
            Some(execution) => ScoreResult::fail(ScoreCategory::Execution, SUCCEEDS)
                .with_metadata("execution_time_ms", execution.execution_time_ms)
                .with_metadata(
                    "error",
                    execution.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                ),
        };
        vec![result]
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cases::{ExecutionExpectation, Expectations};
    use crate::runner::ExecutionResult;

    fn requested() -> Expectations {
        Expectations {
            execution: Some(ExecutionExpectation {
                should_succeed: Some(true),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_successful_execution_passes() {
        let expected = requested();
        let execution = ExecutionResult::success(None, Duration::from_millis(30));
        let scores = ExecutionScorer
            .score(&ScoringContext::new("", &expected, Some(&execution)))
            .await;

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].name, "Execution_Succeeds");
        assert_eq!(scores[0].score, Some(1.0));
    }

    #[tokio::test]
    async fn test_failed_execution_records_error() {
        let expected = requested();
        let execution =
            ExecutionResult::failure("Execution timed out after 100ms", Duration::from_millis(100));
        let scores = ExecutionScorer
            .score(&ScoringContext::new("", &expected, Some(&execution)))
            .await;

        assert_eq!(scores[0].score, Some(0.0));
        assert_eq!(scores[0].metadata["error"], "Execution timed out after 100ms");
    }

    #[tokio::test]
    async fn test_missing_execution_fails_with_reason() {
        let expected = requested();
        let scores = ExecutionScorer
            .score(&ScoringContext::new("", &expected, None))
            .await;

        assert_eq!(scores[0].score, Some(0.0));
        assert!(scores[0].metadata.contains_key("reason"));
    }

    #[tokio::test]
    async fn test_not_requested_is_not_applicable() {
        let expected = Expectations {
            execution: Some(ExecutionExpectation {
                should_succeed: Some(false),
            }),
            ..Default::default()
        };
        let execution = ExecutionResult::success(None, Duration::ZERO);
        let scores = ExecutionScorer
            .score(&ScoringContext::new("", &expected, Some(&execution)))
            .await;

        assert_eq!(scores[0].score, None);
    }
}
