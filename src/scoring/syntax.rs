//! Syntax checks: parse validity and async/await usage.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ScoreCategory, ScoreResult, Scorer, ScoringContext};
use crate::runner::{SyntaxChecker, SyntaxVerdict};

pub const IS_VALID_JS: &str = "IsValidJS";
pub const HAS_ASYNC_AWAIT: &str = "HasAsyncAwait";

/// Scores `Syntax_IsValidJS` and `Syntax_HasAsyncAwait`.
pub struct SyntaxScorer {
    checker: Arc<dyn SyntaxChecker>,
}

impl SyntaxScorer {
    pub fn new(checker: Arc<dyn SyntaxChecker>) -> Self {
        Self { checker }
    }

    async fn valid_js(&self, code: &str) -> ScoreResult {
        match self.checker.check(code).await {
            SyntaxVerdict::Valid => ScoreResult::pass(ScoreCategory::Syntax, IS_VALID_JS),
            SyntaxVerdict::Invalid(message) => {
                ScoreResult::fail(ScoreCategory::Syntax, IS_VALID_JS).with_metadata("error", message)
            }
            SyntaxVerdict::Unavailable(message) => {
                ScoreResult::fail(ScoreCategory::Syntax, IS_VALID_JS)
                    .with_metadata("checker_unavailable", message)
            }
        }
    }
}

/// Both keywords appear somewhere in the code. Purely lexical.
pub fn has_async_await(code: &str) -> bool {
    code.contains("async") && code.contains("await")
}

#[async_trait]
impl Scorer for SyntaxScorer {
    fn name(&self) -> &str {
        "syntax"
    }

    async fn score(&self, ctx: &ScoringContext<'_>) -> Vec<ScoreResult> {
        let valid = if ctx.expected.wants_valid_js() {
            self.valid_js(ctx.code).await
        } else {
            ScoreResult::not_applicable(ScoreCategory::Syntax, IS_VALID_JS)
        };

        let async_await = if ctx.expected.wants_async_await() {
            ScoreResult::from_bool(ScoreCategory::Syntax, HAS_ASYNC_AWAIT, has_async_await(ctx.code))
        } else {
            ScoreResult::not_applicable(ScoreCategory::Syntax, HAS_ASYNC_AWAIT)
        };

        vec![valid, async_await]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{Expectations, SyntaxExpectation};

    struct StubChecker(SyntaxVerdict);

    #[async_trait]
    impl SyntaxChecker for StubChecker {
        async fn check(&self, _code: &str) -> SyntaxVerdict {
            self.0.clone()
        }
    }

    fn scorer(verdict: SyntaxVerdict) -> SyntaxScorer {
        SyntaxScorer::new(Arc::new(StubChecker(verdict)))
    }

    fn expecting_both() -> Expectations {
        Expectations {
            syntax: Some(SyntaxExpectation {
                is_valid_js: Some(true),
                has_async_await: Some(true),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_has_async_await_is_lexical() {
        assert!(has_async_await("async function f() { await g(); }"));
        assert!(!has_async_await("async function f() { return 1; }"));
        assert!(!has_async_await("function f() {}"));
    }

    #[tokio::test]
    async fn test_requested_checks_are_scored() {
        let expected = expecting_both();
        let code = "async function run() { await client.connect(); }";
        let scores = scorer(SyntaxVerdict::Valid)
            .score(&ScoringContext::new(code, &expected, None))
            .await;

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].name, "Syntax_IsValidJS");
        assert_eq!(scores[0].score, Some(1.0));
        assert_eq!(scores[1].name, "Syntax_HasAsyncAwait");
        assert_eq!(scores[1].score, Some(1.0));
    }

    #[tokio::test]
    async fn test_invalid_code_records_error() {
        let expected = expecting_both();
        let scores = scorer(SyntaxVerdict::Invalid("SyntaxError: Unexpected end of input".into()))
            .score(&ScoringContext::new("function (", &expected, None))
            .await;

        assert_eq!(scores[0].score, Some(0.0));
        assert_eq!(scores[0].metadata["error"], "SyntaxError: Unexpected end of input");
        assert_eq!(scores[1].score, Some(0.0));
    }

    #[tokio::test]
    async fn test_unavailable_checker_scores_zero_with_metadata() {
        let expected = expecting_both();
        let scores = scorer(SyntaxVerdict::Unavailable("node missing".into()))
            .score(&ScoringContext::new("const x = 1;", &expected, None))
            .await;

        assert_eq!(scores[0].score, Some(0.0));
        assert_eq!(scores[0].metadata["checker_unavailable"], "node missing");
    }

    #[tokio::test]
    async fn test_unrequested_checks_are_not_applicable() {
        let expected = Expectations::default();
        let scores = scorer(SyntaxVerdict::Valid)
            .score(&ScoringContext::new("const x = 1;", &expected, None))
            .await;

        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.score.is_none()));
    }
}
