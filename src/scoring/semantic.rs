//! Literal substring presence/absence checks.

use async_trait::async_trait;

use super::{ScoreCategory, ScoreResult, Scorer, ScoringContext};
use crate::cases::PatternCheck;

/// Scores each `mustContain` / `mustNotContain` entry as `Semantic_<name>`.
pub struct SemanticScorer;

impl SemanticScorer {
    fn check_all(
        code: &str,
        checks: &[PatternCheck],
        placeholder: &str,
        want_present: bool,
    ) -> Vec<ScoreResult> {
        if checks.is_empty() {
            return vec![ScoreResult::not_applicable(ScoreCategory::Semantic, placeholder)];
        }
        checks
            .iter()
            .map(|check| {
                let present = code.contains(&check.pattern);
                ScoreResult::from_bool(ScoreCategory::Semantic, &check.name, present == want_present)
                    .with_metadata("pattern", check.pattern.as_str())
            })
            .collect()
    }
}

#[async_trait]
impl Scorer for SemanticScorer {
    fn name(&self) -> &str {
        "semantic"
    }

    async fn score(&self, ctx: &ScoringContext<'_>) -> Vec<ScoreResult> {
        let mut scores =
            Self::check_all(ctx.code, ctx.expected.must_contain(), "MustContain", true);
        scores.extend(Self::check_all(
            ctx.code,
            ctx.expected.must_not_contain(),
            "MustNotContain",
            false,
        ));
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{Expectations, SemanticExpectation};

    fn expectations(contain: Vec<PatternCheck>, not_contain: Vec<PatternCheck>) -> Expectations {
        Expectations {
            semantic: Some(SemanticExpectation {
                must_contain: Some(contain),
                must_not_contain: Some(not_contain),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_presence_and_absence() {
        let expected = expectations(
            vec![
                PatternCheck::new(".createSearchIndex(", "UsesCreateSearchIndex"),
                PatternCheck::new("dynamic: true", "DynamicMapping"),
            ],
            vec![PatternCheck::new("dropDatabase", "NoDropDatabase")],
        );
        let code = "await coll.createSearchIndex({ name: 'idx', definition: { mappings: { dynamic: false } } });";

        let scores = SemanticScorer
            .score(&ScoringContext::new(code, &expected, None))
            .await;

        let by_name: Vec<(&str, Option<f64>)> =
            scores.iter().map(|s| (s.name.as_str(), s.score)).collect();
        assert_eq!(
            by_name,
            vec![
                ("Semantic_UsesCreateSearchIndex", Some(1.0)),
                ("Semantic_DynamicMapping", Some(0.0)),
                ("Semantic_NoDropDatabase", Some(1.0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_forbidden_pattern_present_fails() {
        let expected = expectations(vec![], vec![PatternCheck::new("eval(", "NoEval")]);
        let scores = SemanticScorer
            .score(&ScoringContext::new("eval('1')", &expected, None))
            .await;

        assert_eq!(scores[0].name, "Semantic_MustContain");
        assert_eq!(scores[0].score, None);
        assert_eq!(scores[1].name, "Semantic_NoEval");
        assert_eq!(scores[1].score, Some(0.0));
    }

    #[tokio::test]
    async fn test_patterns_are_literal() {
        let expected = expectations(vec![PatternCheck::new("a.b(", "Literal")], vec![]);
        let scores = SemanticScorer
            .score(&ScoringContext::new("aXb(", &expected, None))
            .await;
        assert_eq!(scores[0].score, Some(0.0));
    }

    #[tokio::test]
    async fn test_absent_group_yields_two_not_applicable() {
        let expected = Expectations::default();
        let scores = SemanticScorer
            .score(&ScoringContext::new("", &expected, None))
            .await;

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[1].name, "Semantic_MustNotContain");
        assert!(scores.iter().all(|s| !s.is_applicable()));
    }
}
