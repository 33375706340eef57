//! Compound scoring.
//!
//! Not-applicable scores are dropped first. Each category with at least one
//! remaining score gets a `<Category>_Compound` equal to the mean of its
//! members, and the overall `CompoundScore` is the mean of those category
//! compounds. Categories therefore weigh the same no matter how many checks
//! they contain.

use serde::{Deserialize, Serialize};

use super::{ScoreCategory, ScoreResult};

/// Name of the overall compound score.
pub const COMPOUND_SCORE: &str = "CompoundScore";

/// Scores for one (case, approach) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScore {
    /// Every applicable individual score, in production order.
    pub individual: Vec<ScoreResult>,
    /// One compound per category with at least one applicable score.
    pub categories: Vec<ScoreResult>,
    /// The overall compound. `score` is `None` when no category applied.
    pub compound: ScoreResult,
}

impl AggregatedScore {
    /// A zero compound for runs that failed before they could be scored.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            individual: Vec::new(),
            categories: Vec::new(),
            compound: compound_result(Some(0.0)).with_metadata("error", error.into()),
        }
    }

    pub fn compound_score(&self) -> Option<f64> {
        self.compound.score
    }

    pub fn category(&self, category: ScoreCategory) -> Option<&ScoreResult> {
        self.categories.iter().find(|c| c.category == category)
    }
}

fn compound_result(score: Option<f64>) -> ScoreResult {
    ScoreResult {
        category: ScoreCategory::Overall,
        name: COMPOUND_SCORE.to_string(),
        score,
        metadata: Default::default(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Aggregate partial scores into category and overall compounds.
pub fn aggregate(scores: Vec<ScoreResult>) -> AggregatedScore {
    let individual: Vec<ScoreResult> = scores.into_iter().filter(|s| s.is_applicable()).collect();

    let categories: Vec<ScoreResult> = ScoreCategory::ALL
        .iter()
        .filter_map(|&category| {
            let members: Vec<f64> = individual
                .iter()
                .filter(|s| s.category == category)
                .filter_map(|s| s.score)
                .collect();
            let value = mean(&members)?;
            Some(
                ScoreResult::new(category, "Compound", Some(value))
                    .with_metadata("count", members.len()),
            )
        })
        .collect();

    let category_means: Vec<f64> = categories.iter().filter_map(|c| c.score).collect();
    let compound = compound_result(mean(&category_means))
        .with_metadata("categories", categories.len());

    AggregatedScore {
        individual,
        categories,
        compound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(category: ScoreCategory, name: &str, value: Option<f64>) -> ScoreResult {
        ScoreResult::new(category, name, value)
    }

    #[test]
    fn test_mean_of_category_means() {
        let scores = vec![
            score(ScoreCategory::Syntax, "A", Some(1.0)),
            score(ScoreCategory::Syntax, "B", Some(1.0)),
            score(ScoreCategory::Syntax, "C", Some(1.0)),
            score(ScoreCategory::Syntax, "D", Some(1.0)),
            score(ScoreCategory::Execution, "Succeeds", Some(0.0)),
        ];

        let aggregated = aggregate(scores);

        assert_eq!(
            aggregated.category(ScoreCategory::Syntax).unwrap().score,
            Some(1.0)
        );
        assert_eq!(
            aggregated.category(ScoreCategory::Execution).unwrap().score,
            Some(0.0)
        );
        // A flat mean would be 0.8.
        assert_eq!(aggregated.compound_score(), Some(0.5));
        assert_eq!(aggregated.compound.name, "CompoundScore");
    }

    #[test]
    fn test_not_applicable_scores_are_dropped() {
        let scores = vec![
            score(ScoreCategory::Syntax, "IsValidJS", Some(1.0)),
            score(ScoreCategory::Syntax, "HasAsyncAwait", None),
            score(ScoreCategory::Semantic, "MustContain", None),
            score(ScoreCategory::Result, "SearchIndexExists", Some(0.0)),
        ];

        let aggregated = aggregate(scores);

        assert_eq!(aggregated.individual.len(), 2);
        let names: Vec<&str> = aggregated.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Syntax_Compound", "Result_Compound"]);
        assert_eq!(aggregated.compound_score(), Some(0.5));
    }

    #[test]
    fn test_partial_category() {
        let scores = vec![
            score(ScoreCategory::Semantic, "A", Some(1.0)),
            score(ScoreCategory::Semantic, "B", Some(0.0)),
            score(ScoreCategory::Semantic, "C", Some(0.0)),
            score(ScoreCategory::Semantic, "D", Some(1.0)),
        ];
        let aggregated = aggregate(scores);
        assert_eq!(aggregated.compound_score(), Some(0.5));
        assert_eq!(aggregated.categories[0].metadata["count"], 4);
    }

    #[test]
    fn test_nothing_applicable_has_no_compound() {
        let aggregated = aggregate(vec![score(ScoreCategory::Syntax, "IsValidJS", None)]);
        assert!(aggregated.individual.is_empty());
        assert!(aggregated.categories.is_empty());
        assert_eq!(aggregated.compound_score(), None);

        assert_eq!(aggregate(Vec::new()).compound_score(), None);
    }

    #[test]
    fn test_failed_run_scores_zero() {
        let failed = AggregatedScore::failed("missing skill");
        assert_eq!(failed.compound_score(), Some(0.0));
        assert_eq!(failed.compound.metadata["error"], "missing skill");
    }
}
