//! Assertion scorers and score aggregation.
//!
//! Every scorer turns one group of a case's expectations into zero or more
//! [`ScoreResult`]s. A score is `Some(1.0)` for a pass, `Some(0.0)` for a
//! failure and `None` when the assertion does not apply to the case; the
//! aggregator drops `None` entries before averaging.
//!
//! ```text
//! code + expectations + execution → ScorerRegistry → Vec<ScoreResult> → aggregate
//! ```

pub mod aggregate;
pub mod execution;
pub mod result;
pub mod semantic;
pub mod syntax;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cases::Expectations;
use crate::runner::{ExecutionResult, SearchIndexVerifier, SyntaxChecker};

pub use aggregate::{aggregate, AggregatedScore, COMPOUND_SCORE};
pub use execution::ExecutionScorer;
pub use result::ResultScorer;
pub use semantic::SemanticScorer;
pub use syntax::SyntaxScorer;

/// Category a score belongs to. Set by the scorer that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreCategory {
    Syntax,
    Semantic,
    Execution,
    Result,
    /// The overall compound across categories.
    Overall,
}

impl ScoreCategory {
    /// Assertion categories in reporting order.
    pub const ALL: [ScoreCategory; 4] = [
        ScoreCategory::Syntax,
        ScoreCategory::Semantic,
        ScoreCategory::Execution,
        ScoreCategory::Result,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ScoreCategory::Syntax => "Syntax",
            ScoreCategory::Semantic => "Semantic",
            ScoreCategory::Execution => "Execution",
            ScoreCategory::Result => "Result",
            ScoreCategory::Overall => "Overall",
        }
    }

    /// Full score name, e.g. `Syntax_IsValidJS`.
    pub fn scoped(&self, name: &str) -> String {
        format!("{}_{}", self.prefix(), name)
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One partial score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub category: ScoreCategory,
    /// Namespaced name, `<Category>_<Check>`.
    pub name: String,
    /// 1.0 pass, 0.0 fail, `None` not applicable.
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ScoreResult {
    /// Creates a score for `category` named `<Category>_<check>`.
    pub fn new(category: ScoreCategory, check: &str, score: Option<f64>) -> Self {
        Self {
            category,
            name: category.scoped(check),
            score,
            metadata: Map::new(),
        }
    }

    pub fn pass(category: ScoreCategory, check: &str) -> Self {
        Self::new(category, check, Some(1.0))
    }

    pub fn fail(category: ScoreCategory, check: &str) -> Self {
        Self::new(category, check, Some(0.0))
    }

    pub fn not_applicable(category: ScoreCategory, check: &str) -> Self {
        Self::new(category, check, None)
    }

    pub fn from_bool(category: ScoreCategory, check: &str, passed: bool) -> Self {
        if passed {
            Self::pass(category, check)
        } else {
            Self::fail(category, check)
        }
    }

    /// Adds a diagnostic metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_applicable(&self) -> bool {
        self.score.is_some()
    }

    pub fn passed(&self) -> bool {
        self.score == Some(1.0)
    }
}

/// Everything a scorer may look at for one (case, approach) run.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub code: &'a str,
    pub expected: &'a Expectations,
    pub execution: Option<&'a ExecutionResult>,
}

impl<'a> ScoringContext<'a> {
    pub fn new(
        code: &'a str,
        expected: &'a Expectations,
        execution: Option<&'a ExecutionResult>,
    ) -> Self {
        Self {
            code,
            expected,
            execution,
        }
    }
}

/// Produces partial scores for one group of expectations.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Scorer name, for logging.
    fn name(&self) -> &str;

    async fn score(&self, ctx: &ScoringContext<'_>) -> Vec<ScoreResult>;
}

/// Ordered collection of scorers run for every case.
#[derive(Default)]
pub struct ScorerRegistry {
    scorers: Vec<Box<dyn Scorer>>,
}

impl ScorerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in scorers, in category order.
    pub fn with_defaults(
        syntax_checker: Arc<dyn SyntaxChecker>,
        verifier: Arc<SearchIndexVerifier>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SyntaxScorer::new(syntax_checker)));
        registry.register(Box::new(SemanticScorer));
        registry.register(Box::new(ExecutionScorer));
        registry.register(Box::new(ResultScorer::new(verifier)));
        registry
    }

    pub fn register(&mut self, scorer: Box<dyn Scorer>) {
        self.scorers.push(scorer);
    }

    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scorers.iter().map(|s| s.name()).collect()
    }

    /// Run every scorer in registration order and concatenate the results.
    pub async fn score_all(&self, ctx: &ScoringContext<'_>) -> Vec<ScoreResult> {
        let mut scores = Vec::new();
        for scorer in &self.scorers {
            let produced = scorer.score(ctx).await;
            tracing::debug!(scorer = scorer.name(), count = produced.len(), "Scorer finished");
            scores.extend(produced);
        }
        scores
    }
}
