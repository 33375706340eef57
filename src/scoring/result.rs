//! External-state checks, delegated to the search index verifier.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ScoreResult, Scorer, ScoringContext};
use crate::runner::SearchIndexVerifier;

/// Scores `Result_SearchIndexExists` and `Result_Config_<path>`.
pub struct ResultScorer {
    verifier: Arc<SearchIndexVerifier>,
}

impl ResultScorer {
    pub fn new(verifier: Arc<SearchIndexVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Scorer for ResultScorer {
    fn name(&self) -> &str {
        "result"
    }

    async fn score(&self, ctx: &ScoringContext<'_>) -> Vec<ScoreResult> {
        self.verifier
            .verify(ctx.expected.search_index(), ctx.execution)
            .await
    }
}
