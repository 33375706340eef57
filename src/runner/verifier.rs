//! Verification of the external state left behind by generated code.
//!
//! Search index listings are eventually consistent: an index created a
//! moment ago may not be listed yet. The verifier polls the listing until the
//! expected index shows up or the wait budget runs out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::result::ExecutionResult;
use crate::cases::{SearchIndexExpectation, SearchIndexRef};
use crate::error::StoreError;
use crate::scoring::{ScoreCategory, ScoreResult};
use crate::store::{SearchIndexCatalog, SearchIndexInfo, SearchIndexSession};

pub const SEARCH_INDEX_EXISTS: &str = "SearchIndexExists";

enum Lookup {
    Found(SearchIndexInfo),
    Missing(Vec<String>),
}

/// Checks that an expected search index exists and matches its config.
pub struct SearchIndexVerifier {
    catalog: Arc<dyn SearchIndexCatalog>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl SearchIndexVerifier {
    pub fn new(catalog: Arc<dyn SearchIndexCatalog>) -> Self {
        Self {
            catalog,
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Produce `Result_SearchIndexExists` plus one `Result_Config_<path>`
    /// score per config entry.
    pub async fn verify(
        &self,
        expectation: Option<&SearchIndexExpectation>,
        execution: Option<&ExecutionResult>,
    ) -> Vec<ScoreResult> {
        let Some(expectation) = expectation else {
            return vec![ScoreResult::not_applicable(
                ScoreCategory::Result,
                SEARCH_INDEX_EXISTS,
            )];
        };

        match execution {
            None => {
                return vec![ScoreResult::fail(ScoreCategory::Result, SEARCH_INDEX_EXISTS)
                    .with_metadata("reason", "code was not executed")]
            }
            Some(execution) if !execution.success => {
                let mut failed = ScoreResult::fail(ScoreCategory::Result, SEARCH_INDEX_EXISTS)
                    .with_metadata("reason", "execution failed");
                if let Some(ref error) = execution.error {
                    failed = failed.with_metadata("execution_error", error.as_str());
                }
                return vec![failed];
            }
            Some(_) => {}
        }

        let target = expectation.target();
        let lookup = match self.catalog.connect().await {
            Ok(session) => {
                let lookup = self.find_index(session.as_ref(), &target).await;
                session.close().await;
                lookup
            }
            Err(e) => Err(e),
        };

        match lookup {
            Ok(Lookup::Found(info)) => {
                info!(index = %target, status = ?info.status, "Search index found");
                let mut scores = vec![ScoreResult::pass(ScoreCategory::Result, SEARCH_INDEX_EXISTS)
                    .with_metadata("status", info.status.clone().map_or(Value::Null, Value::String))];
                scores.extend(
                    expectation
                        .config
                        .iter()
                        .map(|(path, expected)| config_score(&info, path, expected)),
                );
                scores
            }
            Ok(Lookup::Missing(found)) => {
                info!(index = %target, found = ?found, "Search index not found");
                let mut scores = vec![ScoreResult::fail(ScoreCategory::Result, SEARCH_INDEX_EXISTS)
                    .with_metadata("found_indexes", found)];
                scores.extend(expectation.config.keys().map(|path| {
                    config_name_fail(path).with_metadata("reason", "index not found")
                }));
                scores
            }
            Err(e) => {
                warn!(index = %target, error = %e, "Search index verification failed");
                let mut scores = vec![ScoreResult::fail(ScoreCategory::Result, SEARCH_INDEX_EXISTS)
                    .with_metadata("reason", format!("verification failed: {}", e))];
                scores.extend(
                    expectation
                        .config
                        .keys()
                        .map(|path| config_name_fail(path).with_metadata("reason", "index not verified")),
                );
                scores
            }
        }
    }

    async fn find_index(
        &self,
        session: &dyn SearchIndexSession,
        target: &SearchIndexRef,
    ) -> Result<Lookup, StoreError> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let indexes = session
                .list_search_indexes(&target.database, &target.collection)
                .await?;
            if let Some(found) = indexes.iter().find(|idx| idx.name == target.index_name) {
                return Ok(Lookup::Found(found.clone()));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Lookup::Missing(
                    indexes.into_iter().map(|idx| idx.name).collect(),
                ));
            }
            debug!(index = %target, "Search index not listed yet, polling");
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

fn config_name_fail(path: &str) -> ScoreResult {
    ScoreResult::fail(ScoreCategory::Result, &format!("Config_{}", path))
}

fn config_score(info: &SearchIndexInfo, path: &str, expected: &Value) -> ScoreResult {
    let actual = lookup_path(info.definition(), path).or_else(|| lookup_path(&info.document, path));
    let matched = actual.is_some_and(|actual| values_match(actual, expected));
    ScoreResult::from_bool(ScoreCategory::Result, &format!("Config_{}", path), matched)
        .with_metadata("expected", expected.clone())
        .with_metadata("actual", actual.cloned().unwrap_or(Value::Null))
}

/// Resolve a dot path such as `mappings.fields.title.type`. Numeric segments
/// index into arrays.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Deep equality with numbers compared by value (`1` equals `1.0`).
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_match(x, y)))
        }
        _ => actual == expected,
    }
}
