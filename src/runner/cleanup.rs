//! Reset of external state between runs.
//!
//! The search service allows a single index per name and deletes
//! asynchronously, so a drop is followed by polling until the index is no
//! longer listed. Cleanup never fails: every error is logged and swallowed so
//! the evaluation can continue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cases::SearchIndexRef;
use crate::error::StoreError;
use crate::store::{SearchIndexCatalog, SearchIndexSession};

/// How a cleanup attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Nothing to drop.
    Absent,
    /// Dropped and confirmed gone.
    Removed,
    /// Drop issued but the index was still listed at the deadline.
    TimedOut,
    /// Connecting, listing or dropping failed.
    Failed,
}

/// Drops search indexes and waits for deletion to complete.
pub struct CleanupCoordinator {
    catalog: Arc<dyn SearchIndexCatalog>,
    poll_interval: Duration,
}

impl CleanupCoordinator {
    pub fn new(catalog: Arc<dyn SearchIndexCatalog>) -> Self {
        Self {
            catalog,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Drop `target` if it exists and wait up to `max_wait` for it to go away.
    pub async fn cleanup(&self, target: &SearchIndexRef, max_wait: Duration) -> CleanupOutcome {
        let session = match self.catalog.connect().await {
            Ok(session) => session,
            Err(e) => {
                warn!(index = %target, error = %e, "Cleanup could not connect");
                return CleanupOutcome::Failed;
            }
        };

        let outcome = match self.drop_and_wait(session.as_ref(), target, max_wait).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(index = %target, error = %e, "Cleanup failed");
                CleanupOutcome::Failed
            }
        };
        session.close().await;

        match outcome {
            CleanupOutcome::Removed => info!(index = %target, "Search index removed"),
            CleanupOutcome::TimedOut => warn!(
                index = %target,
                max_wait_ms = max_wait.as_millis() as u64,
                "Search index still listed after cleanup wait"
            ),
            CleanupOutcome::Absent => debug!(index = %target, "Nothing to clean up"),
            CleanupOutcome::Failed => {}
        }
        outcome
    }

    async fn drop_and_wait(
        &self,
        session: &dyn SearchIndexSession,
        target: &SearchIndexRef,
        max_wait: Duration,
    ) -> Result<CleanupOutcome, StoreError> {
        if !index_listed(session, target).await? {
            return Ok(CleanupOutcome::Absent);
        }

        session.drop_search_index(target).await?;
        let deadline = Instant::now() + max_wait;

        loop {
            if !index_listed(session, target).await? {
                return Ok(CleanupOutcome::Removed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(CleanupOutcome::TimedOut);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

async fn index_listed(
    session: &dyn SearchIndexSession,
    target: &SearchIndexRef,
) -> Result<bool, StoreError> {
    let indexes = session
        .list_search_indexes(&target.database, &target.collection)
        .await?;
    Ok(indexes.iter().any(|idx| idx.name == target.index_name))
}
