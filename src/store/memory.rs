//! In-process search index catalog.
//!
//! Mirrors the eventually consistent behaviour of the real service: a dropped
//! index stays visible (with status `DELETING`) for a configurable number of
//! listings before it disappears. Stands in for a live deployment in the
//! orchestrator, cleanup and verifier tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::json;

use super::{SearchIndexCatalog, SearchIndexInfo, SearchIndexSession};
use crate::cases::SearchIndexRef;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct CatalogState {
    indexes: BTreeMap<(String, String), Vec<StoredIndex>>,
    drop_lag: usize,
    fail_connect: bool,
    stats: CatalogStats,
}

#[derive(Debug, Clone)]
struct StoredIndex {
    info: SearchIndexInfo,
    // Listings left before a dropped index disappears.
    pending_drop: Option<usize>,
}

/// Call counters, for asserting on how the catalog was used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub connects: usize,
    pub closes: usize,
    pub lists: usize,
    pub drops: usize,
}

/// Shared in-memory catalog. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of listings a dropped index remains visible for.
    pub fn with_drop_lag(self, listings: usize) -> Self {
        self.lock().drop_lag = listings;
        self
    }

    /// Make every `connect` fail.
    pub fn failing(self) -> Self {
        self.lock().fail_connect = true;
        self
    }

    /// Insert an index with the given definition and status `READY`.
    pub fn insert_index(&self, target: &SearchIndexRef, definition: serde_json::Value) {
        let info = SearchIndexInfo {
            name: target.index_name.clone(),
            status: Some("READY".to_string()),
            document: json!({
                "name": target.index_name,
                "status": "READY",
                "queryable": true,
                "latestDefinition": definition,
            }),
        };
        let mut state = self.lock();
        let entries = state
            .indexes
            .entry((target.database.clone(), target.collection.clone()))
            .or_default();
        entries.retain(|idx| idx.info.name != target.index_name);
        entries.push(StoredIndex {
            info,
            pending_drop: None,
        });
    }

    /// Whether an index is currently visible (including one being deleted).
    pub fn contains(&self, target: &SearchIndexRef) -> bool {
        self.lock()
            .indexes
            .get(&(target.database.clone(), target.collection.clone()))
            .map(|entries| entries.iter().any(|idx| idx.info.name == target.index_name))
            .unwrap_or(false)
    }

    /// Total number of visible indexes across all namespaces.
    pub fn index_count(&self) -> usize {
        self.lock().indexes.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> CatalogStats {
        self.lock().stats.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        // A poisoned lock only means a test panicked mid-update; the data is
        // still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SearchIndexCatalog for InMemoryCatalog {
    async fn connect(&self) -> Result<Box<dyn SearchIndexSession>, StoreError> {
        let mut state = self.lock();
        if state.fail_connect {
            return Err(StoreError::Connection(
                "in-memory catalog configured to fail".to_string(),
            ));
        }
        state.stats.connects += 1;
        drop(state);
        Ok(Box::new(InMemorySession {
            catalog: self.clone(),
        }))
    }
}

struct InMemorySession {
    catalog: InMemoryCatalog,
}

#[async_trait]
impl SearchIndexSession for InMemorySession {
    async fn list_search_indexes(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<SearchIndexInfo>, StoreError> {
        let mut state = self.catalog.lock();
        state.stats.lists += 1;

        let key = (database.to_string(), collection.to_string());
        let Some(entries) = state.indexes.get_mut(&key) else {
            return Ok(Vec::new());
        };

        let listed = entries.iter().map(|idx| idx.info.clone()).collect();

        for idx in entries.iter_mut() {
            if let Some(remaining) = idx.pending_drop.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }
        }
        entries.retain(|idx| idx.pending_drop != Some(0));

        Ok(listed)
    }

    async fn drop_search_index(&self, target: &SearchIndexRef) -> Result<(), StoreError> {
        let mut state = self.catalog.lock();
        state.stats.drops += 1;
        let lag = state.drop_lag;

        let key = (target.database.clone(), target.collection.clone());
        let entries = state.indexes.get_mut(&key).ok_or_else(|| StoreError::Drop {
            namespace: target.namespace(),
            index: target.index_name.clone(),
            message: "index not found".to_string(),
        })?;

        let position = entries
            .iter()
            .position(|idx| idx.info.name == target.index_name)
            .ok_or_else(|| StoreError::Drop {
                namespace: target.namespace(),
                index: target.index_name.clone(),
                message: "index not found".to_string(),
            })?;

        if lag == 0 {
            entries.remove(position);
        } else {
            let entry = &mut entries[position];
            entry.pending_drop = Some(lag);
            entry.info.status = Some("DELETING".to_string());
        }
        Ok(())
    }

    async fn close(&self) {
        self.catalog.lock().stats.closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SearchIndexRef {
        SearchIndexRef::new("db", "coll", "idx")
    }

    #[tokio::test]
    async fn test_insert_list_and_drop() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_index(&target(), json!({"mappings": {"dynamic": true}}));

        let session = catalog.connect().await.unwrap();
        let listed = session.list_search_indexes("db", "coll").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "idx");

        session.drop_search_index(&target()).await.unwrap();
        assert!(!catalog.contains(&target()));
        session.close().await;

        let stats = catalog.stats();
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.closes, 1);
        assert_eq!(stats.drops, 1);
    }

    #[tokio::test]
    async fn test_drop_lag_keeps_index_visible() {
        let catalog = InMemoryCatalog::new().with_drop_lag(2);
        catalog.insert_index(&target(), json!({}));

        let session = catalog.connect().await.unwrap();
        session.drop_search_index(&target()).await.unwrap();

        let first = session.list_search_indexes("db", "coll").await.unwrap();
        assert_eq!(first[0].status.as_deref(), Some("DELETING"));
        let second = session.list_search_indexes("db", "coll").await.unwrap();
        assert_eq!(second.len(), 1);
        let third = session.list_search_indexes("db", "coll").await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_drop_missing_index_errors() {
        let catalog = InMemoryCatalog::new();
        let session = catalog.connect().await.unwrap();
        let err = session.drop_search_index(&target()).await.unwrap_err();
        assert!(matches!(err, StoreError::Drop { .. }));
    }

    #[tokio::test]
    async fn test_failing_catalog() {
        let catalog = InMemoryCatalog::new().failing();
        assert!(catalog.connect().await.is_err());
        assert_eq!(catalog.stats().connects, 0);
    }
}
