//! Access to the external search index namespace.
//!
//! The verifier and the cleanup coordinator both go through
//! [`SearchIndexCatalog`]. Every call site opens its own session and closes it
//! when done; sessions are never pooled or shared between cases.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cases::SearchIndexRef;
use crate::error::StoreError;

pub use memory::InMemoryCatalog;
pub use mongo::MongoCatalog;

/// One search index as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexInfo {
    /// Index name.
    pub name: String,
    /// Build status (e.g. "PENDING", "READY", "DELETING"), when reported.
    pub status: Option<String>,
    /// Full index document as returned by the server.
    pub document: serde_json::Value,
}

impl SearchIndexInfo {
    /// Index definition used for config comparisons: `latestDefinition` when
    /// the server reports one, otherwise the whole document.
    pub fn definition(&self) -> &serde_json::Value {
        self.document
            .get("latestDefinition")
            .unwrap_or(&self.document)
    }
}

/// Opens sessions against the external system.
#[async_trait]
pub trait SearchIndexCatalog: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn SearchIndexSession>, StoreError>;
}

/// A single open connection.
#[async_trait]
pub trait SearchIndexSession: Send + Sync {
    /// List every search index defined on `database.collection`.
    async fn list_search_indexes(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<SearchIndexInfo>, StoreError>;

    /// Request deletion of a search index. Deletion completes asynchronously.
    async fn drop_search_index(&self, target: &SearchIndexRef) -> Result<(), StoreError>;

    /// Release the connection. Errors are swallowed.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_prefers_latest_definition() {
        let info = SearchIndexInfo {
            name: "idx".to_string(),
            status: Some("READY".to_string()),
            document: json!({
                "name": "idx",
                "latestDefinition": {"mappings": {"dynamic": true}}
            }),
        };
        assert_eq!(info.definition(), &json!({"mappings": {"dynamic": true}}));

        let bare = SearchIndexInfo {
            name: "idx".to_string(),
            status: None,
            document: json!({"name": "idx", "mappings": {"dynamic": false}}),
        };
        assert_eq!(bare.definition(), &bare.document);
    }
}
