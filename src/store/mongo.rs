//! MongoDB-backed search index catalog.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::Client;
use tracing::debug;

use super::{SearchIndexCatalog, SearchIndexInfo, SearchIndexSession};
use crate::cases::SearchIndexRef;
use crate::error::StoreError;

/// Server error code for a missing database or collection.
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Catalog that opens a fresh MongoDB client per session.
#[derive(Debug, Clone)]
pub struct MongoCatalog {
    uri: String,
    server_selection_timeout: Duration,
}

impl MongoCatalog {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            server_selection_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }
}

#[async_trait]
impl SearchIndexCatalog for MongoCatalog {
    async fn connect(&self) -> Result<Box<dyn SearchIndexSession>, StoreError> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.app_name = Some("skill-eval".to_string());
        options.server_selection_timeout = Some(self.server_selection_timeout);

        let client =
            Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;

        // The driver connects lazily; ping so connection failures surface here.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Box::new(MongoSession { client }))
    }
}

struct MongoSession {
    client: Client,
}

#[async_trait]
impl SearchIndexSession for MongoSession {
    async fn list_search_indexes(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<SearchIndexInfo>, StoreError> {
        let namespace = format!("{}.{}", database, collection);
        let coll = self
            .client
            .database(database)
            .collection::<Document>(collection);

        let cursor = match coll.list_search_indexes().await {
            Ok(cursor) => cursor,
            Err(e) if is_namespace_not_found(&e) => {
                debug!(namespace = %namespace, "Collection does not exist; no search indexes");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StoreError::List {
                    namespace,
                    message: e.to_string(),
                })
            }
        };

        let documents: Vec<Document> =
            cursor
                .try_collect()
                .await
                .map_err(|e: MongoError| StoreError::List {
                    namespace: namespace.clone(),
                    message: e.to_string(),
                })?;

        Ok(documents.into_iter().map(to_index_info).collect())
    }

    async fn drop_search_index(&self, target: &SearchIndexRef) -> Result<(), StoreError> {
        self.client
            .database(&target.database)
            .collection::<Document>(&target.collection)
            .drop_search_index(&target.index_name)
            .await
            .map_err(|e| StoreError::Drop {
                namespace: target.namespace(),
                index: target.index_name.clone(),
                message: e.to_string(),
            })
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

fn to_index_info(document: Document) -> SearchIndexInfo {
    let name = document.get_str("name").unwrap_or_default().to_string();
    let status = document.get_str("status").ok().map(str::to_string);
    SearchIndexInfo {
        name,
        status,
        document: Bson::Document(document).into_relaxed_extjson(),
    }
}

fn is_namespace_not_found(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => command.code == NAMESPACE_NOT_FOUND,
        _ => false,
    }
}
