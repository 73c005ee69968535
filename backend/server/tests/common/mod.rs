#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{Value, json};
use server::{
    app,
    config::Config,
    database::{Document, DocumentStore, Query, StoreError, StoredDocument},
    memory::MemoryStore,
    state::AppState,
};

pub const RESPONSES: &str = "responses";
pub const PROGRESSIVE: &str = "progressive_responses";

pub fn server_with(config: Config, store: Option<Arc<dyn DocumentStore>>) -> TestServer {
    TestServer::new(app(AppState::with_store(config, store))).unwrap()
}

pub fn memory_server() -> (TestServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Config::default(), Some(store.clone()));

    (server, store)
}

pub fn storeless_server() -> TestServer {
    server_with(Config::default(), None)
}

pub fn full_answers() -> Value {
    json!({"q1": "a", "q2": "b", "q3": "c", "q4": "d", "q5": "e", "q6": "f"})
}

pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Memory store whose writes to one collection always fail.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub failing_collection: String,
}

impl FailingStore {
    pub fn new(failing_collection: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_collection: failing_collection.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        if collection == self.failing_collection {
            return Err(StoreError::Status {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }

        self.inner.create(collection, id, document).await
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.query(collection, query).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }
}
