use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::database::{Document, DocumentStore, Query, StoreError, StoredDocument};

/// Process-local store with the same query semantics as Firestore.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Snapshot of a collection in id order.
    pub fn documents(&self, collection: &str) -> Vec<StoredDocument> {
        self.collections
            .read()
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| StoredDocument {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let mut matched: Vec<StoredDocument> = self
            .documents(collection)
            .into_iter()
            .filter(|document| query.matches(&document.fields))
            .collect();

        matched.sort_by(|a, b| query.compare(&a.fields, &b.fields));

        Ok(matched)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(documents) = self.collections.write().get_mut(collection) {
            documents.remove(id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::database::Direction;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[tokio::test]
    async fn test_create_query_delete() {
        let store = MemoryStore::new();

        store
            .create("responses", "a", doc(json!({"ts": "2025-01-01", "session_id": "test_a"})))
            .await
            .unwrap();
        store
            .create("responses", "b", doc(json!({"ts": "2025-03-01", "session_id": "real_b"})))
            .await
            .unwrap();
        store
            .create("responses", "c", doc(json!({"session_id": "test_c"})))
            .await
            .unwrap();

        assert_eq!(store.len("responses"), 3);
        assert!(store.is_empty("progressive_responses"));

        let ordered = store
            .query("responses", &Query::all().order_by("ts", Direction::Descending))
            .await
            .unwrap();
        let ids: Vec<&str> = ordered.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let tests = store
            .query("responses", &Query::all().range("session_id", "test_", "test`"))
            .await
            .unwrap();
        assert_eq!(tests.len(), 2);

        store.delete("responses", "a").await.unwrap();
        store.delete("missing", "a").await.unwrap();
        assert_eq!(store.len("responses"), 2);
    }
}
