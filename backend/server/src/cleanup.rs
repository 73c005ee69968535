use payloads::{TEST_SESSION_END, TEST_SESSION_PREFIX, responses::DeletedCounts};
use tracing::info;

use crate::database::{DocumentStore, Query, StoreError};

/// Removes QA sessions from both collections.
///
/// Scan then delete one document at a time, a failure midway leaves the
/// earlier deletions in place.
pub async fn cleanup_test_sessions(
    store: &dyn DocumentStore,
    collection: &str,
    progressive_collection: &str,
) -> Result<DeletedCounts, StoreError> {
    let responses = delete_test_sessions(store, collection).await?;
    let progressive = delete_test_sessions(store, progressive_collection).await?;

    Ok(DeletedCounts {
        responses,
        progressive,
        total: responses + progressive,
    })
}

async fn delete_test_sessions(store: &dyn DocumentStore, collection: &str) -> Result<usize, StoreError> {
    let query = Query::all().range("session_id", TEST_SESSION_PREFIX, TEST_SESSION_END);
    let documents = store.query(collection, &query).await?;

    for document in &documents {
        store.delete(collection, &document.id).await?;
    }

    info!(collection, deleted = documents.len(), "Removed test sessions");

    Ok(documents.len())
}
