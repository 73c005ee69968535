use payloads::{
    QUESTION_KEYS,
    responses::{Listing, ProgressiveEntry, ResponseEntry, ResponseMetadata},
};
use serde_json::Value;

use crate::{
    database::{Direction, DocumentStore, Query, StoreError, StoredDocument},
    utils::truncate,
};

const USER_AGENT_CHARS: usize = 100;

pub async fn list_responses(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Listing<ResponseEntry>, StoreError> {
    let query = Query::all().order_by("ts", Direction::Descending);
    let documents = store.query(collection, &query).await?;

    Ok(Listing::new(documents.iter().map(response_entry).collect()))
}

pub async fn list_progressive(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Listing<ProgressiveEntry>, StoreError> {
    let query = Query::all().order_by("timestamp", Direction::Descending);
    let documents = store.query(collection, &query).await?;

    Ok(Listing::new(documents.iter().map(progressive_entry).collect()))
}

pub fn response_entry(document: &StoredDocument) -> ResponseEntry {
    let user_agent = document
        .fields
        .get("ua")
        .and_then(Value::as_str)
        .filter(|ua| !ua.is_empty())
        .map(|ua| truncate(ua, USER_AGENT_CHARS));

    ResponseEntry {
        id: document.id.clone(),
        timestamp: document.field("ts"),
        session_id: document.field("session_id"),
        campaign_id: document.field("campaign_id"),
        answers: QUESTION_KEYS
            .iter()
            .map(|key| (key.to_string(), document.field(key)))
            .collect(),
        metadata: ResponseMetadata {
            user_agent,
            referer: document.field("referer"),
            origin: document.field("origin"),
            page_url: document.field("page_url"),
            is_complete: document
                .fields
                .get("is_complete")
                .cloned()
                .unwrap_or(Value::Bool(true)),
        },
    }
}

pub fn progressive_entry(document: &StoredDocument) -> ProgressiveEntry {
    ProgressiveEntry {
        id: document.id.clone(),
        session_id: document.field("session_id"),
        question_number: document.field("question_number"),
        answer: document.field("answer"),
        is_complete: document
            .fields
            .get("is_complete")
            .cloned()
            .unwrap_or(Value::Bool(false)),
        timestamp: document.field("timestamp"),
        completion_timestamp: document.field("completion_timestamp"),
        campaign_id: document.field("campaign_id"),
        all_answers: document.field("all_answers"),
    }
}
