//! # Firestore
//!
//! Document store backed by the Firestore REST API (v1).
//!
//! ## Endpoints
//! - Create: `POST {documents}/{collection}?documentId={id}`
//! - Query: `POST {documents}:runQuery` with a structured query
//! - Delete: `DELETE {documents}/{collection}/{id}`
//!
//! ## Credentials
//! - A static bearer token if one is configured (env or `/run/secrets`)
//! - The emulator accepts the fixed `owner` token over plain HTTP
//! - Otherwise the metadata server of the Cloud Run/GCE instance hands out a
//!   service account token, cached until a minute before it expires
//!
//! ## Commands
//!
//! Local emulator.
//! ```sh
//! gcloud emulators firestore start --host-port=localhost:8681
//! FIRESTORE_EMULATOR_HOST=localhost:8681 PROJECT_ID=demo cargo run -p survey-backend
//! ```
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    codec::{decode_fields, document_id, encode_fields},
    config::Config,
    database::{Direction, Document, DocumentStore, Query, StoreError, StoredDocument},
};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const EMULATOR_TOKEN: &str = "owner";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

enum Credentials {
    Static(String),
    Emulator,
    Metadata,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct QueryResult {
    document: Option<RawDocument>,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

pub struct FirestoreStore {
    http: Client,
    documents_url: String,
    credentials: Credentials,
    token: Mutex<Option<CachedToken>>,
}

impl FirestoreStore {
    pub fn new(config: &Config, project_id: &str) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;

        let (root, credentials) = match (&config.emulator_host, &config.access_token) {
            (Some(host), _) => (format!("http://{host}/v1"), Credentials::Emulator),
            (None, Some(token)) => (FIRESTORE_URL.to_string(), Credentials::Static(token.clone())),
            (None, None) => (FIRESTORE_URL.to_string(), Credentials::Metadata),
        };

        let documents_url = format!(
            "{root}/projects/{project_id}/databases/{}/documents",
            config.database_id
        );
        info!("Firestore documents at {documents_url}");

        Ok(Self {
            http,
            documents_url,
            credentials,
            token: Mutex::new(None),
        })
    }

    async fn bearer(&self) -> Result<String, StoreError> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::Emulator => Ok(EMULATOR_TOKEN.to_string()),
            Credentials::Metadata => {
                let mut cached = self.token.lock().await;

                if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
                    return Ok(token.value.clone());
                }

                let fresh = self.fetch_metadata_token().await?;
                let value = fresh.value.clone();
                *cached = Some(fresh);

                Ok(value)
            }
        }
    }

    async fn fetch_metadata_token(&self) -> Result<CachedToken, StoreError> {
        debug!("Fetching access token from metadata server");

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;

        let token: MetadataToken = check(response)
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?
            .json()
            .await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let token = self.bearer().await?;
        let response = request.bearer_auth(token).send().await?;

        check(response).await
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &'static str {
        "firestore"
    }

    async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        let request = self
            .http
            .post(format!("{}/{collection}", self.documents_url))
            .query(&[("documentId", id)])
            .json(&json!({ "fields": encode_fields(&document) }));

        self.send(request).await?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let request = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .json(&json!({ "structuredQuery": structured_query(collection, query) }));

        let results: Vec<QueryResult> = self.send(request).await?.json().await?;

        decode_results(results)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let request = self
            .http
            .delete(format!("{}/{collection}/{id}", self.documents_url));

        self.send(request).await?;

        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();

    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

/// runQuery streams one entry per document, plus entries that only carry `readTime`.
fn decode_results(results: Vec<QueryResult>) -> Result<Vec<StoredDocument>, StoreError> {
    results
        .into_iter()
        .filter_map(|result| result.document)
        .map(|document| {
            Ok(StoredDocument {
                id: document_id(&document.name).to_string(),
                fields: decode_fields(&document.fields)?,
            })
        })
        .collect()
}

pub fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };

        structured["orderBy"] = json!([{ "field": { "fieldPath": field }, "direction": direction }]);
    }

    if let Some(range) = &query.range {
        structured["where"] = json!({
            "compositeFilter": {
                "op": "AND",
                "filters": [
                    field_filter(&range.field, "GREATER_THAN_OR_EQUAL", &range.start),
                    field_filter(&range.field, "LESS_THAN", &range.end),
                ]
            }
        });
    }

    structured
}

fn field_filter(field: &str, op: &str, value: &str) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": { "stringValue": value }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_query() {
        let query = Query::all().order_by("ts", Direction::Descending);

        assert_eq!(
            structured_query("responses", &query),
            json!({
                "from": [{"collectionId": "responses"}],
                "orderBy": [{"field": {"fieldPath": "ts"}, "direction": "DESCENDING"}]
            })
        );
    }

    #[test]
    fn test_range_query() {
        let query = Query::all().range("session_id", "test_", "test`");
        let structured = structured_query("progressive_responses", &query);

        let filters = &structured["where"]["compositeFilter"]["filters"];
        assert_eq!(filters[0]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(filters[0]["fieldFilter"]["value"]["stringValue"], "test_");
        assert_eq!(filters[1]["fieldFilter"]["op"], "LESS_THAN");
        assert_eq!(filters[1]["fieldFilter"]["value"]["stringValue"], "test`");
        assert!(structured.get("orderBy").is_none());
    }

    fn results(value: Value) -> Vec<QueryResult> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_results() {
        let response = json!([
            {
                "document": {
                    "name": "projects/demo/databases/(default)/documents/responses/abc",
                    "fields": {
                        "session_id": {"stringValue": "test_1"},
                        "question_number": {"integerValue": "3"},
                        "is_complete": {"booleanValue": false}
                    },
                    "createTime": "2025-01-01T00:00:00Z",
                    "updateTime": "2025-01-01T00:00:00Z"
                },
                "readTime": "2025-01-01T00:00:01Z"
            },
            {
                "document": {"name": "projects/demo/databases/(default)/documents/responses/empty"},
                "readTime": "2025-01-01T00:00:01Z"
            },
            {"readTime": "2025-01-01T00:00:01Z"}
        ]);

        let documents = decode_results(results(response)).unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].id, "abc");
        assert_eq!(documents[0].field("session_id"), json!("test_1"));
        assert_eq!(documents[0].field("question_number"), json!(3));
        assert_eq!(documents[0].field("is_complete"), json!(false));
        assert_eq!(documents[1].id, "empty");
        assert!(documents[1].fields.is_empty());
    }

    #[test]
    fn test_decode_results_without_documents() {
        let documents = decode_results(results(json!([{"readTime": "2025-01-01T00:00:01Z"}]))).unwrap();

        assert!(documents.is_empty());
        assert!(decode_results(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_decode_results_rejects_untyped_fields() {
        let response = json!([{
            "document": {
                "name": "projects/demo/databases/(default)/documents/responses/bad",
                "fields": {"session_id": "plain"}
            }
        }]);

        assert!(matches!(
            decode_results(results(response)),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn test_emulator_urls() {
        let config = Config {
            emulator_host: Some("localhost:8681".into()),
            ..Config::default()
        };

        let store = FirestoreStore::new(&config, "demo").unwrap();

        assert_eq!(
            store.documents_url,
            "http://localhost:8681/v1/projects/demo/databases/(default)/documents"
        );
        assert!(matches!(store.credentials, Credentials::Emulator));
    }

    #[tokio::test]
    async fn test_static_token() {
        let config = Config {
            access_token: Some("secret".into()),
            ..Config::default()
        };

        let store = FirestoreStore::new(&config, "demo").unwrap();

        assert_eq!(store.bearer().await.unwrap(), "secret");
        assert!(store.documents_url.starts_with(FIRESTORE_URL));
    }
}
