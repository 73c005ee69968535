//! # Document Store
//!
//! Survey responses live in a managed document database (Firestore).
//!
//! ## Collections
//!
//! - Primary (`responses`): one document per complete submission, plus one consolidated
//!   document per finished progressive session
//! - Progressive (`progressive_responses`): one document per progressive answer
//!
//! ## Access Patterns
//!
//! - Create with a generated UUID as the document id, documents are never updated
//! - Stream a whole collection, optionally ordered by a timestamp field
//! - Range scan on `session_id` to find QA test sessions, then delete one by one
//!
//! The store is built once at startup and shared by every request. There is no
//! transaction support, callers that write twice accept partial writes.
use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Document,
}

impl StoredDocument {
    pub fn field(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Half-open string range `[start, end)` over one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub field: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub order_by: Option<(String, Direction)>,
    pub range: Option<Range>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn range(mut self, field: &str, start: &str, end: &str) -> Self {
        self.range = Some(Range {
            field: field.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        });
        self
    }

    /// Documents without the ordered field are never returned, same as Firestore.
    pub fn matches(&self, fields: &Document) -> bool {
        if let Some((field, _)) = &self.order_by {
            if !fields.contains_key(field) {
                return false;
            }
        }

        match &self.range {
            Some(range) => match fields.get(&range.field) {
                Some(Value::String(value)) => {
                    value.as_str() >= range.start.as_str() && value.as_str() < range.end.as_str()
                }
                _ => false,
            },
            None => true,
        }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let Some((field, direction)) = &self.order_by else {
            return Ordering::Equal;
        };

        let ordering = compare_values(
            a.get(field).unwrap_or(&Value::Null),
            b.get(field).unwrap_or(&Value::Null),
        );

        match direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// Cross-type ordering: null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| compare_values(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed store response: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, query: &Query)
    -> Result<Vec<StoredDocument>, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
