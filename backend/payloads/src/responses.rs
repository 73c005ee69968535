use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stored {
    Firestore,
    /// Progressive record plus the consolidated record.
    FirestoreBoth,
    LogOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Complete,
    Progressive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectReceipt {
    pub ok: bool,
    pub stored: Stored,
    pub id: String,

    #[serde(rename = "type")]
    pub kind: SubmissionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_number: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_complete: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidated_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            missing: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub ok: bool,
    pub count: usize,
    pub responses: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new(responses: Vec<T>) -> Self {
        Self {
            ok: true,
            count: responses.len(),
            responses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub id: String,
    pub timestamp: Value,
    pub session_id: Value,
    pub campaign_id: Value,
    pub answers: BTreeMap<String, Value>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub user_agent: Option<String>,
    pub referer: Value,
    pub origin: Value,
    pub page_url: Value,
    pub is_complete: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressiveEntry {
    pub id: String,
    pub session_id: Value,
    pub question_number: Value,
    pub answer: Value,
    pub is_complete: Value,
    pub timestamp: Value,
    pub completion_timestamp: Value,
    pub campaign_id: Value,
    pub all_answers: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub ok: bool,
    pub analytics: Analytics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub completion_rate: f64,
    pub drop_off_by_question: BTreeMap<u8, DropOff>,
    pub question_statistics: BTreeMap<String, QuestionStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropOff {
    pub answered: usize,
    pub drop_off_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub total: usize,
    pub answers: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub ok: bool,
    pub message: String,
    pub deleted: DeletedCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedCounts {
    pub responses: usize,
    pub progressive: usize,
    pub total: usize,
}
