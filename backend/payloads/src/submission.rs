use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{QUESTION_COUNT, QUESTION_KEYS, is_truthy};

pub const QUESTION_NUMBER: &str = "question_number";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Missing answers: {}", .0.join(", "))]
    MissingAnswers(Vec<String>),

    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Question number must be an integer between 1 and {QUESTION_COUNT}")]
    InvalidQuestionNumber,

    #[error("Invalid audience type")]
    InvalidAudienceType,
}

impl SubmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::MissingAnswers(_) => "missing_answers",
            SubmissionError::MissingFields(_) => "missing_fields",
            SubmissionError::InvalidQuestionNumber => "invalid_question_number",
            SubmissionError::InvalidAudienceType => "invalid_audience_type",
        }
    }

    pub fn missing(&self) -> &[String] {
        match self {
            SubmissionError::MissingAnswers(keys) | SubmissionError::MissingFields(keys) => keys,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceType {
    SmallBusiness,
    GeneralPublic,
}

impl AudienceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceType::SmallBusiness => "small_business",
            AudienceType::GeneralPublic => "general_public",
        }
    }
}

impl FromStr for AudienceType {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small_business" => Ok(AudienceType::SmallBusiness),
            "general_public" => Ok(AudienceType::GeneralPublic),
            _ => Err(SubmissionError::InvalidAudienceType),
        }
    }
}

impl fmt::Display for AudienceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six answers of a complete submission, serialized as `q1..q6`.
#[derive(Debug, Clone, PartialEq)]
pub struct Answers([Value; QUESTION_COUNT as usize]);

impl Answers {
    pub fn new(values: [Value; QUESTION_COUNT as usize]) -> Self {
        Self(values)
    }

    /// 1-based, like `question_number`.
    pub fn get(&self, question: u8) -> Option<&Value> {
        self.0.get(usize::from(question).checked_sub(1)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        QUESTION_KEYS.iter().copied().zip(self.0.iter())
    }
}

impl Serialize for Answers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Ad-serving identifiers forwarded by the creative, stored as sent.
///
/// Ad servers expand macros to numbers or strings, so the JSON type is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tracking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_item_id: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<Value>,
}

impl Tracking {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            campaign_id: raw(map, "campaign_id"),
            line_item_id: raw(map, "line_item_id"),
            creative_id: raw(map, "creative_id"),
            page_url: raw(map, "page_url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteSubmission {
    #[serde(flatten)]
    pub answers: Answers,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub tracking: Tracking,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,

    pub is_complete: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<String>,
}

impl CompleteSubmission {
    pub fn new(answers: Answers) -> Self {
        Self {
            answers,
            session_id: None,
            tracking: Tracking::default(),
            audience_type: None,
            extra: None,
            is_complete: true,
            completion_timestamp: None,
        }
    }

    /// Fails when the audience is absent or not one of the known values.
    pub fn audience(&self) -> Result<AudienceType, SubmissionError> {
        self.audience_type
            .as_deref()
            .ok_or(SubmissionError::InvalidAudienceType)?
            .parse()
    }
}

impl TryFrom<Map<String, Value>> for CompleteSubmission {
    type Error = SubmissionError;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let missing: Vec<String> = QUESTION_KEYS
            .iter()
            .filter(|key| !map.get(**key).is_some_and(is_truthy))
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(SubmissionError::MissingAnswers(missing));
        }

        let answers = QUESTION_KEYS.map(|key| map.remove(key).unwrap_or(Value::Null));

        Ok(Self {
            answers: Answers::new(answers),
            session_id: text(&map, "session_id"),
            tracking: Tracking::from_map(&map),
            audience_type: text(&map, "audience_type"),
            extra: map.remove("extra").filter(|extra| !extra.is_null()),
            is_complete: map.get("is_complete").is_none_or(is_truthy),
            completion_timestamp: text(&map, "completion_timestamp"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressiveSubmission {
    pub session_id: String,

    pub question_number: u8,

    pub answer: Value,

    pub is_complete: bool,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub all_answers: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience_type: Option<String>,

    #[serde(flatten)]
    pub tracking: Tracking,
}

impl ProgressiveSubmission {
    pub fn new(session_id: impl Into<String>, question_number: u8, answer: impl Into<Value>) -> Self {
        Self {
            session_id: session_id.into(),
            question_number,
            answer: answer.into(),
            is_complete: false,
            all_answers: Map::new(),
            timestamp: None,
            completion_timestamp: None,
            user_agent: None,
            audience_type: None,
            tracking: Tracking::default(),
        }
    }

    /// Marks this as the terminating submission of its session.
    pub fn completing(mut self, all_answers: Map<String, Value>) -> Self {
        self.is_complete = true;
        self.all_answers = all_answers;
        self
    }

    /// Whether this submission also produces a consolidated record.
    pub fn consolidates(&self) -> bool {
        self.is_complete && !self.all_answers.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for ProgressiveSubmission {
    type Error = SubmissionError;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut missing = Vec::new();

        if !map.get("session_id").is_some_and(is_truthy) {
            missing.push("session_id".to_string());
        }
        if map.get(QUESTION_NUMBER).is_none_or(Value::is_null) {
            missing.push(QUESTION_NUMBER.to_string());
        }
        if !map.get("answer").is_some_and(is_truthy) {
            missing.push("answer".to_string());
        }

        if !missing.is_empty() {
            return Err(SubmissionError::MissingFields(missing));
        }

        let question_number = map
            .get(QUESTION_NUMBER)
            .and_then(Value::as_u64)
            .filter(|n| (1..=u64::from(QUESTION_COUNT)).contains(n))
            .and_then(|n| u8::try_from(n).ok())
            .ok_or(SubmissionError::InvalidQuestionNumber)?;

        let all_answers = match map.remove("all_answers") {
            Some(Value::Object(all_answers)) => all_answers,
            _ => Map::new(),
        };

        Ok(Self {
            session_id: text(&map, "session_id").unwrap_or_default(),
            question_number,
            answer: map.remove("answer").unwrap_or(Value::Null),
            is_complete: map.get("is_complete").is_some_and(is_truthy),
            all_answers,
            timestamp: text(&map, "timestamp"),
            completion_timestamp: text(&map, "completion_timestamp"),
            user_agent: text(&map, "user_agent"),
            audience_type: text(&map, "audience_type"),
            tracking: Tracking::from_map(&map),
        })
    }
}

/// A `/collect` body after boundary validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Submission {
    Complete(CompleteSubmission),
    Progressive(ProgressiveSubmission),
}

impl Submission {
    /// Anything that is not a JSON object is read as an empty object.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SubmissionError> {
        match serde_json::from_slice(bytes) {
            Ok(Value::Object(map)) => Self::from_map(map),
            _ => Self::from_map(Map::new()),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Result<Self, SubmissionError> {
        if map.contains_key(QUESTION_NUMBER) {
            ProgressiveSubmission::try_from(map).map(Submission::Progressive)
        } else {
            CompleteSubmission::try_from(map).map(Submission::Complete)
        }
    }
}

fn raw(map: &Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).filter(|value| !value.is_null()).cloned()
}

/// Session ids and timestamps are used as keys and range bounds, so they are kept as text.
fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
