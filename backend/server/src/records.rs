//! Stored document shapes.
//!
//! - Complete and consolidated records share the primary collection and its field
//!   names (`ts`, `ua`, `q1..q6`)
//! - Progressive records keep the names the creative posts (`timestamp`, `user_agent`)
use chrono::{DateTime, Utc};
use payloads::submission::{CompleteSubmission, ProgressiveSubmission};
use serde_json::{Value, json};

use crate::{
    database::Document,
    utils::{RequestMeta, into_document, timestamp_micros, timestamp_seconds},
};

pub fn complete_record(
    id: &str,
    submission: &CompleteSubmission,
    meta: &RequestMeta,
    now: DateTime<Utc>,
) -> Document {
    let tracking = &submission.tracking;

    let mut record = into_document(json!({
        "id": id,
        "ts": timestamp_seconds(now),
        "session_id": submission.session_id,
        "campaign_id": tracking.campaign_id,
        "line_item_id": tracking.line_item_id,
        "creative_id": tracking.creative_id,
        "page_url": tracking.page_url,
        "ua": meta.user_agent,
        "referer": meta.referer,
        "origin": meta.origin,
        "extra": submission.extra,
        "audience_type": submission.audience_type,
        "is_complete": submission.is_complete,
        "completion_timestamp": submission
            .completion_timestamp
            .clone()
            .unwrap_or_else(|| timestamp_micros(now)),
    }));

    for (key, answer) in submission.answers.iter() {
        record.insert(key.to_string(), answer.clone());
    }

    record
}

pub fn progressive_record(
    id: &str,
    submission: &ProgressiveSubmission,
    meta: &RequestMeta,
    now: DateTime<Utc>,
) -> Document {
    let tracking = &submission.tracking;

    let all_answers = if submission.all_answers.is_empty() {
        Value::Null
    } else {
        Value::Object(submission.all_answers.clone())
    };

    into_document(json!({
        "id": id,
        "session_id": submission.session_id,
        "question_number": submission.question_number,
        "answer": submission.answer,
        "is_complete": submission.is_complete,
        "timestamp": submission
            .timestamp
            .clone()
            .unwrap_or_else(|| timestamp_micros(now)),
        "completion_timestamp": submission.completion_timestamp,
        "campaign_id": tracking.campaign_id,
        "line_item_id": tracking.line_item_id,
        "creative_id": tracking.creative_id,
        "page_url": tracking.page_url,
        "user_agent": submission.user_agent.as_deref().unwrap_or(&meta.user_agent),
        "referer": meta.referer,
        "origin": meta.origin,
        "all_answers": all_answers,
    }))
}

/// Complete-style record synthesized from the last answer of a progressive session.
///
/// `all_answers` is spread last, so its keys win over the metadata fields.
pub fn consolidated_record(
    id: &str,
    submission: &ProgressiveSubmission,
    meta: &RequestMeta,
    now: DateTime<Utc>,
) -> Document {
    let tracking = &submission.tracking;

    let mut record = into_document(json!({
        "id": id,
        "ts": submission
            .timestamp
            .clone()
            .unwrap_or_else(|| timestamp_micros(now)),
        "session_id": submission.session_id,
        "campaign_id": tracking.campaign_id,
        "line_item_id": tracking.line_item_id,
        "creative_id": tracking.creative_id,
        "page_url": tracking.page_url,
        "ua": submission.user_agent.as_deref().unwrap_or(&meta.user_agent),
        "referer": meta.referer,
        "origin": meta.origin,
        "is_complete": true,
        "completion_timestamp": submission.completion_timestamp,
        "audience_type": submission.audience_type,
    }));

    record.extend(submission.all_answers.clone());

    record
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use payloads::submission::{Answers, Submission};
    use serde_json::Map;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
    }

    fn meta() -> RequestMeta {
        RequestMeta {
            user_agent: "Mozilla/5.0".into(),
            referer: "https://news.example/".into(),
            origin: "https://ads.example".into(),
        }
    }

    #[test]
    fn test_complete_record() {
        let mut submission =
            CompleteSubmission::new(Answers::new(["a", "b", "c", "d", "e", "f"].map(Value::from)));
        submission.session_id = Some("s1".into());

        let record = complete_record("id-1", &submission, &meta(), now());

        assert_eq!(record["id"], "id-1");
        assert_eq!(record["ts"], "2025-05-01T10:00:00Z");
        assert_eq!(record["q1"], "a");
        assert_eq!(record["q6"], "f");
        assert_eq!(record["session_id"], "s1");
        assert_eq!(record["campaign_id"], Value::Null);
        assert_eq!(record["ua"], "Mozilla/5.0");
        assert_eq!(record["is_complete"], true);
        assert_eq!(record["completion_timestamp"], "2025-05-01T10:00:00.000000Z");
    }

    #[test]
    fn test_progressive_record_prefers_client_values() {
        let body = json!({
            "session_id": "s1",
            "question_number": 3,
            "answer": "engajado",
            "timestamp": "2025-04-30T09:00:00Z",
            "user_agent": "Banner/1.0"
        });
        let Ok(Submission::Progressive(submission)) = Submission::from_slice(body.to_string().as_bytes())
        else {
            panic!("expected progressive submission");
        };

        let record = progressive_record("id-2", &submission, &meta(), now());

        assert_eq!(record["question_number"], 3);
        assert_eq!(record["timestamp"], "2025-04-30T09:00:00Z");
        assert_eq!(record["user_agent"], "Banner/1.0");
        assert_eq!(record["referer"], "https://news.example/");
        assert_eq!(record["is_complete"], false);
        assert_eq!(record["all_answers"], Value::Null);
    }

    #[test]
    fn test_consolidated_record_spreads_answers() {
        let mut all_answers = Map::new();
        for (i, answer) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            all_answers.insert(format!("q{}", i + 1), json!(answer));
        }

        let submission = ProgressiveSubmission::new("s1", 6, "f").completing(all_answers);
        let record = consolidated_record("id-3", &submission, &meta(), now());

        assert_eq!(record["id"], "id-3");
        assert_eq!(record["ts"], "2025-05-01T10:00:00.000000Z");
        assert_eq!(record["ua"], "Mozilla/5.0");
        assert_eq!(record["is_complete"], true);
        for key in payloads::QUESTION_KEYS {
            assert!(record.contains_key(key), "{key} missing from consolidated record");
        }
    }
}
