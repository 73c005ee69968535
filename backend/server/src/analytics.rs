use std::collections::{BTreeMap, HashMap, HashSet};

use payloads::{
    QUESTION_COUNT, is_truthy,
    responses::{Analytics, DropOff, QuestionStats},
};
use serde_json::Value;

use crate::database::{Document, DocumentStore, Query, StoreError, StoredDocument};

#[derive(Default)]
struct SessionProgress {
    questions: HashSet<i64>,
    completed: bool,
}

pub async fn analytics(store: &dyn DocumentStore, collection: &str) -> Result<Analytics, StoreError> {
    let documents = store.query(collection, &Query::all()).await?;

    Ok(summarize(&documents))
}

/// Completion and drop-off over progressive records grouped by `session_id`.
pub fn summarize(documents: &[StoredDocument]) -> Analytics {
    let mut sessions: HashMap<String, SessionProgress> = HashMap::new();
    let mut question_statistics: BTreeMap<String, QuestionStats> = BTreeMap::new();

    for document in documents {
        let fields = &document.fields;
        let question = fields.get("question_number");

        let session = sessions.entry(key(fields.get("session_id"))).or_default();
        if let Some(number) = question.and_then(Value::as_i64) {
            session.questions.insert(number);
        }
        if completes_session(fields) {
            session.completed = true;
        }

        let stats = question_statistics.entry(key(question)).or_default();
        stats.total += 1;
        *stats.answers.entry(key(fields.get("answer"))).or_default() += 1;
    }

    let total_sessions = sessions.len();
    let completed_sessions = sessions.values().filter(|s| s.completed).count();

    let drop_off_by_question = (1..=QUESTION_COUNT)
        .map(|question| {
            let answered = sessions
                .values()
                .filter(|s| s.questions.contains(&i64::from(question)))
                .count();

            let drop_off = DropOff {
                answered,
                drop_off_rate: percentage(total_sessions - answered, total_sessions),
            };

            (question, drop_off)
        })
        .collect();

    Analytics {
        total_sessions,
        completed_sessions,
        completion_rate: round2(percentage(completed_sessions, total_sessions)),
        drop_off_by_question,
        question_statistics,
    }
}

/// Same rule as consolidation: the flag alone, without the answer map, completes nothing.
fn completes_session(fields: &Document) -> bool {
    let flagged = fields.get("is_complete").is_some_and(is_truthy);
    let answered = fields
        .get("all_answers")
        .and_then(Value::as_object)
        .is_some_and(|answers| !answers.is_empty());

    flagged && answered
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    part as f64 / total as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grouping key for arbitrary field values. Strings are used as-is.
fn key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
