//! # Payloads
//!
//! Wire types shared by the collection server and the tester.
//!
//! ## Submissions
//! - The banner posts JSON to `/collect` in one of two shapes
//! - **Complete**: all six answers `q1..q6` in a single request
//! - **Progressive**: one answer per request, keyed by `question_number`, the last one
//!   flagged `is_complete` and carrying `all_answers`
//! - The shape is decided by the presence of the `question_number` key and validated
//!   here, before anything reaches the store
//!
//! ## Responses
//! - Every response body carries `ok`
//! - Failures carry an `error` code, see [`submission::SubmissionError`] for the
//!   client-side ones
use serde_json::Value;

pub mod responses;
pub mod submission;

#[cfg(feature = "remote")]
pub mod remote;

pub const QUESTION_COUNT: u8 = 6;

pub const QUESTION_KEYS: [&str; QUESTION_COUNT as usize] = ["q1", "q2", "q3", "q4", "q5", "q6"];

/// Sessions created by QA runs start with this prefix.
pub const TEST_SESSION_PREFIX: &str = "test_";

/// Exclusive upper bound of the test-session range. '`' is the character after '_'.
pub const TEST_SESSION_END: &str = "test`";

/// Loose truthiness used for required fields and completion flags.
///
/// Null, `false`, `0`, `""`, `[]` and `{}` are falsy, everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn is_test_session(session_id: &str) -> bool {
    session_id >= TEST_SESSION_PREFIX && session_id < TEST_SESSION_END
}
