//! # Collection
//!
//! Turns a validated submission into stored records.
//!
//! ## Complete Submissions
//! - One record in the primary collection
//! - `audience_type` is enforced only when `REQUIRE_AUDIENCE_TYPE` is set
//!
//! ## Progressive Submissions
//! - One record in the progressive collection per answer
//! - The answer flagged `is_complete` that carries `all_answers` also writes a
//!   consolidated record into the primary collection, after the progressive one
//! - The two writes are independent: if the second fails the first stays, and
//!   the request fails with a 500
//! - Nothing deduplicates, a retried completion writes another consolidated record
use chrono::Utc;
use payloads::{
    responses::{CollectReceipt, Stored, SubmissionKind},
    submission::{CompleteSubmission, ProgressiveSubmission, Submission},
};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    database::Document,
    error::AppError,
    records::{complete_record, consolidated_record, progressive_record},
    state::AppState,
    utils::RequestMeta,
};

pub async fn collect(
    state: &AppState,
    submission: Submission,
    meta: &RequestMeta,
) -> Result<CollectReceipt, AppError> {
    match submission {
        Submission::Complete(complete) => collect_complete(state, complete, meta).await,
        Submission::Progressive(progressive) => collect_progressive(state, progressive, meta).await,
    }
}

async fn collect_complete(
    state: &AppState,
    submission: CompleteSubmission,
    meta: &RequestMeta,
) -> Result<CollectReceipt, AppError> {
    if state.config.require_audience_type {
        submission.audience()?;
    }

    let id = Uuid::new_v4().to_string();
    let record = complete_record(&id, &submission, meta, Utc::now());

    let stored = persist(state, &state.config.collection, &id, record).await?;

    info!(
        %id,
        session_id = submission.session_id.as_deref().unwrap_or_default(),
        ?stored,
        "Collected complete response"
    );

    Ok(CollectReceipt {
        ok: true,
        stored,
        id,
        kind: SubmissionKind::Complete,
        question_number: None,
        is_complete: None,
        consolidated_id: None,
        audience_type: submission.audience_type,
    })
}

async fn collect_progressive(
    state: &AppState,
    submission: ProgressiveSubmission,
    meta: &RequestMeta,
) -> Result<CollectReceipt, AppError> {
    let now = Utc::now();

    let id = Uuid::new_v4().to_string();
    let record = progressive_record(&id, &submission, meta, now);

    let mut stored = persist(state, &state.config.progressive_collection, &id, record).await?;

    info!(
        %id,
        session_id = %submission.session_id,
        question = submission.question_number,
        ?stored,
        "Collected progressive answer"
    );

    let mut consolidated_id = None;

    if submission.consolidates() {
        let complete_id = Uuid::new_v4().to_string();
        let record = consolidated_record(&complete_id, &submission, meta, now);

        if persist(state, &state.config.collection, &complete_id, record).await? == Stored::Firestore {
            stored = Stored::FirestoreBoth;
        }

        info!(
            id = %complete_id,
            session_id = %submission.session_id,
            "Consolidated progressive session"
        );

        consolidated_id = Some(complete_id);
    } else if submission.is_complete {
        warn!(
            session_id = %submission.session_id,
            "Completion flagged without all_answers, no consolidated record"
        );
    }

    Ok(CollectReceipt {
        ok: true,
        stored,
        id,
        kind: SubmissionKind::Progressive,
        question_number: Some(submission.question_number),
        is_complete: Some(submission.is_complete),
        consolidated_id,
        audience_type: None,
    })
}

async fn persist(
    state: &AppState,
    collection: &str,
    id: &str,
    record: Document,
) -> Result<Stored, AppError> {
    let Some(store) = &state.store else {
        let record = Value::Object(record);
        info!(collection, id, %record, "No store configured, logging record");

        return Ok(Stored::LogOnly);
    };

    debug!(collection, id, "Writing to {}", store.name());

    store.create(collection, id, record).await.map_err(|e| {
        error!(collection, id, "Write failed: {e}");

        AppError::from(e)
    })?;

    Ok(Stored::Firestore)
}
