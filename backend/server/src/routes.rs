use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use payloads::{
    responses::{
        AnalyticsReport, CleanupReport, CollectReceipt, Listing, ProgressiveEntry, ResponseEntry,
    },
    submission::Submission,
};
use tracing::debug;

use crate::{
    analytics::analytics, cleanup::cleanup_test_sessions, collect::collect, error::AppError,
    listing::{list_progressive, list_responses},
    state::AppState,
    utils::RequestMeta,
};

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn collect_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CollectReceipt>, AppError> {
    let submission = Submission::from_slice(&body).inspect_err(|e| {
        debug!("Rejected submission: {e}");
    })?;

    let meta = RequestMeta::from_headers(&headers);

    Ok(Json(collect(&state, submission, &meta).await?))
}

pub async fn responses_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Listing<ResponseEntry>>, AppError> {
    let listing = list_responses(state.store()?, &state.config.collection).await?;

    Ok(Json(listing))
}

pub async fn progressive_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Listing<ProgressiveEntry>>, AppError> {
    let listing = list_progressive(state.store()?, &state.config.progressive_collection).await?;

    Ok(Json(listing))
}

pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let analytics = analytics(state.store()?, &state.config.progressive_collection).await?;

    Ok(Json(AnalyticsReport {
        ok: true,
        analytics,
    }))
}

pub async fn cleanup_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupReport>, AppError> {
    let deleted = cleanup_test_sessions(
        state.store()?,
        &state.config.collection,
        &state.config.progressive_collection,
    )
    .await?;

    Ok(Json(CleanupReport {
        ok: true,
        message: "Test sessions removed".to_string(),
        deleted,
    }))
}
