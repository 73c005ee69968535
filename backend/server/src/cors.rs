//! CORS headers on every response.
//!
//! The allow-list comes from `ALLOWED_ORIGINS`. A request origin is echoed back when
//! the list holds `*` or the exact origin, anything else gets the first listed origin
//! so the browser rejects it. Responses always vary on `Origin`.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
        },
    },
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

const ANY_ORIGIN: &str = "*";

pub fn allow_origin(allowed: &[String], origin: Option<&str>) -> String {
    let origin = origin.unwrap_or(ANY_ORIGIN);

    if allowed.iter().any(|o| o == ANY_ORIGIN || o == origin) {
        return origin.to_string();
    }

    allowed
        .first()
        .cloned()
        .unwrap_or_else(|| ANY_ORIGIN.to_string())
}

pub async fn corsify(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;

    let allow = allow_origin(&state.config.allowed_origins, origin.as_deref());
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&allow) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));

    response
}

pub async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}
