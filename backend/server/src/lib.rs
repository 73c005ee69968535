//! Documentation of the survey collection backend behind the HTML5 banner questionnaire.
//!
//!
//!
//! # General Infrastructure
//! - The banner is served by the ad server inside a third-party page
//! - Each answer (or the whole questionnaire) is posted cross-origin to `/collect`
//! - Single container on Cloud Run, scales to zero, stateless between requests
//! - Firestore in native mode holds two collections, see [`database`]
//! - Store client is created once at startup and reused by every request
//!
//!
//!
//! # Routes
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | `/` | health marker, plain `OK` |
//! | POST | `/collect` | complete or progressive submission |
//! | OPTIONS | `/collect` | CORS preflight, 204 |
//! | GET | `/responses` | complete records, newest first |
//! | GET | `/progressive-responses` | progressive records, newest first |
//! | GET | `/analytics` | completion rate, drop-off, answer histograms |
//! | DELETE | `/cleanup-test-sessions` | remove `test_` sessions from both collections |
//!
//!
//!
//! # Notes
//!
//! ## Progressive Collection
//! Banner users drop off between questions, so answers are sent one by one and the
//! session is reconciled on the last one. The last answer carries the full answer map
//! and becomes a consolidated record next to the complete submissions, so listings of
//! the primary collection see both kinds the same way.
//!
//! ## Without a Store
//! If no project is configured the backend still answers `/collect` with
//! `stored: "log_only"` and writes the records to the log. Read endpoints fail with
//! `firestore_not_available`.
//!
//!
//!
//! # Setup
//!
//! Run locally with an in-memory store.
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=info cargo run -p survey-backend
//! ```
//!
//! Against Firestore.
//! ```sh
//! PROJECT_ID=my-project RUST_LOG=info cargo run -p survey-backend
//! ```
//!
//! Smoke test a deployment.
//! ```sh
//! cargo run -p tester -- --url https://my-service.run.app smoke
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod analytics;
pub mod cleanup;
pub mod codec;
pub mod collect;
pub mod config;
pub mod cors;
pub mod database;
pub mod error;
pub mod firestore;
pub mod listing;
pub mod memory;
pub mod records;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use cors::{corsify, preflight_handler};
use routes::{
    analytics_handler, cleanup_handler, collect_handler, health_handler, progressive_handler,
    responses_handler,
};
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/collect", post(collect_handler).options(preflight_handler))
        .route("/responses", get(responses_handler))
        .route("/progressive-responses", get(progressive_handler))
        .route("/analytics", get(analytics_handler))
        .route(
            "/cleanup-test-sessions",
            delete(cleanup_handler).options(preflight_handler),
        )
        .layer(middleware::from_fn_with_state(state.clone(), corsify))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
