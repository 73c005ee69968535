use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use payloads::{responses::ErrorBody, submission::SubmissionError};
use thiserror::Error;

use crate::database::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    #[error("Firestore not available")]
    StoreUnavailable,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Submission(e) => e.code(),
            AppError::Database(_) => "database_error",
            AppError::StoreUnavailable => "firestore_not_available",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Submission { .. } => StatusCode::BAD_REQUEST,
            AppError::Database { .. } | AppError::StoreUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut body = ErrorBody::new(self.code());

        match &self {
            AppError::Submission(e) if !e.missing().is_empty() => {
                body.missing = Some(e.missing().to_vec());
            }
            AppError::Database(e) => body.details = Some(e.to_string()),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
