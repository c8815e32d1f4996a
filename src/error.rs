//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::logic::oracle::OracleError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Malformed input: wrong shape, wrong types, broken upload.
    // Surfaced before any gate logic runs.
    Validation(String),

    // The classifier failed to initialize at startup
    ModelUnavailable,

    // The classifier failed at inference time
    Oracle(OracleError),

    // Database errors on the read paths
    Database(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ModelUnavailable => {
                tracing::warn!("prediction rejected: model unavailable");
                (StatusCode::INTERNAL_SERVER_ERROR, "Model not loaded")
            }
            AppError::Oracle(err) => {
                tracing::error!("Oracle error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction engine error")
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<OracleError> for AppError {
    fn from(err: OracleError) -> Self {
        AppError::Oracle(err)
    }
}
