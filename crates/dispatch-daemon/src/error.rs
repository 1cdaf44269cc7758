//! `ApiError`: the one error type every handler in `routes.rs` returns.
//!
//! Maps each error kind to an HTTP status code and a
//! `{"error": "<message>"}` envelope. Lower layers (`dispatch-db`,
//! `dispatch-transport`) return `anyhow::Result`; handlers downcast for
//! the `dispatch_db::LostRace` marker rather than guessing from message
//! text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    AuthRequired,
    AuthFailed,
    LostRace(String),
    NotFound,
    UpstreamFailure(String),
    ConfigError(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "missing or malformed bearer token".to_string(),
            ),
            ApiError::AuthFailed => (
                StatusCode::UNAUTHORIZED,
                "signature verification failed".to_string(),
            ),
            ApiError::LostRace(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::UpstreamFailure(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Translate a Store Gateway/engine `anyhow::Result` failure into an
/// `ApiError`, distinguishing a lost CAS race (409) from a genuine upstream
/// failure (400/500) by downcasting for the `LostRace` marker type rather
/// than matching on message text.
pub fn from_store_error(err: anyhow::Error, race_message: &str) -> ApiError {
    if err.downcast_ref::<dispatch_db::LostRace>().is_some() {
        ApiError::LostRace(race_message.to_string())
    } else {
        tracing::error!(error = %err, "store/engine call failed");
        ApiError::UpstreamFailure(err.to_string())
    }
}
