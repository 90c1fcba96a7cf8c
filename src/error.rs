use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::llm::ResolveError;

/// Error taxonomy for the HTTP surface. Every handler returns this; the
/// `IntoResponse` impl maps each variant to a status code and the
/// `{"error": ...}` body shape clients already parse.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("{0}")]
    NoData(String),

    #[error("{0}")]
    Resolution(#[from] ResolveError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// The message the summary endpoints answer when a month has nothing to
    /// average.
    pub fn no_data() -> Self {
        ApiError::NoData("No valid data to calculate averages".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NoData(_) => StatusCode::NOT_FOUND,
            ApiError::Resolution(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
