use crate::pricing::QueryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Malformed or contradictory request parameters
    InvalidRequest(String),
    /// No record under the requested model id
    ModelNotFound(String),
    /// No snapshot has been loaded or published yet
    CacheNotReady,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::ModelNotFound(id) => write!(f, "Model not found: {}", id),
            Self::CacheNotReady => write!(f, "Pricing cache not ready"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::CacheNotReady => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::InvalidRequest(_) => "invalid_request",
        AppError::ModelNotFound(_) => "model_not_found",
        AppError::CacheNotReady => "cache_not_ready",
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound(id) => Self::ModelNotFound(id),
            QueryError::Unavailable => Self::CacheNotReady,
        }
    }
}
