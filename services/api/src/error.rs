//! Custom error types for the API service

use axum::{
    Json,
    extract::{
        Path, Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use domain::ServiceError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Failure reported by a domain service
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Helpdesk sync requested but not configured
    #[error("External helpdesk sync is not configured")]
    SyncDisabled,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SyncDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Service(err) => match err {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
                ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Database(_) | ServiceError::Internal(_) => {
                    error!("Request failed: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        };

        let error_message = match &self {
            ApiError::Service(err) => err.public_message(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Malformed bodies, queries and paths are user-correctable input
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Service(ServiceError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Service(ServiceError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Service(ServiceError::validation(rejection.body_text()))
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body extractor whose rejection renders as an `ApiError`
pub type ValidJson<T> = WithRejection<Json<T>, ApiError>;
/// Query string extractor whose rejection renders as an `ApiError`
pub type ValidQuery<T> = WithRejection<Query<T>, ApiError>;
/// Path extractor whose rejection renders as an `ApiError`
pub type ValidPath<T> = WithRejection<Path<T>, ApiError>;
