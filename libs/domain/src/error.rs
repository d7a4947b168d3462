//! Error taxonomy shared by the domain services

use common::error::DatabaseError;
use thiserror::Error;

/// Errors surfaced by the domain services
///
/// `NotFound` is also returned for entities the caller is not allowed to see.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Bad credentials, invalid or expired token, inactive account
    #[error("{0}")]
    Auth(String),

    /// Authenticated but not allowed to act on the resource
    #[error("{0}")]
    Forbidden(String),

    /// Entity absent or invisible to the caller
    #[error("{0}")]
    NotFound(String),

    /// Duplicate unique key
    #[error("{0}")]
    Conflict(String),

    /// The external helpdesk was unreachable or rejected the call
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Persistence failure
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Any other unexpected failure
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    /// Whether the error comes from the server side rather than the caller
    pub fn is_internal(&self) -> bool {
        matches!(self, ServiceError::Database(_) | ServiceError::Internal(_))
    }

    /// Message safe to return to a caller; server-side details stay in the log
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Type alias for domain results
pub type ServiceResult<T> = Result<T, ServiceError>;
