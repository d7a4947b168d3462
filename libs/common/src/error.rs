//! Custom error types for the common library
//!
//! This module defines the database error type shared by every repository
//! in the workspace.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A unique constraint rejected the write
    #[error("Duplicate value for unique key: {0}")]
    UniqueViolation(String),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify a query error, separating unique-key violations from other failures
    pub fn from_query(err: SqlxError) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                DatabaseError::UniqueViolation(db.constraint().unwrap_or("unknown").to_string())
            }
            _ => DatabaseError::Query(err),
        }
    }

    /// Whether this error is a unique-key violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
