//! # Store Errors
//!
//! Error types for the durable store adapter.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Write or read failure against Postgres
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
