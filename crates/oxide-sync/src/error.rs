//! Error types for database comparison.

use std::path::PathBuf;

use oxide_sync_core::{Dialect, SyncError};

/// Errors that can occur while comparing databases.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Engine precondition failed (missing primary key, unknown dialect).
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Database error while reading metadata or rows.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing the profile file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No saved profile with this name.
    #[error("Connection profile not found: {0}")]
    ProfileNotFound(String),

    /// The profile file could not be parsed.
    #[error("Failed to parse profile file '{path}': {message}")]
    ProfileFile {
        /// Path to the profile file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// No adapter exists for this dialect.
    #[error("No database adapter available for {0}")]
    AdapterUnavailable(Dialect),

    /// Metadata returned by the database was not in the expected shape.
    #[error("Unexpected metadata for table '{table}': {message}")]
    Metadata {
        /// Table being described.
        table: String,
        /// Error message.
        message: String,
    },
}

/// Result type for database comparison.
pub type Result<T> = std::result::Result<T, Error>;
