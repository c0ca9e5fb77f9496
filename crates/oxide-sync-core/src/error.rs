//! Error types for the diffing engine.

/// Precondition violations raised by the engine.
///
/// Both variants abort a comparison before any entry is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The table has no primary key, so rows cannot be matched.
    #[error("Table '{table}' has no primary key")]
    NoPrimaryKey {
        /// The table that was rejected.
        table: String,
    },

    /// The dialect tag is not one of the known dialects.
    #[error("Unsupported database type: {0}")]
    UnsupportedDialect(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
