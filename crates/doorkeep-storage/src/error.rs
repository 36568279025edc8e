use thiserror::Error;

/// Storage-specific errors for the code store.
///
/// A closed store is reported as [`StorageError::Closed`] rather than as a
/// generic database failure so callers can tell lifecycle misuse apart from
/// I/O trouble.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Operation attempted after the store was closed
    #[error("store closed")]
    Closed,

    /// A persisted column could not be decoded
    #[error("Cannot decode {field} of code record: {message}")]
    Decode { field: &'static str, message: String },

    /// A record could not be encoded for writing
    #[error("Cannot encode {field} of code record: {message}")]
    Encode { field: &'static str, message: String },

    /// Record rejected before writing
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Database and lifecycle failures are transient; a record that cannot
    /// be encoded, decoded or validated fails the same way every time.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeep_storage::StorageError;
    ///
    /// assert!(StorageError::Closed.is_transient());
    /// assert!(!StorageError::Validation("bad digits".into()).is_transient());
    /// ```
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Database(_) | StorageError::Closed)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolClosed => StorageError::Closed,
            other => StorageError::Database(other),
        }
    }
}

impl From<doorkeep_core::Error> for StorageError {
    fn from(error: doorkeep_core::Error) -> Self {
        StorageError::Validation(error.to_string())
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
