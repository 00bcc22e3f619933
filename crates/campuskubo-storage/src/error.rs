use thiserror::Error;

/// Storage-specific error types for the CampusKubo data layer.
///
/// Expected failures (bad input, missing rows, ownership mismatches) get
/// their own variants so callers can branch on [`StorageError::kind`]
/// instead of matching message strings. The `Display` text stays
/// human-readable for the UI.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Entity not found in database
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Input rejected before any SQL ran
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller does not own the row it tried to change
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Uniqueness or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation repeated too soon
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Password hashing failed
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Closed classification of every [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Conflict,
    Internal,
}

impl StorageError {
    /// Create a not-found error for `entity_type` looked up by `field`.
    pub fn not_found(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an ownership error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Classify the error.
    ///
    /// SQLite unique and foreign-key violations count as conflicts, and a
    /// `RowNotFound` from `fetch_one` counts as not-found.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) | Self::RateLimited(_) => ErrorKind::Conflict,
            Self::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            Self::Database(sqlx::Error::Database(db))
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                ErrorKind::Conflict
            }
            Self::Database(_)
            | Self::PasswordHash(_)
            | Self::Configuration(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<campuskubo_core::Error> for StorageError {
    fn from(err: campuskubo_core::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
