use std::time::Duration;
use thiserror::Error;

/// Centralized error types for the application
///
/// Every collaborator failure and every recoverable conversation condition is
/// converted to this enum so the router can decide, in one place, what the
/// member sees and whether their conversation status survives.
///
/// # Example
///
/// ```no_run
/// use bookclub::core::error::{AppError, ErrorKind};
///
/// fn is_retryable(err: &AppError) -> bool {
///     matches!(err.kind(), ErrorKind::Storage | ErrorKind::Delivery)
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    /// A Record Store call did not finish in time
    #[error("Storage call timed out after {0:?}")]
    StorageTimeout(Duration),

    /// The blocking worker running a Record Store call died
    #[error("Storage task failed: {0}")]
    StorageTask(String),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// A reply could not be delivered in time
    #[error("Delivery timed out after {0:?}")]
    DeliveryTimeout(Duration),

    /// Malformed or out-of-range member input; the message is the re-prompt
    #[error("Validation error: {0}")]
    Validation(String),

    /// A member invoked an admin-only command
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Stored conversation status is not declared by any flow
    #[error("Unknown conversation status: {0:?}")]
    UnknownStatus(String),

    /// Nothing to act on (no active book, no progress row)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Startup misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error taxonomy used by the conversation router to pick a recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    UnknownStatus,
    NotFound,
    Storage,
    Delivery,
    Config,
}

impl AppError {
    /// Classifies the error for recovery
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Authorization(_) => ErrorKind::Authorization,
            AppError::UnknownStatus(_) => ErrorKind::UnknownStatus,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Database(_)
            | AppError::DatabasePool(_)
            | AppError::Migration(_)
            | AppError::StorageTimeout(_)
            | AppError::StorageTask(_)
            | AppError::Io(_) => ErrorKind::Storage,
            AppError::Telegram(_) | AppError::DeliveryTimeout(_) => ErrorKind::Delivery,
            AppError::Config(_) => ErrorKind::Config,
        }
    }

    /// Text shown to the member for errors that carry their own reply
    pub fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Validation(msg) | AppError::Authorization(msg) | AppError::NotFound(msg) => Some(msg.as_str()),
            _ => None,
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
