// src/error.rs
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Whether the caller may safely retry the failed operation.
    /// A retried credit can leave a duplicate ledger row behind; that is
    /// reconciliation's job to collapse, not the caller's to prevent.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}
