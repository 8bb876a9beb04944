//! # portal-db - Study Portal Data Access Layer
//!
//! Per-user progress tracking for the certification study portal, kept in a
//! single-file SQLite store.
//!
//! portal-db provides:
//! - Idempotent schema setup with column migrations and a bootstrap admin
//! - Pooled connections with query and transaction scopes
//! - Generic typed CRUD primitives shared by every entity accessor
//! - Accessors for users, progress, notes, quiz results and study sessions
//! - A flat compatibility facade for the web UI layer

pub mod config;
pub mod dao;
pub mod facade;
pub mod portal;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use portal::{Portal, PortalStore};
pub use storage::{Database, DatabaseConfig};

use rusqlite::ErrorCode;

/// Result type alias for portal-db operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for portal-db operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("duplicate key in {table}: {detail}")]
    DuplicateKey { table: &'static str, detail: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("constraint violation in {table}: {detail}")]
    Constraint { table: &'static str, detail: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Classify a SQLite failure raised while touching `table`.
    pub(crate) fn from_sqlite(table: &'static str, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            if failure.code == ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                return match failure.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Error::DuplicateKey { table, detail }
                    }
                    _ => Error::Constraint { table, detail },
                };
            }
        }
        Error::Storage(err)
    }

    /// Transient engine or I/O failure. Retrying is up to the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
            ),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Engine-level failure, as opposed to a domain error.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }
}
