//! # Store Errors
//!
//! Everything a repository or a Cart Store operation can fail with.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error ──► classify ──┬── Busy ──► CartStore retries              │
//! │                             │             └── gives up: Conflict        │
//! │                             ├── UniqueViolation / ForeignKeyViolation   │
//! │                             └── QueryFailed / PoolExhausted / ...       │
//! │                                                                         │
//! │  CoreError (unknown user, product or line; bad quantity) ──► Core       │
//! │                                                                         │
//! │  Core and Conflict are the caller-facing outcomes; the rest mean the    │
//! │  storage layer itself is unhappy.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use trolley_core::{CoreError, ValidationError};

/// Failure of a database or Cart Store operation.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE column or pair already holds this value: a user email,
    /// a user's cart, or a product line within a cart.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other statement failure, CHECK constraints included.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// `SQLITE_BUSY` / `SQLITE_LOCKED`: another writer holds the file.
    #[error("Database is busy")]
    Busy,

    /// Every retry of a cart mutation hit [`DbError::Busy`].
    #[error("Cart update conflicted with concurrent writers after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Unreadable or out-of-range configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected by a business rule before anything was written.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An invariant of the store itself did not hold.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether running the whole operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy)
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

// SQLITE_BUSY = 5, SQLITE_LOCKED = 6; extended result codes keep the primary
// code in the low byte.
fn is_lock_contention(db_err: &dyn sqlx::error::DatabaseError) -> bool {
    let by_code = db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6));

    by_code || db_err.message().contains("database is locked")
}

fn classify(db_err: &dyn sqlx::error::DatabaseError) -> DbError {
    let msg = db_err.message();

    if is_lock_contention(db_err) {
        return DbError::Busy;
    }

    if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::duplicate(columns, "unknown");
    }

    if msg.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: msg.to_string(),
        };
    }

    DbError::QueryFailed(msg.to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify(&*db_err),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
