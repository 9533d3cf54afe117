//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Domain rule (CoreError)             │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (chansync-sync) ← Classified for sweeps                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sweep report / direct caller                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chansync_core::CoreError;
use thiserror::Error;

/// Failures of the repository layer.
///
/// Constraint failures are lifted out of the raw SQLite message so the
/// sync layer can tell a duplicate channel identifier apart from a
/// broken reference without string matching of its own.
#[derive(Debug, Error)]
pub enum DbError {
    /// Lookup by id or channel identifier matched no row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second state-map entry for the same channel and code
    /// - Second listing of a product on a channel
    /// - Reused channel identifier on an order or order line
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent channel or product
    /// - Deleting a channel that still has listings or orders
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A domain rule enforced at write time.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Opening the file or the pool failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A bundled migration did not apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected the statement for a reason other than a constraint.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Anything sqlx reports that has no better home above.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// `NotFound` for an entity kind and the key that missed.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// `UniqueViolation` with a known field and value.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    /// Checks if the failure is worth retrying (lock contention, pool).
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::PoolExhausted => true,
            DbError::QueryFailed(msg) => msg.contains("database is locked"),
            _ => false,
        }
    }
}

/// ```text
/// RowNotFound                          → NotFound
/// "UNIQUE constraint failed: t.c"      → UniqueViolation { field: "t.c" }
/// "FOREIGN KEY constraint failed"      → ForeignKeyViolation
/// other database error                 → QueryFailed
/// PoolTimedOut                         → PoolExhausted
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: columns.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
