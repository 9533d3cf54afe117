//! # Sync Error Types
//!
//! Error types for synchronization operations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Capability     │  │   Adapter       │  │     Domain              │ │
//! │  │                 │  │   transport     │  │                         │ │
//! │  │  NotImplemented │  │  Connection     │  │  CoreError (verbatim):  │ │
//! │  │  Capability     │  │  Timeout        │  │  UnresolvedException... │ │
//! │  │                 │  │  Rejected       │  │  UnmappedTaxReference   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Watermark     │  │    Database     │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Watermark      │  │  DbError        │  │  InvalidConfig          │ │
//! │  │  Conflict       │  │                 │  │  ConfigLoadFailed       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Scheduled sweeps skip NotImplementedCapability silently.               │
//! │  Direct calls get every error unchanged.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use chansync_core::{CoreError, SyncOperation};
use chansync_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure of the engine.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Capability Errors
    // =========================================================================
    /// The channel's adapter kind does not implement the operation.
    #[error("{capability} is not implemented for {source_kind} channels")]
    NotImplementedCapability {
        source_kind: String,
        capability: String,
    },

    /// No adapter is registered for the channel's source kind.
    #[error("No adapter registered for source kind {0}")]
    UnknownSourceKind(String),

    // =========================================================================
    // Watermark Errors
    // =========================================================================
    /// Another run advanced the watermark first.
    #[error("Watermark {operation} of channel {channel_id} was advanced by a concurrent run")]
    WatermarkConflict {
        channel_id: String,
        operation: SyncOperation,
    },

    // =========================================================================
    // Adapter Transport Errors
    // =========================================================================
    /// The channel could not be reached.
    #[error("{source_kind} channel unreachable: {message}")]
    AdapterConnection {
        source_kind: String,
        message: String,
    },

    /// The channel did not answer in time.
    #[error("{source_kind} channel timed out after {seconds} seconds")]
    AdapterTimeout { source_kind: String, seconds: u64 },

    /// The channel answered with an error.
    #[error("{source_kind} channel rejected the request: {message}")]
    AdapterRejected {
        source_kind: String,
        message: String,
    },

    /// A record was not found on the channel.
    #[error("{source_kind} {entity} \"{identifier}\" was not found on the channel")]
    AdapterNotFound {
        source_kind: String,
        entity: String,
        identifier: String,
    },

    // =========================================================================
    // Domain and Database Errors
    // =========================================================================
    /// A domain rule was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database operation failed.
    #[error(transparent)]
    Database(DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Control channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        // Domain errors surface unchanged whichever layer raised them
        match err {
            DbError::Domain(core) => SyncError::Core(core),
            other => SyncError::Database(other),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Shorthand for a missing adapter capability.
    pub fn not_implemented(source_kind: impl Into<String>, capability: impl Into<String>) -> Self {
        SyncError::NotImplementedCapability {
            source_kind: source_kind.into(),
            capability: capability.into(),
        }
    }

    /// Returns true for a capability the adapter kind lacks.
    ///
    /// Scheduled sweeps skip these silently.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, SyncError::NotImplementedCapability { .. })
    }

    /// Returns true if the operation may succeed when retried.
    ///
    /// ## Retryable Errors
    /// - Channel unreachable or timed out
    /// - Database busy or pool exhausted
    ///
    /// ## Non-Retryable Errors
    /// - Domain rule violations, rejected requests, configuration errors
    /// - Watermark conflicts (the winning run already covered the window)
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::AdapterConnection { .. } | SyncError::AdapterTimeout { .. } => true,
            SyncError::Database(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::UnknownSourceKind(_)
        )
    }

    /// The domain error inside, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            SyncError::Core(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let unreachable = SyncError::AdapterConnection {
            source_kind: "webshop".into(),
            message: "connection refused".into(),
        };
        assert!(unreachable.is_retryable());
        assert!(SyncError::AdapterTimeout {
            source_kind: "webshop".into(),
            seconds: 30
        }
        .is_retryable());
        assert!(SyncError::from(DbError::PoolExhausted).is_retryable());

        assert!(!SyncError::not_implemented("manual", "import_orders").is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_domain_errors_unwrapped_from_db() {
        let err: SyncError = DbError::Domain(CoreError::UnconfiguredCarrier {
            source_kind: "webshop".into(),
            code: "XYZ".into(),
        })
        .into();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::UnconfiguredCarrier { .. })
        ));
        assert!(err.to_string().contains("XYZ"));
    }

    #[test]
    fn test_not_implemented_display() {
        let err = SyncError::not_implemented("manual", "import_orders");
        assert!(err.is_not_implemented());
        assert_eq!(err.to_string(), "import_orders is not implemented for manual channels");
    }
}
