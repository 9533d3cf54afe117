//! # Error Types
//!
//! Domain-specific error types for chansync-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  chansync-core errors (this file)                                      │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  chansync-db errors                                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  chansync-sync errors                                                  │
//! │  └── SyncError        - Adapter, orchestration and sweep failures      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → SyncError → Caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant that an operator may see carries the channel source kind and
//! the offending identifier or value.

use thiserror::Error;

use crate::tax_rate::TaxRate;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations raised while synchronizing a channel.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An order cannot move past quotation while the ledger holds unresolved
    /// exceptions for it.
    ///
    /// ## When This Occurs
    /// - A tax or carrier mismatch was recorded during import
    /// - An operator tries to confirm before reconciling
    #[error("You missed some unresolved exceptions in sale {order_reference}")]
    UnresolvedExceptionBlock { order_reference: String },

    /// An imported order or order line collides with an external identifier
    /// already held by a different local record.
    #[error("{source_kind} {entity} with channel identifier \"{identifier}\" already exists")]
    DuplicateExternalIdentifier {
        source_kind: String,
        entity: String,
        identifier: String,
    },

    /// No tax mapping for an external tax name and rate.
    #[error("{source_kind}: tax \"{}\" of rate {rate} was not found", .name.as_deref().unwrap_or("<unnamed>"))]
    UnmappedTaxReference {
        source_kind: String,
        name: Option<String>,
        rate: TaxRate,
    },

    /// No shipping-carrier mapping for an external carrier code.
    #[error("{source_kind}: shipping carrier is not configured for code: {code}")]
    UnconfiguredCarrier { source_kind: String, code: String },

    /// The channel has no state-map entry that allows importing orders.
    #[error("{source_kind} channel {channel}: no importable order state found, import order states first")]
    NoImportableOrderStates { source_kind: String, channel: String },

    /// A used channel's code cannot change.
    #[error("Channel {channel} is in use, its code \"{code}\" cannot be changed")]
    ChannelCodeImmutable { channel: String, code: String },

    /// A listing cannot target a manual channel.
    #[error("Products cannot be listed on manual channel {channel}")]
    ManualChannelListing { channel: String },

    /// The user in context may not create records on this channel.
    #[error("User {user} cannot create orders under channel {channel}")]
    CreateNotPermitted { user: String, channel: String },

    /// An order or shipment was asked to make a transition its state forbids.
    #[error("{entity} {id} is {current}, cannot {step}")]
    InvalidTransition {
        entity: String,
        id: String,
        current: String,
        step: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_tax_names_both_parts() {
        let err = CoreError::UnmappedTaxReference {
            source_kind: "webshop".to_string(),
            name: Some("VAT".to_string()),
            rate: "0.20".parse().unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("VAT"));
        assert!(msg.contains("0.20"));
        assert!(msg.contains("webshop"));
    }

    #[test]
    fn test_unblock_message_names_order() {
        let err = CoreError::UnresolvedExceptionBlock {
            order_reference: "SO-0042".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "You missed some unresolved exceptions in sale SO-0042"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
