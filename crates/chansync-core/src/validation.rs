//! # Validation Module
//!
//! Input validation for records entering the engine, either from an operator
//! (channel setup, mappings) or from a channel adapter (payloads).
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Adapter (Rust)                                               │
//! │  ├── Wire format → payload types (deserialization)                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Orchestrator (Rust)                                          │
//! │  └── THIS MODULE: identifiers, quantities, prices                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (state codes, listings, channel identifiers)   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use chansync_core::validation::{validate_channel_code, validate_line_quantity};
//!
//! validate_channel_code("WEB-EU").unwrap();
//! validate_line_quantity(2).unwrap();
//! ```

use crate::error::ValidationError;
use crate::payload::ExternalOrder;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_CODE_LEN: usize = 50;
const MAX_IDENTIFIER_LEN: usize = 255;

// =============================================================================
// String Validators
// =============================================================================

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a channel display name.
pub fn validate_channel_name(name: &str) -> ValidationResult<()> {
    required("name", name, MAX_NAME_LEN)
}

/// Validates a channel business code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use chansync_core::validation::validate_channel_code;
///
/// assert!(validate_channel_code("AMZ_US").is_ok());
/// assert!(validate_channel_code("amz us").is_err());
/// ```
pub fn validate_channel_code(code: &str) -> ValidationResult<()> {
    required("code", code, MAX_CODE_LEN)?;

    if !code
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an external order-state code.
///
/// Codes are matched exactly, so surrounding whitespace is rejected rather
/// than trimmed.
pub fn validate_state_code(code: &str) -> ValidationResult<()> {
    required("state code", code, MAX_IDENTIFIER_LEN)?;

    if code.trim() != code {
        return Err(ValidationError::InvalidFormat {
            field: "state code".to_string(),
            reason: "must not have surrounding whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates an identifier assigned by a channel.
pub fn validate_external_identifier(field: &str, identifier: &str) -> ValidationResult<()> {
    required(field, identifier, MAX_IDENTIFIER_LEN)
}

/// Validates a local product code.
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    required("product code", code, MAX_CODE_LEN)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity (> 0).
pub fn validate_line_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Payload Validators
// =============================================================================

/// Validates an order payload before anything is written for it.
pub fn validate_external_order(order: &ExternalOrder) -> ValidationResult<()> {
    validate_external_identifier("order identifier", &order.channel_identifier)?;
    validate_state_code(&order.state_code)?;

    for line in &order.lines {
        if let Some(identifier) = &line.channel_identifier {
            validate_external_identifier("line identifier", identifier)?;
        }
        validate_external_identifier("product identifier", &line.product_identifier)?;
        validate_line_quantity(line.quantity)?;
        validate_price_cents(line.unit_price_cents)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
