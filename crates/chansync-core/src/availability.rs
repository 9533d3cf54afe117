//! # Availability Policy
//!
//! Stock availability of a product as a channel sees it.
//!
//! ## Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Listing has an override?                                               │
//! │     ├── yes ──▶ the override, passed through as-is                      │
//! │     └── no  ──▶ stock in the channel's warehouse                        │
//! │                   ├── quantity > 0  ──▶ bucket / in_stock               │
//! │                   └── quantity <= 0 ──▶ bucket / out_of_stock           │
//! │                                                                         │
//! │  `quantity` and `infinite` types come only from overrides or richer     │
//! │  adapters; the engine never derives them.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// How availability is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityType {
    /// A coarse in/out-of-stock value.
    Bucket,
    /// An exact quantity.
    Quantity,
    /// Always available.
    Infinite,
}

/// Coarse availability value, meaningful for the bucket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityValue {
    InStock,
    Limited,
    OutOfStock,
}

/// Availability of a product within a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Availability {
    #[serde(rename = "type")]
    pub availability_type: AvailabilityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AvailabilityValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl Availability {
    /// Bucket availability derived from a stock quantity.
    ///
    /// ## Example
    /// ```rust
    /// use chansync_core::availability::{Availability, AvailabilityValue};
    ///
    /// assert_eq!(Availability::from_stock(3).value, Some(AvailabilityValue::InStock));
    /// assert_eq!(Availability::from_stock(0).value, Some(AvailabilityValue::OutOfStock));
    /// ```
    pub fn from_stock(quantity: i64) -> Self {
        let value = if quantity > 0 {
            AvailabilityValue::InStock
        } else {
            AvailabilityValue::OutOfStock
        };
        Availability {
            availability_type: AvailabilityType::Bucket,
            value: Some(value),
            quantity: Some(quantity),
        }
    }

    /// Always-available product.
    pub fn infinite() -> Self {
        Availability {
            availability_type: AvailabilityType::Infinite,
            value: None,
            quantity: None,
        }
    }

    /// Exact quantity, as reported by richer adapters.
    pub fn exact(quantity: i64) -> Self {
        Availability {
            availability_type: AvailabilityType::Quantity,
            value: None,
            quantity: Some(quantity),
        }
    }

    /// Checks if the product can be ordered on the channel.
    pub fn is_available(&self) -> bool {
        match self.availability_type {
            AvailabilityType::Infinite => true,
            AvailabilityType::Quantity => self.quantity.unwrap_or(0) > 0,
            AvailabilityType::Bucket => matches!(
                self.value,
                Some(AvailabilityValue::InStock) | Some(AvailabilityValue::Limited)
            ),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
