//! # Listings
//!
//! A listing publishes one product on one non-manual channel under the
//! channel's own product identifier.
//!
//! ## Constraints
//! - unique per `(channel, product)`, whatever the identifier
//! - unique per `(channel, product_identifier, product)`
//! - deleting the product deletes its listings
//! - a channel that still has listings cannot be deleted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::availability::{Availability, AvailabilityType, AvailabilityValue};

/// Lifecycle state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Active,
    Disabled,
}

impl Default for ListingState {
    fn default() -> Self {
        ListingState::Active
    }
}

/// A product listed on a channel.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Listing {
    pub id: String,
    pub channel_id: String,
    pub product_id: String,
    /// The product's identifier on the channel.
    pub product_identifier: String,
    pub state: ListingState,
    /// Availability override type; no override when unset.
    pub override_type: Option<AvailabilityType>,
    pub override_value: Option<AvailabilityValue>,
    pub override_quantity: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == ListingState::Active
    }

    /// The availability override, when the listing carries one.
    pub fn availability_override(&self) -> Option<Availability> {
        self.override_type.map(|availability_type| Availability {
            availability_type,
            value: self.override_value,
            quantity: self.override_quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        Listing {
            id: "l-1".to_string(),
            channel_id: "ch".to_string(),
            product_id: "p-1".to_string(),
            product_identifier: "EXT-1".to_string(),
            state: ListingState::default(),
            override_type: None,
            override_value: None,
            override_quantity: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_override_by_default() {
        let listing = listing();
        assert!(listing.is_active());
        assert!(listing.availability_override().is_none());
    }

    #[test]
    fn test_override_passes_through() {
        let mut listing = listing();
        listing.override_type = Some(AvailabilityType::Infinite);
        assert_eq!(listing.availability_override(), Some(Availability::infinite()));
    }
}
