//! # Availability Resolver
//!
//! Computes what a channel is told about a product's stock.
//!
//! ```text
//! listing override set?  ──yes──▶  the override, passed through as is
//!         │
//!         no
//!         ▼
//! on hand in the channel warehouse  > 0  ──▶  bucket / in_stock / qty
//!                                   ≤ 0  ──▶  bucket / out_of_stock / qty
//! ```

use tracing::debug;

use chansync_core::{Availability, Channel, Listing};
use chansync_db::Database;

use crate::error::SyncResult;

/// A listing paired with the availability to send for it.
#[derive(Debug, Clone)]
pub struct ListingAvailability {
    pub listing: Listing,
    pub availability: Availability,
}

/// Resolves availability within a channel's context.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver {
    db: Database,
}

impl AvailabilityResolver {
    pub fn new(db: Database) -> Self {
        AvailabilityResolver { db }
    }

    /// Availability of a listed product.
    pub async fn for_listing(&self, channel: &Channel, listing: &Listing) -> SyncResult<Availability> {
        if let Some(availability) = listing.availability_override() {
            debug!(listing_id = %listing.id, "Using listing availability override");
            return Ok(availability);
        }
        self.from_stock(channel, &listing.product_id).await
    }

    /// Availability of a product on a channel, through its listing when it
    /// has one.
    pub async fn for_product(&self, channel: &Channel, product_id: &str) -> SyncResult<Availability> {
        match self.db.listings().find_for_product(&channel.id, product_id).await? {
            Some(listing) => self.for_listing(channel, &listing).await,
            None => self.from_stock(channel, product_id).await,
        }
    }

    /// Pairs each listing with its availability, keeping the input order.
    pub async fn resolve_all(
        &self,
        channel: &Channel,
        listings: Vec<Listing>,
    ) -> SyncResult<Vec<ListingAvailability>> {
        let mut items = Vec::with_capacity(listings.len());
        for listing in listings {
            let availability = self.for_listing(channel, &listing).await?;
            items.push(ListingAvailability {
                listing,
                availability,
            });
        }
        Ok(items)
    }

    async fn from_stock(&self, channel: &Channel, product_id: &str) -> SyncResult<Availability> {
        let quantity = self
            .db
            .products()
            .stock_quantity(product_id, &channel.warehouse_id)
            .await?;
        Ok(Availability::from_stock(quantity))
    }
}
