//! # Repository Module
//!
//! Database repository implementations for the channel sync engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Orchestrator                                                          │
//! │       │                                                                 │
//! │       │  db.order_states().ensure(channel_id, "paid", "Paid")          │
//! │       ▼                                                                 │
//! │  OrderStateRepository                                                  │
//! │  ├── resolve(&self, channel_id, code)                                  │
//! │  ├── ensure(&self, channel_id, code, name)                             │
//! │  └── configure(&self, id, action, invoice, shipment)                   │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  SQL stays in this module; the sync engine never writes SQL.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`channel::ChannelRepository`] - Channels and user access
//! - [`order_state::OrderStateRepository`] - State maps
//! - [`listing::ListingRepository`] - Listings, inventory selection
//! - [`exception::ExceptionRepository`] - Exception ledger
//! - [`order::OrderRepository`] - Orders, lines, shipments
//! - [`product::ProductRepository`] - Products, stock
//! - [`tax::TaxRepository`] - Tax mappings
//! - [`carrier::CarrierRepository`] - Carrier mappings
//! - [`watermark::WatermarkRepository`] - Watermark compare-and-swap

pub mod carrier;
pub mod channel;
pub mod exception;
pub mod listing;
pub mod order;
pub mod order_state;
pub mod product;
pub mod tax;
pub mod watermark;

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for repository tests.

    use chansync_core::{Channel, NewChannel, Product, SourceKind};

    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn channel(db: &Database, source: &str) -> Channel {
        db.channels()
            .create(&NewChannel::new("Webshop", SourceKind::new(source), "company-1", "wh-1"))
            .await
            .unwrap()
    }

    pub async fn product(db: &Database, code: &str) -> Product {
        db.products().create(code, &format!("Product {code}"), 1000).await.unwrap()
    }
}
