//! # chansync-db: Database Layer for the Channel Sync Engine
//!
//! This crate provides persistence for channels, state maps, listings, the
//! exception ledger, mappings, watermarks and the engine-facing minimum of
//! orders and products. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Chansync Data Flow                               │
//! │                                                                         │
//! │  Orchestrator (import_orders, export_inventory, ...)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  chansync-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ChannelRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderStateRepo│    │ 001_initial_ │  │   │
//! │  │   │               │    │ ListingRepo   │    │   schema.sql │  │   │
//! │  │   │               │    │ ExceptionRepo │    │              │  │   │
//! │  │   │               │    │ WatermarkRepo │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chansync_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("chansync.db")).await?;
//! let channels = db.channels().list_active().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::carrier::CarrierRepository;
pub use repository::channel::ChannelRepository;
pub use repository::exception::ExceptionRepository;
pub use repository::listing::ListingRepository;
pub use repository::order::{NewOrder, NewOrderLine, OrderRepository};
pub use repository::order_state::OrderStateRepository;
pub use repository::product::ProductRepository;
pub use repository::tax::TaxRepository;
pub use repository::watermark::WatermarkRepository;
