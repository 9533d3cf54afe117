//! # chansync-sync: Channel Synchronization Engine
//!
//! Imports orders and products from external sales channels and exports
//! order status, prices and inventory back, incrementally and per channel.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Channel Sync Engine                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │          SweepScheduler (interval, shutdown handle)              │  │
//! │  │   sweep_import_orders • sweep_update_order_status • ...          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     SyncOrchestrator                             │  │
//! │  │  per-(channel, operation) lock • watermark CAS • retry/backoff   │  │
//! │  └──────┬──────────────────┬──────────────────┬─────────────────────┘  │
//! │         ▼                  ▼                  ▼                         │
//! │  ┌──────────────┐  ┌────────────────┐  ┌──────────────────────┐        │
//! │  │ AdapterReg.  │  │ LifecycleDriver│  │ ExceptionLedger      │        │
//! │  │ one adapter  │  │ quote, confirm │  │ raise / resolve,     │        │
//! │  │ per source   │  │ process, done  │  │ target registry      │        │
//! │  └──────────────┘  └────────────────┘  └──────────────────────┘        │
//! │                    ┌────────────────┐                                   │
//! │                    │ Availability   │                                   │
//! │                    │ Resolver       │                                   │
//! │                    └────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`adapter`] - The `ChannelAdapter` trait, the manual adapter, the registry
//! - [`orchestrator`] - Watermarked imports and exports
//! - [`lifecycle`] - Applies state-map actions to orders
//! - [`ledger`] - Exception ledger with target validation
//! - [`availability`] - Availability of listings and products
//! - [`sweep`] - Sweeps over active channels and the scheduler
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chansync_sync::{AdapterRegistry, OrchestratorSettings, SyncOrchestrator};
//!
//! let mut adapters = AdapterRegistry::new();
//! adapters.register(Arc::new(WebshopAdapter::new(client)));
//!
//! let orchestrator = SyncOrchestrator::new(db, adapters, OrchestratorSettings::default());
//! let orders = orchestrator.import_orders(&channel.id, &SyncContext::new("company-1")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod adapter;
pub mod availability;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod orchestrator;
pub mod sweep;

// =============================================================================
// Re-exports
// =============================================================================

pub use adapter::{AdapterContext, AdapterRegistry, Capability, ChannelAdapter, ManualAdapter};
pub use availability::{AvailabilityResolver, ListingAvailability};
pub use config::{ImportSettings, RetrySettings, SweepSettings, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use ledger::{ExceptionLedger, TargetLookup, TargetRegistry};
pub use lifecycle::LifecycleDriver;
pub use orchestrator::{OrchestratorSettings, ProductImport, SyncOrchestrator};
pub use sweep::{
    sweep_export_inventory, sweep_export_order_status, sweep_export_prices, sweep_import_orders,
    sweep_update_order_status, SweepFailurePolicy, SweepKind, SweepReport, SweepScheduler,
    SweepSchedulerHandle,
};
