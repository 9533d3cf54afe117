//! # chansync-core: Pure Domain Logic for Channel Synchronization
//!
//! This crate holds the rules of the channel synchronization engine as plain
//! types and pure functions. Nothing in here touches a database or a network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Channel Sync Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             chansync-sync (orchestrator, adapters)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ chansync-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │ state_map │  │ lifecycle │  │availability│  │ tax_rate  │  │   │
//! │  │   │  actions  │  │   plans   │  │   policy   │  │fixed-point│  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  chansync-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Channels, orders, products, sync operations, context
//! - [`state_map`] - External order-status to local action mapping
//! - [`exception`] - Exception ledger records and their targets
//! - [`listing`] - Product listings on channels
//! - [`availability`] - Stock availability policy
//! - [`lifecycle`] - Order workflow transitions
//! - [`payload`] - Raw records exchanged with channel adapters
//! - [`tax_rate`] - Fixed-point tax rates (14 digits, 10 fractional)
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chansync_core::state_map::{OrderAction, ResolvedState};
//! use chansync_core::tax_rate::TaxRate;
//!
//! // Unmapped channel states never block an import
//! let resolved = ResolvedState::default();
//! assert_eq!(resolved.action, OrderAction::DoNotImport);
//!
//! // Tax rates compare exactly, no floating point involved
//! let a: TaxRate = "0.20".parse().unwrap();
//! let b: TaxRate = "0.2000000000".parse().unwrap();
//! assert_eq!(a, b);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod error;
pub mod exception;
pub mod lifecycle;
pub mod listing;
pub mod payload;
pub mod state_map;
pub mod tax_rate;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use availability::{Availability, AvailabilityType, AvailabilityValue};
pub use error::{CoreError, CoreResult, ValidationError};
pub use exception::{ChannelException, ExceptionTarget, TargetKind};
pub use lifecycle::LifecycleStep;
pub use listing::{Listing, ListingState};
pub use state_map::{InvoiceMethod, OrderAction, ResolvedState, ShipmentMethod, StateMapEntry};
pub use tax_rate::TaxRate;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Source kind of the built-in channel that never talks to anything.
pub const MANUAL_SOURCE: &str = "manual";

/// How far back the first order import of a channel reaches when the channel
/// has never been synchronized.
pub const DEFAULT_IMPORT_LOOKBACK_MONTHS: u32 = 1;
