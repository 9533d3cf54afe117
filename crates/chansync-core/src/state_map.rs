//! # State Map
//!
//! Translates a channel's own order-status vocabulary into a local
//! fulfillment action plus invoice and shipment policy.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    resolve(channel, external_code)                      │
//! │                                                                         │
//! │  "pending"  ──▶ entry found ──▶ process_manually / order / order       │
//! │  "shipped"  ──▶ no entry    ──▶ do_not_import / manual / manual        │
//! │                                  (the default, never an error)          │
//! │                                                                         │
//! │  Unknown codes are auto-provisioned by `ensure` with the default so    │
//! │  an operator can configure them later. Entries are never deleted       │
//! │  automatically.                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Order Action
// =============================================================================

/// What to do with an order reported in a given external state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    /// Record the state, do not create or advance orders in it.
    DoNotImport,
    /// Import, quote, confirm and process without operator involvement.
    ProcessAutomatically,
    /// Import, quote and confirm; an operator processes it.
    ProcessManually,
    /// Import as a historical order that is already done.
    ImportAsPast,
}

impl OrderAction {
    /// Checks if orders in this state are pulled by an import.
    ///
    /// `import_as_past` only counts when historical orders are requested.
    pub const fn is_importable(&self, include_past: bool) -> bool {
        match self {
            OrderAction::ProcessAutomatically | OrderAction::ProcessManually => true,
            OrderAction::ImportAsPast => include_past,
            OrderAction::DoNotImport => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderAction::DoNotImport => "do_not_import",
            OrderAction::ProcessAutomatically => "process_automatically",
            OrderAction::ProcessManually => "process_manually",
            OrderAction::ImportAsPast => "import_as_past",
        }
    }
}

impl Default for OrderAction {
    fn default() -> Self {
        OrderAction::DoNotImport
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Invoice / Shipment Methods
// =============================================================================

/// When invoices are created for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceMethod {
    Manual,
    /// On order confirmation.
    Order,
    /// On shipment.
    Shipment,
}

impl Default for InvoiceMethod {
    fn default() -> Self {
        InvoiceMethod::Manual
    }
}

/// When shipments are created for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentMethod {
    Manual,
    /// On order confirmation.
    Order,
    /// On invoice payment.
    Invoice,
}

impl Default for ShipmentMethod {
    fn default() -> Self {
        ShipmentMethod::Manual
    }
}

// =============================================================================
// State Map Entry
// =============================================================================

/// One row of a channel's state map.
///
/// `(channel_id, code)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StateMapEntry {
    pub id: String,
    pub channel_id: String,
    /// State code as the channel reports it.
    pub code: String,
    /// Human-readable state name.
    pub name: String,
    pub action: OrderAction,
    pub invoice_method: InvoiceMethod,
    pub shipment_method: ShipmentMethod,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StateMapEntry {
    /// The resolved mapping this entry stands for.
    pub fn resolved(&self) -> ResolvedState {
        ResolvedState {
            action: self.action,
            invoice_method: self.invoice_method,
            shipment_method: self.shipment_method,
        }
    }
}

// =============================================================================
// Resolved State
// =============================================================================

/// The outcome of resolving an external state code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedState {
    pub action: OrderAction,
    pub invoice_method: InvoiceMethod,
    pub shipment_method: ShipmentMethod,
}

/// Resolves an external code against a channel's entries.
///
/// Exact, case-sensitive match on the code. A missing entry yields
/// [`ResolvedState::default`].
///
/// ## Example
/// ```rust
/// use chansync_core::state_map::{resolve, OrderAction};
///
/// let resolved = resolve(&[], "shipped");
/// assert_eq!(resolved.action, OrderAction::DoNotImport);
/// ```
pub fn resolve(entries: &[StateMapEntry], code: &str) -> ResolvedState {
    entries
        .iter()
        .find(|entry| entry.code == code)
        .map(StateMapEntry::resolved)
        .unwrap_or_default()
}

/// Actions whose orders an import pulls.
pub fn importable_actions(include_past: bool) -> Vec<OrderAction> {
    [
        OrderAction::ProcessAutomatically,
        OrderAction::ProcessManually,
        OrderAction::ImportAsPast,
    ]
    .into_iter()
    .filter(|action| action.is_importable(include_past))
    .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
