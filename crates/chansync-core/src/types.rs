//! # Domain Types
//!
//! Core domain types shared by the database layer and the sync engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Channel      │   │     Order       │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  code (business)│   │  reference      │   │  code (business)│       │
//! │  │  source kind    │   │  channel ident. │   │  list price     │       │
//! │  │  4 watermarks   │   │  state          │   │  is_active      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ SyncOperation   │   │   OrderState    │   │  ShipmentState  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  OrderImport    │   │  Draft          │   │  Draft          │       │
//! │  │  OrderExport    │   │  Quotation      │   │  Waiting        │       │
//! │  │  PriceExport    │   │  Confirmed      │   │  Assigned       │       │
//! │  │  InventoryExport│   │  Processing     │   │  Done           │       │
//! │  └─────────────────┘   │  Done/Cancelled │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (code, reference, channel identifier) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::state_map::{InvoiceMethod, ShipmentMethod};
use crate::tax_rate::TaxRate;
use crate::MANUAL_SOURCE;

// =============================================================================
// Source Kind
// =============================================================================

/// The adapter kind a channel talks through.
///
/// The set is closed per deployment but open to extension: a new adapter kind
/// is just a new string registered with the adapter registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
#[ts(export)]
pub struct SourceKind(String);

impl SourceKind {
    /// Creates a source kind from its identifier.
    pub fn new(kind: impl Into<String>) -> Self {
        SourceKind(kind.into())
    }

    /// The built-in no-op source kind.
    pub fn manual() -> Self {
        SourceKind(MANUAL_SOURCE.to_string())
    }

    /// Returns the identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if this is the manual source kind.
    #[inline]
    pub fn is_manual(&self) -> bool {
        self.0 == MANUAL_SOURCE
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKind {
    fn from(kind: &str) -> Self {
        SourceKind::new(kind)
    }
}

// =============================================================================
// Sync Operation
// =============================================================================

/// The incremental operations that keep a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Pull orders from the channel.
    OrderImport,
    /// Push order status to the channel.
    OrderExport,
    /// Push product prices to the channel.
    PriceExport,
    /// Push stock availability to the channel.
    InventoryExport,
}

impl SyncOperation {
    /// All watermarked operations.
    pub const ALL: [SyncOperation; 4] = [
        SyncOperation::OrderImport,
        SyncOperation::OrderExport,
        SyncOperation::PriceExport,
        SyncOperation::InventoryExport,
    ];

    /// Column on `channels` holding this operation's watermark.
    pub const fn watermark_column(&self) -> &'static str {
        match self {
            SyncOperation::OrderImport => "last_order_import",
            SyncOperation::OrderExport => "last_order_export",
            SyncOperation::PriceExport => "last_price_export",
            SyncOperation::InventoryExport => "last_inventory_export",
        }
    }

    /// Short name used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::OrderImport => "order_import",
            SyncOperation::OrderExport => "order_export",
            SyncOperation::PriceExport => "price_export",
            SyncOperation::InventoryExport => "inventory_export",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Channel
// =============================================================================

/// An external sales channel (marketplace, storefront) or the manual channel.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Channel {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Business code, immutable once the channel is in use.
    pub code: Option<String>,

    /// Adapter kind.
    pub source: SourceKind,

    /// Company owning the channel.
    pub company_id: String,

    /// ISO currency code orders are imported in.
    pub currency: String,

    /// Price list used for exported prices.
    pub price_list_id: Option<String>,

    /// Warehouse whose stock backs this channel's availability.
    pub warehouse_id: String,

    /// Default payment term for imported orders.
    pub payment_term_id: Option<String>,

    /// Default invoice method for orders created on this channel.
    pub invoice_method: InvoiceMethod,

    /// Default shipment method for orders created on this channel.
    pub shipment_method: ShipmentMethod,

    /// IANA timezone name the channel reports in.
    pub timezone: String,

    /// Position in sweeps (lower runs first).
    pub sequence: i64,

    /// Inactive channels are skipped by sweeps.
    pub is_active: bool,

    #[ts(as = "Option<String>")]
    pub last_order_import: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub last_order_export: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub last_price_export: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub last_inventory_export: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Returns the watermark for an operation.
    pub fn watermark(&self, operation: SyncOperation) -> Option<DateTime<Utc>> {
        match operation {
            SyncOperation::OrderImport => self.last_order_import,
            SyncOperation::OrderExport => self.last_order_export,
            SyncOperation::PriceExport => self.last_price_export,
            SyncOperation::InventoryExport => self.last_inventory_export,
        }
    }

    /// Label used in user-facing errors: the code when set, else the name.
    pub fn label(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.name)
    }
}

/// Fields for creating a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChannel {
    pub name: String,
    pub code: Option<String>,
    pub source: SourceKind,
    pub company_id: String,
    pub currency: String,
    pub price_list_id: Option<String>,
    pub warehouse_id: String,
    pub payment_term_id: Option<String>,
    pub invoice_method: InvoiceMethod,
    pub shipment_method: ShipmentMethod,
    pub timezone: String,
    pub sequence: i64,
}

impl NewChannel {
    /// Minimal channel with manual defaults, used by setup code and tests.
    pub fn new(
        name: impl Into<String>,
        source: SourceKind,
        company_id: impl Into<String>,
        warehouse_id: impl Into<String>,
    ) -> Self {
        NewChannel {
            name: name.into(),
            code: None,
            source,
            company_id: company_id.into(),
            currency: "USD".to_string(),
            price_list_id: None,
            warehouse_id: warehouse_id.into(),
            payment_term_id: None,
            invoice_method: InvoiceMethod::default(),
            shipment_method: ShipmentMethod::default(),
            timezone: "UTC".to_string(),
            sequence: 10,
        }
    }

    /// Sets the business code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the sweep position.
    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.sequence = sequence;
        self
    }
}

// =============================================================================
// Sync Context
// =============================================================================

/// Explicit context every sync operation runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncContext {
    /// Company the work is done for.
    pub company_id: String,

    /// Acting user; `None` for scheduled sweeps running as the system.
    pub user_id: Option<String>,

    /// Whether orders whose state maps to `import_as_past` are imported.
    pub include_past_orders: bool,
}

impl SyncContext {
    /// System context for a company.
    pub fn new(company_id: impl Into<String>) -> Self {
        SyncContext {
            company_id: company_id.into(),
            user_id: None,
            include_past_orders: false,
        }
    }

    /// Acts as a specific user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Includes historical orders in imports.
    pub fn including_past_orders(mut self, include: bool) -> Self {
        self.include_past_orders = include;
        self
    }
}

// =============================================================================
// Product
// =============================================================================

/// The minimum of a product the engine needs.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Business code (SKU).
    pub code: String,
    pub name: String,
    /// List price in cents.
    pub list_price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order State
// =============================================================================

/// Local fulfillment workflow state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Freshly created.
    Draft,
    /// Quoted to the customer.
    Quotation,
    /// Confirmed, awaiting processing.
    Confirmed,
    /// Shipments and invoices are being produced.
    Processing,
    /// Fully handled, including historical imports.
    Done,
    /// Abandoned.
    Cancelled,
}

impl OrderState {
    /// Returns the lowercase state name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderState::Draft => "draft",
            OrderState::Quotation => "quotation",
            OrderState::Confirmed => "confirmed",
            OrderState::Processing => "processing",
            OrderState::Done => "done",
            OrderState::Cancelled => "cancelled",
        }
    }

    /// Position along the forward workflow; `None` for cancelled.
    pub const fn rank(&self) -> Option<u8> {
        match self {
            OrderState::Draft => Some(0),
            OrderState::Quotation => Some(1),
            OrderState::Confirmed => Some(2),
            OrderState::Processing => Some(3),
            OrderState::Done => Some(4),
            OrderState::Cancelled => None,
        }
    }
}

impl Default for OrderState {
    fn default() -> Self {
        OrderState::Draft
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Shipment State
// =============================================================================

/// Workflow state of an outgoing shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    Draft,
    Waiting,
    Assigned,
    Done,
}

impl ShipmentState {
    /// Next state on the way to `assigned`; `None` once assigned or done.
    pub const fn advance(&self) -> Option<ShipmentState> {
        match self {
            ShipmentState::Draft => Some(ShipmentState::Waiting),
            ShipmentState::Waiting => Some(ShipmentState::Assigned),
            ShipmentState::Assigned | ShipmentState::Done => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ShipmentState::Draft => "draft",
            ShipmentState::Waiting => "waiting",
            ShipmentState::Assigned => "assigned",
            ShipmentState::Done => "done",
        }
    }
}

impl Default for ShipmentState {
    fn default() -> Self {
        ShipmentState::Draft
    }
}

impl fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A sale order, local or imported from a channel.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub channel_id: String,
    pub company_id: String,
    /// Human-readable order reference.
    pub reference: String,
    /// Identifier of the order on the channel, globally unique.
    pub channel_identifier: Option<String>,
    pub state: OrderState,
    pub invoice_method: InvoiceMethod,
    pub shipment_method: ShipmentMethod,
    /// Channel-reported state code the order was last seen in.
    pub channel_state_code: Option<String>,
    pub currency: String,
    /// Local carrier, when the channel's carrier code is mapped.
    pub carrier_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A line of a sale order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    /// Identifier of the line on the channel, globally unique.
    pub channel_identifier: Option<String>,
    pub product_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Local tax applied to this line.
    pub tax_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Line total before tax.
    #[inline]
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

/// An outgoing shipment of an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shipment {
    pub id: String,
    pub order_id: String,
    pub state: ShipmentState,
    pub carrier_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Move
// =============================================================================

/// One entry of a product's stock-movement history.
///
/// Positive quantities bring stock into the warehouse, negative take it out.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMove {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Mappings
// =============================================================================

/// Maps an external tax descriptor to a local tax.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TaxMapping {
    pub id: String,
    pub channel_id: String,
    /// Tax name as the channel reports it.
    pub name: String,
    #[ts(as = "String")]
    pub rate: TaxRate,
    /// Local tax the descriptor stands for.
    pub tax_id: String,
}

/// Maps an external shipping-carrier code to a local carrier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CarrierMapping {
    pub id: String,
    pub channel_id: String,
    pub code: String,
    pub name: String,
    /// Unset until an operator links the code to a local carrier.
    pub carrier_id: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_manual() {
        assert!(SourceKind::manual().is_manual());
        assert!(!SourceKind::new("webshop").is_manual());
        assert_eq!(SourceKind::from("webshop").to_string(), "webshop");
    }

    #[test]
    fn test_source_kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&SourceKind::new("amazon")).unwrap();
        assert_eq!(json, "\"amazon\"");
    }

    #[test]
    fn test_watermark_columns_are_distinct() {
        let mut columns: Vec<_> = SyncOperation::ALL
            .iter()
            .map(|op| op.watermark_column())
            .collect();
        columns.sort();
        columns.dedup();
        assert_eq!(columns.len(), 4);
    }

    #[test]
    fn test_order_state_rank() {
        assert!(OrderState::Quotation.rank() < OrderState::Confirmed.rank());
        assert_eq!(OrderState::Cancelled.rank(), None);
        assert_eq!(OrderState::default(), OrderState::Draft);
    }

    #[test]
    fn test_shipment_advance_stops_at_assigned() {
        let mut state = ShipmentState::Draft;
        let mut seen = vec![state];
        while let Some(next) = state.advance() {
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![ShipmentState::Draft, ShipmentState::Waiting, ShipmentState::Assigned]
        );
    }

    #[test]
    fn test_sync_context_builder() {
        let ctx = SyncContext::new("company-1")
            .with_user("alice")
            .including_past_orders(true);
        assert_eq!(ctx.user_id.as_deref(), Some("alice"));
        assert!(ctx.include_past_orders);
    }
}
