//! # Channel Adapters
//!
//! The seam between the engine and a concrete channel. One adapter exists per
//! source kind; the registry picks it by the channel's `source`.
//!
//! ## Capabilities
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ChannelAdapter                     default body                        │
//! │  ───────────────────────────────    ──────────────────────────────────  │
//! │  import_orders(since)               NotImplementedCapability            │
//! │  import_order(identifier)           NotImplementedCapability            │
//! │  import_products()                  NotImplementedCapability            │
//! │  import_product(identifier)         NotImplementedCapability            │
//! │  export_order_status(since)         NotImplementedCapability            │
//! │  export_product_prices(since)       NotImplementedCapability            │
//! │  export_inventory(items)            export_listing_inventory per item   │
//! │  export_listing_inventory(item)     NotImplementedCapability            │
//! │  import_order_states()              NotImplementedCapability            │
//! │  update_order_status()              NotImplementedCapability            │
//! │  import_shipping_carriers()         NotImplementedCapability            │
//! │                                                                         │
//! │  An adapter overrides only what its channel supports.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chansync_core::payload::{
    ExternalCarrier, ExternalOrder, ExternalOrderState, ExternalProduct, ExternalStatusChange,
};
use chansync_core::{Channel, SourceKind, StateMapEntry, SyncContext};
use chansync_db::Database;

use crate::availability::ListingAvailability;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Capability
// =============================================================================

/// The operations an adapter may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ImportOrders,
    ImportOrder,
    ImportProducts,
    ImportProduct,
    ExportOrderStatus,
    ExportProductPrices,
    ExportInventory,
    ExportListingInventory,
    ImportOrderStates,
    UpdateOrderStatus,
    ImportShippingCarriers,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::ImportOrders => "import_orders",
            Capability::ImportOrder => "import_order",
            Capability::ImportProducts => "import_products",
            Capability::ImportProduct => "import_product",
            Capability::ExportOrderStatus => "export_order_status",
            Capability::ExportProductPrices => "export_product_prices",
            Capability::ExportInventory => "export_inventory",
            Capability::ExportListingInventory => "export_listing_inventory",
            Capability::ImportOrderStates => "import_order_states",
            Capability::UpdateOrderStatus => "update_order_status",
            Capability::ImportShippingCarriers => "import_shipping_carriers",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Adapter Context
// =============================================================================

/// Everything an adapter call runs with. Passed explicitly, never ambient.
#[derive(Clone, Copy)]
pub struct AdapterContext<'a> {
    /// Read access for adapters that select their own records to export.
    pub db: &'a Database,
    pub channel: &'a Channel,
    pub sync: &'a SyncContext,
}

impl<'a> AdapterContext<'a> {
    pub fn new(db: &'a Database, channel: &'a Channel, sync: &'a SyncContext) -> Self {
        AdapterContext { db, channel, sync }
    }

    /// The channel's source kind.
    pub fn source_kind(&self) -> &SourceKind {
        &self.channel.source
    }

    /// Error for a capability this adapter kind lacks.
    pub fn not_implemented(&self, capability: Capability) -> SyncError {
        SyncError::not_implemented(self.channel.source.as_str(), capability.as_str())
    }

    /// State-map entries whose orders an adapter should pull.
    ///
    /// Fails with `NoImportableOrderStates` when the operator has not mapped
    /// any channel state to an importing action yet.
    pub async fn importable_states(&self) -> SyncResult<Vec<StateMapEntry>> {
        Ok(self
            .db
            .order_states()
            .importable_states(self.channel, self.sync.include_past_orders)
            .await?)
    }
}

// =============================================================================
// Channel Adapter Trait
// =============================================================================

/// One implementation per channel source kind.
///
/// Adapters translate between a channel's API and the payload records; all
/// persistence and workflow decisions stay in the orchestrator.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Source kind this adapter serves.
    fn source_kind(&self) -> SourceKind;

    /// Orders modified at or after `since`.
    async fn import_orders(
        &self,
        ctx: &AdapterContext<'_>,
        _since: DateTime<Utc>,
    ) -> SyncResult<Vec<ExternalOrder>> {
        Err(ctx.not_implemented(Capability::ImportOrders))
    }

    /// One order by its channel identifier.
    async fn import_order(
        &self,
        ctx: &AdapterContext<'_>,
        _identifier: &str,
    ) -> SyncResult<ExternalOrder> {
        Err(ctx.not_implemented(Capability::ImportOrder))
    }

    /// Every product the channel lists.
    async fn import_products(&self, ctx: &AdapterContext<'_>) -> SyncResult<Vec<ExternalProduct>> {
        Err(ctx.not_implemented(Capability::ImportProducts))
    }

    /// One product by its channel identifier.
    async fn import_product(
        &self,
        ctx: &AdapterContext<'_>,
        _identifier: &str,
    ) -> SyncResult<ExternalProduct> {
        Err(ctx.not_implemented(Capability::ImportProduct))
    }

    /// Pushes order status changed after `since`. Returns how many orders
    /// were sent.
    async fn export_order_status(
        &self,
        ctx: &AdapterContext<'_>,
        _since: Option<DateTime<Utc>>,
    ) -> SyncResult<usize> {
        Err(ctx.not_implemented(Capability::ExportOrderStatus))
    }

    /// Pushes prices changed after `since`. Returns how many products were
    /// sent.
    async fn export_product_prices(
        &self,
        ctx: &AdapterContext<'_>,
        _since: Option<DateTime<Utc>>,
    ) -> SyncResult<usize> {
        Err(ctx.not_implemented(Capability::ExportProductPrices))
    }

    /// Pushes availability for a batch of listings.
    ///
    /// Channels with a bulk endpoint override this; the default sends one
    /// listing at a time.
    async fn export_inventory(
        &self,
        ctx: &AdapterContext<'_>,
        items: &[ListingAvailability],
    ) -> SyncResult<()> {
        for item in items {
            self.export_listing_inventory(ctx, item).await?;
        }
        Ok(())
    }

    /// Pushes availability for one listing.
    async fn export_listing_inventory(
        &self,
        ctx: &AdapterContext<'_>,
        _item: &ListingAvailability,
    ) -> SyncResult<()> {
        Err(ctx.not_implemented(Capability::ExportListingInventory))
    }

    /// The channel's order-status vocabulary.
    async fn import_order_states(
        &self,
        ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalOrderState>> {
        Err(ctx.not_implemented(Capability::ImportOrderStates))
    }

    /// Status changes of already-imported orders.
    async fn update_order_status(
        &self,
        ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalStatusChange>> {
        Err(ctx.not_implemented(Capability::UpdateOrderStatus))
    }

    /// The shipping carriers the channel knows.
    async fn import_shipping_carriers(
        &self,
        ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalCarrier>> {
        Err(ctx.not_implemented(Capability::ImportShippingCarriers))
    }
}

// =============================================================================
// Manual Adapter
// =============================================================================

/// Adapter of the built-in `manual` source kind.
///
/// It talks to nothing. Pulling status changes succeeds with none; every
/// other capability is unimplemented.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualAdapter;

#[async_trait]
impl ChannelAdapter for ManualAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::manual()
    }

    async fn update_order_status(
        &self,
        _ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalStatusChange>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Adapter Registry
// =============================================================================

/// Adapters keyed by source kind.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    /// Registry holding only the manual adapter.
    pub fn new() -> Self {
        let mut registry = AdapterRegistry {
            adapters: HashMap::new(),
        };
        registry.register(Arc::new(ManualAdapter));
        registry
    }

    /// Adds an adapter, replacing any previous one of the same kind.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) -> &mut Self {
        self.adapters.insert(adapter.source_kind(), adapter);
        self
    }

    /// Adapter for a channel's source kind.
    pub fn get(&self, kind: &SourceKind) -> SyncResult<Arc<dyn ChannelAdapter>> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| SyncError::UnknownSourceKind(kind.to_string()))
    }

    /// Registered source kinds, sorted.
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.adapters.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chansync_core::NewChannel;
    use chansync_db::DbConfig;

    #[tokio::test]
    async fn test_manual_adapter_capabilities() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let channel = db
            .channels()
            .create(&NewChannel::new("Counter", SourceKind::manual(), "company-1", "wh-1"))
            .await
            .unwrap();
        let sync = SyncContext::new("company-1");
        let ctx = AdapterContext::new(&db, &channel, &sync);
        let adapter = ManualAdapter;

        assert!(adapter.update_order_status(&ctx).await.unwrap().is_empty());

        let err = adapter.import_orders(&ctx, Utc::now()).await.unwrap_err();
        assert!(err.is_not_implemented());
        assert_eq!(err.to_string(), "import_orders is not implemented for manual channels");

        // Bulk export falls through to the per-listing default
        assert!(adapter.export_inventory(&ctx, &[]).await.is_ok());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AdapterRegistry::new();
        assert!(registry.get(&SourceKind::manual()).is_ok());

        let err = registry.get(&SourceKind::new("webshop")).err().unwrap();
        assert!(err.is_config_error());
    }
}
