//! # Sync Orchestrator
//!
//! Drives every import and export of a channel. Each operation is
//! independently invocable and safe to re-run.
//!
//! ## Watermarked Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run_start = now                                                        │
//! │  lock (channel, operation)            in-process, one run at a time     │
//! │  prev = watermark (or lookback for a first order import)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bulk work: adapter pull/push, per-record transactions                  │
//! │       │                                                                 │
//! │       ├── any error ──▶ propagate, watermark untouched                  │
//! │       ▼                                                                 │
//! │  CAS watermark: prev ──▶ run_start    own statement, after bulk work    │
//! │       └── lost ──▶ WatermarkConflict                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order Import, Per Payload
//! ```text
//! validate ─▶ identifier owned by another channel? ─▶ DuplicateExternalIdentifier
//!          ─▶ create permission ─▶ ensure state-map entry (auto-provision)
//!          ─▶ resolve every line tax        (UnmappedTaxReference, nothing written)
//!          ─▶ resolve products              (import unknown ones with listing)
//!          ─▶ resolve carrier, silently
//!          ─▶ order + lines in one transaction, with the exception for
//!             an unconfigured carrier when there is one
//!          ─▶ lifecycle driver              (blocked confirm is logged)
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Months, Utc};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use chansync_core::payload::{ExternalOrder, ExternalProduct};
use chansync_core::validation::validate_external_order;
use chansync_core::{
    CarrierMapping, Channel, CoreError, Order, Product, ResolvedState,
    StateMapEntry, SyncContext, SyncOperation, DEFAULT_IMPORT_LOOKBACK_MONTHS,
};
use chansync_db::{Database, NewOrder, NewOrderLine};

use crate::adapter::{AdapterContext, AdapterRegistry, ChannelAdapter};
use crate::availability::AvailabilityResolver;
use crate::config::{RetrySettings, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::ledger::ExceptionLedger;
use crate::lifecycle::LifecycleDriver;

// =============================================================================
// Settings
// =============================================================================

/// Orchestrator knobs taken from [`SyncConfig`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    /// First-import lookback. `None` means one calendar month.
    pub lookback_days: Option<u32>,
    pub retry: RetrySettings,
}

impl OrchestratorSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        OrchestratorSettings {
            lookback_days: config.import.lookback_days,
            retry: config.retry.clone(),
        }
    }

    /// Start of the window a never-synchronized channel imports from.
    ///
    /// ## Errors
    /// * `InvalidConfig` - the lookback reaches past the representable range
    pub fn lookback_start(&self, run_start: DateTime<Utc>) -> SyncResult<DateTime<Utc>> {
        let start = match self.lookback_days {
            Some(days) => ChronoDuration::try_days(i64::from(days))
                .and_then(|lookback| run_start.checked_sub_signed(lookback)),
            None => run_start.checked_sub_months(Months::new(DEFAULT_IMPORT_LOOKBACK_MONTHS)),
        };
        start.ok_or_else(|| {
            SyncError::InvalidConfig(format!(
                "import lookback of {:?} days is out of range",
                self.lookback_days
            ))
        })
    }
}

/// Which products an import covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductImport {
    /// Every product the channel lists.
    All,
    /// One product by its channel identifier.
    Specific(String),
}

type LockKey = (String, SyncOperation);

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs sync operations for channels.
pub struct SyncOrchestrator {
    db: Database,
    adapters: AdapterRegistry,
    lifecycle: LifecycleDriver,
    ledger: ExceptionLedger,
    availability: AvailabilityResolver,
    settings: OrchestratorSettings,
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl SyncOrchestrator {
    pub fn new(db: Database, adapters: AdapterRegistry, settings: OrchestratorSettings) -> Self {
        SyncOrchestrator {
            lifecycle: LifecycleDriver::new(db.clone()),
            ledger: ExceptionLedger::new(db.clone()),
            availability: AvailabilityResolver::new(db.clone()),
            db,
            adapters,
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> &ExceptionLedger {
        &self.ledger
    }

    pub fn lifecycle(&self) -> &LifecycleDriver {
        &self.lifecycle
    }

    pub fn availability(&self) -> &AvailabilityResolver {
        &self.availability
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Imports orders changed since the channel's order-import watermark.
    ///
    /// ## Returns
    /// The imported or updated orders. On any error the watermark is left
    /// where it was; orders committed before the error stay.
    pub async fn import_orders(&self, channel_id: &str, sync: &SyncContext) -> SyncResult<Vec<Order>> {
        let run_start = Utc::now();
        let operation = SyncOperation::OrderImport;
        let _guard = self.lock(channel_id, operation).await;

        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let prev = self.db.watermarks().get(&channel.id, operation).await?;
        let since = match prev {
            Some(prev) => prev,
            None => self.settings.lookback_start(run_start)?,
        };

        info!(
            channel_id = %channel.id,
            source = %channel.source,
            since = %since,
            "Importing orders"
        );

        let actx = AdapterContext::new(&self.db, &channel, sync);
        let payloads = {
            let adapter = adapter.as_ref();
            let actx = &actx;
            self.with_retry(&channel, "import_orders", move || adapter.import_orders(actx, since))
                .await?
        };

        let mut imported = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            imported.push(self.import_payload(adapter.as_ref(), &actx, payload).await?);
        }

        self.commit_watermark(&channel, operation, prev, run_start).await?;

        info!(
            channel_id = %channel.id,
            source = %channel.source,
            count = imported.len(),
            "Orders imported"
        );
        Ok(imported)
    }

    /// Imports one order by its channel identifier. Watermarks are untouched.
    pub async fn import_order(
        &self,
        channel_id: &str,
        sync: &SyncContext,
        identifier: &str,
    ) -> SyncResult<Order> {
        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let actx = AdapterContext::new(&self.db, &channel, sync);

        let payload = {
            let adapter = adapter.as_ref();
            let actx = &actx;
            self.with_retry(&channel, "import_order", move || adapter.import_order(actx, identifier))
                .await?
        };
        self.import_payload(adapter.as_ref(), &actx, &payload).await
    }

    /// Pushes status of orders changed since the order-export watermark.
    pub async fn export_order_status(&self, channel_id: &str, sync: &SyncContext) -> SyncResult<usize> {
        let run_start = Utc::now();
        let operation = SyncOperation::OrderExport;
        let _guard = self.lock(channel_id, operation).await;

        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let prev = self.db.watermarks().get(&channel.id, operation).await?;

        let actx = AdapterContext::new(&self.db, &channel, sync);
        let sent = adapter.export_order_status(&actx, prev).await?;

        self.commit_watermark(&channel, operation, prev, run_start).await?;
        info!(channel_id = %channel.id, source = %channel.source, count = sent, "Order status exported");
        Ok(sent)
    }

    /// Applies status changes the channel reports for imported orders.
    ///
    /// A `manual` channel has nothing to pull and succeeds with zero.
    pub async fn update_order_status(&self, channel_id: &str, sync: &SyncContext) -> SyncResult<usize> {
        let channel = self.db.channels().get(channel_id).await?;
        if channel.source.is_manual() {
            debug!(channel_id = %channel.id, "Manual channel, no status to pull");
            return Ok(0);
        }

        let adapter = self.adapters.get(&channel.source)?;
        let actx = AdapterContext::new(&self.db, &channel, sync);
        let changes = {
            let adapter = adapter.as_ref();
            let actx = &actx;
            self.with_retry(&channel, "update_order_status", move || adapter.update_order_status(actx))
                .await?
        };

        let orders = self.db.orders();
        let mut updated = 0;
        for change in &changes {
            let order = match orders.find_by_channel_identifier(&change.channel_identifier).await? {
                Some(order) if order.channel_id == channel.id => order,
                _ => {
                    warn!(
                        channel_id = %channel.id,
                        identifier = %change.channel_identifier,
                        "Status change for an order that was never imported, skipped"
                    );
                    continue;
                }
            };

            let entry = self
                .ensure_state(&channel, &change.state_code, change.state_name.as_deref())
                .await?;
            orders.set_channel_state_code(&order.id, &change.state_code).await?;
            self.drive(&order, entry.resolved()).await?;
            updated += 1;
        }

        info!(channel_id = %channel.id, source = %channel.source, count = updated, "Order status updated");
        Ok(updated)
    }

    /// Confirms an order on an operator's behalf.
    pub async fn confirm_order(&self, order_id: &str) -> SyncResult<Order> {
        self.lifecycle.confirm(order_id).await
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Imports products with their listings.
    ///
    /// Products already listed on the channel are returned as they are.
    pub async fn import_products(
        &self,
        channel_id: &str,
        sync: &SyncContext,
        scope: ProductImport,
    ) -> SyncResult<Vec<Product>> {
        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let actx = AdapterContext::new(&self.db, &channel, sync);

        let products = match scope {
            ProductImport::All => {
                let payloads = {
                    let adapter = adapter.as_ref();
                    let actx = &actx;
                    self.with_retry(&channel, "import_products", move || adapter.import_products(actx))
                        .await?
                };
                let mut products = Vec::with_capacity(payloads.len());
                for payload in &payloads {
                    products.push(self.store_product(&channel, payload).await?);
                }
                products
            }
            ProductImport::Specific(identifier) => {
                vec![self.product_for_identifier(adapter.as_ref(), &actx, &identifier).await?]
            }
        };

        info!(channel_id = %channel.id, source = %channel.source, count = products.len(), "Products imported");
        Ok(products)
    }

    /// Pushes prices changed since the price-export watermark.
    pub async fn export_prices(&self, channel_id: &str, sync: &SyncContext) -> SyncResult<usize> {
        let run_start = Utc::now();
        let operation = SyncOperation::PriceExport;
        let _guard = self.lock(channel_id, operation).await;

        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let prev = self.db.watermarks().get(&channel.id, operation).await?;

        let actx = AdapterContext::new(&self.db, &channel, sync);
        let sent = adapter.export_product_prices(&actx, prev).await?;

        self.commit_watermark(&channel, operation, prev, run_start).await?;
        info!(channel_id = %channel.id, source = %channel.source, count = sent, "Prices exported");
        Ok(sent)
    }

    /// Pushes availability of listings touched since the inventory watermark.
    ///
    /// Without a watermark every active listing is sent.
    pub async fn export_inventory(&self, channel_id: &str, sync: &SyncContext) -> SyncResult<usize> {
        let run_start = Utc::now();
        let operation = SyncOperation::InventoryExport;
        let _guard = self.lock(channel_id, operation).await;

        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let prev = self.db.watermarks().get(&channel.id, operation).await?;

        let listings = self
            .db
            .listings()
            .select_for_inventory_export(&channel.id, prev)
            .await?;
        let items = self.availability.resolve_all(&channel, listings).await?;
        debug!(channel_id = %channel.id, count = items.len(), "Listings selected for inventory export");

        if !items.is_empty() {
            let actx = AdapterContext::new(&self.db, &channel, sync);
            adapter.export_inventory(&actx, &items).await?;
        }

        self.commit_watermark(&channel, operation, prev, run_start).await?;
        info!(channel_id = %channel.id, source = %channel.source, count = items.len(), "Inventory exported");
        Ok(items.len())
    }

    // =========================================================================
    // Vocabularies
    // =========================================================================

    /// Fills the state map from the channel's status vocabulary.
    pub async fn import_order_states(
        &self,
        channel_id: &str,
        sync: &SyncContext,
    ) -> SyncResult<Vec<StateMapEntry>> {
        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let actx = AdapterContext::new(&self.db, &channel, sync);

        let states = {
            let adapter = adapter.as_ref();
            let actx = &actx;
            self.with_retry(&channel, "import_order_states", move || adapter.import_order_states(actx))
                .await?
        };

        let mut entries = Vec::with_capacity(states.len());
        for state in &states {
            entries.push(self.ensure_state(&channel, &state.code, Some(&state.name)).await?);
        }
        info!(channel_id = %channel.id, source = %channel.source, count = entries.len(), "Order states imported");
        Ok(entries)
    }

    /// Records the carriers the channel knows. Existing links are kept.
    pub async fn import_shipping_carriers(
        &self,
        channel_id: &str,
        sync: &SyncContext,
    ) -> SyncResult<Vec<CarrierMapping>> {
        let channel = self.db.channels().get(channel_id).await?;
        let adapter = self.adapters.get(&channel.source)?;
        let actx = AdapterContext::new(&self.db, &channel, sync);

        let carriers = {
            let adapter = adapter.as_ref();
            let actx = &actx;
            self.with_retry(&channel, "import_shipping_carriers", move || {
                adapter.import_shipping_carriers(actx)
            })
            .await?
        };

        let repo = self.db.carriers();
        let mut mappings = Vec::with_capacity(carriers.len());
        for carrier in &carriers {
            mappings.push(repo.upsert(&channel.id, &carrier.code, &carrier.name).await?);
        }
        info!(channel_id = %channel.id, source = %channel.source, count = mappings.len(), "Shipping carriers imported");
        Ok(mappings)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Imports or updates one order payload.
    async fn import_payload(
        &self,
        adapter: &dyn ChannelAdapter,
        actx: &AdapterContext<'_>,
        payload: &ExternalOrder,
    ) -> SyncResult<Order> {
        let channel = actx.channel;
        validate_external_order(payload).map_err(CoreError::from)?;

        let orders = self.db.orders();
        if let Some(existing) = orders.find_by_channel_identifier(&payload.channel_identifier).await? {
            if existing.channel_id != channel.id {
                return Err(duplicate(channel, "order", &payload.channel_identifier));
            }
            debug!(order_id = %existing.id, identifier = %payload.channel_identifier, "Order already imported");
            let entry = self
                .ensure_state(channel, &payload.state_code, payload.state_name.as_deref())
                .await?;
            orders.set_channel_state_code(&existing.id, &payload.state_code).await?;
            return self.drive(&existing, entry.resolved()).await;
        }

        self.db
            .channels()
            .check_create_permission(channel, actx.sync.user_id.as_deref())
            .await?;

        // Everything that can reject the payload runs before the first write.
        let taxes = self.db.taxes();
        let mut line_taxes = Vec::with_capacity(payload.lines.len());
        let mut seen = HashSet::new();
        for line in &payload.lines {
            if let Some(identifier) = &line.channel_identifier {
                if !seen.insert(identifier.as_str())
                    || orders.line_identifier_exists(identifier).await?
                {
                    return Err(duplicate(channel, "order line", identifier));
                }
            }
            let tax_id = match &line.tax {
                Some(tax) => Some(taxes.resolve(channel, tax.name.as_deref(), tax.rate).await?),
                None => None,
            };
            line_taxes.push(tax_id);
        }

        let entry = self
            .ensure_state(channel, &payload.state_code, payload.state_name.as_deref())
            .await?;

        let mut lines = Vec::with_capacity(payload.lines.len());
        for (line, tax_id) in payload.lines.iter().zip(line_taxes) {
            let product = self
                .product_for_identifier(adapter, actx, &line.product_identifier)
                .await?;
            lines.push(NewOrderLine {
                channel_identifier: line.channel_identifier.clone(),
                description: line.description.clone().unwrap_or_else(|| product.name.clone()),
                product_id: product.id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                tax_id,
            });
        }

        let carrier_id = match &payload.carrier_code {
            Some(code) => self.db.carriers().resolve(channel, code, true).await?,
            None => None,
        };

        let carrier_exception = match (&payload.carrier_code, &carrier_id) {
            (Some(code), None) => Some(format!(
                "Shipping carrier is not configured for code: {code}\n{}",
                serde_json::to_string_pretty(payload).unwrap_or_default()
            )),
            _ => None,
        };

        let order = orders
            .create_flagged(
                &NewOrder {
                    channel_id: channel.id.clone(),
                    company_id: actx.sync.company_id.clone(),
                    reference: payload.reference().to_string(),
                    channel_identifier: Some(payload.channel_identifier.clone()),
                    invoice_method: channel.invoice_method,
                    shipment_method: channel.shipment_method,
                    channel_state_code: Some(payload.state_code.clone()),
                    currency: payload.currency.clone().unwrap_or_else(|| channel.currency.clone()),
                    carrier_id: carrier_id.clone(),
                },
                &lines,
                carrier_exception.as_deref(),
            )
            .await?;

        if carrier_exception.is_some() {
            warn!(
                order_id = %order.id,
                carrier_code = payload.carrier_code.as_deref().unwrap_or_default(),
                "Carrier not configured, exception raised"
            );
        }

        debug!(
            order_id = %order.id,
            identifier = %payload.channel_identifier,
            action = %entry.action,
            "Order created"
        );
        self.drive(&order, entry.resolved()).await
    }

    /// Hands an order to the lifecycle driver. A blocked confirmation leaves
    /// the order where it stopped.
    async fn drive(&self, order: &Order, resolved: ResolvedState) -> SyncResult<Order> {
        match self.lifecycle.apply(order, resolved).await {
            Ok(order) => Ok(order),
            Err(SyncError::Core(CoreError::UnresolvedExceptionBlock { order_reference })) => {
                warn!(
                    order_id = %order.id,
                    reference = %order_reference,
                    "Order has unresolved exceptions, left unconfirmed"
                );
                Ok(self.db.orders().get(&order.id).await?)
            }
            Err(err) => Err(err),
        }
    }

    /// The local product behind a channel product identifier, importing it
    /// with its listing when the channel lists it but we do not.
    async fn product_for_identifier(
        &self,
        adapter: &dyn ChannelAdapter,
        actx: &AdapterContext<'_>,
        identifier: &str,
    ) -> SyncResult<Product> {
        let channel = actx.channel;
        if let Some(listing) = self.db.listings().find_by_identifier(&channel.id, identifier).await? {
            return Ok(self.db.products().get(&listing.product_id).await?);
        }

        let payload = self
            .with_retry(channel, "import_product", move || adapter.import_product(actx, identifier))
            .await?;
        self.store_product(channel, &payload).await
    }

    async fn store_product(&self, channel: &Channel, payload: &ExternalProduct) -> SyncResult<Product> {
        if let Some(listing) = self
            .db
            .listings()
            .find_by_identifier(&channel.id, &payload.identifier)
            .await?
        {
            return Ok(self.db.products().get(&listing.product_id).await?);
        }
        let (product, _listing) = self
            .db
            .products()
            .create_with_listing(&channel.id, payload)
            .await?;
        Ok(product)
    }

    async fn ensure_state(
        &self,
        channel: &Channel,
        code: &str,
        name: Option<&str>,
    ) -> SyncResult<StateMapEntry> {
        Ok(self
            .db
            .order_states()
            .ensure(&channel.id, code, name.unwrap_or(code))
            .await?)
    }

    /// Serializes runs of one operation on one channel.
    async fn lock(&self, channel_id: &str, operation: SyncOperation) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry((channel_id.to_string(), operation))
                .or_default()
                .clone()
        };
        mutex.lock_owned().await
    }

    async fn commit_watermark(
        &self,
        channel: &Channel,
        operation: SyncOperation,
        prev: Option<DateTime<Utc>>,
        run_start: DateTime<Utc>,
    ) -> SyncResult<()> {
        let advanced = self
            .db
            .watermarks()
            .advance(&channel.id, operation, prev, run_start)
            .await?;
        if !advanced {
            return Err(SyncError::WatermarkConflict {
                channel_id: channel.id.clone(),
                operation,
            });
        }
        Ok(())
    }

    /// Runs an adapter pull, retrying transient failures with backoff.
    async fn with_retry<T, F, Fut>(&self, channel: &Channel, capability: &str, mut pull: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        backoff::future::retry_notify(
            self.settings.retry.backoff(),
            || {
                let attempt = pull();
                async move {
                    attempt.await.map_err(|err| {
                        if err.is_retryable() {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: SyncError, wait: std::time::Duration| {
                warn!(
                    channel_id = %channel.id,
                    source = %channel.source,
                    capability,
                    error = %err,
                    retry_in_ms = wait.as_millis() as u64,
                    "Adapter call failed, retrying"
                );
            },
        )
        .await
    }
}

fn duplicate(channel: &Channel, entity: &str, identifier: &str) -> SyncError {
    CoreError::DuplicateExternalIdentifier {
        source_kind: channel.source.to_string(),
        entity: entity.to_string(),
        identifier: identifier.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lookback_defaults_to_one_month() {
        let run_start = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();

        let settings = OrchestratorSettings::default();
        assert_eq!(
            settings.lookback_start(run_start).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );

        let settings = OrchestratorSettings {
            lookback_days: Some(7),
            ..Default::default()
        };
        assert_eq!(
            settings.lookback_start(run_start).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 24, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_lookback_is_a_config_error() {
        let run_start = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let settings = OrchestratorSettings {
            lookback_days: Some(u32::MAX),
            ..Default::default()
        };

        let err = settings.lookback_start(run_start).unwrap_err();
        assert!(err.is_config_error());
    }
}
