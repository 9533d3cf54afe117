//! End-to-end runs of the orchestrator and sweeps against an in-memory
//! database and a scripted channel adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chansync_core::payload::{
    ExternalCarrier, ExternalOrder, ExternalOrderLine, ExternalOrderState, ExternalProduct,
    ExternalStatusChange, ExternalTax,
};
use chansync_core::{
    Channel, CoreError, ExceptionTarget, InvoiceMethod, NewChannel, OrderAction, OrderState,
    ShipmentMethod, ShipmentState, SourceKind, SyncContext, SyncOperation, TaxRate,
};
use chansync_db::{Database, DbConfig};
use chansync_sync::{
    sweep_export_prices, sweep_import_orders, AdapterContext, AdapterRegistry, ChannelAdapter,
    ListingAvailability, OrchestratorSettings, ProductImport, RetrySettings, SweepFailurePolicy,
    SyncError, SyncOrchestrator, SyncResult,
};

// =============================================================================
// Scripted Adapter
// =============================================================================

const WEBSHOP: &str = "webshop";

#[derive(Default)]
struct ScriptedAdapter {
    orders: Mutex<Vec<ExternalOrder>>,
    products: Mutex<Vec<ExternalProduct>>,
    status_changes: Mutex<Vec<ExternalStatusChange>>,
    exported: Mutex<Vec<ListingAvailability>>,
    /// Order pulls that fail with a connection error before one succeeds.
    flaky_pulls: AtomicUsize,
    pulls: AtomicUsize,
    /// The next order pull also advances the import watermark, as a second
    /// process running the same import would.
    race_watermark: AtomicBool,
}

impl ScriptedAdapter {
    fn with_orders(orders: Vec<ExternalOrder>) -> Self {
        let adapter = ScriptedAdapter::default();
        *adapter.orders.lock().unwrap() = orders;
        adapter
    }

    fn exported_count(&self) -> usize {
        self.exported.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::new(WEBSHOP)
    }

    async fn import_orders(
        &self,
        ctx: &AdapterContext<'_>,
        _since: DateTime<Utc>,
    ) -> SyncResult<Vec<ExternalOrder>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.race_watermark.swap(false, Ordering::SeqCst) {
            let watermarks = ctx.db.watermarks();
            let prev = watermarks.get(&ctx.channel.id, SyncOperation::OrderImport).await?;
            watermarks
                .advance(&ctx.channel.id, SyncOperation::OrderImport, prev, Utc::now())
                .await?;
        }
        if self
            .flaky_pulls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::AdapterConnection {
                source_kind: ctx.source_kind().to_string(),
                message: "connection reset".into(),
            });
        }
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn import_order(
        &self,
        ctx: &AdapterContext<'_>,
        identifier: &str,
    ) -> SyncResult<ExternalOrder> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.channel_identifier == identifier)
            .cloned()
            .ok_or_else(|| SyncError::AdapterNotFound {
                source_kind: ctx.source_kind().to_string(),
                entity: "order".into(),
                identifier: identifier.into(),
            })
    }

    async fn import_products(&self, _ctx: &AdapterContext<'_>) -> SyncResult<Vec<ExternalProduct>> {
        Ok(self.products.lock().unwrap().clone())
    }

    async fn import_product(
        &self,
        ctx: &AdapterContext<'_>,
        identifier: &str,
    ) -> SyncResult<ExternalProduct> {
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.identifier == identifier)
            .cloned()
            .ok_or_else(|| SyncError::AdapterNotFound {
                source_kind: ctx.source_kind().to_string(),
                entity: "product".into(),
                identifier: identifier.into(),
            })
    }

    async fn export_listing_inventory(
        &self,
        _ctx: &AdapterContext<'_>,
        item: &ListingAvailability,
    ) -> SyncResult<()> {
        self.exported.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn import_order_states(
        &self,
        _ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalOrderState>> {
        Ok(vec![
            ExternalOrderState { code: "pending".into(), name: "Pending".into() },
            ExternalOrderState { code: "paid".into(), name: "Paid".into() },
        ])
    }

    async fn update_order_status(
        &self,
        _ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalStatusChange>> {
        Ok(std::mem::take(&mut *self.status_changes.lock().unwrap()))
    }

    async fn import_shipping_carriers(
        &self,
        _ctx: &AdapterContext<'_>,
    ) -> SyncResult<Vec<ExternalCarrier>> {
        Ok(vec![ExternalCarrier { code: "dhl".into(), name: "DHL Express".into() }])
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Harness {
    db: Database,
    adapter: Arc<ScriptedAdapter>,
    orchestrator: SyncOrchestrator,
    channel: Channel,
    sync: SyncContext,
}

async fn harness(adapter: ScriptedAdapter) -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let channel = db
        .channels()
        .create(&NewChannel::new("Webshop", SourceKind::new(WEBSHOP), "company-1", "wh-1").with_code("WEB"))
        .await
        .unwrap();

    let adapter = Arc::new(adapter);
    let mut registry = AdapterRegistry::new();
    registry.register(adapter.clone());

    let settings = OrchestratorSettings {
        lookback_days: None,
        retry: RetrySettings::disabled(),
    };
    let orchestrator = SyncOrchestrator::new(db.clone(), registry, settings);

    Harness {
        db,
        adapter,
        orchestrator,
        channel,
        sync: SyncContext::new("company-1"),
    }
}

fn line(identifier: &str, product: &str) -> ExternalOrderLine {
    ExternalOrderLine {
        channel_identifier: Some(identifier.to_string()),
        product_identifier: product.to_string(),
        description: None,
        quantity: 1,
        unit_price_cents: 2500,
        tax: None,
    }
}

fn order(identifier: &str, state_code: &str, lines: Vec<ExternalOrderLine>) -> ExternalOrder {
    ExternalOrder {
        channel_identifier: identifier.to_string(),
        reference: Some(format!("WEB-{identifier}")),
        state_code: state_code.to_string(),
        state_name: None,
        currency: Some("EUR".to_string()),
        carrier_code: None,
        lines,
        updated_at: None,
    }
}

fn shirt() -> ExternalProduct {
    ExternalProduct {
        identifier: "P-1".to_string(),
        code: "SHIRT".to_string(),
        name: "Shirt".to_string(),
        list_price_cents: 2500,
    }
}

async fn map_state(h: &Harness, code: &str, action: OrderAction) {
    let entry = h.db.order_states().ensure(&h.channel.id, code, code).await.unwrap();
    h.db.order_states()
        .configure(&entry.id, action, InvoiceMethod::Order, ShipmentMethod::Order)
        .await
        .unwrap();
}

async fn watermark(h: &Harness, op: SyncOperation) -> Option<DateTime<Utc>> {
    h.db.watermarks().get(&h.channel.id, op).await.unwrap()
}

// =============================================================================
// Order Import
// =============================================================================

#[tokio::test]
async fn test_unmapped_state_imports_as_record_only() {
    let h = harness(ScriptedAdapter::with_orders(vec![
        order("1001", "pending", vec![line("1001-1", "P-1")]),
        order("1002", "pending", vec![line("1002-1", "P-1")]),
        order("1003", "shipped", vec![line("1003-1", "P-1")]),
    ]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());
    h.db.order_states().ensure(&h.channel.id, "pending", "Pending").await.unwrap();

    let before = Utc::now();
    let orders = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    let after = Utc::now();

    assert_eq!(orders.len(), 3);
    assert!(orders.iter().all(|o| o.state == OrderState::Draft));

    // One entry provisioned for the unseen code, with the default mapping
    let entries = h.db.order_states().list(&h.channel.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    let shipped = entries.iter().find(|e| e.code == "shipped").unwrap();
    assert_eq!(shipped.action, OrderAction::DoNotImport);
    assert_eq!(shipped.invoice_method, InvoiceMethod::Manual);

    // The product was imported once, with its listing
    let listing = h.db.listings().find_by_identifier(&h.channel.id, "P-1").await.unwrap();
    assert!(listing.is_some());

    let mark = watermark(&h, SyncOperation::OrderImport).await.unwrap();
    assert!(mark >= before && mark <= after);

    // Re-running changes nothing but the watermark
    let again = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(again.len(), 3);
    assert_eq!(h.db.orders().list_for_channel(&h.channel.id).await.unwrap().len(), 3);
    assert!(watermark(&h, SyncOperation::OrderImport).await.unwrap() >= mark);
}

#[tokio::test]
async fn test_unmapped_tax_writes_nothing() {
    let mut payload = order("2001", "paid", vec![line("2001-1", "P-1")]);
    payload.lines[0].tax = Some(ExternalTax {
        name: Some("VAT".to_string()),
        rate: "0.20".parse::<TaxRate>().unwrap(),
    });
    let h = harness(ScriptedAdapter::with_orders(vec![payload])).await;
    h.adapter.products.lock().unwrap().push(shirt());

    let err = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap_err();
    match &err {
        SyncError::Core(CoreError::UnmappedTaxReference { source_kind, name, .. }) => {
            assert_eq!(source_kind, WEBSHOP);
            assert_eq!(name.as_deref(), Some("VAT"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("VAT"));
    assert!(message.contains("0.2"));

    assert!(h.db.orders().list_for_channel(&h.channel.id).await.unwrap().is_empty());
    assert!(watermark(&h, SyncOperation::OrderImport).await.is_none());

    // Mapped, the same payload goes through with the tax on the line
    h.db.taxes()
        .create(&h.channel.id, "VAT", "0.2".parse().unwrap(), "tax-vat-20")
        .await
        .unwrap();
    let orders = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    let lines = h.db.orders().lines(&orders[0].id).await.unwrap();
    assert_eq!(lines[0].tax_id.as_deref(), Some("tax-vat-20"));
}

#[tokio::test]
async fn test_unconfigured_carrier_blocks_confirmation() {
    let mut payload = order("3001", "paid", vec![line("3001-1", "P-1")]);
    payload.carrier_code = Some("dhl".to_string());
    let h = harness(ScriptedAdapter::with_orders(vec![payload])).await;
    h.adapter.products.lock().unwrap().push(shirt());
    map_state(&h, "paid", OrderAction::ProcessAutomatically).await;

    let orders = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    let imported = &orders[0];
    assert_eq!(imported.state, OrderState::Quotation);
    assert!(watermark(&h, SyncOperation::OrderImport).await.is_some());

    let target = ExceptionTarget::Order(imported.id.clone());
    let open = h.orchestrator.ledger().list_unresolved(&h.channel.id).await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(open[0].log.contains("dhl"));

    let err = h.orchestrator.confirm_order(&imported.id).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Core(CoreError::UnresolvedExceptionBlock { ref order_reference })
            if order_reference == "WEB-3001"
    ));

    h.orchestrator.ledger().resolve(&open[0].id).await.unwrap();
    assert!(!h.orchestrator.ledger().has_unresolved(&target).await.unwrap());
    let confirmed = h.orchestrator.confirm_order(&imported.id).await.unwrap();
    assert_eq!(confirmed.state, OrderState::Confirmed);
}

#[tokio::test]
async fn test_process_automatically_with_mapped_carrier() {
    let mut payload = order("3101", "paid", vec![line("3101-1", "P-1")]);
    payload.carrier_code = Some("dhl".to_string());
    let h = harness(ScriptedAdapter::with_orders(vec![payload])).await;
    h.adapter.products.lock().unwrap().push(shirt());
    map_state(&h, "paid", OrderAction::ProcessAutomatically).await;

    let carriers = h
        .orchestrator
        .import_shipping_carriers(&h.channel.id, &h.sync)
        .await
        .unwrap();
    h.db.carriers().link(&carriers[0].id, "carrier-dhl").await.unwrap();

    let orders = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    let imported = &orders[0];
    assert_eq!(imported.state, OrderState::Processing);
    assert_eq!(imported.carrier_id.as_deref(), Some("carrier-dhl"));

    let shipments = h.db.orders().shipments(&imported.id).await.unwrap();
    assert_eq!(shipments.len(), 1);
    assert_eq!(shipments[0].state, ShipmentState::Assigned);
    assert!(h.orchestrator.ledger().list_unresolved(&h.channel.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_identifier_owned_by_another_channel() {
    let h = harness(ScriptedAdapter::with_orders(vec![order(
        "4001",
        "pending",
        vec![line("4001-1", "P-1")],
    )]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());
    h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();

    let other = h
        .db
        .channels()
        .create(&NewChannel::new("Outlet", SourceKind::new(WEBSHOP), "company-1", "wh-1"))
        .await
        .unwrap();
    let err = h.orchestrator.import_orders(&other.id, &h.sync).await.unwrap_err();
    match err {
        SyncError::Core(CoreError::DuplicateExternalIdentifier { entity, identifier, .. }) => {
            assert_eq!(entity, "order");
            assert_eq!(identifier, "4001");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.db.watermarks().get(&other.id, SyncOperation::OrderImport).await.unwrap().is_none());
}

#[tokio::test]
async fn test_single_order_import_keeps_watermark() {
    let h = harness(ScriptedAdapter::with_orders(vec![order(
        "5001",
        "pending",
        vec![line("5001-1", "P-1")],
    )]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());

    let imported = h
        .orchestrator
        .import_order(&h.channel.id, &h.sync, "5001")
        .await
        .unwrap();
    assert_eq!(imported.channel_identifier.as_deref(), Some("5001"));
    assert!(watermark(&h, SyncOperation::OrderImport).await.is_none());

    let err = h
        .orchestrator
        .import_order(&h.channel.id, &h.sync, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AdapterNotFound { .. }));
}

#[tokio::test]
async fn test_transient_pull_failure_is_retried() {
    let adapter = ScriptedAdapter::with_orders(Vec::new());
    adapter.flaky_pulls.store(2, Ordering::SeqCst);
    let mut h = harness(adapter).await;

    let mut registry = AdapterRegistry::new();
    registry.register(h.adapter.clone());
    h.orchestrator = SyncOrchestrator::new(
        h.db.clone(),
        registry,
        OrchestratorSettings {
            lookback_days: Some(7),
            retry: RetrySettings {
                initial_backoff_ms: 1,
                max_backoff_secs: 1,
                max_elapsed_secs: 10,
            },
        },
    );

    let orders = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(h.adapter.pulls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_status_update_reapplies_lifecycle() {
    let h = harness(ScriptedAdapter::with_orders(vec![order(
        "6001",
        "pending",
        vec![line("6001-1", "P-1")],
    )]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());

    let orders = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(orders[0].state, OrderState::Draft);

    map_state(&h, "paid", OrderAction::ProcessManually).await;
    h.adapter.status_changes.lock().unwrap().extend([
        ExternalStatusChange {
            channel_identifier: "6001".into(),
            state_code: "paid".into(),
            state_name: Some("Paid".into()),
        },
        ExternalStatusChange {
            channel_identifier: "unknown".into(),
            state_code: "paid".into(),
            state_name: None,
        },
    ]);

    let updated = h.orchestrator.update_order_status(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(updated, 1);

    let order = h.db.orders().get(&orders[0].id).await.unwrap();
    assert_eq!(order.state, OrderState::Confirmed);
    assert_eq!(order.channel_state_code.as_deref(), Some("paid"));
}

#[tokio::test]
async fn test_cancelled_order_does_not_stall_import() {
    let h = harness(ScriptedAdapter::with_orders(vec![
        order("9001", "paid", vec![line("9001-1", "P-1")]),
        order("9002", "paid", vec![line("9002-1", "P-1")]),
    ]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());
    map_state(&h, "paid", OrderAction::ProcessManually).await;

    let first = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    let mark = watermark(&h, SyncOperation::OrderImport).await.unwrap();
    let cancelled = first.iter().find(|o| o.channel_identifier.as_deref() == Some("9001")).unwrap();
    h.db.orders().set_state(&cancelled.id, OrderState::Cancelled).await.unwrap();

    h.adapter
        .orders
        .lock()
        .unwrap()
        .push(order("9003", "paid", vec![line("9003-1", "P-1")]));
    let second = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(second.len(), 3);
    assert!(watermark(&h, SyncOperation::OrderImport).await.unwrap() >= mark);

    let fresh = h.db.orders().find_by_channel_identifier("9003").await.unwrap().unwrap();
    assert_eq!(fresh.state, OrderState::Confirmed);
    assert_eq!(h.db.orders().get(&cancelled.id).await.unwrap().state, OrderState::Cancelled);

    // Status pulls leave it cancelled too
    h.adapter.status_changes.lock().unwrap().push(ExternalStatusChange {
        channel_identifier: "9001".into(),
        state_code: "paid".into(),
        state_name: None,
    });
    let updated = h.orchestrator.update_order_status(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(updated, 1);
    assert_eq!(h.db.orders().get(&cancelled.id).await.unwrap().state, OrderState::Cancelled);
}

#[tokio::test]
async fn test_repeated_line_identifier_in_one_payload() {
    let h = harness(ScriptedAdapter::with_orders(vec![order(
        "9101",
        "paid",
        vec![line("L-X", "P-1"), line("L-X", "P-1")],
    )]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());

    let err = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap_err();
    match err {
        SyncError::Core(CoreError::DuplicateExternalIdentifier { source_kind, entity, identifier }) => {
            assert_eq!(source_kind, WEBSHOP);
            assert_eq!(entity, "order line");
            assert_eq!(identifier, "L-X");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.db.orders().list_for_channel(&h.channel.id).await.unwrap().is_empty());
    assert!(watermark(&h, SyncOperation::OrderImport).await.is_none());
}

#[tokio::test]
async fn test_watermark_advanced_by_concurrent_run() {
    let h = harness(ScriptedAdapter::with_orders(vec![order(
        "9201",
        "pending",
        vec![line("9201-1", "P-1")],
    )]))
    .await;
    h.adapter.products.lock().unwrap().push(shirt());
    h.adapter.race_watermark.store(true, Ordering::SeqCst);

    let err = h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap_err();
    match err {
        SyncError::WatermarkConflict { channel_id, operation } => {
            assert_eq!(channel_id, h.channel.id);
            assert_eq!(operation, SyncOperation::OrderImport);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The other run's watermark stands; the order committed before the conflict stays
    let theirs = watermark(&h, SyncOperation::OrderImport).await.unwrap();
    assert!(h.db.orders().find_by_channel_identifier("9201").await.unwrap().is_some());

    // The next run starts from it and moves it on
    h.orchestrator.import_orders(&h.channel.id, &h.sync).await.unwrap();
    assert!(watermark(&h, SyncOperation::OrderImport).await.unwrap() >= theirs);
    assert_eq!(h.db.orders().list_for_channel(&h.channel.id).await.unwrap().len(), 1);
}

// =============================================================================
// Products, States, Inventory
// =============================================================================

#[tokio::test]
async fn test_product_import_scopes() {
    let h = harness(ScriptedAdapter::default()).await;
    h.adapter.products.lock().unwrap().extend([
        shirt(),
        ExternalProduct {
            identifier: "P-2".into(),
            code: "MUG".into(),
            name: "Mug".into(),
            list_price_cents: 900,
        },
    ]);

    let first = h
        .orchestrator
        .import_products(&h.channel.id, &h.sync, ProductImport::Specific("P-1".into()))
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    let all = h
        .orchestrator
        .import_products(&h.channel.id, &h.sync, ProductImport::All)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    // Already listed products come back as they are
    assert_eq!(all[0].id, first[0].id);
    assert_eq!(h.db.listings().list_active(&h.channel.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_order_states_and_concurrent_ensure() {
    let h = harness(ScriptedAdapter::default()).await;

    let entries = h
        .orchestrator
        .import_order_states(&h.channel.id, &h.sync)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);

    let states = h.db.order_states();
    let (a, b) = tokio::join!(
        states.ensure(&h.channel.id, "refunded", "Refunded"),
        states.ensure(&h.channel.id, "refunded", "Refunded"),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(states.list(&h.channel.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_second_inventory_export_selects_nothing() {
    let h = harness(ScriptedAdapter::default()).await;
    let (product, _listing) = h
        .db
        .products()
        .create_with_listing(&h.channel.id, &shirt())
        .await
        .unwrap();
    h.db.products().record_stock_move(&product.id, "wh-1", 5).await.unwrap();

    let sent = h.orchestrator.export_inventory(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(h.adapter.exported_count(), 1);
    assert_eq!(h.adapter.exported.lock().unwrap()[0].availability.quantity, Some(5));

    let sent = h.orchestrator.export_inventory(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(sent, 0);
    assert_eq!(h.adapter.exported_count(), 1);

    h.db.products().record_stock_move(&product.id, "wh-1", -2).await.unwrap();
    let sent = h.orchestrator.export_inventory(&h.channel.id, &h.sync).await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(h.adapter.exported.lock().unwrap()[1].availability.quantity, Some(3));
}

// =============================================================================
// Sweeps
// =============================================================================

#[tokio::test]
async fn test_missing_capability_skipped_by_sweep_only() {
    let h = harness(ScriptedAdapter::default()).await;

    let err = h.orchestrator.export_prices(&h.channel.id, &h.sync).await.unwrap_err();
    assert!(err.is_not_implemented());
    assert!(watermark(&h, SyncOperation::PriceExport).await.is_none());

    let report = sweep_export_prices(&h.orchestrator, &h.sync, SweepFailurePolicy::Abort)
        .await
        .unwrap();
    assert_eq!(report.skipped, vec![h.channel.id.clone()]);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_sweep_failure_policies() {
    let h = harness(ScriptedAdapter::default()).await;
    // No adapter is registered for this kind, and it sweeps first
    let broken = h
        .db
        .channels()
        .create(&NewChannel::new("Legacy", SourceKind::new("legacy"), "company-1", "wh-1").with_sequence(1))
        .await
        .unwrap();

    let err = sweep_import_orders(&h.orchestrator, &h.sync, SweepFailurePolicy::Abort)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownSourceKind(_)));
    assert!(watermark(&h, SyncOperation::OrderImport).await.is_none());

    let report = sweep_import_orders(&h.orchestrator, &h.sync, SweepFailurePolicy::Continue)
        .await
        .unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, broken.id);
    assert_eq!(report.synced, vec![h.channel.id.clone()]);
    assert!(watermark(&h, SyncOperation::OrderImport).await.is_some());
}

#[tokio::test]
async fn test_manual_channel_status_update_is_noop() {
    let h = harness(ScriptedAdapter::default()).await;
    let manual = h
        .db
        .channels()
        .create(&NewChannel::new("Counter", SourceKind::manual(), "company-1", "wh-1"))
        .await
        .unwrap();

    let updated = h.orchestrator.update_order_status(&manual.id, &h.sync).await.unwrap();
    assert_eq!(updated, 0);

    let err = h.orchestrator.import_orders(&manual.id, &h.sync).await.unwrap_err();
    assert!(err.is_not_implemented());
}
