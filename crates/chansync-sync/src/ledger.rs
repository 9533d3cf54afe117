//! # Exception Ledger
//!
//! Records synchronization mismatches against the order or order line they
//! concern, and lets an operator resolve them.
//!
//! ## Target Validation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  raise(channel, ExceptionTarget::OrderLine("l-9"), "tax missing")       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  TargetRegistry ── kind order_line ──▶ OrderLineLookup.exists("l-9")    │
//! │       │                                                                 │
//! │       ├── exists  ──▶ append to channel_exceptions                      │
//! │       └── missing ──▶ NotFound, nothing written                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use chansync_core::{ChannelException, ExceptionTarget, TargetKind};
use chansync_db::{Database, DbError};

use crate::error::SyncResult;

// =============================================================================
// Target Lookup
// =============================================================================

/// Checks that a record of one target kind exists.
#[async_trait]
pub trait TargetLookup: Send + Sync {
    async fn exists(&self, db: &Database, id: &str) -> SyncResult<bool>;
}

struct OrderLookup;

#[async_trait]
impl TargetLookup for OrderLookup {
    async fn exists(&self, db: &Database, id: &str) -> SyncResult<bool> {
        Ok(db.orders().get_by_id(id).await?.is_some())
    }
}

struct OrderLineLookup;

#[async_trait]
impl TargetLookup for OrderLineLookup {
    async fn exists(&self, db: &Database, id: &str) -> SyncResult<bool> {
        Ok(db.orders().get_line(id).await?.is_some())
    }
}

/// Lookups keyed by target kind.
#[derive(Clone)]
pub struct TargetRegistry {
    lookups: HashMap<TargetKind, Arc<dyn TargetLookup>>,
}

impl TargetRegistry {
    /// Registry with lookups for orders and order lines.
    pub fn new() -> Self {
        let mut lookups: HashMap<TargetKind, Arc<dyn TargetLookup>> = HashMap::new();
        lookups.insert(TargetKind::Order, Arc::new(OrderLookup));
        lookups.insert(TargetKind::OrderLine, Arc::new(OrderLineLookup));
        TargetRegistry { lookups }
    }

    /// Replaces the lookup of a kind.
    pub fn register(&mut self, kind: TargetKind, lookup: Arc<dyn TargetLookup>) {
        self.lookups.insert(kind, lookup);
    }

    /// Fails unless the target exists.
    pub async fn validate(&self, db: &Database, target: &ExceptionTarget) -> SyncResult<()> {
        let kind = target.kind();
        let found = match self.lookups.get(&kind) {
            Some(lookup) => lookup.exists(db, target.id()).await?,
            None => false,
        };
        if !found {
            return Err(DbError::not_found(kind.as_str(), target.id()).into());
        }
        Ok(())
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// The exception ledger as the engine and operators use it.
#[derive(Clone)]
pub struct ExceptionLedger {
    db: Database,
    targets: TargetRegistry,
}

impl ExceptionLedger {
    pub fn new(db: Database) -> Self {
        Self::with_targets(db, TargetRegistry::new())
    }

    pub fn with_targets(db: Database, targets: TargetRegistry) -> Self {
        ExceptionLedger { db, targets }
    }

    /// Appends an unresolved exception for an existing target.
    pub async fn raise(
        &self,
        channel_id: &str,
        target: &ExceptionTarget,
        log: &str,
    ) -> SyncResult<ChannelException> {
        self.targets.validate(&self.db, target).await?;
        Ok(self.db.exceptions().raise(channel_id, target, log).await?)
    }

    /// Marks an exception resolved. Resolving twice changes nothing.
    pub async fn resolve(&self, exception_id: &str) -> SyncResult<ChannelException> {
        Ok(self.db.exceptions().resolve(exception_id).await?)
    }

    pub async fn has_unresolved(&self, target: &ExceptionTarget) -> SyncResult<bool> {
        Ok(self.db.exceptions().has_unresolved(target).await?)
    }

    /// A target's exceptions, unresolved first, then newest first.
    pub async fn list_for(&self, target: &ExceptionTarget) -> SyncResult<Vec<ChannelException>> {
        Ok(self.db.exceptions().list_for(target).await?)
    }

    /// A channel's open exceptions, newest first.
    pub async fn list_unresolved(&self, channel_id: &str) -> SyncResult<Vec<ChannelException>> {
        Ok(self.db.exceptions().list_unresolved(channel_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use chansync_core::{InvoiceMethod, NewChannel, ShipmentMethod, SourceKind};
    use chansync_db::{DbConfig, NewOrder};

    #[tokio::test]
    async fn test_raise_validates_target() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let channel = db
            .channels()
            .create(&NewChannel::new("Shop", SourceKind::new("webshop"), "company-1", "wh-1"))
            .await
            .unwrap();
        let ledger = ExceptionLedger::new(db.clone());

        let missing = ExceptionTarget::Order("no-such-order".to_string());
        let err = ledger.raise(&channel.id, &missing, "oops").await.unwrap_err();
        assert!(matches!(err, SyncError::Database(DbError::NotFound { .. })));
        assert!(ledger.list_unresolved(&channel.id).await.unwrap().is_empty());

        let order = db
            .orders()
            .create_with_lines(
                &NewOrder {
                    channel_id: channel.id.clone(),
                    company_id: "company-1".to_string(),
                    reference: "SO-1".to_string(),
                    channel_identifier: None,
                    invoice_method: InvoiceMethod::Manual,
                    shipment_method: ShipmentMethod::Manual,
                    channel_state_code: None,
                    currency: "USD".to_string(),
                    carrier_id: None,
                },
                &[],
            )
            .await
            .unwrap();

        let target = ExceptionTarget::Order(order.id.clone());
        let exception = ledger.raise(&channel.id, &target, "carrier missing").await.unwrap();
        assert!(ledger.has_unresolved(&target).await.unwrap());

        ledger.resolve(&exception.id).await.unwrap();
        assert!(!ledger.has_unresolved(&target).await.unwrap());
        assert_eq!(ledger.list_for(&target).await.unwrap().len(), 1);
    }
}
