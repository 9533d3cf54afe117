//! # Order State Repository
//!
//! Persistence for channel state maps.
//!
//! ## Concurrent Provisioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two imports meet the unmapped code "shipped" at the same time          │
//! │                                                                         │
//! │  import A: INSERT ... ON CONFLICT (channel_id, code) DO NOTHING  ✅     │
//! │  import B: INSERT ... ON CONFLICT (channel_id, code) DO NOTHING  (noop) │
//! │  both:     SELECT ... WHERE channel_id = ? AND code = ?                 │
//! │                                                                         │
//! │  Result: one entry, both callers get it                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::state_map::importable_actions;
use chansync_core::validation::validate_state_code;
use chansync_core::{
    Channel, CoreError, InvoiceMethod, OrderAction, ResolvedState, ShipmentMethod, StateMapEntry,
};

const ENTRY_COLUMNS: &str = r#"
    id, channel_id, code, name, action, invoice_method, shipment_method, created_at, updated_at
"#;

/// Repository for state-map entries.
#[derive(Debug, Clone)]
pub struct OrderStateRepository {
    pool: SqlitePool,
}

impl OrderStateRepository {
    /// Creates a new OrderStateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderStateRepository { pool }
    }

    /// Gets the entry for a channel and external code, if any.
    pub async fn get(&self, channel_id: &str, code: &str) -> DbResult<Option<StateMapEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM channel_order_states WHERE channel_id = ?1 AND code = ?2"
        );
        let entry = sqlx::query_as::<_, StateMapEntry>(&sql)
            .bind(channel_id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    /// Resolves an external code.
    ///
    /// Exact match only. A missing entry resolves to
    /// `do_not_import` / manual / manual, never an error.
    pub async fn resolve(&self, channel_id: &str, code: &str) -> DbResult<ResolvedState> {
        Ok(self
            .get(channel_id, code)
            .await?
            .map(|entry| entry.resolved())
            .unwrap_or_default())
    }

    /// Gets or creates the entry for an external code.
    ///
    /// New entries get the default mapping. Idempotent and safe to race:
    /// the `(channel_id, code)` unique index decides the winner.
    ///
    /// ## Arguments
    /// * `channel_id` - Channel the code belongs to
    /// * `code` - External state code, matched exactly
    /// * `name` - Display name stored when the entry is created
    pub async fn ensure(&self, channel_id: &str, code: &str, name: &str) -> DbResult<StateMapEntry> {
        validate_state_code(code).map_err(CoreError::from)?;

        let defaults = ResolvedState::default();
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO channel_order_states (
                id, channel_id, code, name, action, invoice_method, shipment_method,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT (channel_id, code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(channel_id)
        .bind(code)
        .bind(name)
        .bind(defaults.action)
        .bind(defaults.invoice_method)
        .bind(defaults.shipment_method)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!(channel_id = %channel_id, code = %code, "Provisioned unmapped order state");
        }

        self.get(channel_id, code)
            .await?
            .ok_or_else(|| DbError::not_found("Order state", code))
    }

    /// Changes the mapping of an entry.
    pub async fn configure(
        &self,
        id: &str,
        action: OrderAction,
        invoice_method: InvoiceMethod,
        shipment_method: ShipmentMethod,
    ) -> DbResult<StateMapEntry> {
        let result = sqlx::query(
            r#"
            UPDATE channel_order_states
            SET action = ?2, invoice_method = ?3, shipment_method = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(action)
        .bind(invoice_method)
        .bind(shipment_method)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order state", id));
        }

        debug!(entry_id = %id, action = %action, "Order state configured");

        let sql = format!("SELECT {ENTRY_COLUMNS} FROM channel_order_states WHERE id = ?1");
        let entry = sqlx::query_as::<_, StateMapEntry>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(entry)
    }

    /// Lists a channel's entries by code.
    pub async fn list(&self, channel_id: &str) -> DbResult<Vec<StateMapEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM channel_order_states WHERE channel_id = ?1 ORDER BY code"
        );
        let entries = sqlx::query_as::<_, StateMapEntry>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Entries whose orders an import pulls.
    ///
    /// ## Returns
    /// * `Err(NoImportableOrderStates)` - no entry maps to an importing action
    pub async fn importable_states(
        &self,
        channel: &Channel,
        include_past: bool,
    ) -> DbResult<Vec<StateMapEntry>> {
        let actions = importable_actions(include_past);
        let placeholders = (0..actions.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM channel_order_states \
             WHERE channel_id = ?1 AND action IN ({placeholders}) ORDER BY code"
        );

        let mut query = sqlx::query_as::<_, StateMapEntry>(&sql).bind(&channel.id);
        for action in &actions {
            query = query.bind(*action);
        }
        let entries = query.fetch_all(&self.pool).await?;

        if entries.is_empty() {
            return Err(CoreError::NoImportableOrderStates {
                source_kind: channel.source.to_string(),
                channel: channel.label().to_string(),
            }
            .into());
        }
        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
