//! # Carrier Repository
//!
//! Shipping-carrier mappings. Channel carrier codes are imported from the
//! channel with their display names; an operator later links each one to a
//! local carrier.

use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::validation::validate_external_identifier;
use chansync_core::{CarrierMapping, Channel, CoreError};

const CARRIER_COLUMNS: &str = "id, channel_id, code, name, carrier_id";

/// Repository for carrier mappings.
#[derive(Debug, Clone)]
pub struct CarrierRepository {
    pool: SqlitePool,
}

impl CarrierRepository {
    /// Creates a new CarrierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CarrierRepository { pool }
    }

    /// Records a channel carrier code, keeping any existing mapping.
    ///
    /// A known code only has its display name refreshed; its local carrier
    /// link is untouched.
    pub async fn upsert(&self, channel_id: &str, code: &str, name: &str) -> DbResult<CarrierMapping> {
        validate_external_identifier("carrier code", code).map_err(CoreError::from)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO carrier_mappings (id, channel_id, code, name)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (channel_id, code) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(channel_id)
        .bind(code)
        .bind(name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        debug!(channel_id = %channel_id, code = %code, inserted, "Carrier code recorded");

        self.find(channel_id, code)
            .await?
            .ok_or_else(|| DbError::not_found("Carrier mapping", code))
    }

    /// Links a carrier code to a local carrier.
    pub async fn link(&self, id: &str, carrier_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE carrier_mappings SET carrier_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(carrier_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Carrier mapping", id));
        }
        info!(mapping_id = %id, carrier_id = %carrier_id, "Carrier code linked");
        Ok(())
    }

    /// Finds the mapping of a channel carrier code.
    pub async fn find(&self, channel_id: &str, code: &str) -> DbResult<Option<CarrierMapping>> {
        let sql = format!(
            "SELECT {CARRIER_COLUMNS} FROM carrier_mappings WHERE channel_id = ?1 AND code = ?2"
        );
        let mapping = sqlx::query_as::<_, CarrierMapping>(&sql)
            .bind(channel_id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mapping)
    }

    /// Local carrier for a channel carrier code.
    ///
    /// ## Arguments
    /// * `silent` - report an unknown code as `Ok(None)` instead of failing
    ///
    /// ## Returns
    /// * `Ok(Some(id))` - the code is mapped and linked
    /// * `Ok(None)` - the code is known but unlinked, or unknown in silent mode
    /// * `Err(UnconfiguredCarrier)` - the code is unknown
    pub async fn resolve(
        &self,
        channel: &Channel,
        code: &str,
        silent: bool,
    ) -> DbResult<Option<String>> {
        match self.find(&channel.id, code).await? {
            Some(mapping) => Ok(mapping.carrier_id),
            None if silent => Ok(None),
            None => Err(CoreError::UnconfiguredCarrier {
                source_kind: channel.source.to_string(),
                code: code.to_string(),
            }
            .into()),
        }
    }

    /// Lists a channel's carrier mappings by code.
    pub async fn list(&self, channel_id: &str) -> DbResult<Vec<CarrierMapping>> {
        let sql = format!(
            "SELECT {CARRIER_COLUMNS} FROM carrier_mappings WHERE channel_id = ?1 ORDER BY code"
        );
        let mappings = sqlx::query_as::<_, CarrierMapping>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(mappings)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
