//! # Channel Repository
//!
//! Database operations for channels and their user access lists.
//!
//! ## Key Operations
//! - Create / fetch / list channels in sweep order
//! - Code immutability once the channel is in use
//! - Read and create permissions per user

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::validation::{validate_channel_code, validate_channel_name};
use chansync_core::{Channel, CoreError, NewChannel};

const CHANNEL_COLUMNS: &str = r#"
    id, name, code, source, company_id, currency, price_list_id, warehouse_id,
    payment_term_id, invoice_method, shipment_method, timezone, sequence, is_active,
    last_order_import, last_order_export, last_price_export, last_inventory_export,
    created_at, updated_at
"#;

/// Repository for channel database operations.
#[derive(Debug, Clone)]
pub struct ChannelRepository {
    pool: SqlitePool,
}

impl ChannelRepository {
    /// Creates a new ChannelRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ChannelRepository { pool }
    }

    /// Creates a channel.
    ///
    /// ## Returns
    /// * `Ok(Channel)` - The stored channel, all watermarks unset
    /// * `Err(DbError::UniqueViolation)` - Code already taken
    pub async fn create(&self, new: &NewChannel) -> DbResult<Channel> {
        validate_channel_name(&new.name).map_err(CoreError::from)?;
        if let Some(code) = &new.code {
            validate_channel_code(code).map_err(CoreError::from)?;
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO channels (
                id, name, code, source, company_id, currency, price_list_id,
                warehouse_id, payment_term_id, invoice_method, shipment_method,
                timezone, sequence, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?14)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.code)
        .bind(&new.source)
        .bind(&new.company_id)
        .bind(&new.currency)
        .bind(&new.price_list_id)
        .bind(&new.warehouse_id)
        .bind(&new.payment_term_id)
        .bind(new.invoice_method)
        .bind(new.shipment_method)
        .bind(&new.timezone)
        .bind(new.sequence)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(channel_id = %id, source = %new.source, "Channel created");
        self.get(&id).await
    }

    /// Gets a channel by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Channel))` - Channel found
    /// * `Ok(None)` - Channel not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Channel>> {
        let sql = format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1");
        let channel = sqlx::query_as::<_, Channel>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(channel)
    }

    /// Gets a channel by its ID, failing when it does not exist.
    pub async fn get(&self, id: &str) -> DbResult<Channel> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Channel", id))
    }

    /// Lists active channels in sweep order (sequence, then name).
    pub async fn list_active(&self) -> DbResult<Vec<Channel>> {
        let sql = format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE is_active = 1 ORDER BY sequence, name, id"
        );
        let channels = sqlx::query_as::<_, Channel>(&sql)
            .fetch_all(&self.pool)
            .await?;
        debug!(count = channels.len(), "Listed active channels");
        Ok(channels)
    }

    /// Activates or deactivates a channel.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE channels SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Channel", id));
        }
        Ok(())
    }

    /// Checks if any record refers to the channel.
    pub async fn is_in_use(&self, id: &str) -> DbResult<bool> {
        let used: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM orders WHERE channel_id = ?1)
                OR EXISTS (SELECT 1 FROM listings WHERE channel_id = ?1)
                OR EXISTS (SELECT 1 FROM channel_exceptions WHERE channel_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(used)
    }

    /// Changes a channel's code.
    ///
    /// ## Returns
    /// * `Err(ChannelCodeImmutable)` - the channel has orders, listings or
    ///   exceptions and the code differs from the current one
    pub async fn update_code(&self, id: &str, code: &str) -> DbResult<Channel> {
        validate_channel_code(code).map_err(CoreError::from)?;
        let channel = self.get(id).await?;

        if channel.code.as_deref() == Some(code) {
            return Ok(channel);
        }

        if self.is_in_use(id).await? {
            return Err(CoreError::ChannelCodeImmutable {
                channel: channel.name.clone(),
                code: channel.code.unwrap_or_default(),
            }
            .into());
        }

        sqlx::query("UPDATE channels SET code = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(code)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.get(id).await
    }

    /// Deletes a channel.
    ///
    /// State map, mappings, access lists and exceptions go with it. A channel
    /// that still has listings or orders cannot be deleted.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM channels WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Channel", id));
        }
        info!(channel_id = %id, "Channel deleted");
        Ok(())
    }

    // =========================================================================
    // User access
    // =========================================================================

    /// Lets a user see the channel.
    pub async fn grant_read(&self, channel_id: &str, user_id: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO channel_read_users (channel_id, user_id) VALUES (?1, ?2)")
            .bind(channel_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lets a user create orders on the channel.
    pub async fn grant_create(&self, channel_id: &str, user_id: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO channel_write_users (channel_id, user_id) VALUES (?1, ?2)")
            .bind(channel_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Active channels a user may see, in sweep order.
    pub async fn list_readable(&self, user_id: &str) -> DbResult<Vec<Channel>> {
        let sql = format!(
            r#"
            SELECT {CHANNEL_COLUMNS} FROM channels
            WHERE is_active = 1
              AND id IN (SELECT channel_id FROM channel_read_users WHERE user_id = ?1
                         UNION
                         SELECT channel_id FROM channel_write_users WHERE user_id = ?1)
            ORDER BY sequence, name, id
            "#
        );
        let channels = sqlx::query_as::<_, Channel>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(channels)
    }

    /// Checks that the acting user may create records on the channel.
    ///
    /// `None` is the system user and is always allowed.
    pub async fn check_create_permission(
        &self,
        channel: &Channel,
        user_id: Option<&str>,
    ) -> DbResult<()> {
        let Some(user_id) = user_id else {
            return Ok(());
        };

        let allowed: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM channel_write_users WHERE channel_id = ?1 AND user_id = ?2)",
        )
        .bind(&channel.id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if !allowed {
            return Err(CoreError::CreateNotPermitted {
                user: user_id.to_string(),
                channel: channel.label().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
