//! # Listing Repository
//!
//! Database operations for product listings, including the generic selection
//! behind incremental inventory export.
//!
//! ## Inventory Export Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  active listings of the channel                                         │
//! │       │                                                                 │
//! │       ├── no watermark ──▶ all of them                                  │
//! │       │                                                                 │
//! │       └── watermark W  ──▶ only listings where                          │
//! │                              listing.updated_at > W                     │
//! │                           OR some stock move of the product was         │
//! │                              created or updated after W                 │
//! │                                                                         │
//! │  Each listing at most once, ordered by listing id                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::validation::validate_external_identifier;
use chansync_core::{Availability, CoreError, Listing, ListingState, SourceKind};

const LISTING_COLUMNS: &str = r#"
    l.id, l.channel_id, l.product_id, l.product_identifier, l.state,
    l.override_type, l.override_value, l.override_quantity, l.created_at, l.updated_at
"#;

/// Repository for listing database operations.
#[derive(Debug, Clone)]
pub struct ListingRepository {
    pool: SqlitePool,
}

impl ListingRepository {
    /// Creates a new ListingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ListingRepository { pool }
    }

    /// Lists a product on a channel.
    ///
    /// ## Returns
    /// * `Err(ManualChannelListing)` - the channel is a manual channel
    /// * `Err(DbError::UniqueViolation)` - the product is already listed on
    ///   the channel, under any identifier
    pub async fn create(
        &self,
        channel_id: &str,
        product_id: &str,
        product_identifier: &str,
    ) -> DbResult<Listing> {
        validate_external_identifier("product identifier", product_identifier)
            .map_err(CoreError::from)?;

        let (name, source): (String, SourceKind) =
            sqlx::query_as("SELECT name, source FROM channels WHERE id = ?1")
                .bind(channel_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Channel", channel_id))?;
        if source.is_manual() {
            return Err(CoreError::ManualChannelListing { channel: name }.into());
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO listings (
                id, channel_id, product_id, product_identifier, state, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(channel_id)
        .bind(product_id)
        .bind(product_identifier)
        .bind(ListingState::Active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(listing_id = %id, channel_id = %channel_id, "Listing created");
        self.get(&id).await
    }

    /// Gets a listing by its ID, failing when it does not exist.
    pub async fn get(&self, id: &str) -> DbResult<Listing> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = ?1");
        sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Listing", id))
    }

    /// Finds the listing of a channel product identifier.
    pub async fn find_by_identifier(
        &self,
        channel_id: &str,
        product_identifier: &str,
    ) -> DbResult<Option<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings l \
             WHERE l.channel_id = ?1 AND l.product_identifier = ?2 ORDER BY l.id LIMIT 1"
        );
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(channel_id)
            .bind(product_identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    /// Finds the listing of a product on a channel.
    pub async fn find_for_product(
        &self,
        channel_id: &str,
        product_id: &str,
    ) -> DbResult<Option<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings l WHERE l.channel_id = ?1 AND l.product_id = ?2"
        );
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(channel_id)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    /// Lists a channel's active listings by id.
    pub async fn list_active(&self, channel_id: &str) -> DbResult<Vec<Listing>> {
        self.select_for_inventory_export(channel_id, None).await
    }

    /// Enables or disables a listing.
    pub async fn set_state(&self, id: &str, state: ListingState) -> DbResult<()> {
        let result = sqlx::query("UPDATE listings SET state = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(state)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Listing", id));
        }
        Ok(())
    }

    /// Sets or clears a listing's availability override.
    pub async fn set_override(&self, id: &str, availability: Option<Availability>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET override_type = ?2, override_value = ?3, override_quantity = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(availability.map(|a| a.availability_type))
        .bind(availability.and_then(|a| a.value))
        .bind(availability.and_then(|a| a.quantity))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Listing", id));
        }
        Ok(())
    }

    /// Selects the listings an inventory export must send.
    ///
    /// ## Arguments
    /// * `channel_id` - Channel being exported
    /// * `since` - The channel's inventory watermark; `None` selects every
    ///   active listing
    pub async fn select_for_inventory_export(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<Listing>> {
        let sql = format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings l
            WHERE l.channel_id = ?1
              AND l.state = 'active'
              AND (
                  ?2 IS NULL
                  OR julianday(l.updated_at) > julianday(?2)
                  OR EXISTS (
                      SELECT 1 FROM stock_moves m
                      WHERE m.product_id = l.product_id
                        AND (julianday(m.updated_at) > julianday(?2)
                             OR julianday(m.created_at) > julianday(?2))
                  )
              )
            ORDER BY l.id
            "#
        );

        let listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(channel_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            channel_id = %channel_id,
            incremental = since.is_some(),
            count = listings.len(),
            "Selected listings for inventory export"
        );
        Ok(listings)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
