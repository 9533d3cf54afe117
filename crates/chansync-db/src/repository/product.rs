//! # Product Repository
//!
//! Database operations for products and their stock-movement history.
//!
//! ## Key Operations
//! - CRUD for the engine-facing product minimum
//! - Product + listing creation in one transaction (product import)
//! - Stock quantity per warehouse as the sum of stock moves

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::payload::ExternalProduct;
use chansync_core::validation::{
    validate_external_identifier, validate_price_cents, validate_product_code,
};
use chansync_core::{CoreError, Listing, ListingState, Product, SourceKind, StockMove};

const PRODUCT_COLUMNS: &str = "id, code, name, list_price_cents, is_active, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.create("SKU-1", "Red shirt", 1999).await?;
/// repo.record_stock_move(&product.id, &warehouse_id, 10).await?;
/// let on_hand = repo.stock_quantity(&product.id, &warehouse_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates an active product.
    pub async fn create(&self, code: &str, name: &str, list_price_cents: i64) -> DbResult<Product> {
        validate_product_code(code).map_err(CoreError::from)?;
        validate_price_cents(list_price_cents).map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (id, code, name, list_price_cents, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(code)
        .bind(name)
        .bind(list_price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(&id).await
    }

    /// Creates a product and its listing on a channel atomically.
    ///
    /// Either both rows exist afterwards or neither does.
    pub async fn create_with_listing(
        &self,
        channel_id: &str,
        external: &ExternalProduct,
    ) -> DbResult<(Product, Listing)> {
        validate_product_code(&external.code).map_err(CoreError::from)?;
        validate_price_cents(external.list_price_cents).map_err(CoreError::from)?;
        validate_external_identifier("product identifier", &external.identifier)
            .map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let (channel_name, source): (String, SourceKind) =
            sqlx::query_as("SELECT name, source FROM channels WHERE id = ?1")
                .bind(channel_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Channel", channel_id))?;
        if source.is_manual() {
            return Err(CoreError::ManualChannelListing {
                channel: channel_name,
            }
            .into());
        }

        let product_id = Uuid::new_v4().to_string();
        let listing_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (id, code, name, list_price_cents, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            "#,
        )
        .bind(&product_id)
        .bind(&external.code)
        .bind(&external.name)
        .bind(external.list_price_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO listings (
                id, channel_id, product_id, product_identifier, state, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&listing_id)
        .bind(channel_id)
        .bind(&product_id)
        .bind(&external.identifier)
        .bind(ListingState::Active)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            channel_id = %channel_id,
            identifier = %external.identifier,
            "Product imported with listing"
        );

        let product = self.get(&product_id).await?;
        let listing = crate::ListingRepository::new(self.pool.clone())
            .get(&listing_id)
            .await?;
        Ok((product, listing))
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets a product by its ID, failing when it does not exist.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Finds a product by its business code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Changes a product's list price.
    pub async fn update_price(&self, id: &str, list_price_cents: i64) -> DbResult<()> {
        validate_price_cents(list_price_cents).map_err(CoreError::from)?;
        let result =
            sqlx::query("UPDATE products SET list_price_cents = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(list_price_cents)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Deletes a product and, through the schema, its listings.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Appends a stock move. Positive quantities are receipts.
    pub async fn record_stock_move(
        &self,
        product_id: &str,
        warehouse_id: &str,
        quantity: i64,
    ) -> DbResult<StockMove> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO stock_moves (id, product_id, warehouse_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(product_id)
        .bind(warehouse_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %product_id, warehouse_id = %warehouse_id, quantity, "Stock move recorded");

        let stock_move = sqlx::query_as::<_, StockMove>(
            "SELECT id, product_id, warehouse_id, quantity, created_at, updated_at FROM stock_moves WHERE id = ?1",
        )
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stock_move)
    }

    /// Quantity on hand of a product in a warehouse.
    pub async fn stock_quantity(&self, product_id: &str, warehouse_id: &str) -> DbResult<i64> {
        let quantity: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_moves WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support;
    use chansync_core::payload::ExternalProduct;

    fn external(identifier: &str, code: &str) -> ExternalProduct {
        ExternalProduct {
            identifier: identifier.to_string(),
            code: code.to_string(),
            name: "Imported".to_string(),
            list_price_cents: 2500,
        }
    }

    #[tokio::test]
    async fn test_stock_quantity_sums_moves_per_warehouse() {
        let db = test_support::db().await;
        let product = test_support::product(&db, "P-1").await;
        let repo = db.products();

        assert_eq!(repo.stock_quantity(&product.id, "wh-1").await.unwrap(), 0);

        repo.record_stock_move(&product.id, "wh-1", 10).await.unwrap();
        repo.record_stock_move(&product.id, "wh-1", -4).await.unwrap();
        repo.record_stock_move(&product.id, "wh-2", 50).await.unwrap();

        assert_eq!(repo.stock_quantity(&product.id, "wh-1").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_create_with_listing() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;

        let (product, listing) = db
            .products()
            .create_with_listing(&channel.id, &external("EXT-9", "SKU-9"))
            .await
            .unwrap();

        assert_eq!(listing.product_id, product.id);
        assert_eq!(listing.product_identifier, "EXT-9");
        assert_eq!(product.list_price_cents, 2500);
    }

    #[tokio::test]
    async fn test_create_with_listing_is_atomic() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        test_support::product(&db, "SKU-9").await;

        // Product code collides: no listing may be left behind
        let result = db
            .products()
            .create_with_listing(&channel.id, &external("EXT-9", "SKU-9"))
            .await;
        assert!(result.is_err());
        assert!(db
            .listings()
            .find_by_identifier(&channel.id, "EXT-9")
            .await
            .unwrap()
            .is_none());
    }
}
