//! # Order Repository
//!
//! Database operations for orders, order lines and shipments.
//!
//! ## Atomic Import
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. INSERT INTO orders (..., channel_identifier)                        │
//! │  2. INSERT INTO order_lines (...)  × N                                  │
//! │  3. INSERT INTO channel_exceptions (...)  when a mismatch is known      │
//! │                                                                         │
//! │  COMMIT ← order, lines and exception, or nothing                        │
//! │                                                                         │
//! │  channel_identifier is globally unique on both tables, so a replayed    │
//! │  import can never create a second copy.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::{
    ExceptionTarget, InvoiceMethod, Order, OrderLine, OrderState, Shipment, ShipmentMethod,
    ShipmentState,
};

const ORDER_COLUMNS: &str = r#"
    id, channel_id, company_id, reference, channel_identifier, state, invoice_method,
    shipment_method, channel_state_code, currency, carrier_id, created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id, order_id, channel_identifier, product_id, description, quantity, unit_price_cents,
    tax_id, created_at
"#;

const SHIPMENT_COLUMNS: &str = "id, order_id, state, carrier_id, created_at, updated_at";

/// Fields for creating an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub channel_id: String,
    pub company_id: String,
    pub reference: String,
    pub channel_identifier: Option<String>,
    pub invoice_method: InvoiceMethod,
    pub shipment_method: ShipmentMethod,
    pub channel_state_code: Option<String>,
    pub currency: String,
    pub carrier_id: Option<String>,
}

/// Fields for creating an order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub channel_identifier: Option<String>,
    pub product_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_id: Option<String>,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates a draft order and its lines in one transaction.
    ///
    /// ## Returns
    /// * `Ok(Order)` - the stored draft order
    /// * `Err(DbError::UniqueViolation)` - an order or line channel identifier
    ///   is already taken; nothing was written
    pub async fn create_with_lines(&self, order: &NewOrder, lines: &[NewOrderLine]) -> DbResult<Order> {
        self.create_flagged(order, lines, None).await
    }

    /// Creates a draft order and its lines, raising an unresolved exception
    /// against the new order in the same transaction when `exception_log`
    /// is given.
    ///
    /// A failed exception write rolls the order back, so an order never
    /// exists without the exception that should block its confirmation.
    pub async fn create_flagged(
        &self,
        order: &NewOrder,
        lines: &[NewOrderLine],
        exception_log: Option<&str>,
    ) -> DbResult<Order> {
        let order_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, channel_id, company_id, reference, channel_identifier, state,
                invoice_method, shipment_method, channel_state_code, currency, carrier_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            "#,
        )
        .bind(&order_id)
        .bind(&order.channel_id)
        .bind(&order.company_id)
        .bind(&order.reference)
        .bind(&order.channel_identifier)
        .bind(OrderState::Draft)
        .bind(order.invoice_method)
        .bind(order.shipment_method)
        .bind(&order.channel_state_code)
        .bind(&order.currency)
        .bind(&order.carrier_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    id, order_id, channel_identifier, product_id, description, quantity,
                    unit_price_cents, tax_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order_id)
            .bind(&line.channel_identifier)
            .bind(&line.product_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(&line.tax_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(log) = exception_log {
            let target = ExceptionTarget::Order(order_id.clone());
            sqlx::query(
                r#"
                INSERT INTO channel_exceptions (
                    id, channel_id, target_kind, target_id, log, is_resolved, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.channel_id)
            .bind(target.kind())
            .bind(target.id())
            .bind(log)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            channel_id = %order.channel_id,
            lines = lines.len(),
            "Order created"
        );
        self.get(&order_id).await
    }

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Gets an order by its ID, failing when it does not exist.
    pub async fn get(&self, id: &str) -> DbResult<Order> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Finds the order holding a channel identifier, on any channel.
    pub async fn find_by_channel_identifier(&self, identifier: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE channel_identifier = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Checks if an order line already holds a channel identifier.
    pub async fn line_identifier_exists(&self, identifier: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM order_lines WHERE channel_identifier = ?1)",
        )
        .bind(identifier)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Lists a channel's orders, oldest first.
    pub async fn list_for_channel(&self, channel_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE channel_id = ?1 ORDER BY created_at, rowid"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Orders of a channel changed after `since` (all when `None`).
    pub async fn list_updated_since(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE channel_id = ?1 AND (?2 IS NULL OR julianday(updated_at) > julianday(?2)) \
             ORDER BY updated_at, rowid"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(channel_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Lines of an order in creation order.
    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY rowid");
        let lines = sqlx::query_as::<_, OrderLine>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Gets an order line by its ID.
    pub async fn get_line(&self, id: &str) -> DbResult<Option<OrderLine>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM order_lines WHERE id = ?1");
        let line = sqlx::query_as::<_, OrderLine>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(line)
    }

    // =========================================================================
    // Workflow
    // =========================================================================

    /// Writes invoice and shipment methods.
    pub async fn set_methods(
        &self,
        id: &str,
        invoice_method: InvoiceMethod,
        shipment_method: ShipmentMethod,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET invoice_method = ?2, shipment_method = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(invoice_method)
        .bind(shipment_method)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Moves an order to a new workflow state.
    pub async fn set_state(&self, id: &str, state: OrderState) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET state = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(state)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        debug!(order_id = %id, state = %state, "Order state changed");
        Ok(())
    }

    /// Records the channel-reported state code of an order.
    pub async fn set_channel_state_code(&self, id: &str, code: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET channel_state_code = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(code)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    // =========================================================================
    // Shipments
    // =========================================================================

    /// Creates a draft shipment for an order.
    pub async fn create_shipment(&self, order_id: &str, carrier_id: Option<&str>) -> DbResult<Shipment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO shipments (id, order_id, state, carrier_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(order_id)
        .bind(ShipmentState::Draft)
        .bind(carrier_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = ?1");
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(shipment)
    }

    /// Shipments of an order in creation order.
    pub async fn shipments(&self, order_id: &str) -> DbResult<Vec<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE order_id = ?1 ORDER BY rowid");
        let shipments = sqlx::query_as::<_, Shipment>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(shipments)
    }

    /// Moves a shipment to a new state.
    pub async fn set_shipment_state(&self, id: &str, state: ShipmentState) -> DbResult<()> {
        let result = sqlx::query("UPDATE shipments SET state = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(state)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shipment", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    fn new_order(channel_id: &str, identifier: &str) -> NewOrder {
        NewOrder {
            channel_id: channel_id.to_string(),
            company_id: "company-1".to_string(),
            reference: identifier.to_string(),
            channel_identifier: Some(identifier.to_string()),
            invoice_method: InvoiceMethod::Manual,
            shipment_method: ShipmentMethod::Manual,
            channel_state_code: Some("paid".to_string()),
            currency: "EUR".to_string(),
            carrier_id: None,
        }
    }

    fn new_line(product_id: &str, identifier: &str) -> NewOrderLine {
        NewOrderLine {
            channel_identifier: Some(identifier.to_string()),
            product_id: product_id.to_string(),
            description: "Item".to_string(),
            quantity: 2,
            unit_price_cents: 500,
            tax_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_with_lines() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let product = test_support::product(&db, "P-1").await;
        let repo = db.orders();

        let order = repo
            .create_with_lines(
                &new_order(&channel.id, "W-1"),
                &[new_line(&product.id, "W-1-a"), new_line(&product.id, "W-1-b")],
            )
            .await
            .unwrap();

        assert_eq!(order.state, OrderState::Draft);
        assert_eq!(repo.lines(&order.id).await.unwrap().len(), 2);
        assert!(repo.line_identifier_exists("W-1-a").await.unwrap());
        assert_eq!(
            repo.find_by_channel_identifier("W-1").await.unwrap().map(|o| o.id),
            Some(order.id)
        );
    }

    #[tokio::test]
    async fn test_duplicate_line_identifier_writes_nothing() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let product = test_support::product(&db, "P-1").await;
        let repo = db.orders();

        repo.create_with_lines(&new_order(&channel.id, "W-1"), &[new_line(&product.id, "L-1")])
            .await
            .unwrap();

        let err = repo
            .create_with_lines(&new_order(&channel.id, "W-2"), &[new_line(&product.id, "L-1")])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(repo.find_by_channel_identifier("W-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_flagged_raises_exception() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.orders();

        let order = repo
            .create_flagged(&new_order(&channel.id, "W-1"), &[], Some("carrier ups"))
            .await
            .unwrap();

        let target = ExceptionTarget::Order(order.id.clone());
        assert!(db.exceptions().has_unresolved(&target).await.unwrap());
        assert_eq!(db.exceptions().list_for(&target).await.unwrap()[0].log, "carrier ups");
    }

    #[tokio::test]
    async fn test_failed_exception_write_rolls_back_order() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.orders();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_exceptions BEFORE INSERT ON channel_exceptions
            BEGIN SELECT RAISE(ABORT, 'ledger unavailable'); END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        assert!(repo
            .create_flagged(&new_order(&channel.id, "W-1"), &[], Some("carrier ups"))
            .await
            .is_err());
        assert!(repo.find_by_channel_identifier("W-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shipment_states() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.orders();
        let order = repo
            .create_with_lines(&new_order(&channel.id, "W-1"), &[])
            .await
            .unwrap();

        let shipment = repo.create_shipment(&order.id, None).await.unwrap();
        assert_eq!(shipment.state, ShipmentState::Draft);

        repo.set_shipment_state(&shipment.id, ShipmentState::Waiting).await.unwrap();
        assert_eq!(
            repo.shipments(&order.id).await.unwrap()[0].state,
            ShipmentState::Waiting
        );
    }
}
