//! # Tax Repository
//!
//! Per-channel tax mappings: an external `(name, rate)` descriptor stands for
//! one local tax.
//!
//! Rates are stored as integer 10^-10 units so the lookup compares exactly.
//! Some channels report a rate without a name; such lookups match on the rate
//! alone and only succeed when exactly one mapping carries it.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::validation::validate_external_identifier;
use chansync_core::{Channel, CoreError, TaxMapping, TaxRate};

const TAX_COLUMNS: &str = "id, channel_id, name, rate, tax_id";

/// Repository for tax mappings.
#[derive(Debug, Clone)]
pub struct TaxRepository {
    pool: SqlitePool,
}

impl TaxRepository {
    /// Creates a new TaxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TaxRepository { pool }
    }

    /// Maps an external tax descriptor to a local tax.
    pub async fn create(
        &self,
        channel_id: &str,
        name: &str,
        rate: TaxRate,
        tax_id: &str,
    ) -> DbResult<TaxMapping> {
        validate_external_identifier("tax name", name).map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO tax_mappings (id, channel_id, name, rate, tax_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(channel_id)
        .bind(name)
        .bind(rate)
        .bind(tax_id)
        .execute(&self.pool)
        .await?;

        debug!(channel_id = %channel_id, name = %name, rate = %rate, "Tax mapping created");

        let sql = format!("SELECT {TAX_COLUMNS} FROM tax_mappings WHERE id = ?1");
        let mapping = sqlx::query_as::<_, TaxMapping>(&sql)
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(mapping)
    }

    /// Finds the single mapping matching a descriptor.
    ///
    /// ## Returns
    /// * `Ok(Some(_))` - exactly one mapping matches
    /// * `Ok(None)` - none does, or a nameless lookup is ambiguous
    pub async fn find(
        &self,
        channel_id: &str,
        name: Option<&str>,
        rate: TaxRate,
    ) -> DbResult<Option<TaxMapping>> {
        let sql = format!(
            "SELECT {TAX_COLUMNS} FROM tax_mappings \
             WHERE channel_id = ?1 AND rate = ?2 AND (?3 IS NULL OR name = ?3) \
             ORDER BY name LIMIT 2"
        );
        let mut matches = sqlx::query_as::<_, TaxMapping>(&sql)
            .bind(channel_id)
            .bind(rate)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        if matches.len() == 1 {
            Ok(matches.pop())
        } else {
            Ok(None)
        }
    }

    /// Local tax id for a descriptor.
    ///
    /// ## Returns
    /// * `Err(UnmappedTaxReference)` - no unique mapping; the error names the
    ///   channel source kind, the tax name and the rate
    pub async fn resolve(
        &self,
        channel: &Channel,
        name: Option<&str>,
        rate: TaxRate,
    ) -> DbResult<String> {
        match self.find(&channel.id, name, rate).await? {
            Some(mapping) => Ok(mapping.tax_id),
            None => Err(CoreError::UnmappedTaxReference {
                source_kind: channel.source.to_string(),
                name: name.map(str::to_string),
                rate,
            }
            .into()),
        }
    }

    /// Lists a channel's tax mappings.
    pub async fn list(&self, channel_id: &str) -> DbResult<Vec<TaxMapping>> {
        let sql = format!(
            "SELECT {TAX_COLUMNS} FROM tax_mappings WHERE channel_id = ?1 ORDER BY name, rate"
        );
        let mappings = sqlx::query_as::<_, TaxMapping>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(mappings)
    }

    /// Removes a mapping.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tax_mappings WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax mapping", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support;
    use crate::DbError;
    use chansync_core::{CoreError, TaxRate};

    fn rate(text: &str) -> TaxRate {
        text.parse().unwrap()
    }

    #[tokio::test]
    async fn test_exact_rate_match() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.taxes();

        repo.create(&channel.id, "VAT", rate("0.2"), "tax-vat").await.unwrap();

        let tax_id = repo
            .resolve(&channel, Some("VAT"), rate("0.2000000000"))
            .await
            .unwrap();
        assert_eq!(tax_id, "tax-vat");

        // Nameless lookups match on rate
        assert_eq!(repo.resolve(&channel, None, rate("0.20")).await.unwrap(), "tax-vat");
    }

    #[tokio::test]
    async fn test_unmapped_names_both_fields() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;

        let err = db
            .taxes()
            .resolve(&channel, Some("VAT"), rate("0.20"))
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::UnmappedTaxReference { source_kind, name, rate }) => {
                assert_eq!(source_kind, "webshop");
                assert_eq!(name.as_deref(), Some("VAT"));
                assert_eq!(rate.to_string(), "0.20");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nameless_lookup_must_be_unambiguous() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.taxes();

        repo.create(&channel.id, "VAT", rate("0.07"), "tax-a").await.unwrap();
        repo.create(&channel.id, "Food", rate("0.07"), "tax-b").await.unwrap();

        assert!(repo.find(&channel.id, None, rate("0.07")).await.unwrap().is_none());
        assert_eq!(
            repo.find(&channel.id, Some("Food"), rate("0.07"))
                .await
                .unwrap()
                .map(|m| m.tax_id),
            Some("tax-b".to_string())
        );
    }

    #[tokio::test]
    async fn test_duplicate_descriptor_rejected() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.taxes();

        repo.create(&channel.id, "VAT", rate("0.2"), "tax-a").await.unwrap();
        let err = repo
            .create(&channel.id, "VAT", rate("0.20"), "tax-b")
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }
}
