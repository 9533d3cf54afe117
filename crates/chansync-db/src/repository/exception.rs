//! # Exception Repository
//!
//! The persistent exception ledger.
//!
//! ## Rules
//! - `raise` appends, never deduplicates
//! - `resolve` is one-way; resolving a resolved record changes nothing
//! - nothing in the engine reopens a record

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use chansync_core::{ChannelException, ExceptionTarget};

const EXCEPTION_COLUMNS: &str =
    "id, channel_id, target_kind, target_id, log, is_resolved, created_at, resolved_at";

/// Repository for channel exceptions.
#[derive(Debug, Clone)]
pub struct ExceptionRepository {
    pool: SqlitePool,
}

impl ExceptionRepository {
    /// Creates a new ExceptionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExceptionRepository { pool }
    }

    /// Appends an unresolved exception.
    ///
    /// ## Arguments
    /// * `channel_id` - Channel the mismatch arose from
    /// * `target` - Order or order line it concerns
    /// * `log` - Diagnostic for the operator
    pub async fn raise(
        &self,
        channel_id: &str,
        target: &ExceptionTarget,
        log: &str,
    ) -> DbResult<ChannelException> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO channel_exceptions (
                id, channel_id, target_kind, target_id, log, is_resolved, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
        )
        .bind(&id)
        .bind(channel_id)
        .bind(target.kind())
        .bind(target.id())
        .bind(log)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        warn!(
            exception_id = %id,
            channel_id = %channel_id,
            target = %target,
            "Channel exception raised"
        );
        self.get(&id).await
    }

    /// Gets an exception by its ID.
    pub async fn get(&self, id: &str) -> DbResult<ChannelException> {
        let sql = format!("SELECT {EXCEPTION_COLUMNS} FROM channel_exceptions WHERE id = ?1");
        sqlx::query_as::<_, ChannelException>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Channel exception", id))
    }

    /// Marks an exception resolved.
    ///
    /// Resolving twice keeps the first resolution time.
    pub async fn resolve(&self, id: &str) -> DbResult<ChannelException> {
        let result = sqlx::query(
            "UPDATE channel_exceptions SET is_resolved = 1, resolved_at = ?2 WHERE id = ?1 AND is_resolved = 0",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let exception = self.get(id).await?;
        if result.rows_affected() > 0 {
            debug!(exception_id = %id, "Channel exception resolved");
        }
        Ok(exception)
    }

    /// Checks if any unresolved exception targets the record.
    pub async fn has_unresolved(&self, target: &ExceptionTarget) -> DbResult<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM channel_exceptions
                WHERE target_kind = ?1 AND target_id = ?2 AND is_resolved = 0
            )
            "#,
        )
        .bind(target.kind())
        .bind(target.id())
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    /// Exceptions of a record, unresolved first, then newest first.
    pub async fn list_for(&self, target: &ExceptionTarget) -> DbResult<Vec<ChannelException>> {
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM channel_exceptions \
             WHERE target_kind = ?1 AND target_id = ?2 \
             ORDER BY is_resolved ASC, created_at DESC, rowid DESC"
        );
        let exceptions = sqlx::query_as::<_, ChannelException>(&sql)
            .bind(target.kind())
            .bind(target.id())
            .fetch_all(&self.pool)
            .await?;
        Ok(exceptions)
    }

    /// Unresolved exceptions of a channel, newest first.
    pub async fn list_unresolved(&self, channel_id: &str) -> DbResult<Vec<ChannelException>> {
        let sql = format!(
            "SELECT {EXCEPTION_COLUMNS} FROM channel_exceptions \
             WHERE channel_id = ?1 AND is_resolved = 0 \
             ORDER BY created_at DESC, rowid DESC"
        );
        let exceptions = sqlx::query_as::<_, ChannelException>(&sql)
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(exceptions)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support;
    use chansync_core::ExceptionTarget;

    #[tokio::test]
    async fn test_raise_and_resolve() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.exceptions();
        let target = ExceptionTarget::Order("o-1".to_string());

        assert!(!repo.has_unresolved(&target).await.unwrap());

        let exception = repo.raise(&channel.id, &target, "carrier XYZ unknown").await.unwrap();
        assert!(!exception.is_resolved);
        assert!(repo.has_unresolved(&target).await.unwrap());

        let resolved = repo.resolve(&exception.id).await.unwrap();
        assert!(resolved.is_resolved);
        let first_resolution = resolved.resolved_at;
        assert!(first_resolution.is_some());
        assert!(!repo.has_unresolved(&target).await.unwrap());

        // Second resolve is a no-op
        let again = repo.resolve(&exception.id).await.unwrap();
        assert_eq!(again.resolved_at, first_resolution);
    }

    #[tokio::test]
    async fn test_raise_does_not_deduplicate() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.exceptions();
        let target = ExceptionTarget::OrderLine("l-1".to_string());

        repo.raise(&channel.id, &target, "same").await.unwrap();
        repo.raise(&channel.id, &target, "same").await.unwrap();

        assert_eq!(repo.list_for(&target).await.unwrap().len(), 2);
        assert_eq!(repo.list_unresolved(&channel.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_for_orders_unresolved_first() {
        let db = test_support::db().await;
        let channel = test_support::channel(&db, "webshop").await;
        let repo = db.exceptions();
        let target = ExceptionTarget::Order("o-1".to_string());

        let older = repo.raise(&channel.id, &target, "older").await.unwrap();
        let newer = repo.raise(&channel.id, &target, "newer").await.unwrap();
        repo.resolve(&newer.id).await.unwrap();
        let newest = repo.raise(&channel.id, &target, "newest").await.unwrap();

        let ids: Vec<_> = repo
            .list_for(&target)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![newest.id, older.id, newer.id]);

        // Other targets are not affected
        let other = ExceptionTarget::Order("o-2".to_string());
        assert!(repo.list_for(&other).await.unwrap().is_empty());
    }
}
