//! # Watermark Repository
//!
//! The four "synchronized up to" timestamps of a channel.
//!
//! ## Compare-and-Swap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run A reads W0 ─────────── bulk work ─────────── CAS(W0 → A) ✅        │
//! │  run B reads W0 ──── bulk work ──── CAS(W0 → B) ✅                      │
//! │                                          run A: CAS(W0 → A) ❌ (now B)  │
//! │                                                                         │
//! │  UPDATE channels SET col = ?new WHERE id = ? AND col IS ?prev           │
//! │                                                                         │
//! │  The loser sees zero rows affected and leaves the winner's value.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use chansync_core::SyncOperation;

/// Repository for channel watermarks.
#[derive(Debug, Clone)]
pub struct WatermarkRepository {
    pool: SqlitePool,
}

impl WatermarkRepository {
    /// Creates a new WatermarkRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WatermarkRepository { pool }
    }

    /// Current watermark of an operation, `None` before its first success.
    pub async fn get(&self, channel_id: &str, op: SyncOperation) -> DbResult<Option<DateTime<Utc>>> {
        let sql = format!("SELECT {} FROM channels WHERE id = ?1", op.watermark_column());
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(&sql)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(watermark,)| watermark)
            .ok_or_else(|| DbError::not_found("Channel", channel_id))
    }

    /// Moves a watermark from `prev` to `new` if nobody moved it meanwhile.
    ///
    /// A `new` older than `prev` keeps `prev`, so the watermark never goes
    /// back.
    ///
    /// ## Returns
    /// * `Ok(true)` - the watermark now holds the advanced value
    /// * `Ok(false)` - it no longer held `prev`; nothing was written
    pub async fn advance(
        &self,
        channel_id: &str,
        op: SyncOperation,
        prev: Option<DateTime<Utc>>,
        new: DateTime<Utc>,
    ) -> DbResult<bool> {
        let target = match prev {
            Some(prev) if prev > new => prev,
            _ => new,
        };

        let sql = format!(
            "UPDATE channels SET {col} = ?2 WHERE id = ?1 AND {col} IS ?3",
            col = op.watermark_column()
        );
        let result = sqlx::query(&sql)
            .bind(channel_id)
            .bind(target)
            .bind(prev)
            .execute(&self.pool)
            .await?;

        let advanced = result.rows_affected() == 1;
        debug!(
            channel_id = %channel_id,
            operation = %op,
            watermark = %target,
            advanced,
            "Watermark compare-and-swap"
        );
        Ok(advanced)
    }

    /// Clears a watermark so the next run starts from scratch.
    pub async fn reset(&self, channel_id: &str, op: SyncOperation) -> DbResult<()> {
        let sql = format!("UPDATE channels SET {} = NULL WHERE id = ?1", op.watermark_column());
        let result = sqlx::query(&sql).bind(channel_id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Channel", channel_id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
