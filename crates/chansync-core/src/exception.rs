//! # Exception Ledger Records
//!
//! A channel exception records one synchronization mismatch against the order
//! or order line it concerns. Operators reconcile the mismatch and resolve the
//! record; nothing reopens a resolved record.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sync code path ──raise──▶ [unresolved] ──operator resolve──▶ [resolved]│
//! │                                 │                                       │
//! │                                 └──▶ blocks confirm() of the target    │
//! │                                                                         │
//! │  Listing order: unresolved first, then newest first                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Target
// =============================================================================

/// Kind of record an exception can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Order,
    OrderLine,
}

impl TargetKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Order => "order",
            TargetKind::OrderLine => "order_line",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record an exception concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ExceptionTarget {
    Order(String),
    OrderLine(String),
}

impl ExceptionTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            ExceptionTarget::Order(_) => TargetKind::Order,
            ExceptionTarget::OrderLine(_) => TargetKind::OrderLine,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ExceptionTarget::Order(id) | ExceptionTarget::OrderLine(id) => id,
        }
    }

    /// Rebuilds a target from its stored kind and id.
    pub fn from_parts(kind: TargetKind, id: impl Into<String>) -> Self {
        match kind {
            TargetKind::Order => ExceptionTarget::Order(id.into()),
            TargetKind::OrderLine => ExceptionTarget::OrderLine(id.into()),
        }
    }
}

impl fmt::Display for ExceptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

// =============================================================================
// Channel Exception
// =============================================================================

/// A persisted synchronization mismatch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ChannelException {
    pub id: String,
    pub channel_id: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    /// Free-text diagnostic for the operator.
    pub log: String,
    pub is_resolved: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ChannelException {
    pub fn target(&self) -> ExceptionTarget {
        ExceptionTarget::from_parts(self.target_kind, self.target_id.clone())
    }

    /// Ledger display order: unresolved before resolved, then newest first.
    pub fn ledger_cmp(a: &ChannelException, b: &ChannelException) -> Ordering {
        a.is_resolved
            .cmp(&b.is_resolved)
            .then_with(|| b.created_at.cmp(&a.created_at))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn exception(id: &str, resolved: bool, age_minutes: i64) -> ChannelException {
        ChannelException {
            id: id.to_string(),
            channel_id: "ch".to_string(),
            target_kind: TargetKind::Order,
            target_id: "o-1".to_string(),
            log: "mismatch".to_string(),
            is_resolved: resolved,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            resolved_at: None,
        }
    }

    #[test]
    fn test_target_round_trips_through_parts() {
        let target = ExceptionTarget::OrderLine("l-9".to_string());
        let rebuilt = ExceptionTarget::from_parts(target.kind(), target.id());
        assert_eq!(target, rebuilt);
        assert_eq!(target.to_string(), "order_line:l-9");
    }

    #[test]
    fn test_target_serializes_tagged() {
        let json = serde_json::to_value(ExceptionTarget::Order("o-1".to_string())).unwrap();
        assert_eq!(json["kind"], "order");
        assert_eq!(json["id"], "o-1");
    }

    #[test]
    fn test_ledger_order_unresolved_first_then_newest() {
        let mut list = vec![
            exception("old-open", false, 30),
            exception("new-closed", true, 1),
            exception("new-open", false, 5),
        ];
        list.sort_by(ChannelException::ledger_cmp);
        let ids: Vec<_> = list.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new-open", "old-open", "new-closed"]);
    }
}
