//! # Scheduled Sweeps
//!
//! Runs one sync operation over every active channel, in sequence order, and
//! a scheduler that repeats the sweeps on an interval.
//!
//! ## Failure Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for channel in active channels (by sequence):                          │
//! │       ok                     ──▶ counted as synced                      │
//! │       NotImplemented         ──▶ skipped, debug log only                │
//! │       other error, continue  ──▶ error log, recorded, next channel      │
//! │       other error, abort     ──▶ error log, sweep returns the error     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use chansync_core::SyncContext;

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::SyncOrchestrator;

// =============================================================================
// Failure Policy
// =============================================================================

/// What a sweep does when a channel fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepFailurePolicy {
    /// Log, record and move on to the next channel.
    #[default]
    Continue,
    /// Stop the sweep at the first failing channel.
    Abort,
}

impl SweepFailurePolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SweepFailurePolicy::Continue => "continue",
            SweepFailurePolicy::Abort => "abort",
        }
    }
}

impl fmt::Display for SweepFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepFailurePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(SweepFailurePolicy::Continue),
            "abort" => Ok(SweepFailurePolicy::Abort),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown sweep failure policy \"{other}\", expected continue or abort"
            ))),
        }
    }
}

// =============================================================================
// Sweep Kinds
// =============================================================================

/// The operations that run as sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    ImportOrders,
    UpdateOrderStatus,
    ExportOrderStatus,
    ExportPrices,
    ExportInventory,
}

impl SweepKind {
    /// One scheduler round, in this order.
    pub const ALL: [SweepKind; 5] = [
        SweepKind::ImportOrders,
        SweepKind::UpdateOrderStatus,
        SweepKind::ExportOrderStatus,
        SweepKind::ExportPrices,
        SweepKind::ExportInventory,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            SweepKind::ImportOrders => "import_orders",
            SweepKind::UpdateOrderStatus => "update_order_status",
            SweepKind::ExportOrderStatus => "export_order_status",
            SweepKind::ExportPrices => "export_prices",
            SweepKind::ExportInventory => "export_inventory",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Channels the operation succeeded on.
    pub synced: Vec<String>,
    /// Channels whose adapter lacks the capability.
    pub skipped: Vec<String>,
    /// Channels that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// =============================================================================
// Sweeps
// =============================================================================

pub async fn sweep_import_orders(
    orchestrator: &SyncOrchestrator,
    sync: &SyncContext,
    policy: SweepFailurePolicy,
) -> SyncResult<SweepReport> {
    sweep(orchestrator, SweepKind::ImportOrders, sync, policy).await
}

pub async fn sweep_update_order_status(
    orchestrator: &SyncOrchestrator,
    sync: &SyncContext,
    policy: SweepFailurePolicy,
) -> SyncResult<SweepReport> {
    sweep(orchestrator, SweepKind::UpdateOrderStatus, sync, policy).await
}

pub async fn sweep_export_order_status(
    orchestrator: &SyncOrchestrator,
    sync: &SyncContext,
    policy: SweepFailurePolicy,
) -> SyncResult<SweepReport> {
    sweep(orchestrator, SweepKind::ExportOrderStatus, sync, policy).await
}

pub async fn sweep_export_prices(
    orchestrator: &SyncOrchestrator,
    sync: &SyncContext,
    policy: SweepFailurePolicy,
) -> SyncResult<SweepReport> {
    sweep(orchestrator, SweepKind::ExportPrices, sync, policy).await
}

pub async fn sweep_export_inventory(
    orchestrator: &SyncOrchestrator,
    sync: &SyncContext,
    policy: SweepFailurePolicy,
) -> SyncResult<SweepReport> {
    sweep(orchestrator, SweepKind::ExportInventory, sync, policy).await
}

/// Runs one operation over every active channel.
///
/// ## Returns
/// * `Ok(report)` - every channel was attempted (or the policy is continue)
/// * `Err(e)` - the policy is abort and a channel failed with `e`
pub async fn sweep(
    orchestrator: &SyncOrchestrator,
    kind: SweepKind,
    sync: &SyncContext,
    policy: SweepFailurePolicy,
) -> SyncResult<SweepReport> {
    let channels = orchestrator.database().channels().list_active().await?;
    let mut report = SweepReport::default();

    for channel in &channels {
        let result = match kind {
            SweepKind::ImportOrders => orchestrator.import_orders(&channel.id, sync).await.map(|_| ()),
            SweepKind::UpdateOrderStatus => {
                orchestrator.update_order_status(&channel.id, sync).await.map(|_| ())
            }
            SweepKind::ExportOrderStatus => {
                orchestrator.export_order_status(&channel.id, sync).await.map(|_| ())
            }
            SweepKind::ExportPrices => orchestrator.export_prices(&channel.id, sync).await.map(|_| ()),
            SweepKind::ExportInventory => {
                orchestrator.export_inventory(&channel.id, sync).await.map(|_| ())
            }
        };

        match result {
            Ok(()) => report.synced.push(channel.id.clone()),
            Err(err) if err.is_not_implemented() => {
                debug!(channel_id = %channel.id, source = %channel.source, sweep = %kind, "Capability not implemented, skipped");
                report.skipped.push(channel.id.clone());
            }
            Err(err) => {
                error!(channel_id = %channel.id, source = %channel.source, sweep = %kind, error = %err, "Sweep failed for channel");
                if policy == SweepFailurePolicy::Abort {
                    return Err(err);
                }
                report.failed.push((channel.id.clone(), err.to_string()));
            }
        }
    }

    info!(
        sweep = %kind,
        synced = report.synced.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Sweep finished"
    );
    Ok(report)
}

// =============================================================================
// Scheduler
// =============================================================================

/// Repeats every sweep on an interval until shut down.
pub struct SweepScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    sync: SyncContext,
    interval: Duration,
    policy: SweepFailurePolicy,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running scheduler.
#[derive(Clone)]
pub struct SweepSchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepSchedulerHandle {
    /// Triggers graceful shutdown. The round in progress finishes first.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl SweepScheduler {
    /// Creates a scheduler and its handle.
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        sync: SyncContext,
        interval: Duration,
        policy: SweepFailurePolicy,
    ) -> (Self, SweepSchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = SweepScheduler {
            orchestrator,
            sync,
            interval,
            policy,
            shutdown_rx,
        };
        (scheduler, SweepSchedulerHandle { shutdown_tx })
    }

    /// Runs the scheduler loop. Spawn it as a background task.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), policy = %self.policy, "Sweep scheduler starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_round().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sweep scheduler shutting down");
                    break;
                }
            }
        }

        info!("Sweep scheduler stopped");
    }

    /// Runs every sweep once.
    async fn run_round(&self) {
        for kind in SweepKind::ALL {
            if let Err(e) = sweep(&self.orchestrator, kind, &self.sync, self.policy).await {
                error!(sweep = %kind, error = %e, "Sweep aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("continue".parse::<SweepFailurePolicy>().unwrap(), SweepFailurePolicy::Continue);
        assert_eq!(" ABORT ".parse::<SweepFailurePolicy>().unwrap(), SweepFailurePolicy::Abort);

        let err = "retry".parse::<SweepFailurePolicy>().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_policy_default_is_continue() {
        assert_eq!(SweepFailurePolicy::default(), SweepFailurePolicy::Continue);
        assert_eq!(SweepFailurePolicy::Abort.to_string(), "abort");
    }
}
