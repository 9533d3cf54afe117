//! # chansync-sweeper
//!
//! Runs the scheduled sweeps against the local database until Ctrl-C.
//!
//! ```text
//! sync.toml + CHANSYNC_* ──▶ SyncConfig ──▶ Database ──▶ SyncOrchestrator
//!                                                              │
//!                                   SweepScheduler (interval) ◀┘
//! ```
//!
//! Channel adapters are registered by the embedding application; this binary
//! carries only the built-in `manual` adapter, so sweeps over other source
//! kinds report them as unknown.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chansync_core::SyncContext;
use chansync_db::{Database, DbConfig};
use chansync_sync::{
    AdapterRegistry, OrchestratorSettings, SweepScheduler, SyncConfig, SyncOrchestrator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SyncConfig::load(config_path)?;

    let db_path = config.database_path()?;
    info!(path = %db_path.display(), "Opening database");
    let db = Database::new(
        DbConfig::new(db_path).max_connections(config.database.max_connections),
    )
    .await?;

    let orchestrator = Arc::new(SyncOrchestrator::new(
        db.clone(),
        AdapterRegistry::new(),
        OrchestratorSettings::from_config(&config),
    ));
    let sync = SyncContext::new(config.company_id.clone())
        .including_past_orders(config.import.include_past_orders);

    let (scheduler, handle) = SweepScheduler::new(
        orchestrator,
        sync,
        config.sweep_interval(),
        config.sweep.failure_policy,
    );
    let task = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received");

    if let Err(e) = handle.shutdown().await {
        error!(error = %e, "Failed to signal scheduler shutdown");
    }
    if let Err(e) = task.await {
        error!(error = %e, "Scheduler task panicked");
    }

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chansync=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
