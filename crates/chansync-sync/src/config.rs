//! # Sync Configuration
//!
//! Configuration for the sync engine and the sweeper binary.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CHANSYNC_DB_PATH=/var/lib/chansync/chansync.db                     │
//! │     CHANSYNC_SWEEP_FAILURE_POLICY=abort                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/chansync/sync.toml (Linux)                               │
//! │     ~/Library/Application Support/com.chansync.chansync/sync.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! company_id = "company-1"
//!
//! [database]
//! path = "/var/lib/chansync/chansync.db"
//! max_connections = 5
//!
//! [import]
//! lookback_days = 14        # omit for one calendar month
//! include_past_orders = false
//!
//! [sweep]
//! interval_secs = 300
//! failure_policy = "continue"  # continue | abort
//!
//! [retry]
//! initial_backoff_ms = 500
//! max_backoff_secs = 30
//! max_elapsed_secs = 120
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::sweep::SweepFailurePolicy;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the local database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Import Settings
// =============================================================================

/// Longest first-import lookback accepted, ten years.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Order import behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSettings {
    /// How far back a channel's first order import reaches.
    /// `None` means one calendar month.
    #[serde(default)]
    pub lookback_days: Option<u32>,

    /// Whether orders mapped to `import_as_past` are pulled.
    #[serde(default)]
    pub include_past_orders: bool,
}

// =============================================================================
// Sweep Settings
// =============================================================================

/// Scheduled sweep behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Seconds between two sweep rounds.
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// What a sweep does when one channel fails.
    #[serde(default)]
    pub failure_policy: SweepFailurePolicy,
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for SweepSettings {
    fn default() -> Self {
        SweepSettings {
            interval_secs: default_sweep_interval(),
            failure_policy: SweepFailurePolicy::default(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Exponential backoff for transient adapter failures on pull operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Give up after this long. 0 disables retries.
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_secs: u64,
}

fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    30
}
fn default_max_elapsed() -> u64 {
    120
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            max_elapsed_secs: default_max_elapsed(),
        }
    }
}

impl RetrySettings {
    /// No retries at all. Used by tests and one-shot runs.
    pub fn disabled() -> Self {
        RetrySettings {
            initial_backoff_ms: 0,
            max_backoff_secs: 0,
            max_elapsed_secs: 0,
        }
    }

    /// Builds the backoff policy for one pull operation.
    pub fn backoff(&self) -> backoff::ExponentialBackoff {
        backoff::ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_secs(self.max_backoff_secs),
            max_elapsed_time: Some(Duration::from_secs(self.max_elapsed_secs)),
            ..Default::default()
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Company scheduled sweeps run for.
    #[serde(default = "default_company")]
    pub company_id: String,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub import: ImportSettings,

    #[serde(default)]
    pub sweep: SweepSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_company() -> String {
    "default-company".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            company_id: default_company(),
            database: DatabaseSettings::default(),
            import: ImportSettings::default(),
            sweep: SweepSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. `CHANSYNC_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.company_id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("company_id must not be empty".into()));
        }
        if self.sweep.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sweep.interval_secs must be greater than 0".into(),
            ));
        }
        if let Some(days) = self.import.lookback_days {
            if days == 0 || days > MAX_LOOKBACK_DAYS {
                return Err(SyncError::InvalidConfig(format!(
                    "import.lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}"
                )));
            }
        }
        if self.database.max_connections == 0 {
            return Err(SyncError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.retry.max_backoff_secs.saturating_mul(1000) < self.retry.initial_backoff_ms {
            return Err(SyncError::InvalidConfig(
                "retry.max_backoff_secs must not be shorter than retry.initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Applies `CHANSYNC_*` overrides from a variable lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> SyncResult<()> {
        if let Some(path) = lookup("CHANSYNC_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(company) = lookup("CHANSYNC_COMPANY_ID") {
            self.company_id = company;
        }

        if let Some(days) = lookup("CHANSYNC_LOOKBACK_DAYS") {
            let days = days.parse::<u32>().map_err(|_| {
                SyncError::InvalidConfig(format!("CHANSYNC_LOOKBACK_DAYS is not a number: {days}"))
            })?;
            self.import.lookback_days = Some(days);
        }

        if let Some(flag) = lookup("CHANSYNC_INCLUDE_PAST_ORDERS") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.import.include_past_orders = true,
                "0" | "false" | "no" => self.import.include_past_orders = false,
                _ => warn!(value = %flag, "Unknown CHANSYNC_INCLUDE_PAST_ORDERS value"),
            }
        }

        if let Some(secs) = lookup("CHANSYNC_SWEEP_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                debug!(interval_secs = s, "Overriding sweep interval from environment");
                self.sweep.interval_secs = s;
            }
        }

        if let Some(policy) = lookup("CHANSYNC_SWEEP_FAILURE_POLICY") {
            self.sweep.failure_policy = policy.parse()?;
        }

        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "chansync", "chansync")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Database file to open: configured, else the platform data directory.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("com", "chansync", "chansync").ok_or_else(|| {
            SyncError::InvalidConfig("Could not determine data directory".into())
        })?;
        std::fs::create_dir_all(dirs.data_dir())?;
        Ok(dirs.data_dir().join("chansync.db"))
    }

    /// Interval between sweep rounds.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_secs)
    }
}
