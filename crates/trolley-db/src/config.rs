//! # Store Configuration
//!
//! Configuration for the Cart Store: where the database lives, the pricing
//! policy, and how hard to retry when SQLite reports a busy database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TROLLEY_DB_PATH=/var/lib/trolley/trolley.db                        │
//! │     TROLLEY_MAX_RETRIES=5                                              │
//! │     TROLLEY_BULK_THRESHOLD=20.00                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/trolley/trolley.toml (Linux)                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     standard pricing policy, 3 attempts, platform data dir             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/trolley/trolley.db"
//! max_connections = 5
//!
//! [pricing]
//! bulk_threshold = "20.00"
//! bulk_discount_bps = 1000
//! loyalty_discount_bps = 200
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 25
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use trolley_core::types::DiscountRate;
use trolley_core::validation::{validate_discount_bps, validate_price_cents};
use trolley_core::{Money, PricingPolicy};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

const CONFIG_FILE_NAME: &str = "trolley.toml";
const DATABASE_FILE_NAME: &str = "trolley.db";

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: None,
            max_connections: 5,
        }
    }
}

/// `[pricing]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub bulk_threshold: Money,
    pub bulk_discount_bps: u32,
    pub loyalty_discount_bps: u32,
}

impl PricingSection {
    pub fn policy(&self) -> PricingPolicy {
        PricingPolicy {
            bulk_threshold: self.bulk_threshold,
            bulk_discount: DiscountRate::from_bps(self.bulk_discount_bps),
            loyalty_discount: DiscountRate::from_bps(self.loyalty_discount_bps),
        }
    }
}

impl Default for PricingSection {
    fn default() -> Self {
        let standard = PricingPolicy::standard();
        PricingSection {
            bulk_threshold: standard.bulk_threshold,
            bulk_discount_bps: standard.bulk_discount.bps(),
            loyalty_discount_bps: standard.loyalty_discount.bps(),
        }
    }
}

/// `[retry]` section: bounded retries for busy-database conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n × backoff_ms`.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

// =============================================================================
// Store Config
// =============================================================================

/// Complete Cart Store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: DatabaseSection,
    pub pricing: PricingSection,
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Loads configuration from a file (or the default location), then
    /// applies environment overrides and validates.
    ///
    /// A missing file is not an error: defaults are used.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let path = config_path.or_else(default_config_path);

        let mut config = match path {
            Some(ref path) if path.exists() => {
                info!(path = %path.display(), "Loading store configuration");
                Self::from_file(path)?
            }
            _ => {
                debug!("No configuration file found, using defaults");
                StoreConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Parses TOML text.
    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> DbResult<String> {
        toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Checks ranges: rates within 0..=100%, a non-negative threshold,
    /// at least one attempt and one connection.
    pub fn validate(&self) -> DbResult<()> {
        validate_price_cents(self.pricing.bulk_threshold.cents())?;
        validate_discount_bps("bulk_discount_bps", self.pricing.bulk_discount_bps)?;
        validate_discount_bps("loyalty_discount_bps", self.pricing.loyalty_discount_bps)?;

        if self.retry.max_attempts == 0 {
            return Err(DbError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// The pricing policy the store hands to the engine.
    pub fn pricing_policy(&self) -> PricingPolicy {
        self.pricing.policy()
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbResult<DbConfig> {
        let path = match &self.database.path {
            Some(path) => path.clone(),
            None => default_database_path()?,
        };

        Ok(DbConfig::new(path).max_connections(self.database.max_connections))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TROLLEY_DB_PATH") {
            debug!(path = %path, "TROLLEY_DB_PATH override");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(raw) = std::env::var("TROLLEY_MAX_RETRIES") {
            match raw.parse() {
                Ok(attempts) => self.retry.max_attempts = attempts,
                Err(_) => warn!(value = %raw, "Ignoring invalid TROLLEY_MAX_RETRIES"),
            }
        }

        if let Ok(raw) = std::env::var("TROLLEY_BULK_THRESHOLD") {
            match raw.parse() {
                Ok(threshold) => self.pricing.bulk_threshold = threshold,
                Err(_) => warn!(value = %raw, "Ignoring invalid TROLLEY_BULK_THRESHOLD"),
            }
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "trolley", "trolley")
}

/// `~/.config/trolley/trolley.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// `~/.local/share/trolley/trolley.db` on Linux. Creates the directory.
pub fn default_database_path() -> DbResult<PathBuf> {
    let dirs = project_dirs()
        .ok_or_else(|| DbError::Config("could not determine app data directory".to_string()))?;

    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .map_err(|e| DbError::Config(format!("cannot create {}: {e}", data_dir.display())))?;

    Ok(data_dir.join(DATABASE_FILE_NAME))
}

// =============================================================================
// Unit Tests
// =============================================================================
