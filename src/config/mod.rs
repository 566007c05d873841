//! Configuration management for the price oracle service
//!
//! Loads defaults, then `config/default` and `config/local` files, then
//! `ORACLE__`-prefixed environment variables via .env.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{AggregationMethod, OracleParams};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub oracle: OracleSettings,
    pub admin: AdminSettings,
    pub persistence: PersistenceSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSettings {
    /// Aggregation method: mean, median or confidence-weighted
    pub aggregation_method: String,
    /// Minimum surviving observations per aggregation (1-10)
    pub min_sources: usize,
    /// Minimum confidence 0-100
    pub min_confidence: u8,
    /// Maximum observation age in seconds
    pub staleness_secs: u64,
    /// Outlier band width in basis points
    pub max_deviation_bps: u32,
    /// Per-source fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Interval between polling refreshes of configured pairs, seconds
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSettings {
    /// Owner identity for admin operations
    pub owner: String,
    /// Submitters authorized at startup
    pub submitters: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSettings {
    /// Data directory
    pub data_dir: String,
    /// Enable CSV logging of aggregation results
    pub csv_enabled: bool,
    /// Enable the durable registry snapshot
    pub snapshot_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Serve the HTTP API (requires the `api` feature)
    pub enabled: bool,
    /// Bind address, e.g. "127.0.0.1:8795"
    pub bind: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Oracle defaults
            .set_default("oracle.aggregation_method", "median")?
            .set_default("oracle.min_sources", 2)?
            .set_default("oracle.min_confidence", 70)?
            .set_default("oracle.staleness_secs", 3600)?
            .set_default("oracle.max_deviation_bps", 1000)?
            .set_default("oracle.fetch_timeout_ms", 3000)?
            .set_default("oracle.refresh_interval_secs", 60)?
            // Admin defaults
            .set_default("admin.owner", "local-admin")?
            .set_default("admin.submitters", Vec::<String>::new())?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            .set_default("persistence.snapshot_enabled", true)?
            // API defaults
            .set_default("api.enabled", true)?
            .set_default("api.bind", "127.0.0.1:8795")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ORACLE_*)
            .add_source(Environment::with_prefix("ORACLE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<()> {
        if AggregationMethod::parse(&self.oracle.aggregation_method).is_none() {
            bail!(
                "Unknown aggregation method `{}` (expected mean, median or confidence-weighted)",
                self.oracle.aggregation_method
            );
        }
        if !(1..=10).contains(&self.oracle.min_sources) {
            bail!(
                "oracle.min_sources {} must be within 1-10",
                self.oracle.min_sources
            );
        }
        if self.oracle.min_confidence > 100 {
            bail!(
                "oracle.min_confidence {} must be within 0-100",
                self.oracle.min_confidence
            );
        }
        if self.oracle.fetch_timeout_ms == 0 {
            bail!("oracle.fetch_timeout_ms must be positive");
        }
        Ok(())
    }

    /// Global aggregation parameters derived from the settings.
    pub fn oracle_params(&self) -> OracleParams {
        OracleParams {
            // validate() already checked the method string
            method: AggregationMethod::parse(&self.oracle.aggregation_method)
                .unwrap_or_default(),
            min_sources: self.oracle.min_sources,
            min_confidence: self.oracle.min_confidence,
            staleness_secs: self.oracle.staleness_secs,
            max_deviation_bps: self.oracle.max_deviation_bps,
            paused: false,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle.fetch_timeout_ms)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.persistence.data_dir)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join("registry.json")
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "method={} min_sources={} min_conf={} staleness={}s deviation={}bps api={}",
            self.oracle.aggregation_method,
            self.oracle.min_sources,
            self.oracle.min_confidence,
            self.oracle.staleness_secs,
            self.oracle.max_deviation_bps,
            self.api.enabled
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
