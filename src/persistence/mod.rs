//! Persistence - CSV log of aggregation results and the durable registry
//! snapshot
//!
//! The registry snapshot is the service's configuration store: loaded at
//! startup, written on shutdown and after admin mutations if the host wires
//! that up. Aggregation results are appended to CSV for offline analysis.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::registry::RegistrySnapshot;
use crate::types::{format_price, AggregatedPrice, AggregationMethod, TokenPair};

/// One aggregation result row in the CSV log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationRecord {
    pub timestamp: i64,
    pub pair: String,
    /// Human-readable decimal price
    pub price: String,
    /// Raw 18-decimal fixed-point price
    pub price_fixed: u128,
    pub confidence: u8,
    pub sources_used: usize,
    pub method: String,
}

/// Append-only CSV writer for aggregation results.
pub struct ResultLogger {
    path: PathBuf,
}

impl ResultLogger {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        Ok(Self {
            path: data_dir.join("aggregated_prices.csv"),
        })
    }

    pub fn append(
        &self,
        pair: &TokenPair,
        result: &AggregatedPrice,
        method: AggregationMethod,
    ) -> Result<()> {
        let write_headers = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut writer = WriterBuilder::new()
            .has_headers(write_headers)
            .from_writer(file);
        writer.serialize(AggregationRecord {
            timestamp: result.timestamp,
            pair: pair.key(),
            price: format_price(result.price),
            price_fixed: result.price,
            confidence: result.confidence,
            sources_used: result.sources_used,
            method: method.to_string(),
        })?;
        writer.flush().context("Failed to flush result log")?;
        Ok(())
    }
}

/// Write the registry snapshot as pretty JSON.
pub fn save_registry(path: &Path, snapshot: &RegistrySnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot).context("Failed to encode snapshot")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Registry snapshot saved");
    Ok(())
}

/// Load the registry snapshot if one was persisted.
pub fn load_registry(path: &Path) -> Result<Option<RegistrySnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(snapshot))
}
