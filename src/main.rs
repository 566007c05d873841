//! Price oracle service binary
//!
//! Loads configuration, restores the registry snapshot, then polls every
//! configured pair on an interval (and serves the HTTP API when the `api`
//! feature is enabled). The registry snapshot is persisted on shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use price_oracle::config::AppConfig;
use price_oracle::error::OracleError;
use price_oracle::oracle::sources::HttpSourceClient;
use price_oracle::oracle::{PriceOracle, SourceFetcher};
use price_oracle::persistence::{self, ResultLogger};
use price_oracle::registry::SourceRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(digest = %config.digest(), "Configuration loaded");

    // Registry: fresh from config, then overlaid with the durable snapshot
    let registry = Arc::new(SourceRegistry::new(
        config.admin.owner.clone(),
        config.oracle_params(),
    ));
    if config.persistence.snapshot_enabled {
        if let Some(snapshot) = persistence::load_registry(&config.snapshot_path())? {
            registry.restore(snapshot);
        }
    }
    for submitter in &config.admin.submitters {
        registry.authorize_submitter(&config.admin.owner, submitter)?;
    }

    // One HTTP client backs all three reader traits
    let client = Arc::new(
        HttpSourceClient::new(config.fetch_timeout())
            .context("Failed to create source client")?,
    );
    let fetcher = SourceFetcher::new(
        client.clone(),
        client.clone(),
        client,
        config.fetch_timeout(),
    );

    let mut oracle = PriceOracle::new(registry.clone(), fetcher);
    if config.persistence.csv_enabled {
        oracle = oracle.with_result_log(ResultLogger::new(&config.data_dir())?);
    }
    let oracle = Arc::new(oracle);

    #[cfg(feature = "api")]
    if config.api.enabled {
        let router = price_oracle::api::create_router(oracle.clone(), registry.clone());
        let bind = config.api.bind.clone();
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind {bind}"))?;
        info!(bind = %bind, "API listening");
        tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, router).await {
                warn!(error = %error, "API server stopped");
            }
        });
    }

    info!(
        interval_secs = config.oracle.refresh_interval_secs,
        "Oracle service started"
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(
        config.oracle.refresh_interval_secs.max(1),
    ));
    loop {
        tokio::select! {
            _ = ticker.tick() => refresh_pairs(&oracle).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if config.persistence.snapshot_enabled {
        persistence::save_registry(&config.snapshot_path(), &registry.export_snapshot())?;
    }
    info!("Oracle service stopped");
    Ok(())
}

/// Poll every configured pair once. Data-quality failures are routine and
/// logged at debug; anything else is worth a warning.
async fn refresh_pairs(oracle: &PriceOracle) {
    for pair in oracle.registry().list_pairs() {
        match oracle.aggregated_price(&pair.base, &pair.quote).await {
            Ok(_) => {}
            Err(
                error @ (OracleError::InsufficientSources { .. }
                | OracleError::LowConfidence { .. }
                | OracleError::Paused),
            ) => {
                tracing::debug!(pair = %pair, reason = %error, "No aggregate this round");
            }
            Err(error) => {
                warn!(pair = %pair, error = %error, "Aggregation failed");
            }
        }
    }
}
