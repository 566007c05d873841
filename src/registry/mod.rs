//! Source Registry - shared configuration store for the aggregation pipeline
//!
//! Holds per-pair source configurations, TWAP configs, the single stored
//! manual observation per pair, the authorized-submitter set and the global
//! aggregation parameters. All mutations go through a single write lock;
//! aggregation queries take cheap cloned snapshots under the read lock so
//! the fetch pipeline always observes one consistent view.
//!
//! Access control is an explicit caller-identity check at each operation
//! boundary: admin mutations require the owner, manual submissions require
//! membership in the submitter set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::info;

use crate::error::{OracleError, OracleResult};
use crate::types::{
    AggregationMethod, ManualPrice, OracleParams, SourceConfig, SourceKind, TokenPair, TwapConfig,
    MAX_SOURCE_WEIGHT, MIN_TWAP_PERIOD_SECS,
};

/// Configuration-changed events, broadcast for observability.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    SourceRegistered {
        pair: TokenPair,
        kind: SourceKind,
        label: String,
    },
    TwapConfigured {
        pair: TokenPair,
        pool_id: String,
        period_secs: u64,
    },
    ManualPriceSubmitted {
        pair: TokenPair,
        submitter: String,
    },
    SubmitterAuthorized(String),
    SubmitterRevoked(String),
    AggregationMethodChanged(AggregationMethod),
    MinSourcesChanged(usize),
    Paused,
    Unpaused,
}

/// Consistent per-pair view handed to the fetch pipeline.
#[derive(Debug, Clone)]
pub struct PairSnapshot {
    pub pair: TokenPair,
    pub sources: Vec<SourceConfig>,
    pub twap: Option<TwapConfig>,
    pub manual: Option<ManualPrice>,
    pub params: OracleParams,
}

/// Serializable registry state for the durable snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub sources: Vec<PairSources>,
    pub twaps: Vec<PairTwap>,
    pub submitters: Vec<String>,
    pub params: OracleParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSources {
    pub pair: TokenPair,
    pub configs: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairTwap {
    pub pair: TokenPair,
    pub config: TwapConfig,
}

#[derive(Debug)]
struct RegistryInner {
    owner: String,
    submitters: HashSet<String>,
    sources: HashMap<TokenPair, Vec<SourceConfig>>,
    twaps: HashMap<TokenPair, TwapConfig>,
    manual: HashMap<TokenPair, ManualPrice>,
    params: OracleParams,
}

pub struct SourceRegistry {
    inner: RwLock<RegistryInner>,
    events: broadcast::Sender<RegistryEvent>,
}

impl SourceRegistry {
    pub fn new(owner: impl Into<String>, params: OracleParams) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: RwLock::new(RegistryInner {
                owner: owner.into(),
                submitters: HashSet::new(),
                sources: HashMap::new(),
                twaps: HashMap::new(),
                manual: HashMap::new(),
                params,
            }),
            events,
        }
    }

    /// Subscribe to configuration-changed events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RegistryEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn require_owner(inner: &RegistryInner, caller: &str) -> OracleResult<()> {
        if inner.owner != caller {
            return Err(OracleError::Unauthorized(caller.to_string()));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────

    /// Append a new price source for a pair. The pair is created implicitly
    /// if it was previously unconfigured.
    pub fn register_source(
        &self,
        caller: &str,
        pair: TokenPair,
        config: SourceConfig,
    ) -> OracleResult<()> {
        if pair.base == pair.quote {
            return Err(OracleError::InvalidConfig(
                "pair must reference two distinct tokens".into(),
            ));
        }
        if config.feed_id.trim().is_empty() {
            return Err(OracleError::InvalidConfig("feed identifier is empty".into()));
        }
        if config.weight > MAX_SOURCE_WEIGHT {
            return Err(OracleError::InvalidConfig(format!(
                "weight {} exceeds maximum {}",
                config.weight, MAX_SOURCE_WEIGHT
            )));
        }
        if config.heartbeat_secs == 0 {
            return Err(OracleError::InvalidConfig("heartbeat must be positive".into()));
        }

        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        let kind = config.kind;
        let label = config.label.clone();
        inner.sources.entry(pair.clone()).or_default().push(config);
        drop(inner);

        info!(pair = %pair, kind = %kind, label = %label, "Price source registered");
        self.emit(RegistryEvent::SourceRegistered { pair, kind, label });
        Ok(())
    }

    /// Set the TWAP configuration for a pair, replacing any prior config.
    pub fn register_twap(
        &self,
        caller: &str,
        pair: TokenPair,
        config: TwapConfig,
    ) -> OracleResult<()> {
        if pair.base == pair.quote {
            return Err(OracleError::InvalidConfig(
                "pair must reference two distinct tokens".into(),
            ));
        }
        if config.pool_id.trim().is_empty() {
            return Err(OracleError::InvalidConfig("pool identifier is empty".into()));
        }
        if config.period_secs < MIN_TWAP_PERIOD_SECS {
            return Err(OracleError::InvalidConfig(format!(
                "TWAP period {}s is below the minimum {}s",
                config.period_secs, MIN_TWAP_PERIOD_SECS
            )));
        }

        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        let pool_id = config.pool_id.clone();
        let period_secs = config.period_secs;
        inner.twaps.insert(pair.clone(), config);
        drop(inner);

        info!(pair = %pair, pool = %pool_id, period_secs, "TWAP source configured");
        self.emit(RegistryEvent::TwapConfigured {
            pair,
            pool_id,
            period_secs,
        });
        Ok(())
    }

    /// Store the current manual observation for a pair, overwriting any
    /// previous submission.
    pub fn submit_manual_price(
        &self,
        caller: &str,
        pair: TokenPair,
        price: u128,
        confidence: u8,
        label: &str,
    ) -> OracleResult<()> {
        let mut inner = self.write();
        if !inner.submitters.contains(caller) {
            return Err(OracleError::Unauthorized(caller.to_string()));
        }
        if inner.params.paused {
            return Err(OracleError::Paused);
        }
        if price == 0 {
            return Err(OracleError::InvalidPrice);
        }
        if confidence > 100 {
            return Err(OracleError::InvalidParameter(
                "confidence must be within 0-100".into(),
            ));
        }

        let entry = ManualPrice {
            price,
            confidence,
            label: label.to_string(),
            submitted_at: Utc::now().timestamp(),
            submitted_by: caller.to_string(),
        };
        inner.manual.insert(pair.clone(), entry);
        drop(inner);

        info!(pair = %pair, submitter = caller, confidence, "Manual price submitted");
        self.emit(RegistryEvent::ManualPriceSubmitted {
            pair,
            submitter: caller.to_string(),
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Admin
    // ─────────────────────────────────────────────────────────────────

    /// Grant manual-submission rights. Idempotent.
    pub fn authorize_submitter(&self, caller: &str, submitter: &str) -> OracleResult<()> {
        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        let added = inner.submitters.insert(submitter.to_string());
        drop(inner);
        if added {
            info!(submitter, "Manual submitter authorized");
            self.emit(RegistryEvent::SubmitterAuthorized(submitter.to_string()));
        }
        Ok(())
    }

    /// Revoke manual-submission rights. Idempotent.
    pub fn revoke_submitter(&self, caller: &str, submitter: &str) -> OracleResult<()> {
        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        let removed = inner.submitters.remove(submitter);
        drop(inner);
        if removed {
            info!(submitter, "Manual submitter revoked");
            self.emit(RegistryEvent::SubmitterRevoked(submitter.to_string()));
        }
        Ok(())
    }

    pub fn set_aggregation_method(
        &self,
        caller: &str,
        method: AggregationMethod,
    ) -> OracleResult<()> {
        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        inner.params.method = method;
        drop(inner);
        info!(method = %method, "Aggregation method changed");
        self.emit(RegistryEvent::AggregationMethodChanged(method));
        Ok(())
    }

    pub fn set_min_sources(&self, caller: &str, min_sources: usize) -> OracleResult<()> {
        if !(1..=10).contains(&min_sources) {
            return Err(OracleError::InvalidParameter(format!(
                "min_sources {} must be within 1-10",
                min_sources
            )));
        }
        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        inner.params.min_sources = min_sources;
        drop(inner);
        info!(min_sources, "Minimum source count changed");
        self.emit(RegistryEvent::MinSourcesChanged(min_sources));
        Ok(())
    }

    /// Engage the circuit breaker: all price-affecting operations fail with
    /// `Paused` until `unpause`.
    pub fn pause(&self, caller: &str) -> OracleResult<()> {
        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        inner.params.paused = true;
        drop(inner);
        info!("Oracle paused");
        self.emit(RegistryEvent::Paused);
        Ok(())
    }

    pub fn unpause(&self, caller: &str) -> OracleResult<()> {
        let mut inner = self.write();
        Self::require_owner(&inner, caller)?;
        inner.params.paused = false;
        drop(inner);
        info!("Oracle unpaused");
        self.emit(RegistryEvent::Unpaused);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Read surface
    // ─────────────────────────────────────────────────────────────────

    pub fn params(&self) -> OracleParams {
        self.read().params.clone()
    }

    pub fn is_submitter(&self, caller: &str) -> bool {
        self.read().submitters.contains(caller)
    }

    /// One consistent view of everything the fetch pipeline needs for a pair.
    pub fn pair_snapshot(&self, pair: &TokenPair) -> PairSnapshot {
        let inner = self.read();
        PairSnapshot {
            pair: pair.clone(),
            sources: inner.sources.get(pair).cloned().unwrap_or_default(),
            twap: inner.twaps.get(pair).cloned(),
            manual: inner.manual.get(pair).cloned(),
            params: inner.params.clone(),
        }
    }

    pub fn sources_for(&self, pair: &TokenPair) -> Vec<SourceConfig> {
        self.read().sources.get(pair).cloned().unwrap_or_default()
    }

    pub fn manual_for(&self, pair: &TokenPair) -> Option<ManualPrice> {
        self.read().manual.get(pair).cloned()
    }

    /// Every pair with at least one source, TWAP config or manual entry.
    pub fn list_pairs(&self) -> Vec<TokenPair> {
        let inner = self.read();
        let mut pairs: Vec<TokenPair> = inner
            .sources
            .keys()
            .chain(inner.twaps.keys())
            .chain(inner.manual.keys())
            .cloned()
            .collect();
        pairs.sort_by_key(|p| p.key());
        pairs.dedup();
        pairs
    }

    // ─────────────────────────────────────────────────────────────────
    // Durable snapshot
    // ─────────────────────────────────────────────────────────────────

    /// Export registry state for persistence. Manual observations are
    /// excluded: they would be stale by the time a restart reloads them.
    pub fn export_snapshot(&self) -> RegistrySnapshot {
        let inner = self.read();
        let mut sources: Vec<PairSources> = inner
            .sources
            .iter()
            .map(|(pair, configs)| PairSources {
                pair: pair.clone(),
                configs: configs.clone(),
            })
            .collect();
        sources.sort_by_key(|entry| entry.pair.key());
        let mut twaps: Vec<PairTwap> = inner
            .twaps
            .iter()
            .map(|(pair, config)| PairTwap {
                pair: pair.clone(),
                config: config.clone(),
            })
            .collect();
        twaps.sort_by_key(|entry| entry.pair.key());
        let mut submitters: Vec<String> = inner.submitters.iter().cloned().collect();
        submitters.sort();
        RegistrySnapshot {
            sources,
            twaps,
            submitters,
            params: inner.params.clone(),
        }
    }

    /// Restore registry state from a persisted snapshot. Startup-only path,
    /// invoked before the service accepts callers.
    pub fn restore(&self, snapshot: RegistrySnapshot) {
        let mut inner = self.write();
        inner.sources = snapshot
            .sources
            .into_iter()
            .map(|entry| (entry.pair, entry.configs))
            .collect();
        inner.twaps = snapshot
            .twaps
            .into_iter()
            .map(|entry| (entry.pair, entry.config))
            .collect();
        inner.submitters = snapshot.submitters.into_iter().collect();
        inner.params = snapshot.params;
        let pairs = inner.sources.len();
        drop(inner);
        info!(pairs, "Registry state restored from snapshot");
    }
}
