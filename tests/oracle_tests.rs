//! Integration tests for the aggregation pipeline
//!
//! Drives the full snapshot -> fetch -> filter -> reject -> aggregate flow
//! against deterministic in-memory readers.

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use price_oracle::error::OracleError;
    use price_oracle::oracle::sources::{
        ExternalFeed, ExternalQuote, FeedReader, FeedRound, PoolReader,
    };
    use price_oracle::oracle::{PriceOracle, SourceFetcher};
    use price_oracle::registry::SourceRegistry;
    use price_oracle::types::{
        AggregationMethod, OracleParams, SourceConfig, SourceKind, TokenPair, TwapConfig,
        PRICE_SCALE,
    };

    const OWNER: &str = "owner";

    // ============================================================================
    // Deterministic in-memory readers
    // ============================================================================

    #[derive(Default)]
    struct StaticFeeds {
        rounds: HashMap<String, FeedRound>,
    }

    #[async_trait]
    impl FeedReader for StaticFeeds {
        async fn latest_round(&self, feed_id: &str) -> Result<FeedRound> {
            self.rounds
                .get(feed_id)
                .cloned()
                .ok_or_else(|| anyhow!("feed {feed_id} unreachable"))
        }
    }

    #[derive(Default)]
    struct StaticPools {
        ticks: HashMap<String, [i64; 2]>,
    }

    #[async_trait]
    impl PoolReader for StaticPools {
        async fn tick_cumulatives(&self, pool_id: &str, _secs_ago: [u32; 2]) -> Result<[i64; 2]> {
            self.ticks
                .get(pool_id)
                .copied()
                .ok_or_else(|| anyhow!("pool {pool_id} unreachable"))
        }
    }

    #[derive(Default)]
    struct StaticQuotes {
        quotes: HashMap<String, ExternalQuote>,
    }

    #[async_trait]
    impl ExternalFeed for StaticQuotes {
        async fn quote(&self, feed_id: &str) -> Result<ExternalQuote> {
            self.quotes
                .get(feed_id)
                .cloned()
                .ok_or_else(|| anyhow!("oracle {feed_id} unreachable"))
        }
    }

    // ============================================================================
    // Fixture helpers
    // ============================================================================

    fn pair() -> TokenPair {
        TokenPair::new("WETH", "USDC")
    }

    fn chainlink_source(feed_id: &str) -> SourceConfig {
        SourceConfig {
            kind: SourceKind::Chainlink,
            feed_id: feed_id.to_string(),
            heartbeat_secs: 3600,
            max_deviation_bps: 1000,
            weight: 5000,
            active: true,
            label: format!("chainlink:{feed_id}"),
        }
    }

    fn external_source(feed_id: &str) -> SourceConfig {
        SourceConfig {
            kind: SourceKind::ExternalOracle,
            feed_id: feed_id.to_string(),
            heartbeat_secs: 3600,
            max_deviation_bps: 1000,
            weight: 2500,
            active: true,
            label: format!("external:{feed_id}"),
        }
    }

    fn quote(price: u64, confidence: u8, timestamp: i64) -> ExternalQuote {
        ExternalQuote {
            price: Decimal::from(price),
            confidence,
            timestamp,
        }
    }

    fn oracle(
        feeds: StaticFeeds,
        pools: StaticPools,
        quotes: StaticQuotes,
    ) -> (Arc<SourceRegistry>, PriceOracle) {
        let registry = Arc::new(SourceRegistry::new(OWNER, OracleParams::default()));
        let fetcher = SourceFetcher::new(
            Arc::new(feeds),
            Arc::new(pools),
            Arc::new(quotes),
            Duration::from_secs(2),
        );
        let oracle = PriceOracle::new(registry.clone(), fetcher);
        (registry, oracle)
    }

    /// Registry + oracle backed only by external quotes at the given
    /// (price, confidence) points, all fresh.
    fn external_only(points: &[(u64, u8)]) -> (Arc<SourceRegistry>, PriceOracle) {
        let now = Utc::now().timestamp();
        let mut quotes = StaticQuotes::default();
        for (index, (price, confidence)) in points.iter().enumerate() {
            quotes.quotes.insert(
                format!("https://oracle.example/{index}"),
                quote(*price, *confidence, now),
            );
        }
        let (registry, oracle) = oracle(StaticFeeds::default(), StaticPools::default(), quotes);
        for index in 0..points.len() {
            registry
                .register_source(
                    OWNER,
                    pair(),
                    external_source(&format!("https://oracle.example/{index}")),
                )
                .unwrap();
        }
        (registry, oracle)
    }

    // ============================================================================
    // Aggregation pipeline
    // ============================================================================

    #[tokio::test]
    async fn test_median_across_three_chainlink_feeds() {
        let now = Utc::now().timestamp();
        let mut feeds = StaticFeeds::default();
        for (feed_id, answer) in [
            ("feed://a", 2_000_00000000_i64),
            ("feed://b", 2_010_00000000),
            ("feed://c", 1_990_00000000),
        ] {
            feeds.rounds.insert(
                feed_id.to_string(),
                FeedRound {
                    answer: answer as i128,
                    decimals: 8,
                    updated_at: now,
                },
            );
        }
        let (registry, oracle) = oracle(feeds, StaticPools::default(), StaticQuotes::default());
        for feed_id in ["feed://a", "feed://b", "feed://c"] {
            registry
                .register_source(OWNER, pair(), chainlink_source(feed_id))
                .unwrap();
        }

        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        assert_eq!(result.price, 2_000 * PRICE_SCALE);
        assert_eq!(result.confidence, 95);
        assert_eq!(result.sources_used, 3);
    }

    #[tokio::test]
    async fn test_outlier_rejected_end_to_end() {
        let (_registry, oracle) = external_only(&[(100, 90), (101, 90), (99, 90), (500, 90)]);

        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        // 500 falls outside the 10% band; survivors [100, 101, 99]
        assert_eq!(result.sources_used, 3);
        assert_eq!(result.price, 100 * PRICE_SCALE);
        assert_eq!(result.confidence, 90);
    }

    #[tokio::test]
    async fn test_mean_method_scenario() {
        let (registry, oracle) = external_only(&[(100, 90), (102, 80), (98, 85)]);
        registry
            .set_aggregation_method(OWNER, AggregationMethod::Mean)
            .unwrap();

        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        assert_eq!(result.price, 100 * PRICE_SCALE);
        assert_eq!(result.confidence, 85);
    }

    #[tokio::test]
    async fn test_confidence_weighted_stays_in_range() {
        let (registry, oracle) = external_only(&[(100, 95), (110, 70), (105, 85)]);
        registry
            .set_aggregation_method(OWNER, AggregationMethod::ConfidenceWeighted)
            .unwrap();

        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        assert!(result.price >= 100 * PRICE_SCALE);
        assert!(result.price <= 110 * PRICE_SCALE);
    }

    #[tokio::test]
    async fn test_single_source_is_insufficient() {
        let (_registry, oracle) = external_only(&[(100, 90)]);

        let result = oracle.aggregated_price("WETH", "USDC").await;
        assert!(matches!(
            result,
            Err(OracleError::InsufficientSources {
                available: 1,
                required: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_stale_observation_is_filtered_out() {
        let now = Utc::now().timestamp();
        let mut quotes = StaticQuotes::default();
        quotes
            .quotes
            .insert("https://oracle.example/fresh".into(), quote(100, 90, now));
        quotes.quotes.insert(
            "https://oracle.example/stale".into(),
            quote(100, 99, now - 3601),
        );
        let (registry, oracle) = oracle(StaticFeeds::default(), StaticPools::default(), quotes);
        for feed_id in ["https://oracle.example/fresh", "https://oracle.example/stale"] {
            registry
                .register_source(OWNER, pair(), external_source(feed_id))
                .unwrap();
        }

        // The stale quote is dropped despite its high confidence, leaving one
        // survivor below min_sources.
        let result = oracle.aggregated_price("WETH", "USDC").await;
        assert!(matches!(
            result,
            Err(OracleError::InsufficientSources { available: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_dead_feed_does_not_block_the_rest() {
        let now = Utc::now().timestamp();
        let mut feeds = StaticFeeds::default();
        // feed://dead is registered but absent from the reader
        feeds.rounds.insert(
            "feed://alive".into(),
            FeedRound {
                answer: 100_00000000,
                decimals: 8,
                updated_at: now,
            },
        );
        let mut quotes = StaticQuotes::default();
        quotes
            .quotes
            .insert("https://oracle.example/0".into(), quote(101, 90, now));
        let (registry, oracle) = oracle(feeds, StaticPools::default(), quotes);
        registry
            .register_source(OWNER, pair(), chainlink_source("feed://alive"))
            .unwrap();
        registry
            .register_source(OWNER, pair(), chainlink_source("feed://dead"))
            .unwrap();
        registry
            .register_source(OWNER, pair(), external_source("https://oracle.example/0"))
            .unwrap();

        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        assert_eq!(result.sources_used, 2);
    }

    // ============================================================================
    // TWAP
    // ============================================================================

    #[tokio::test]
    async fn test_twap_source_price() {
        let mut pools = StaticPools::default();
        // Flat tick history: parity price
        pools.ticks.insert("pool://weth-usdc".into(), [0, 0]);
        let (registry, oracle) = oracle(StaticFeeds::default(), pools, StaticQuotes::default());
        registry
            .register_twap(
                OWNER,
                pair(),
                TwapConfig {
                    pool_id: "pool://weth-usdc".into(),
                    period_secs: 600,
                    token0: "WETH".into(),
                    token1: "USDC".into(),
                    token0_decimals: 18,
                    token1_decimals: 18,
                    active: true,
                },
            )
            .unwrap();

        let (price, confidence) = oracle
            .source_price("WETH", "USDC", SourceKind::UniswapTwap)
            .await
            .unwrap();
        assert_eq!(price, PRICE_SCALE);
        assert_eq!(confidence, 85);
    }

    #[tokio::test]
    async fn test_source_price_unconfigured_kind_not_found() {
        let (_registry, oracle) = external_only(&[(100, 90), (101, 90)]);

        let result = oracle
            .source_price("WETH", "USDC", SourceKind::UniswapTwap)
            .await;
        assert!(matches!(result, Err(OracleError::FeedNotFound { .. })));
    }

    // ============================================================================
    // Manual prices and authorization
    // ============================================================================

    #[tokio::test]
    async fn test_unauthorized_manual_submission_changes_nothing() {
        let (registry, oracle) = external_only(&[(100, 90), (101, 90)]);

        let result =
            registry.submit_manual_price("rogue", pair(), 100 * PRICE_SCALE, 95, "desk");
        assert!(matches!(result, Err(OracleError::Unauthorized(_))));
        assert!(registry.manual_for(&pair()).is_none());

        // The pipeline still sees exactly the two external sources
        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        assert_eq!(result.sources_used, 2);
    }

    #[tokio::test]
    async fn test_manual_price_joins_the_observation_set() {
        let (registry, oracle) = external_only(&[(100, 90), (101, 90)]);
        registry.authorize_submitter(OWNER, "desk-1").unwrap();
        registry
            .submit_manual_price("desk-1", pair(), 102 * PRICE_SCALE, 88, "desk")
            .unwrap();

        let prices = oracle.multi_source_prices("WETH", "USDC").await;
        assert_eq!(prices.prices.len(), 3);
        assert!(prices.labels.iter().any(|label| label == "desk"));

        let result = oracle.aggregated_price("WETH", "USDC").await.unwrap();
        assert_eq!(result.sources_used, 3);
    }

    #[tokio::test]
    async fn test_manual_source_price_kind() {
        let (registry, oracle) = external_only(&[]);
        registry.authorize_submitter(OWNER, "desk-1").unwrap();
        registry
            .submit_manual_price("desk-1", pair(), 42 * PRICE_SCALE, 91, "desk")
            .unwrap();

        let (price, confidence) = oracle
            .source_price("WETH", "USDC", SourceKind::Manual)
            .await
            .unwrap();
        assert_eq!(price, 42 * PRICE_SCALE);
        assert_eq!(confidence, 91);
    }

    // ============================================================================
    // Circuit breaker
    // ============================================================================

    #[tokio::test]
    async fn test_pause_halts_price_operations() {
        let (registry, oracle) = external_only(&[(100, 90), (101, 90)]);
        registry.pause(OWNER).unwrap();

        assert!(matches!(
            oracle.aggregated_price("WETH", "USDC").await,
            Err(OracleError::Paused)
        ));
        assert!(matches!(
            oracle
                .source_price("WETH", "USDC", SourceKind::ExternalOracle)
                .await,
            Err(OracleError::Paused)
        ));
        assert!(oracle.multi_source_prices("WETH", "USDC").await.prices.is_empty());

        registry.unpause(OWNER).unwrap();
        assert!(oracle.aggregated_price("WETH", "USDC").await.is_ok());
    }

    #[tokio::test]
    async fn test_pause_requires_owner() {
        let (registry, _oracle) = external_only(&[]);
        assert!(matches!(
            registry.pause("rogue"),
            Err(OracleError::Unauthorized(_))
        ));
    }

    // ============================================================================
    // Multi-source view
    // ============================================================================

    #[tokio::test]
    async fn test_multi_source_prices_empty_without_sources() {
        let (_registry, oracle) = oracle(
            StaticFeeds::default(),
            StaticPools::default(),
            StaticQuotes::default(),
        );
        let prices = oracle.multi_source_prices("WETH", "USDC").await;
        assert!(prices.prices.is_empty());
        assert!(prices.confidences.is_empty());
        assert!(prices.labels.is_empty());
        assert!(prices.timestamps.is_empty());
    }

    #[tokio::test]
    async fn test_multi_source_prices_are_parallel_arrays() {
        let (_registry, oracle) = external_only(&[(100, 90), (101, 85)]);
        let prices = oracle.multi_source_prices("WETH", "USDC").await;
        assert_eq!(prices.prices.len(), 2);
        assert_eq!(prices.confidences.len(), 2);
        assert_eq!(prices.labels.len(), 2);
        assert_eq!(prices.timestamps.len(), 2);
    }
}
