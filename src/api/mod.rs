//! Admin/query HTTP API
//!
//! REST surface over the oracle and registry. Caller identity for gated
//! operations is taken from the `x-caller` header; authentication proper is
//! deployment plumbing that sits in front of this service.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::OracleError;
use crate::oracle::PriceOracle;
use crate::registry::SourceRegistry;
use crate::types::{
    decimal_to_fixed, format_price, AggregationMethod, SourceConfig, SourceKind, TokenPair,
};

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub oracle: Arc<PriceOracle>,
    pub registry: Arc<SourceRegistry>,
}

/// Create the API router with all endpoints
pub fn create_router(oracle: Arc<PriceOracle>, registry: Arc<SourceRegistry>) -> Router {
    Router::new()
        // Query endpoints
        .route("/api/health", get(get_health))
        .route("/api/price/:base/:quote", get(get_aggregated_price))
        .route("/api/price/:base/:quote/sources", get(get_multi_source_prices))
        .route("/api/price/:base/:quote/source/:kind", get(get_source_price))
        // Manual submissions
        .route("/api/prices/manual", post(post_manual_price))
        // Admin endpoints
        .route("/api/admin/sources", post(post_register_source))
        .route("/api/admin/twap", post(post_register_twap))
        .route("/api/admin/method", post(post_set_method))
        .route("/api/admin/min-sources", post(post_set_min_sources))
        .route("/api/admin/submitters", post(post_set_submitter))
        .route("/api/admin/pause", post(post_pause))
        .route("/api/admin/unpause", post(post_unpause))
        // State
        .with_state(ApiState { oracle, registry })
        // CORS for the dashboard frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

fn caller(headers: &HeaderMap) -> String {
    headers
        .get("x-caller")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

// ─────────────────────────────────────────────────────────────────
// Query handlers
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthResponse {
    paused: bool,
    method: String,
    min_sources: usize,
    pairs: Vec<String>,
}

/// GET /api/health - registry overview
async fn get_health(State(state): State<ApiState>) -> impl IntoResponse {
    let params = state.registry.params();
    let pairs = state
        .registry
        .list_pairs()
        .into_iter()
        .map(|pair| pair.key())
        .collect();
    Json(ApiResponse::success(HealthResponse {
        paused: params.paused,
        method: params.method.to_string(),
        min_sources: params.min_sources,
        pairs,
    }))
}

#[derive(Debug, Serialize)]
struct PriceResponse {
    price: String,
    price_fixed: u128,
    confidence: u8,
    sources_used: usize,
    timestamp: i64,
}

/// GET /api/price/:base/:quote - aggregated price
async fn get_aggregated_price(
    Path((base, quote)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    match state.oracle.aggregated_price(&base, &quote).await {
        Ok(result) => Json(ApiResponse::success(PriceResponse {
            price: format_price(result.price),
            price_fixed: result.price,
            confidence: result.confidence,
            sources_used: result.sources_used,
            timestamp: result.timestamp,
        })),
        Err(error) => Json(ApiResponse::error(error.to_string())),
    }
}

/// GET /api/price/:base/:quote/sources - raw per-source view
async fn get_multi_source_prices(
    Path((base, quote)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let prices = state.oracle.multi_source_prices(&base, &quote).await;
    Json(ApiResponse::success(prices))
}

/// GET /api/price/:base/:quote/source/:kind - one source in isolation
async fn get_source_price(
    Path((base, quote, kind)): Path<(String, String, String)>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let Some(kind) = SourceKind::parse(&kind) else {
        return Json(ApiResponse::error(format!("unknown source kind `{kind}`")));
    };
    match state.oracle.source_price(&base, &quote, kind).await {
        Ok((price, confidence)) => Json(ApiResponse::success(PriceResponse {
            price: format_price(price),
            price_fixed: price,
            confidence,
            sources_used: 1,
            timestamp: chrono::Utc::now().timestamp(),
        })),
        Err(error) => Json(ApiResponse::error(error.to_string())),
    }
}

// ─────────────────────────────────────────────────────────────────
// Mutation handlers
// ─────────────────────────────────────────────────────────────────

fn ack(result: Result<(), OracleError>) -> Json<ApiResponse<bool>> {
    match result {
        Ok(()) => Json(ApiResponse::success(true)),
        Err(error) => Json(ApiResponse::error(error.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct ManualPriceRequest {
    base: String,
    quote: String,
    /// Decimal price, e.g. "2500.25"
    price: Decimal,
    confidence: u8,
    label: Option<String>,
}

/// POST /api/prices/manual - authorized manual submission
async fn post_manual_price(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ManualPriceRequest>,
) -> impl IntoResponse {
    let Some(price) = decimal_to_fixed(request.price) else {
        return Json(ApiResponse::error("price must be a positive decimal"));
    };
    let pair = TokenPair::new(&request.base, &request.quote);
    let label = request.label.unwrap_or_else(|| "manual".to_string());
    ack(state.registry.submit_manual_price(
        &caller(&headers),
        pair,
        price,
        request.confidence,
        &label,
    ))
}

#[derive(Debug, Deserialize)]
struct RegisterSourceRequest {
    base: String,
    quote: String,
    #[serde(flatten)]
    config: SourceConfig,
}

/// POST /api/admin/sources - register a price source
async fn post_register_source(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<RegisterSourceRequest>,
) -> impl IntoResponse {
    let pair = TokenPair::new(&request.base, &request.quote);
    ack(state
        .registry
        .register_source(&caller(&headers), pair, request.config))
}

#[derive(Debug, Deserialize)]
struct RegisterTwapRequest {
    base: String,
    quote: String,
    #[serde(flatten)]
    config: crate::types::TwapConfig,
}

/// POST /api/admin/twap - set the TWAP config for a pair
async fn post_register_twap(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<RegisterTwapRequest>,
) -> impl IntoResponse {
    let pair = TokenPair::new(&request.base, &request.quote);
    ack(state
        .registry
        .register_twap(&caller(&headers), pair, request.config))
}

#[derive(Debug, Deserialize)]
struct SetMethodRequest {
    /// 0 = mean, 1 = median, 2 = confidence-weighted
    method: u8,
}

/// POST /api/admin/method - select the aggregation method
async fn post_set_method(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<SetMethodRequest>,
) -> impl IntoResponse {
    let Some(method) = AggregationMethod::from_u8(request.method) else {
        return Json(ApiResponse::error(format!(
            "invalid parameter: method {} must be 0, 1 or 2",
            request.method
        )));
    };
    ack(state
        .registry
        .set_aggregation_method(&caller(&headers), method))
}

#[derive(Debug, Deserialize)]
struct SetMinSourcesRequest {
    min_sources: usize,
}

/// POST /api/admin/min-sources
async fn post_set_min_sources(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<SetMinSourcesRequest>,
) -> impl IntoResponse {
    ack(state
        .registry
        .set_min_sources(&caller(&headers), request.min_sources))
}

#[derive(Debug, Deserialize)]
struct SetSubmitterRequest {
    submitter: String,
    authorized: bool,
}

/// POST /api/admin/submitters - authorize or revoke a manual submitter
async fn post_set_submitter(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<SetSubmitterRequest>,
) -> impl IntoResponse {
    let caller = caller(&headers);
    let result = if request.authorized {
        state.registry.authorize_submitter(&caller, &request.submitter)
    } else {
        state.registry.revoke_submitter(&caller, &request.submitter)
    };
    ack(result)
}

/// POST /api/admin/pause - engage the circuit breaker
async fn post_pause(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    ack(state.registry.pause(&caller(&headers)))
}

/// POST /api/admin/unpause
async fn post_unpause(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    ack(state.registry.unpause(&caller(&headers)))
}
