//! Error taxonomy for the aggregation pipeline and admin surface
//!
//! Configuration and authorization errors abort before any state mutation.
//! Data-quality errors abort a single query and leave registry state
//! untouched; callers should treat them as "no trustworthy price available
//! right now" rather than as corruption.

use thiserror::Error;

use crate::types::SourceKind;

#[derive(Debug, Error)]
pub enum OracleError {
    /// Malformed or out-of-range input to a registration operation
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Malformed or out-of-range input to a parameter mutation
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Caller lacks the required role
    #[error("caller `{0}` is not authorized")]
    Unauthorized(String),

    /// Too few observations survived filtering and outlier rejection
    #[error("insufficient sources: {available} usable, {required} required")]
    InsufficientSources { available: usize, required: usize },

    /// Aggregate confidence fell below the configured minimum
    #[error("aggregated confidence {confidence} is below the minimum {minimum}")]
    LowConfidence { confidence: u8, minimum: u8 },

    /// Aggregated or submitted price is not a positive value
    #[error("price must be a positive value")]
    InvalidPrice,

    /// No active source of the requested kind is configured for the pair
    #[error("no active {kind} source configured for {pair}")]
    FeedNotFound { pair: String, kind: SourceKind },

    /// The requested source could not produce a fresh reading
    #[error("{kind} price for {pair} is stale or unavailable")]
    StalePrice { pair: String, kind: SourceKind },

    /// Circuit breaker is engaged
    #[error("oracle is paused")]
    Paused,
}

pub type OracleResult<T> = Result<T, OracleError>;
