use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a raw candle sequence cannot be turned into an enriched series.
/// The whole series is rejected; nothing is patched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("non-positive open {open} at index {index} ({timestamp})")]
    NonPositiveOpen {
        index: usize,
        timestamp: DateTime<Utc>,
        open: Decimal,
    },

    #[error("timestamps not strictly ascending at index {index}")]
    Unordered { index: usize },

    #[error("value at index {index} is out of numeric range")]
    Unrepresentable { index: usize },

    #[error("{indicator} returned {got} value(s) for {expected} candle(s)")]
    MisalignedIndicator {
        indicator: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Invalid scan configuration. Fatal to the scan invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("lookback must be at least 1")]
    ZeroLookback,

    #[error("lookback {lookback} exceeds the maximum of {max}")]
    LookbackTooLarge { lookback: usize, max: usize },

    #[error("{name} must be a finite value >= 0, got {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },

    #[error("at least one quote currency is required")]
    NoQuoteCurrencies,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("unknown venue: '{0}'")]
    UnknownVenue(String),

    #[error("invalid interval: '{0}'")]
    InvalidInterval(String),

    #[error("invalid indicator parameters: {0}")]
    InvalidIndicator(String),
}

/// The current observation cannot be put under test.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("series has no current observation")]
    NoObservation,

    #[error("current {0} value is undefined (indicator warm-up)")]
    IndicatorWarmup(&'static str),
}
