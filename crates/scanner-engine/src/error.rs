use std::time::Duration;

use scanner_core::error::{ConfigError, EvaluationError, SeriesError};
use scanner_providers::error::ProviderError;
use serde::Serialize;
use thiserror::Error;

/// Scan-level failure. No partial result accompanies it.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to list instruments on {venue}: {source}")]
    Universe {
        venue: String,
        #[source]
        source: ProviderError,
    },

    #[error("scan cancelled")]
    Cancelled,
}

/// Why one instrument dropped out of a scan. Never aborts the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
pub enum SkipReason {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("insufficient history: {available} candle(s), need {required}")]
    InsufficientHistory { available: usize, required: usize },

    #[error("no usable baseline over {lookback} observation(s)")]
    NoBaseline { lookback: usize },

    #[error("indicator warm-up: {0}")]
    IndicatorWarmup(String),

    #[error("computation error: {0}")]
    Computation(String),
}

impl From<SeriesError> for SkipReason {
    fn from(e: SeriesError) -> Self {
        SkipReason::Computation(e.to_string())
    }
}

impl From<EvaluationError> for SkipReason {
    fn from(e: EvaluationError) -> Self {
        match e {
            EvaluationError::IndicatorWarmup(_) => SkipReason::IndicatorWarmup(e.to_string()),
            EvaluationError::NoObservation => SkipReason::Computation(e.to_string()),
        }
    }
}

impl From<ProviderError> for SkipReason {
    fn from(e: ProviderError) -> Self {
        SkipReason::Fetch(e.to_string())
    }
}
