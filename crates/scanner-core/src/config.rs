use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interval::Interval;

/// Per-scan thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub volume_mult: f64,
    pub return_mult: f64,
    pub lookback: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            volume_mult: 2.0,
            return_mult: 2.0,
            lookback: 20,
        }
    }
}

/// Largest accepted lookback. Venues serve at most 1000 candles per request.
pub const MAX_LOOKBACK: usize = 1000;

fn check_multiplier(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidMultiplier { name, value });
    }
    Ok(())
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback == 0 {
            return Err(ConfigError::ZeroLookback);
        }
        if self.lookback > MAX_LOOKBACK {
            return Err(ConfigError::LookbackTooLarge {
                lookback: self.lookback,
                max: MAX_LOOKBACK,
            });
        }
        check_multiplier("volume_mult", self.volume_mult)?;
        check_multiplier("return_mult", self.return_mult)?;
        Ok(())
    }
}

/// Scan settings that stay fixed across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// An instrument is scanned only if its identifier contains one of these.
    pub quote_currencies: Vec<String>,
    pub interval: Interval,
    /// Extra candles requested beyond `lookback`.
    pub history_padding: usize,
    /// Maximum number of instruments fetched and evaluated at once.
    pub concurrency: usize,
    /// Per-instrument fetch deadline. `None` waits for the source.
    pub fetch_timeout: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            quote_currencies: vec!["USDT".to_string()],
            interval: Interval::Day1,
            history_padding: 10,
            concurrency: 1,
            fetch_timeout: None,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quote_currencies.iter().all(|q| q.trim().is_empty()) {
            return Err(ConfigError::NoQuoteCurrencies);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    /// Substring test against the quote-currency allow-list.
    pub fn accepts(&self, symbol: &str) -> bool {
        self.quote_currencies
            .iter()
            .any(|q| !q.is_empty() && symbol.contains(q.as_str()))
    }

    /// Number of candles to request for a given lookback.
    pub fn candle_count(&self, lookback: usize) -> usize {
        lookback.saturating_add(self.history_padding)
    }
}
