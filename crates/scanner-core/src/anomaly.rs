//! The high-demand rule: an instrument matches when its current volume and
//! current return both sit at or above `mean + mult * std` of their own
//! baseline. Only upward moves qualify.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::baseline::{Baseline, MetricBaseline};
use crate::config::ScanParams;
use crate::error::EvaluationError;
use crate::series::EnrichedSeries;

/// Lower bound on the std used for thresholds, as a fraction of `|mean|`.
pub const VARIANCE_FLOOR_RATIO: f64 = 0.01;

/// `max(std, |mean| * 0.01)`. Zero only when both std and mean are zero.
pub fn effective_std(metric: &MetricBaseline) -> f64 {
    metric.std.max(metric.mean.abs() * VARIANCE_FLOOR_RATIO)
}

/// Display rounding, halves to even. Non-finite values pass through.
fn round_to(value: f64, places: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub volume: f64,
    pub daily_return: f64,
}

impl Thresholds {
    pub fn new(baseline: &Baseline, params: &ScanParams) -> Self {
        Self {
            volume: baseline.volume.mean + params.volume_mult * effective_std(&baseline.volume),
            daily_return: baseline.daily_return.mean
                + params.return_mult * effective_std(&baseline.daily_return),
        }
    }

    /// Conjunctive and one-sided: both values must reach their threshold.
    pub fn is_exceeded_by(&self, volume: f64, daily_return: f64) -> bool {
        volume >= self.volume && daily_return >= self.daily_return
    }
}

/// One instrument flagged by a scan. Display fields are rounded; the rule
/// itself runs on unrounded values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub symbol: String,
    pub current_volume: f64,
    pub normal_volume: f64,
    /// Percent, two decimals.
    pub current_return_pct: f64,
    /// Percent, two decimals.
    pub normal_return_pct: f64,
    /// Oscillator (RSI), two decimals.
    pub rsi: f64,
    /// Trend value (MACD), four decimals.
    pub macd: f64,
    pub timestamp: DateTime<Utc>,
}

/// Apply the rule to the last observation of `series`.
///
/// Returns `Ok(None)` when the rule does not fire, and an error when the
/// current observation has undefined indicator values.
pub fn evaluate(
    symbol: &str,
    series: &EnrichedSeries,
    baseline: &Baseline,
    params: &ScanParams,
) -> Result<Option<Match>, EvaluationError> {
    let current = series.current().ok_or(EvaluationError::NoObservation)?;
    let rsi = current
        .oscillator
        .ok_or(EvaluationError::IndicatorWarmup("oscillator"))?;
    let macd = current
        .trend
        .ok_or(EvaluationError::IndicatorWarmup("trend"))?;

    let thresholds = Thresholds::new(baseline, params);
    if !thresholds.is_exceeded_by(current.volume, current.daily_return) {
        return Ok(None);
    }

    Ok(Some(Match {
        symbol: symbol.to_string(),
        current_volume: current.volume,
        normal_volume: baseline.volume.mean,
        current_return_pct: round_to(current.daily_return * 100.0, 2),
        normal_return_pct: round_to(baseline.daily_return.mean * 100.0, 2),
        rsi: round_to(rsi, 2),
        macd: round_to(macd, 4),
        timestamp: current.timestamp,
    }))
}
