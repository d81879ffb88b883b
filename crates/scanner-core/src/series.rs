use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::candle::Candle;
use crate::error::SeriesError;
use crate::indicator::IndicatorProvider;

/// A candle extended with its intra-candle return and indicator values.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
    /// `(close - open) / open`, signed.
    pub daily_return: f64,
    pub oscillator: Option<f64>,
    pub trend: Option<f64>,
}

/// Analysis-ready series for one instrument, ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSeries {
    observations: Vec<Observation>,
}

impl EnrichedSeries {
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// The most recent observation, the one under test.
    pub fn current(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

fn to_f64(value: Decimal, index: usize) -> Result<f64, SeriesError> {
    value
        .to_f64()
        .ok_or(SeriesError::Unrepresentable { index })
}

fn check_aligned(
    indicator: &'static str,
    values: &[Option<f64>],
    expected: usize,
) -> Result<(), SeriesError> {
    if values.len() != expected {
        return Err(SeriesError::MisalignedIndicator {
            indicator,
            expected,
            got: values.len(),
        });
    }
    Ok(())
}

/// Turn raw candles into an enriched series.
///
/// Rejects the whole series on an empty input, a non-positive open, or
/// timestamps that are not strictly ascending.
pub fn build(
    candles: &[Candle],
    indicators: &dyn IndicatorProvider,
) -> Result<EnrichedSeries, SeriesError> {
    if candles.is_empty() {
        return Err(SeriesError::Empty);
    }

    for i in 1..candles.len() {
        if candles[i].timestamp <= candles[i - 1].timestamp {
            return Err(SeriesError::Unordered { index: i });
        }
    }

    let mut closes = Vec::with_capacity(candles.len());
    let mut partial = Vec::with_capacity(candles.len());

    for (index, candle) in candles.iter().enumerate() {
        if candle.open <= Decimal::ZERO {
            return Err(SeriesError::NonPositiveOpen {
                index,
                timestamp: candle.timestamp,
                open: candle.open,
            });
        }
        // Decimal division keeps the return exact before crossing into f64.
        let intra_return = candle
            .intra_return()
            .ok_or(SeriesError::Unrepresentable { index })?;
        let daily_return = to_f64(intra_return, index)?;
        let close = to_f64(candle.close, index)?;
        let volume = to_f64(candle.volume, index)?;
        closes.push(close);
        partial.push((candle.timestamp, close, volume, daily_return));
    }

    let oscillator = indicators.oscillator(&closes);
    check_aligned("oscillator", &oscillator, candles.len())?;
    let trend = indicators.trend(&closes);
    check_aligned("trend", &trend, candles.len())?;

    let observations = partial
        .into_iter()
        .zip(oscillator.into_iter().zip(trend))
        .map(
            |((timestamp, close, volume, daily_return), (oscillator, trend))| Observation {
                timestamp,
                close,
                volume,
                daily_return,
                oscillator,
                trend,
            },
        )
        .collect();

    Ok(EnrichedSeries { observations })
}
