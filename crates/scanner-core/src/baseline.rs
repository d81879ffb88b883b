use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};

use crate::series::{EnrichedSeries, Observation};

/// Mean and raw sample standard deviation of one metric over the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub mean: f64,
    pub std: f64,
}

impl MetricBaseline {
    /// Arithmetic mean and Bessel-corrected std. A single-value window has
    /// no defined spread and reports `std = 0.0`.
    fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len();
        let data = Data::new(values);
        let mean = data.mean()?;
        let std = if n < 2 { 0.0 } else { data.std_dev()? };
        (mean.is_finite() && std.is_finite()).then_some(Self { mean, std })
    }

    /// `None` if any value in the window is undefined.
    fn from_defined(values: impl Iterator<Item = Option<f64>>) -> Option<Self> {
        let values: Option<Vec<f64>> = values.collect();
        Self::from_values(values?)
    }
}

/// Rolling baseline of one instrument, computed over the `lookback`
/// observations immediately before the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub volume: MetricBaseline,
    pub daily_return: MetricBaseline,
    /// `None` when the oscillator's warm-up overlaps the window.
    pub oscillator: Option<MetricBaseline>,
    /// `None` when the trend indicator's warm-up overlaps the window.
    pub trend: Option<MetricBaseline>,
}

/// The `lookback` observations ending one position before the last.
/// The last observation never belongs to its own window.
pub fn window(series: &EnrichedSeries, lookback: usize) -> Option<&[Observation]> {
    let obs = series.observations();
    if lookback == 0 || obs.len() <= lookback {
        return None;
    }
    let end = obs.len() - 1;
    Some(&obs[end - lookback..end])
}

/// Estimate the baseline, or `None` if the series is shorter than
/// `lookback + 1` or the volume/return statistics are not finite.
pub fn estimate(series: &EnrichedSeries, lookback: usize) -> Option<Baseline> {
    let window = window(series, lookback)?;

    let volume = MetricBaseline::from_values(window.iter().map(|o| o.volume).collect())?;
    let daily_return =
        MetricBaseline::from_values(window.iter().map(|o| o.daily_return).collect())?;
    let oscillator = MetricBaseline::from_defined(window.iter().map(|o| o.oscillator));
    let trend = MetricBaseline::from_defined(window.iter().map(|o| o.trend));

    Some(Baseline {
        volume,
        daily_return,
        oscillator,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Candle;
    use crate::series::build;
    use crate::series::tests::{EchoIndicators, candle};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn series_from_volumes(volumes: &[i64], warmup: usize) -> EnrichedSeries {
        let candles: Vec<Candle> = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| candle(i as u32 + 1, dec!(100), dec!(101), Decimal::from(v)))
            .collect();
        build(&candles, &EchoIndicators { warmup }).unwrap()
    }

    #[test]
    fn window_excludes_current_observation() {
        let series = series_from_volumes(&[10, 20, 30, 1000], 0);
        let baseline = estimate(&series, 3).unwrap();
        assert_eq!(baseline.volume.mean, 20.0);
        assert_ne!(baseline.volume.mean, series.current().unwrap().volume);
    }

    #[test]
    fn window_uses_only_trailing_lookback() {
        let series = series_from_volumes(&[99999, 10, 20, 30, 1000], 0);
        let w = window(&series, 3).unwrap();
        assert_eq!(
            w.iter().map(|o| o.volume).collect::<Vec<_>>(),
            vec![10.0, 20.0, 30.0]
        );
    }

    #[test]
    fn sample_std_is_bessel_corrected() {
        let series = series_from_volumes(&[2, 4, 4, 4, 5, 5, 7, 9, 0], 0);
        let baseline = estimate(&series, 8).unwrap();
        assert!((baseline.volume.mean - 5.0).abs() < 1e-12);
        // Population std is 2.0; sample std is sqrt(32 / 7).
        assert!((baseline.volume.std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn series_one_short_is_skipped() {
        let series = series_from_volumes(&[1, 2, 3], 0);
        assert!(estimate(&series, 3).is_none());
        assert!(estimate(&series, 2).is_some());
    }

    #[test]
    fn zero_lookback_is_rejected() {
        let series = series_from_volumes(&[1, 2, 3], 0);
        assert!(estimate(&series, 0).is_none());
    }

    #[test]
    fn huge_lookback_is_skipped_without_overflow() {
        let series = series_from_volumes(&[1, 2, 3], 0);
        assert!(window(&series, usize::MAX).is_none());
    }

    #[test]
    fn flat_window_has_zero_std() {
        let series = series_from_volumes(&[500, 500, 500, 500, 520], 0);
        let baseline = estimate(&series, 4).unwrap();
        assert_eq!(baseline.volume.mean, 500.0);
        assert_eq!(baseline.volume.std, 0.0);
    }

    #[test]
    fn single_value_window_reports_zero_std() {
        let series = series_from_volumes(&[500, 700], 0);
        let baseline = estimate(&series, 1).unwrap();
        assert_eq!(baseline.volume.mean, 500.0);
        assert_eq!(baseline.volume.std, 0.0);
    }

    #[test]
    fn warmup_inside_window_leaves_indicator_baseline_undefined() {
        let series = series_from_volumes(&[1, 2, 3, 4, 5], 2);
        let baseline = estimate(&series, 4).unwrap();
        assert!(baseline.oscillator.is_none());
        assert!(baseline.trend.is_none());
        assert_eq!(baseline.volume.mean, 2.5);
    }

    #[test]
    fn warmup_before_window_keeps_indicator_baseline() {
        let series = series_from_volumes(&[1, 2, 3, 4, 5], 1);
        let baseline = estimate(&series, 3).unwrap();
        let osc = baseline.oscillator.unwrap();
        assert_eq!(osc.mean, 101.0);
        assert_eq!(osc.std, 0.0);
    }
}
