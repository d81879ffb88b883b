use ta::Next;
use ta::indicators::{MovingAverageConvergenceDivergence, RelativeStrengthIndex};

use crate::error::ConfigError;

/// Computes momentum/trend indicators over a closing-price series.
///
/// Both outputs must be index-aligned with `closes`. Positions inside the
/// indicator's warm-up carry `None`, never a placeholder number.
pub trait IndicatorProvider: Send + Sync {
    /// Bounded oscillator (RSI in the default implementation).
    fn oscillator(&self, closes: &[f64]) -> Vec<Option<f64>>;

    /// Trend-following oscillator (MACD line in the default implementation).
    fn trend(&self, closes: &[f64]) -> Vec<Option<f64>>;
}

/// Indicator provider backed by the `ta` crate: RSI as the oscillator and the
/// MACD line as the trend value.
///
/// RSI uses Wilder smoothing (`alpha = 1 / period`). `ta` smooths with an EMA
/// of `k = 2 / (n + 1)`, so the RSI is built with `n = 2 * period - 1`.
#[derive(Debug, Clone)]
pub struct TaIndicators {
    rsi: RelativeStrengthIndex,
    rsi_period: usize,
    macd: MovingAverageConvergenceDivergence,
    macd_slow: usize,
}

impl TaIndicators {
    pub const RSI_PERIOD: usize = 14;
    pub const MACD_FAST: usize = 12;
    pub const MACD_SLOW: usize = 26;
    pub const MACD_SIGNAL: usize = 9;

    pub fn new(
        rsi_period: usize,
        macd_fast: usize,
        macd_slow: usize,
        macd_signal: usize,
    ) -> Result<Self, ConfigError> {
        let invalid_rsi = |detail: String| {
            ConfigError::InvalidIndicator(format!("rsi({rsi_period}): {detail}"))
        };
        let wilder_span = rsi_period
            .checked_mul(2)
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| invalid_rsi("period must be at least 1".into()))?;
        let rsi =
            RelativeStrengthIndex::new(wilder_span).map_err(|e| invalid_rsi(format!("{e:?}")))?;
        let macd = MovingAverageConvergenceDivergence::new(macd_fast, macd_slow, macd_signal)
            .map_err(|e| {
                ConfigError::InvalidIndicator(format!(
                    "macd({macd_fast}, {macd_slow}, {macd_signal}): {e:?}"
                ))
            })?;
        Ok(Self {
            rsi,
            rsi_period,
            macd,
            macd_slow,
        })
    }

    /// Number of leading positions with an undefined oscillator value.
    pub fn oscillator_warmup(&self) -> usize {
        self.rsi_period
    }

    /// Number of leading positions with an undefined trend value.
    pub fn trend_warmup(&self) -> usize {
        self.macd_slow.saturating_sub(1)
    }
}

impl Default for TaIndicators {
    fn default() -> Self {
        Self::new(
            Self::RSI_PERIOD,
            Self::MACD_FAST,
            Self::MACD_SLOW,
            Self::MACD_SIGNAL,
        )
        .expect("standard RSI/MACD periods are valid")
    }
}

/// Replace the first `warmup` positions and any non-finite output with `None`.
fn mask_warmup(values: impl Iterator<Item = f64>, warmup: usize) -> Vec<Option<f64>> {
    values
        .enumerate()
        .map(|(i, v)| (i >= warmup && v.is_finite()).then_some(v))
        .collect()
}

impl IndicatorProvider for TaIndicators {
    fn oscillator(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut rsi = self.rsi.clone();
        mask_warmup(
            closes.iter().map(|&c| rsi.next(c)),
            self.oscillator_warmup(),
        )
    }

    fn trend(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut macd = self.macd.clone();
        mask_warmup(
            closes.iter().map(|&c| macd.next(c).macd),
            self.trend_warmup(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising_closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn outputs_are_index_aligned() {
        let ind = TaIndicators::default();
        let closes = rising_closes(40);
        assert_eq!(ind.oscillator(&closes).len(), 40);
        assert_eq!(ind.trend(&closes).len(), 40);
    }

    #[test]
    fn oscillator_warmup_is_undefined() {
        let ind = TaIndicators::default();
        let rsi = ind.oscillator(&rising_closes(30));
        assert!(rsi[..14].iter().all(Option::is_none));
        assert!(rsi[14..].iter().all(Option::is_some));
    }

    #[test]
    fn trend_warmup_is_undefined() {
        let ind = TaIndicators::default();
        let macd = ind.trend(&rising_closes(30));
        assert!(macd[..25].iter().all(Option::is_none));
        assert!(macd[25..].iter().all(Option::is_some));
    }

    #[test]
    fn rising_prices_give_positive_trend() {
        let ind = TaIndicators::default();
        let macd = ind.trend(&rising_closes(40));
        assert!(macd[39].unwrap() > 0.0);
    }

    #[test]
    fn short_input_is_entirely_undefined() {
        let ind = TaIndicators::default();
        let rsi = ind.oscillator(&rising_closes(5));
        assert_eq!(rsi, vec![None; 5]);
    }

    #[test]
    fn repeated_calls_do_not_share_state() {
        let ind = TaIndicators::default();
        let closes = rising_closes(30);
        assert_eq!(ind.trend(&closes), ind.trend(&closes));
        assert_eq!(ind.oscillator(&closes), ind.oscillator(&closes));
    }

    /// Closing prices after a long steady climb followed by one sharp drop.
    fn climb_then_drop() -> Vec<f64> {
        let mut closes = rising_closes(40);
        closes.push(120.0);
        closes
    }

    #[test]
    fn rsi_uses_wilder_smoothing() {
        let closes = climb_then_drop();
        let wilder = TaIndicators::default().oscillator(&closes)[40].unwrap();

        let mut reference = RelativeStrengthIndex::new(27).unwrap();
        let expected = closes.iter().map(|&c| reference.next(c)).last().unwrap();
        assert!((wilder - expected).abs() < 1e-12);

        // A plain 14-period EMA reacts faster to the drop.
        let mut ema14 = RelativeStrengthIndex::new(14).unwrap();
        let faster = closes.iter().map(|&c| ema14.next(c)).last().unwrap();
        assert!(wilder > faster);
    }

    #[test]
    fn invalid_period_is_rejected() {
        assert!(matches!(
            TaIndicators::new(0, 12, 26, 9),
            Err(ConfigError::InvalidIndicator(_))
        ));
    }

    #[test]
    fn mask_warmup_drops_non_finite() {
        let masked = mask_warmup([1.0, f64::NAN, 3.0].into_iter(), 0);
        assert_eq!(masked, vec![Some(1.0), None, Some(3.0)]);
    }
}
