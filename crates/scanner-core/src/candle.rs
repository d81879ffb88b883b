use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV candle for one instrument. Volume is in base-asset units
/// and may be fractional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// `(close - open) / open`, or `None` when `open` is not positive or the
    /// quotient does not fit in a `Decimal`.
    pub fn intra_return(&self) -> Option<Decimal> {
        if self.open <= Decimal::ZERO {
            return None;
        }
        self.close.checked_sub(self.open)?.checked_div(self.open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, close: Decimal) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: dec!(12.5),
        }
    }

    #[test]
    fn intra_return_is_signed() {
        assert_eq!(candle(dec!(100), dec!(105)).intra_return(), Some(dec!(0.05)));
        assert_eq!(candle(dec!(100), dec!(90)).intra_return(), Some(dec!(-0.1)));
    }

    #[test]
    fn intra_return_undefined_for_non_positive_open() {
        assert_eq!(candle(dec!(0), dec!(1)).intra_return(), None);
        assert_eq!(candle(dec!(-2), dec!(1)).intra_return(), None);
    }

    #[test]
    fn intra_return_undefined_when_quotient_overflows() {
        let tiny = dec!(0.0000000000000000000000000001);
        assert_eq!(candle(tiny, dec!(100)).intra_return(), None);
    }
}
