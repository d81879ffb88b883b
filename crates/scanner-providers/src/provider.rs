use std::time::Duration;

use async_trait::async_trait;
use scanner_core::candle::Candle;
use scanner_core::interval::Interval;

use crate::error::ProviderError;

/// A venue's public market data: its instrument universe and recent candles.
///
/// Identifiers use `BASE/QUOTE` syntax (e.g. `BTC/USDT`); implementations map
/// them to their own wire format.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Venue name (for logging/display).
    fn name(&self) -> &str;

    /// Minimum spacing between consecutive requests to respect venue rate
    /// limits. Callers enforce it; implementations never sleep.
    fn request_spacing(&self) -> Duration;

    /// All tradable spot instruments on the venue.
    async fn list_instruments(&self) -> Result<Vec<String>, ProviderError>;

    /// The most recent `count` candles, sorted ascending by timestamp.
    /// May return fewer than `count` for young instruments; the last candle
    /// is usually still forming.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, ProviderError>;
}

/// Map `BTC/USDT` (or a derivative form `BTC/USDT:USDT`) to `BTCUSDT`.
pub fn wire_symbol(symbol: &str) -> String {
    let spot = symbol.split(':').next().unwrap_or(symbol);
    spot.replace('/', "").to_uppercase()
}

pub fn join_symbol(base: &str, quote: &str) -> String {
    format!("{base}/{quote}")
}

/// Sort ascending and drop candles sharing a timestamp, keeping the last one.
pub(crate) fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.timestamp);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(prev) if prev.timestamp == candle.timestamp => *prev = candle,
            _ => out.push(candle),
        }
    }
    out
}
