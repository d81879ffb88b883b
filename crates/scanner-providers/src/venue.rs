use std::sync::Arc;

use crate::binance::BinanceProvider;
use crate::bybit::BybitProvider;
use crate::error::ProviderError;
use crate::provider::MarketDataSource;

/// Venues with a built-in market-data source.
pub const SUPPORTED_VENUES: &[&str] = &["bybit", "binance"];

pub const DEFAULT_VENUE: &str = "bybit";

/// Construct the market-data source for a venue name (case-insensitive).
pub fn create_source(venue: &str) -> Result<Arc<dyn MarketDataSource>, ProviderError> {
    match venue.to_lowercase().as_str() {
        "bybit" => Ok(Arc::new(BybitProvider::new())),
        "binance" => Ok(Arc::new(BinanceProvider::new())),
        _ => Err(ProviderError::UnknownVenue(venue.to_string())),
    }
}
