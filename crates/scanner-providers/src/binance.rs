use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use scanner_core::candle::Candle;
use scanner_core::interval::Interval;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{MarketDataSource, join_symbol, normalize, wire_symbol};

const BINANCE_BASE_URL: &str = "https://api.binance.com";
const MAX_KLINE_LIMIT: usize = 1000;
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Binance public spot market data. No authentication required.
pub struct BinanceProvider {
    client: Client,
    base_url: String,
}

impl BinanceProvider {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_BASE_URL.to_string())
    }

    /// Create with a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }

    async fn send(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        // 418 is Binance's escalation after repeated 429s.
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        Ok(response)
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn interval_code(interval: Interval) -> &'static str {
    match interval {
        Interval::Minute1 => "1m",
        Interval::Minute5 => "5m",
        Interval::Minute15 => "15m",
        Interval::Hour1 => "1h",
        Interval::Hour4 => "4h",
        Interval::Day1 => "1d",
        Interval::Week1 => "1w",
    }
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

fn api_error(status: u16, body: String) -> ProviderError {
    match serde_json::from_str::<BinanceErrorBody>(&body) {
        Ok(err) if err.code == INVALID_SYMBOL_CODE => ProviderError::UnsupportedSymbol(err.msg),
        Ok(err) => ProviderError::Venue {
            code: err.code,
            message: err.msg,
        },
        Err(_) => ProviderError::Api {
            status,
            message: body,
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfo {
    symbols: Vec<BinanceSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbol {
    status: String,
    base_asset: String,
    quote_asset: String,
}

fn decimal_field(row: &[Value], index: usize, field: &str) -> Result<Decimal, ProviderError> {
    let raw = row
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Parse(format!("kline {field} missing or not a string")))?;
    Decimal::from_str(raw)
        .map_err(|e| ProviderError::Parse(format!("invalid {field} '{raw}': {e}")))
}

/// Klines are `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
fn parse_kline(row: &[Value]) -> Result<Candle, ProviderError> {
    let ms = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ProviderError::Parse("kline open time missing".into()))?;
    let timestamp = DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ProviderError::Parse(format!("invalid unix millis: {ms}")))?;

    Ok(Candle {
        timestamp,
        open: decimal_field(row, 1, "open")?,
        high: decimal_field(row, 2, "high")?,
        low: decimal_field(row, 3, "low")?,
        close: decimal_field(row, 4, "close")?,
        volume: decimal_field(row, 5, "volume")?,
    })
}

fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>, ProviderError> {
    let candles = rows
        .iter()
        .map(|row| parse_kline(row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(normalize(candles))
}

fn trading_symbols(info: ExchangeInfo) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.status == "TRADING")
        .map(|s| join_symbol(&s.base_asset, &s.quote_asset))
        .collect()
}

#[async_trait]
impl MarketDataSource for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    fn request_spacing(&self) -> Duration {
        Duration::from_millis(50)
    }

    async fn list_instruments(&self) -> Result<Vec<String>, ProviderError> {
        let info: ExchangeInfo = self
            .send("/api/v3/exchangeInfo", &[("permissions", "SPOT")])
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("failed to parse exchangeInfo: {e}")))?;

        let symbols = trading_symbols(info);
        debug!("binance: {} trading spot instrument(s)", symbols.len());
        Ok(symbols)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let limit = count.clamp(1, MAX_KLINE_LIMIT).to_string();
        let wire = wire_symbol(symbol);
        let rows: Vec<Vec<Value>> = self
            .send(
                "/api/v3/klines",
                &[
                    ("symbol", wire.as_str()),
                    ("interval", interval_code(interval)),
                    ("limit", limit.as_str()),
                ],
            )
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("failed to parse klines: {e}")))?;

        parse_klines(&rows)
    }
}
