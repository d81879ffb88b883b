use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use scanner_core::candle::Candle;
use scanner_core::interval::Interval;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{MarketDataSource, join_symbol, normalize, wire_symbol};

const BYBIT_BASE_URL: &str = "https://api.bybit.com";
const INSTRUMENTS_PATH: &str = "/v5/market/instruments-info";
const MAX_KLINE_LIMIT: usize = 1000;
const RATE_LIMIT_RET_CODE: i64 = 10006;
const INVALID_SYMBOL_RET_CODE: i64 = 10001;

/// Bybit v5 public spot market data. No authentication required.
pub struct BybitProvider {
    client: Client,
    base_url: String,
}

impl BybitProvider {
    pub fn new() -> Self {
        Self::with_base_url(BYBIT_BASE_URL.to_string())
    }

    /// Create with a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0")
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 60,
            });
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status,
                message: body,
            });
        }

        let body: BybitResponse<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("failed to parse response: {e}")))?;
        body.into_result()
    }
}

impl Default for BybitProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Bybit's kline interval codes.
fn interval_code(interval: Interval) -> &'static str {
    match interval {
        Interval::Minute1 => "1",
        Interval::Minute5 => "5",
        Interval::Minute15 => "15",
        Interval::Hour1 => "60",
        Interval::Hour4 => "240",
        Interval::Day1 => "D",
        Interval::Week1 => "W",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitResponse<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

impl<T> BybitResponse<T> {
    fn into_result(self) -> Result<T, ProviderError> {
        match self.ret_code {
            0 => self
                .result
                .ok_or_else(|| ProviderError::Parse("no result in response".into())),
            RATE_LIMIT_RET_CODE => Err(ProviderError::RateLimited {
                retry_after_secs: 1,
            }),
            INVALID_SYMBOL_RET_CODE if self.ret_msg.to_lowercase().contains("symbol") => {
                Err(ProviderError::UnsupportedSymbol(self.ret_msg))
            }
            code => Err(ProviderError::Venue {
                code,
                message: self.ret_msg,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentsResult {
    #[serde(default)]
    list: Vec<BybitInstrument>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstrument {
    base_coin: String,
    quote_coin: String,
    status: String,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, ProviderError> {
    Decimal::from_str(value)
        .map_err(|e| ProviderError::Parse(format!("invalid {field} '{value}': {e}")))
}

/// Rows are `[startMs, open, high, low, close, volume, turnover]`, newest first.
fn parse_kline_rows(rows: &[Vec<String>]) -> Result<Vec<Candle>, ProviderError> {
    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 6 {
            return Err(ProviderError::Parse(format!(
                "kline row has {} field(s), expected at least 6",
                row.len()
            )));
        }
        let ms: i64 = row[0]
            .parse()
            .map_err(|e| ProviderError::Parse(format!("invalid start time '{}': {e}", row[0])))?;
        let timestamp = DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| ProviderError::Parse(format!("invalid unix millis: {ms}")))?;

        candles.push(Candle {
            timestamp,
            open: parse_decimal("open", &row[1])?,
            high: parse_decimal("high", &row[2])?,
            low: parse_decimal("low", &row[3])?,
            close: parse_decimal("close", &row[4])?,
            volume: parse_decimal("volume", &row[5])?,
        });
    }
    Ok(normalize(candles))
}

fn trading_symbols(instruments: Vec<BybitInstrument>) -> impl Iterator<Item = String> {
    instruments
        .into_iter()
        .filter(|i| i.status == "Trading")
        .map(|i| join_symbol(&i.base_coin, &i.quote_coin))
}

#[async_trait]
impl MarketDataSource for BybitProvider {
    fn name(&self) -> &str {
        "bybit"
    }

    fn request_spacing(&self) -> Duration {
        Duration::from_millis(20)
    }

    async fn list_instruments(&self) -> Result<Vec<String>, ProviderError> {
        let mut symbols = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: InstrumentsResult = match &cursor {
                Some(c) => {
                    self.get(INSTRUMENTS_PATH, &[("category", "spot"), ("cursor", c.as_str())])
                        .await?
                }
                None => self.get(INSTRUMENTS_PATH, &[("category", "spot")]).await?,
            };
            symbols.extend(trading_symbols(page.list));

            match page.next_page_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("bybit: {} trading spot instrument(s)", symbols.len());
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
        let result: KlineResult = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", "spot"),
                    ("symbol", wire.as_str()),
                    ("interval", interval_code(interval)),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        parse_kline_rows(&result.list)
    }
}
