use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use scanner_core::anomaly::{self, Match};
use scanner_core::baseline;
use scanner_core::candle::Candle;
use scanner_core::config::{ScanConfig, ScanParams};
use scanner_core::error::ConfigError;
use scanner_core::indicator::{IndicatorProvider, TaIndicators};
use scanner_core::series;
use scanner_providers::provider::MarketDataSource;
use scanner_providers::venue::create_source;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{ScanError, SkipReason};
use crate::pacing::RateGate;

/// An instrument that dropped out of a scan and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub symbol: String,
    pub reason: SkipReason,
}

/// Full outcome of one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub venue: String,
    /// In universe order.
    pub matches: Vec<Match>,
    pub skipped: Vec<Skipped>,
    /// Instruments that passed the quote-currency filter and were evaluated.
    pub scanned: usize,
    /// Instruments rejected by the quote-currency filter.
    pub filtered: usize,
}

/// Scans a venue's instruments for high-demand anomalies.
///
/// Each instrument is fetched and evaluated independently; failures are
/// recorded as skips and never abort the scan.
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    indicators: Arc<dyn IndicatorProvider>,
    config: ScanConfig,
    gate: RateGate,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        indicators: Arc<dyn IndicatorProvider>,
        config: ScanConfig,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        let gate = RateGate::new(source.request_spacing());
        Ok(Self {
            source,
            indicators,
            config,
            gate,
        })
    }

    /// Scanner over a built-in venue with the default RSI/MACD indicators.
    pub fn for_venue(venue: &str, config: ScanConfig) -> Result<Self, ScanError> {
        let source =
            create_source(venue).map_err(|_| ConfigError::UnknownVenue(venue.to_string()))?;
        Self::new(source, Arc::new(TaIndicators::default()), config)
    }

    pub fn venue(&self) -> &str {
        self.source.name()
    }

    /// Scan the venue's whole universe and return the matches.
    pub async fn scan(&self, params: &ScanParams) -> Result<Vec<Match>, ScanError> {
        let report = self.scan_report(params, &CancelSignal::new()).await?;
        Ok(report.matches)
    }

    /// Scan the venue's whole universe, keeping skip diagnostics.
    pub async fn scan_report(
        &self,
        params: &ScanParams,
        cancel: &CancelSignal,
    ) -> Result<ScanReport, ScanError> {
        params.validate()?;

        let universe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            listed = self.source.list_instruments() => listed.map_err(|source| ScanError::Universe {
                venue: self.venue().to_string(),
                source,
            })?,
        };

        self.scan_universe(&universe, params, cancel).await
    }

    /// Scan a caller-supplied list of instruments, in the given order.
    pub async fn scan_universe(
        &self,
        universe: &[String],
        params: &ScanParams,
        cancel: &CancelSignal,
    ) -> Result<ScanReport, ScanError> {
        params.validate()?;
        let params = *params;

        let candidates: Vec<&str> = universe
            .iter()
            .map(String::as_str)
            .filter(|s| self.config.accepts(s))
            .collect();
        let filtered = universe.len() - candidates.len();

        info!(
            venue = self.venue(),
            candidates = candidates.len(),
            filtered,
            lookback = params.lookback,
            volume_mult = params.volume_mult,
            return_mult = params.return_mult,
            "Starting scan"
        );

        // `buffered` keeps universe order while up to `concurrency`
        // instruments are in flight.
        let mut outcomes = pin!(
            stream::iter(candidates)
                .map(move |symbol| async move {
                    (symbol, self.scan_instrument(symbol, &params).await)
                })
                .buffered(self.config.concurrency)
        );

        let mut report = ScanReport {
            venue: self.venue().to_string(),
            matches: Vec::new(),
            skipped: Vec::new(),
            scanned: 0,
            filtered,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(venue = self.venue(), scanned = report.scanned, "Scan cancelled");
                    return Err(ScanError::Cancelled);
                }
                next = outcomes.next() => next,
            };
            let Some((symbol, outcome)) = next else {
                break;
            };

            report.scanned += 1;
            match outcome {
                Ok(Some(found)) => {
                    info!(
                        symbol,
                        volume = found.current_volume,
                        return_pct = found.current_return_pct,
                        "High-demand match"
                    );
                    report.matches.push(found);
                }
                Ok(None) => debug!(symbol, "No anomaly"),
                Err(reason) => {
                    debug!(symbol, %reason, "Skipped");
                    report.skipped.push(Skipped {
                        symbol: symbol.to_string(),
                        reason,
                    });
                }
            }
        }

        info!(
            venue = self.venue(),
            scanned = report.scanned,
            matches = report.matches.len(),
            skipped = report.skipped.len(),
            "Scan complete"
        );
        Ok(report)
    }

    async fn fetch(&self, symbol: &str, count: usize) -> Result<Vec<Candle>, SkipReason> {
        self.gate.wait().await;
        let fetch = self
            .source
            .fetch_candles(symbol, self.config.interval, count);
        let candles = match self.config.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| SkipReason::Timeout(limit))??,
            None => fetch.await?,
        };
        Ok(candles)
    }

    async fn scan_instrument(
        &self,
        symbol: &str,
        params: &ScanParams,
    ) -> Result<Option<Match>, SkipReason> {
        debug!(symbol, "Scanning");
        let candles = self
            .fetch(symbol, self.config.candle_count(params.lookback))
            .await?;

        let required = params.lookback.saturating_add(1);
        if candles.len() < required {
            return Err(SkipReason::InsufficientHistory {
                available: candles.len(),
                required,
            });
        }

        let series = series::build(&candles, self.indicators.as_ref())?;
        let baseline = baseline::estimate(&series, params.lookback).ok_or(
            SkipReason::NoBaseline {
                lookback: params.lookback,
            },
        )?;
        Ok(anomaly::evaluate(symbol, &series, &baseline, params)?)
    }
}

/// One scan cycle over a built-in venue with default settings.
pub async fn scan(
    venue: &str,
    volume_mult: f64,
    return_mult: f64,
    lookback: usize,
) -> Result<Vec<Match>, ScanError> {
    let params = ScanParams {
        volume_mult,
        return_mult,
        lookback,
    };
    params.validate()?;
    Scanner::for_venue(venue, ScanConfig::default())?
        .scan(&params)
        .await
}
