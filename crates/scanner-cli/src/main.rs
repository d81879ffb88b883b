use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scanner_core::anomaly::Match;
use scanner_core::config::{ScanConfig, ScanParams};
use scanner_core::interval::Interval;
use scanner_engine::cancel::CancelSignal;
use scanner_engine::error::ScanError;
use scanner_engine::scan::{ScanReport, Scanner};
use scanner_providers::venue::{DEFAULT_VENUE, SUPPORTED_VENUES};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "crypto-scanner",
    about = "Scan crypto venues for high-demand volume and return anomalies"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan and print the matches
    Scan(ScanArgs),

    /// Re-run the scan on a fixed period until interrupted
    Watch {
        #[command(flatten)]
        scan: ScanArgs,

        /// Minutes between scans
        #[arg(long, default_value_t = 15)]
        every_mins: u64,
    },

    /// List supported venues
    Venues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Venue to scan
    #[arg(long, default_value = DEFAULT_VENUE)]
    venue: String,

    /// Volume threshold in standard deviations above the mean
    #[arg(long, default_value_t = 2.0)]
    volume_mult: f64,

    /// Return threshold in standard deviations above the mean
    #[arg(long, default_value_t = 2.0)]
    return_mult: f64,

    /// Number of prior candles forming the baseline
    #[arg(long, default_value_t = 20)]
    lookback: usize,

    /// Quote currencies to keep (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "USDT")]
    quote: Vec<String>,

    /// Candle interval (1m, 5m, 15m, 1h, 4h, 1d, 1w)
    #[arg(long, default_value = "1d")]
    interval: Interval,

    /// Instruments fetched at once
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Per-instrument fetch timeout in seconds
    #[arg(long)]
    fetch_timeout_secs: Option<u64>,

    /// Abandon a scan that runs longer than this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Scan only these instruments, e.g. BTC/USDT,ETH/USDT (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl ScanArgs {
    fn params(&self) -> ScanParams {
        ScanParams {
            volume_mult: self.volume_mult,
            return_mult: self.return_mult,
            lookback: self.lookback,
        }
    }

    fn config(&self) -> ScanConfig {
        ScanConfig {
            quote_currencies: self.quote.iter().map(|q| q.trim().to_uppercase()).collect(),
            interval: self.interval,
            concurrency: self.concurrency,
            fetch_timeout: self.fetch_timeout_secs.map(Duration::from_secs),
            ..ScanConfig::default()
        }
    }

    fn scanner(&self) -> Result<Scanner> {
        let params = self.params();
        params.validate().context("invalid scan parameters")?;
        Scanner::for_venue(&self.venue, self.config()).context("invalid scan configuration")
    }
}

/// A signal for one scan cycle, tripped by `stop` or by the deadline.
fn cycle_signal(stop: &CancelSignal, deadline: Option<Duration>) -> (CancelSignal, JoinHandle<()>) {
    let cycle = CancelSignal::new();
    let (stop, trip) = (stop.clone(), cycle.clone());
    let handle = tokio::spawn(async move {
        match deadline {
            Some(deadline) => tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(deadline) => warn!("Scan deadline of {deadline:?} reached"),
            },
            None => stop.cancelled().await,
        }
        trip.cancel();
    });
    (cycle, handle)
}

async fn run_cycle(
    scanner: &Scanner,
    args: &ScanArgs,
    stop: &CancelSignal,
) -> Result<ScanReport, ScanError> {
    let (cancel, watchdog) = cycle_signal(stop, args.timeout_secs.map(Duration::from_secs));
    let params = args.params();
    let report = match &args.symbols {
        Some(symbols) => {
            let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
            scanner.scan_universe(&symbols, &params, &cancel).await
        }
        None => scanner.scan_report(&params, &cancel).await,
    };
    watchdog.abort();
    report
}

fn format_volume(value: f64) -> String {
    format!("{value:.2}")
}

fn render_table(matches: &[Match]) -> String {
    if matches.is_empty() {
        return "No high-demand instruments found.".to_string();
    }

    let headers = [
        "Symbol",
        "Current Volume",
        "Normal Volume",
        "Current Return (%)",
        "Normal Return (%)",
        "RSI",
        "MACD",
        "Timestamp",
    ];
    let rows: Vec<[String; 8]> = matches
        .iter()
        .map(|m| {
            [
                m.symbol.clone(),
                format_volume(m.current_volume),
                format_volume(m.normal_volume),
                format!("{:.2}", m.current_return_pct),
                format!("{:.2}", m.normal_return_pct),
                format!("{:.2}", m.rsi),
                format!("{:.4}", m.macd),
                m.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                // Text columns left-aligned, numbers right-aligned.
                if i == 0 || i == 7 {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

fn print_report(report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_table(&report.matches));
            println!(
                "\n{}: {} scanned, {} match(es), {} skipped",
                report.venue,
                report.scanned,
                report.matches.len(),
                report.skipped.len()
            );
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report.matches)
                .context("failed to serialize matches")?;
            println!("{json}");
        }
    }
    Ok(())
}

async fn cmd_scan(args: &ScanArgs, stop: &CancelSignal) -> Result<()> {
    let scanner = args.scanner()?;
    info!("Scanning {} for high-demand instruments", scanner.venue());
    let report = run_cycle(&scanner, args, stop)
        .await
        .with_context(|| format!("scan of {} failed", scanner.venue()))?;
    print_report(&report, args.format)
}

async fn cmd_watch(args: &ScanArgs, every_mins: u64, stop: &CancelSignal) -> Result<()> {
    if every_mins == 0 {
        anyhow::bail!("--every-mins must be at least 1");
    }
    let scanner = args.scanner()?;
    let period = Duration::from_secs(every_mins * 60);
    info!(
        "Watching {} every {every_mins} minute(s); Ctrl-C to stop",
        scanner.venue()
    );

    loop {
        match run_cycle(&scanner, args, stop).await {
            Ok(report) => print_report(&report, args.format)?,
            Err(ScanError::Cancelled) if stop.is_cancelled() => break,
            Err(e @ ScanError::Config(_)) => return Err(e).context("invalid scan configuration"),
            Err(e) => warn!("Scan cycle failed: {e}"),
        }

        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }

    info!("Stopped watching {}", scanner.venue());
    Ok(())
}

fn cmd_venues() {
    for venue in SUPPORTED_VENUES {
        if *venue == DEFAULT_VENUE {
            println!("{venue} (default)");
        } else {
            println!("{venue}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let stop = CancelSignal::new();
    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match &cli.command {
        Commands::Scan(args) => cmd_scan(args, &stop).await?,
        Commands::Watch { scan, every_mins } => cmd_watch(scan, *every_mins, &stop).await?,
        Commands::Venues => cmd_venues(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_scan_defaults() {
        let cli = Cli::try_parse_from(["crypto-scanner", "scan"]).unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.venue, "bybit");
                assert_eq!(args.volume_mult, 2.0);
                assert_eq!(args.return_mult, 2.0);
                assert_eq!(args.lookback, 20);
                assert_eq!(args.quote, vec!["USDT"]);
                assert_eq!(args.interval, Interval::Day1);
                assert_eq!(args.concurrency, 1);
                assert!(args.symbols.is_none());
                assert!(args.timeout_secs.is_none());
                assert_eq!(args.format, OutputFormat::Table);
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn parse_scan_args() {
        let cli = Cli::try_parse_from([
            "crypto-scanner",
            "scan",
            "--venue",
            "binance",
            "--volume-mult",
            "3",
            "--return-mult",
            "1.5",
            "--lookback",
            "30",
            "--quote",
            "USDT,USDC",
            "--interval",
            "4h",
            "-s",
            "BTC/USDT,ETH/USDT",
            "--timeout-secs",
            "120",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.venue, "binance");
                assert_eq!(args.volume_mult, 3.0);
                assert_eq!(args.return_mult, 1.5);
                assert_eq!(args.lookback, 30);
                assert_eq!(args.quote, vec!["USDT", "USDC"]);
                assert_eq!(args.interval, Interval::Hour4);
                assert_eq!(
                    args.symbols,
                    Some(vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()])
                );
                assert_eq!(args.timeout_secs, Some(120));
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn parse_watch_args() {
        let cli =
            Cli::try_parse_from(["crypto-scanner", "watch", "--every-mins", "5"]).unwrap();
        match cli.command {
            Commands::Watch { scan, every_mins } => {
                assert_eq!(every_mins, 5);
                assert_eq!(scan.lookback, 20);
            }
            _ => panic!("expected Watch command"),
        }
    }

    #[test]
    fn parse_watch_default_period() {
        let cli = Cli::try_parse_from(["crypto-scanner", "watch"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watch { every_mins: 15, .. }
        ));
    }

    #[test]
    fn parse_venues() {
        let cli = Cli::try_parse_from(["crypto-scanner", "venues"]).unwrap();
        assert!(matches!(cli.command, Commands::Venues));
    }

    #[test]
    fn rejects_bad_interval() {
        assert!(Cli::try_parse_from(["crypto-scanner", "scan", "--interval", "3d"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_lookback() {
        assert!(Cli::try_parse_from(["crypto-scanner", "scan", "--lookback", "many"]).is_err());
    }

    #[test]
    fn quote_list_is_normalized_into_config() {
        let cli =
            Cli::try_parse_from(["crypto-scanner", "scan", "--quote", "usdt, usdc"]).unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("expected Scan command");
        };
        assert_eq!(args.config().quote_currencies, vec!["USDT", "USDC"]);
        assert_eq!(args.config().history_padding, 10);
    }

    #[test]
    fn unknown_venue_fails_before_scanning() {
        let cli =
            Cli::try_parse_from(["crypto-scanner", "scan", "--venue", "mtgox"]).unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("expected Scan command");
        };
        assert!(args.scanner().is_err());
    }

    #[test]
    fn zero_lookback_fails_before_scanning() {
        let cli = Cli::try_parse_from(["crypto-scanner", "scan", "--lookback", "0"]).unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("expected Scan command");
        };
        assert!(args.scanner().is_err());
    }

    #[test]
    fn table_lists_matches_under_headers() {
        let m = Match {
            symbol: "BTC/USDT".into(),
            current_volume: 5000.0,
            normal_volume: 1000.0,
            current_return_pct: 12.35,
            normal_return_pct: 1.0,
            rsi: 71.5,
            macd: 0.1235,
            timestamp: "2025-01-21T00:00:00Z".parse().unwrap(),
        };
        let table = render_table(&[m]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Symbol"));
        assert!(lines[0].contains("Current Return (%)"));
        assert!(lines[2].starts_with("BTC/USDT"));
        assert!(lines[2].contains("5000.00"));
        assert!(lines[2].contains("12.35"));
        assert!(lines[2].contains("0.1235"));
        assert!(lines[2].ends_with("2025-01-21 00:00"));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render_table(&[]), "No high-demand instruments found.");
    }

    #[tokio::test]
    async fn cycle_signal_follows_stop() {
        let stop = CancelSignal::new();
        let (cycle, _handle) = cycle_signal(&stop, None);
        assert!(!cycle.is_cancelled());
        stop.cancel();
        tokio::time::timeout(Duration::from_secs(1), cycle.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cycle_signal_trips_at_deadline() {
        let stop = CancelSignal::new();
        let (cycle, _handle) = cycle_signal(&stop, Some(Duration::from_millis(10)));
        tokio::time::timeout(Duration::from_secs(1), cycle.cancelled())
            .await
            .unwrap();
        assert!(!stop.is_cancelled());
    }
}
