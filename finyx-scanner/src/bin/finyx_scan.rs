//! One-shot scan over all tradable Binance USDT perpetuals.
//!
//! Configuration via environment:
//! - `SCAN_TIMEFRAME`: candle interval, eg. `5m` (default `5m`)
//! - `SCAN_BATCH_SIZE`: symbols fetched concurrently (default 10)
//! - `SCAN_HISTORY_LIMIT`: candles fetched per symbol (default 200)
//! - `SCAN_SYMBOLS`: comma-separated symbol list overriding exchange
//!   discovery
//! - `RUST_LOG`: tracing filter (default `info`)

use std::sync::Arc;

use finyx_scanner::{BinanceFutures, MarketData, ScanConfig, Scanner, Symbol};
use finyx_signals::Timeframe;
use smol_str::SmolStr;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = ScanConfig {
        timeframe: env_parse("SCAN_TIMEFRAME", Timeframe::default()),
        batch_size: env_parse("SCAN_BATCH_SIZE", ScanConfig::default().batch_size),
        history_limit: env_parse("SCAN_HISTORY_LIMIT", ScanConfig::default().history_limit),
        ..ScanConfig::default()
    };

    let market = Arc::new(BinanceFutures::new());
    let symbols = match std::env::var("SCAN_SYMBOLS") {
        Ok(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SmolStr::new)
            .collect::<Vec<Symbol>>(),
        Err(_) => market.fetch_symbols().await?,
    };

    let scanner = Scanner::new(market, config);

    // Ctrl-C requests cooperative cancellation; the in-flight batch
    // finishes and its results are discarded.
    let handle = scanner.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested");
            handle.cancel();
        }
    });

    let result = scanner.run(&symbols).await;

    let mut ranked: Vec<_> = result.signals.iter().collect();
    ranked.sort_by_key(|(symbol, _)| symbol.as_str());
    for (symbol, signals) in ranked {
        for signal in signals {
            info!(
                %symbol,
                kind = %signal.kind,
                price = signal.price,
                time = signal.time,
                "signal"
            );
        }
    }
    info!(
        scanned = result.symbols_scanned,
        failed = result.symbols_failed,
        signals = result.total_signals(),
        cancelled = result.cancelled,
        elapsed_ms = (result.finished_at - result.started_at).num_milliseconds(),
        "scan complete"
    );

    Ok(())
}

/// Env-filtered logging, `info` unless `RUST_LOG` says otherwise.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
