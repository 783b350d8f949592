//! Batched multi-symbol scan orchestration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use finyx_signals::{EngineConfig, Signal, StrategyKind, Timeframe, DEFAULT_CAPACITY};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::MarketError;
use crate::market::{MarketData, Symbol};
use crate::tracker::SymbolTracker;

/// Default symbols fetched concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default historical candles requested per symbol.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Quote-asset majors scanned ahead of the long tail.
const MAJOR_BASES: [&str; 10] = [
    "BTC", "ETH", "BNB", "SOL", "ADA", "DOT", "LINK", "AVAX", "MATIC", "ATOM",
];

/// One scan run's parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub timeframe: Timeframe,
    pub strategy: StrategyKind,
    pub batch_size: usize,
    pub history_limit: usize,
    pub capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::default(),
            strategy: StrategyKind::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ScanConfig {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timeframe: self.timeframe,
            strategy: self.strategy,
            ..EngineConfig::default()
        }
    }
}

/// Aggregated outcome of one scan run.
///
/// `signals` holds only symbols that produced at least one signal; a
/// successfully scanned quiet symbol counts toward `symbols_scanned`
/// without an entry here.
#[derive(Debug, Serialize)]
pub struct ScanResult {
    pub timeframe: Timeframe,
    pub signals: HashMap<Symbol, Vec<Signal>>,
    pub symbols_scanned: usize,
    pub symbols_failed: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn total_signals(&self) -> usize {
        self.signals.values().map(Vec::len).sum()
    }
}

/// Cloneable cancellation flag for an in-progress scan.
///
/// Cancellation is cooperative: the batch in flight when the flag is
/// raised runs to completion and its results are discarded.
#[derive(Debug, Clone, Default)]
pub struct ScanHandle(Arc<AtomicBool>);

impl ScanHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives batched historical scans over a [`MarketData`] backend.
pub struct Scanner {
    market: Arc<dyn MarketData>,
    config: ScanConfig,
    handle: ScanHandle,
}

impl Scanner {
    pub fn new(market: Arc<dyn MarketData>, config: ScanConfig) -> Self {
        Self {
            market,
            config,
            handle: ScanHandle::default(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Handle for cancelling a run from another task.
    pub fn handle(&self) -> ScanHandle {
        self.handle.clone()
    }

    /// Scan every symbol, majors first, in concurrent batches.
    ///
    /// Per-symbol failures are logged and counted; they never abort the
    /// run.
    pub async fn run(&self, symbols: &[Symbol]) -> ScanResult {
        let started_at = Utc::now();
        let ordered = prioritize(symbols);
        info!(
            symbols = ordered.len(),
            timeframe = %self.config.timeframe,
            batch_size = self.config.batch_size,
            "starting scan"
        );

        let mut result = ScanResult {
            timeframe: self.config.timeframe,
            signals: HashMap::new(),
            symbols_scanned: 0,
            symbols_failed: 0,
            cancelled: false,
            started_at,
            finished_at: started_at,
        };

        let batch_size = self.config.batch_size.max(1);
        for batch in ordered.chunks(batch_size) {
            if self.handle.is_cancelled() {
                result.cancelled = true;
                break;
            }

            let outcomes = join_all(batch.iter().map(|symbol| self.scan_symbol(symbol))).await;

            // A cancel raised mid-batch lets the requests finish but
            // discards what they produced.
            if self.handle.is_cancelled() {
                result.cancelled = true;
                break;
            }

            for (symbol, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(signals) => {
                        result.symbols_scanned += 1;
                        if !signals.is_empty() {
                            result.signals.insert(symbol.clone(), signals);
                        }
                    }
                    Err(error) => {
                        result.symbols_failed += 1;
                        warn!(%symbol, %error, "symbol scan failed");
                    }
                }
            }
        }

        result.finished_at = Utc::now();
        info!(
            scanned = result.symbols_scanned,
            failed = result.symbols_failed,
            signals = result.total_signals(),
            cancelled = result.cancelled,
            "scan finished"
        );
        result
    }

    async fn scan_symbol(&self, symbol: &Symbol) -> Result<Vec<Signal>, MarketError> {
        let candles = self
            .market
            .fetch_candles(symbol, self.config.timeframe, self.config.history_limit)
            .await?;

        let mut tracker =
            SymbolTracker::new(symbol.clone(), self.config.engine_config(), self.config.capacity);
        let accepted = tracker.seed(candles);
        debug!(%symbol, candles = accepted, "scanned symbol");
        Ok(tracker.signals())
    }
}

/// Stable reorder putting major-base symbols ahead of the long tail.
pub fn prioritize(symbols: &[Symbol]) -> Vec<Symbol> {
    let is_major =
        |symbol: &Symbol| MAJOR_BASES.iter().any(|base| symbol.starts_with(base));

    let mut ordered: Vec<Symbol> = symbols.iter().filter(|s| is_major(s)).cloned().collect();
    ordered.extend(symbols.iter().filter(|s| !is_major(s)).cloned());
    ordered
}
