//! Per-symbol state: reconciles stream updates into the candle buffer
//! and drives incremental signal evaluation.

use finyx_signals::{
    indicator_series, Applied, Candle, CandleBuffer, EngineConfig, IndicatorKind, Signal,
    SignalEngine, SignalLog,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::market::{CandleUpdate, Symbol};

/// A signal paired with the symbol it fired on, for fan-out to
/// downstream consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub symbol: Symbol,
    pub signal: Signal,
}

/// All mutable state for one tracked symbol.
///
/// The tracker takes updates through `&mut self`, so per-symbol writes
/// are serialized by ownership; concurrency across symbols is the
/// scanner's concern.
pub struct SymbolTracker {
    symbol: Symbol,
    buffer: CandleBuffer,
    engine: SignalEngine,
    signals: SignalLog,
    notifier: Option<mpsc::UnboundedSender<SignalEvent>>,
}

impl SymbolTracker {
    pub fn new(symbol: impl Into<Symbol>, config: EngineConfig, capacity: usize) -> Self {
        let signal_cap = config.signal_cap;
        Self {
            symbol: symbol.into(),
            buffer: CandleBuffer::new(capacity),
            engine: SignalEngine::new(config),
            signals: SignalLog::new(signal_cap),
            notifier: None,
        }
    }

    /// Forward every newly fired signal to `tx` as well as retaining it
    /// in the local log.
    pub fn with_notifier(mut self, tx: mpsc::UnboundedSender<SignalEvent>) -> Self {
        self.notifier = Some(tx);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn buffer(&self) -> &CandleBuffer {
        &self.buffer
    }

    /// Load historical closed candles and run a full evaluation pass.
    ///
    /// Candles that fail validation or do not advance the clock are
    /// dropped with a warning rather than failing the whole seed.
    /// Returns the number of candles accepted.
    pub fn seed(&mut self, history: Vec<Candle>) -> usize {
        let mut accepted = 0;
        for candle in history {
            match self.buffer.apply(candle, true) {
                Ok(Applied::Appended { evicted }) => {
                    if evicted {
                        self.engine.shift_for_eviction();
                    }
                    accepted += 1;
                }
                Ok(Applied::Replaced) => accepted += 1,
                Err(error) => {
                    warn!(symbol = %self.symbol, %error, "dropping invalid seed candle");
                }
            }
        }

        let signals = self.engine.evaluate_all(&self.buffer);
        debug!(
            symbol = %self.symbol,
            candles = self.buffer.len(),
            signals = signals.len(),
            "seeded symbol history"
        );
        self.signals.replace(signals);
        accepted
    }

    /// Reconcile one stream update into the buffer, then evaluate the
    /// newest bar.
    ///
    /// Malformed or stale updates are dropped with a warning and leave
    /// all prior state untouched.
    pub fn apply(&mut self, update: CandleUpdate) -> Option<Signal> {
        let closed = update.is_closed();
        match self.buffer.apply(update.candle, closed) {
            Ok(Applied::Appended { evicted }) => {
                if evicted {
                    self.engine.shift_for_eviction();
                }
            }
            Ok(Applied::Replaced) => {}
            Err(error) => {
                warn!(symbol = %self.symbol, %error, "dropping stream update");
                return None;
            }
        }

        let signal = self.engine.evaluate_latest(&self.buffer)?;
        info!(
            symbol = %self.symbol,
            kind = %signal.kind,
            price = signal.price,
            "signal fired"
        );
        self.signals.push(signal);

        if let Some(tx) = self.notifier.take() {
            let event = SignalEvent {
                symbol: self.symbol.clone(),
                signal,
            };
            if tx.send(event).is_ok() {
                self.notifier = Some(tx);
            } else {
                debug!(symbol = %self.symbol, "signal consumer gone, disabling notifier");
            }
        }

        Some(signal)
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.to_vec()
    }

    /// Full indicator overlay for the current buffer, one value per
    /// candle.
    pub fn indicator_series(&self, kind: IndicatorKind, period: usize) -> Vec<f64> {
        indicator_series(&self.buffer, kind, period)
    }

    pub fn latest_signal(&self) -> Option<Signal> {
        self.signals.latest().copied()
    }
}
