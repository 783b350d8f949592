//! Emitted trading signals and their bounded rolling log.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of signals retained per symbol.
pub const DEFAULT_SIGNAL_CAP: usize = 50;

/// Discrete signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Buy,
    Sell,
    Pump,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
            SignalKind::Pump => "PUMP",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One fired signal. Immutable once created.
///
/// `index` is the buffer position at evaluation time; it is a snapshot
/// and is not rewritten when older candles are evicted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub index: usize,
    pub kind: SignalKind,
    pub price: f64,
    pub time: i64,
}

/// Rolling list of fired signals, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SignalLog {
    signals: VecDeque<Signal>,
    cap: usize,
}

impl SignalLog {
    pub fn new(cap: usize) -> Self {
        Self {
            signals: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, signal: Signal) {
        if self.signals.len() >= self.cap {
            self.signals.pop_front();
        }
        self.signals.push_back(signal);
    }

    /// Replace the whole log with the output of a fresh full pass.
    pub fn replace(&mut self, signals: Vec<Signal>) {
        self.signals.clear();
        let skip = signals.len().saturating_sub(self.cap);
        self.signals.extend(signals.into_iter().skip(skip));
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn latest(&self) -> Option<&Signal> {
        self.signals.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    pub fn to_vec(&self) -> Vec<Signal> {
        self.signals.iter().copied().collect()
    }
}

impl Default for SignalLog {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAP)
    }
}
