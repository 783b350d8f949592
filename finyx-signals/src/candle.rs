//! OHLCV candle record and the capacity-bounded rolling buffer.
//!
//! Candles are validated once at ingestion; indicator math assumes the
//! invariants hold and never re-checks them.

use std::collections::VecDeque;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default rolling buffer capacity.
pub const DEFAULT_CAPACITY: usize = 500;

/// One fixed-duration OHLCV aggregation.
///
/// `time` is the candle open time in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Check the OHLCV invariants: `low <= min(open, close)`,
    /// `high >= max(open, close)`, `volume >= 0`, finite fields.
    pub fn validate(&self) -> Result<(), CandleError> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(CandleError::Malformed {
                time: self.time,
                reason: "non-finite field",
            });
        }
        if self.low > self.open.min(self.close) {
            return Err(CandleError::Malformed {
                time: self.time,
                reason: "low above body",
            });
        }
        if self.high < self.open.max(self.close) {
            return Err(CandleError::Malformed {
                time: self.time,
                reason: "high below body",
            });
        }
        if self.volume < 0.0 {
            return Err(CandleError::Malformed {
                time: self.time,
                reason: "negative volume",
            });
        }
        Ok(())
    }

    /// Close above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Extract a single field value.
    pub fn field(&self, field: CandleField) -> f64 {
        match field {
            CandleField::Open => self.open,
            CandleField::High => self.high,
            CandleField::Low => self.low,
            CandleField::Close => self.close,
            CandleField::Volume => self.volume,
        }
    }
}

/// Field selector for windowed indicator functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

/// Errors rejected at candle ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandleError {
    #[error("malformed candle at {time}: {reason}")]
    Malformed { time: i64, reason: &'static str },

    #[error("stale candle timestamp {time}, buffer last is {last}")]
    StaleTimestamp { time: i64, last: i64 },
}

/// Outcome of applying one candle to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new candle was appended; `evicted` is set when the oldest
    /// candle was trimmed to stay within capacity.
    Appended { evicted: bool },
    /// The newest candle was replaced in place (same timestamp).
    Replaced,
}

/// Ordered, time-indexed rolling buffer of candles.
///
/// Insertion order is chronological order; the newest candle may still
/// be forming ("open") and is the only candle that is ever mutated.
/// Any per-index indicator values cached by callers become stale at or
/// after an index mutated by [`CandleBuffer::apply`].
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: VecDeque<Candle>,
    capacity: usize,
    last_open: bool,
}

impl CandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
            last_open: false,
        }
    }

    /// Seed the buffer from an oldest-to-newest history of closed
    /// candles. Candles that fail validation or do not advance the
    /// clock are rejected.
    pub fn seed(capacity: usize, history: Vec<Candle>) -> Result<Self, CandleError> {
        let mut buffer = Self::new(capacity);
        for candle in history {
            buffer.apply(candle, true)?;
        }
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Whether the newest candle is still forming.
    pub fn last_is_open(&self) -> bool {
        self.last_open
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Apply one incremental candle, `closed` marking whether the
    /// upstream feed has finalized it.
    ///
    /// Same timestamp as the newest candle replaces it in place; a newer
    /// timestamp appends (evicting the oldest candle beyond capacity);
    /// an older timestamp is rejected as stale.
    pub fn apply(&mut self, candle: Candle, closed: bool) -> Result<Applied, CandleError> {
        candle.validate()?;

        match self.candles.back() {
            Some(last) if candle.time == last.time => {
                *self.candles.back_mut().expect("back checked above") = candle;
                self.last_open = !closed;
                Ok(Applied::Replaced)
            }
            Some(last) if candle.time < last.time => Err(CandleError::StaleTimestamp {
                time: candle.time,
                last: last.time,
            }),
            _ => {
                let evicted = if self.candles.len() >= self.capacity {
                    self.candles.pop_front();
                    true
                } else {
                    false
                };
                self.candles.push_back(candle);
                self.last_open = !closed;
                Ok(Applied::Appended { evicted })
            }
        }
    }
}

impl Index<usize> for CandleBuffer {
    type Output = Candle;

    fn index(&self, index: usize) -> &Candle {
        &self.candles[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_validate_rejects_low_above_body() {
        let malformed = Candle {
            time: 0,
            open: 100.0,
            high: 105.0,
            low: 101.0,
            close: 102.0,
            volume: 1.0,
        };
        assert!(matches!(
            malformed.validate(),
            Err(CandleError::Malformed { reason: "low above body", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_volume() {
        let mut c = candle(0, 100.0);
        c.volume = -1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_apply_replace_vs_append() {
        let mut buffer = CandleBuffer::new(10);

        assert_eq!(
            buffer.apply(candle(1000, 100.0), false).unwrap(),
            Applied::Appended { evicted: false }
        );
        assert!(buffer.last_is_open());

        // Closed update with the same timestamp finalizes in place.
        assert_eq!(
            buffer.apply(candle(1000, 101.0), true).unwrap(),
            Applied::Replaced
        );
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last().unwrap().close, 101.0);
        assert!(!buffer.last_is_open());

        // Two consecutive closed candles with increasing timestamps.
        buffer.apply(candle(2000, 102.0), true).unwrap();
        buffer.apply(candle(3000, 103.0), true).unwrap();
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_apply_rejects_stale_timestamp() {
        let mut buffer = CandleBuffer::new(10);
        buffer.apply(candle(2000, 100.0), true).unwrap();

        let err = buffer.apply(candle(1000, 99.0), true).unwrap_err();
        assert_eq!(err, CandleError::StaleTimestamp { time: 1000, last: 2000 });
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut buffer = CandleBuffer::new(500);
        for i in 0..501 {
            let applied = buffer.apply(candle(i * 1000, 100.0), true).unwrap();
            if i == 500 {
                assert_eq!(applied, Applied::Appended { evicted: true });
            }
        }
        assert_eq!(buffer.len(), 500);
        assert_eq!(buffer[0].time, 1000);
        assert_eq!(buffer.last().unwrap().time, 500_000);
    }

    #[test]
    fn test_seed_orders_chronologically() {
        let history = (0..5).map(|i| candle(i * 1000, 100.0 + i as f64)).collect();
        let buffer = CandleBuffer::seed(100, history).unwrap();
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.last_is_open());
        assert_eq!(buffer[4].close, 104.0);
    }
}
