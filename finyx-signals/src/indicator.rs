//! Pure, index-addressed indicator functions over a candle buffer.
//!
//! Every function is referentially transparent: the same buffer and
//! index always produce the same value, which is what lets the engine
//! recompute prior-index classifications instead of caching them.
//!
//! Insufficient-history behaviour is deliberate and load-bearing:
//! windowed means/extremes degrade to the first stored value, `ema`
//! degrades to the raw close and `rsi` to neutral 50. Callers treat
//! these as "not enough data" sentinels rather than failures.

use crate::candle::{CandleBuffer, CandleField};

/// Canonical Fibonacci retracement fractions.
pub const FIB_FRACTIONS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Arithmetic mean of `field` over the trailing `period` candles.
pub fn sma(candles: &CandleBuffer, index: usize, period: usize, field: CandleField) -> f64 {
    if index + 1 < period {
        return candles[0].field(field);
    }
    let start = index + 1 - period;
    let sum: f64 = (start..=index).map(|i| candles[i].field(field)).sum();
    sum / period as f64
}

/// Exponential moving average of closes, seeded from the close at
/// `index - period` and rolled forward.
///
/// When `index < period` this returns the raw close at `index`. That is
/// an approximation, not a true EMA, and is kept bit-for-bit compatible
/// with the historical signal output.
pub fn ema(candles: &CandleBuffer, index: usize, period: usize) -> f64 {
    if index < period {
        return candles[index].close;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut value = candles[index - period].close;
    for i in (index - period + 1)..=index {
        value = candles[i].close * multiplier + value * (1.0 - multiplier);
    }
    value
}

/// Relative Strength Index over the trailing `period` closes.
///
/// Neutral 50 below `period` candles of history; exactly 100 when the
/// trailing window has no losing bar.
pub fn rsi(candles: &CandleBuffer, index: usize, period: usize) -> f64 {
    if index < period {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (index - period + 1)..=index {
        let change = candles[i].close - candles[i - 1].close;
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// MACD line, signal and histogram at one index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD(12, 26) with the signal taken as the mean of the line over the
/// trailing 9 positions (fewer near the start of the buffer).
pub fn macd(candles: &CandleBuffer, index: usize) -> Macd {
    let line = ema(candles, index, 12) - ema(candles, index, 26);

    let start = index.saturating_sub(8);
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in start..=index {
        sum += ema(candles, i, 12) - ema(candles, i, 26);
        count += 1;
    }
    let signal = sum / count as f64;

    Macd {
        line,
        signal,
        histogram: line - signal,
    }
}

/// Maximum of `field` over the trailing `period` candles.
pub fn highest(candles: &CandleBuffer, index: usize, period: usize, field: CandleField) -> f64 {
    if index + 1 < period {
        return candles[0].field(field);
    }
    let start = index + 1 - period;
    (start..=index)
        .map(|i| candles[i].field(field))
        .fold(f64::MIN, f64::max)
}

/// Minimum of `field` over the trailing `period` candles.
pub fn lowest(candles: &CandleBuffer, index: usize, period: usize, field: CandleField) -> f64 {
    if index + 1 < period {
        return candles[0].field(field);
    }
    let start = index + 1 - period;
    (start..=index)
        .map(|i| candles[i].field(field))
        .fold(f64::MAX, f64::min)
}

/// Confirmed pivot high: the high at `index` strictly exceeds every high
/// in the `lookback` candles on both sides.
///
/// Candles near the end of the buffer cannot yet be confirmed and
/// return false until enough future candles exist. This is a delayed
/// two-sided detector, not causal in real time.
pub fn pivot_high(candles: &CandleBuffer, index: usize, lookback: usize) -> bool {
    if index < lookback || index + lookback >= candles.len() {
        return false;
    }
    let current = candles[index].high;
    for i in (index - lookback)..index {
        if candles[i].high >= current {
            return false;
        }
    }
    for i in (index + 1)..=(index + lookback) {
        if candles[i].high >= current {
            return false;
        }
    }
    true
}

/// Confirmed pivot low; mirror of [`pivot_high`].
pub fn pivot_low(candles: &CandleBuffer, index: usize, lookback: usize) -> bool {
    if index < lookback || index + lookback >= candles.len() {
        return false;
    }
    let current = candles[index].low;
    for i in (index - lookback)..index {
        if candles[i].low <= current {
            return false;
        }
    }
    for i in (index + 1)..=(index + lookback) {
        if candles[i].low <= current {
            return false;
        }
    }
    true
}

/// Fibonacci retracement range over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fibonacci {
    pub high: f64,
    pub low: f64,
}

impl Fibonacci {
    /// Price at one retracement fraction: `high - (high - low) * f`.
    pub fn level(&self, fraction: f64) -> f64 {
        self.high - (self.high - self.low) * fraction
    }

    /// All canonical levels, paired with their fractions.
    pub fn levels(&self) -> [(f64, f64); 7] {
        FIB_FRACTIONS.map(|f| (f, self.level(f)))
    }
}

/// Retracement range from the trailing `lookback` highs and lows.
pub fn fibonacci(candles: &CandleBuffer, index: usize, lookback: usize) -> Fibonacci {
    Fibonacci {
        high: highest(candles, index, lookback, CandleField::High),
        low: lowest(candles, index, lookback, CandleField::Low),
    }
}

/// Indicator selector for chart-overlay series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    MacdLine,
    MacdSignal,
    MacdHistogram,
}

/// Compute one indicator across the whole buffer, for chart overlays.
///
/// `period` is ignored by the MACD kinds (fixed 12/26/9).
pub fn indicator_series(candles: &CandleBuffer, kind: IndicatorKind, period: usize) -> Vec<f64> {
    (0..candles.len())
        .map(|i| match kind {
            IndicatorKind::Sma => sma(candles, i, period, CandleField::Close),
            IndicatorKind::Ema => ema(candles, i, period),
            IndicatorKind::Rsi => rsi(candles, i, period),
            IndicatorKind::MacdLine => macd(candles, i).line,
            IndicatorKind::MacdSignal => macd(candles, i).signal,
            IndicatorKind::MacdHistogram => macd(candles, i).histogram,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Candle;

    fn buffer_from_closes(closes: &[f64]) -> CandleBuffer {
        let history = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: i as i64 * 60_000,
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect();
        CandleBuffer::seed(1000, history).unwrap()
    }

    #[test]
    fn test_sma_mean_and_sentinel() {
        let candles = buffer_from_closes(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(sma(&candles, 3, 4, CandleField::Close), 25.0);
        assert_eq!(sma(&candles, 3, 2, CandleField::Close), 35.0);
        // Not enough history: degrades to the first stored value.
        assert_eq!(sma(&candles, 1, 4, CandleField::Close), 10.0);
    }

    #[test]
    fn test_ema_matches_recurrence_from_seed() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let candles = buffer_from_closes(&closes);

        let period = 12;
        let index = 35;
        let m = 2.0 / (period as f64 + 1.0);
        let mut expected = closes[index - period];
        for close in &closes[(index - period + 1)..=index] {
            expected = close * m + expected * (1.0 - m);
        }
        assert!((ema(&candles, index, period) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ema_insufficient_history_returns_close() {
        let candles = buffer_from_closes(&[100.0, 101.0, 102.0]);
        assert_eq!(ema(&candles, 2, 12), 102.0);
    }

    #[test]
    fn test_rsi_bounds_and_sentinels() {
        // Monotonic rise: no losses, RSI exactly 100.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let candles = buffer_from_closes(&closes);
        assert_eq!(rsi(&candles, 29, 14), 100.0);

        // Monotonic fall: no gains, RSI exactly 0.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let candles = buffer_from_closes(&closes);
        assert_eq!(rsi(&candles, 29, 14), 0.0);

        // Below period: neutral.
        assert_eq!(rsi(&candles, 10, 14), 50.0);

        // Mixed data stays within [0, 100].
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 1.3).sin() * 3.0).collect();
        let candles = buffer_from_closes(&closes);
        for i in 0..60 {
            let value = rsi(&candles, i, 14);
            assert!((0.0..=100.0).contains(&value), "rsi {value} out of bounds");
        }
    }

    #[test]
    fn test_macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).cos() * 4.0).collect();
        let candles = buffer_from_closes(&closes);
        let m = macd(&candles, 70);
        assert!((m.histogram - (m.line - m.signal)).abs() < 1e-12);
        assert!((m.line - (ema(&candles, 70, 12) - ema(&candles, 70, 26))).abs() < 1e-12);
    }

    #[test]
    fn test_pivot_high_requires_strict_dominance_both_sides() {
        // Highs: close + 1, peak at index 5.
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        let candles = buffer_from_closes(&closes);
        assert!(pivot_high(&candles, 5, 5));
        assert!(!pivot_low(&candles, 5, 5));

        // Equal high on the right: >= disqualifies.
        let closes = [100.0, 101.0, 102.0, 110.0, 102.0, 110.0, 101.0, 100.0];
        let candles = buffer_from_closes(&closes);
        assert!(!pivot_high(&candles, 3, 2));
    }

    #[test]
    fn test_pivot_unconfirmed_near_buffer_end() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0];
        let candles = buffer_from_closes(&closes);
        // The newest candle has the greatest high but no future
        // confirmation window yet.
        assert!(!pivot_high(&candles, 5, 3));
        // And too little history on the left also disqualifies.
        assert!(!pivot_high(&candles, 1, 3));
    }

    #[test]
    fn test_fibonacci_levels() {
        let closes = [100.0, 120.0, 110.0, 105.0];
        let candles = buffer_from_closes(&closes);
        let fib = fibonacci(&candles, 3, 4);
        // high = 121, low = 99 from the +-1 candle bodies.
        assert_eq!(fib.high, 121.0);
        assert_eq!(fib.low, 99.0);
        assert_eq!(fib.level(0.0), 121.0);
        assert_eq!(fib.level(1.0), 99.0);
        assert!((fib.level(0.618) - (121.0 - 22.0 * 0.618)).abs() < 1e-12);
        assert_eq!(fib.levels().len(), 7);
    }

    #[test]
    fn test_indicator_series_covers_every_index() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 0.1).collect();
        let candles = buffer_from_closes(&closes);
        let series = indicator_series(&candles, IndicatorKind::Ema, 12);
        assert_eq!(series.len(), 50);
        let series = indicator_series(&candles, IndicatorKind::MacdHistogram, 0);
        assert_eq!(series.len(), 50);
    }
}
