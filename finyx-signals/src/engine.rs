//! Per-index feature extraction and the signal engine driving a
//! configured strategy over the candle buffer.

use crate::candle::{CandleBuffer, CandleField};
use crate::indicator::{fibonacci, highest, macd, pivot_high, pivot_low, rsi, sma, Macd};
use crate::signal::{Signal, SignalKind, DEFAULT_SIGNAL_CAP};
use crate::strategy::StrategyKind;
use crate::timeframe::Timeframe;
use crate::trend::{self, Trend};

/// Warmup length: the first `MIN_CANDLES` positions of a buffer are
/// never evaluated. Too little history is an insufficient-data state,
/// not an error.
pub const MIN_CANDLES: usize = 100;

/// Default signal cooldown in bars.
pub const DEFAULT_COOLDOWN_BARS: usize = 3;

/// Engine configuration. Explicit, passed in by the caller; there is no
/// ambient global state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timeframe: Timeframe,
    /// Bars that must elapse after any emission before another signal
    /// of any type may fire.
    pub cooldown_bars: usize,
    /// Rolling signal retention per symbol.
    pub signal_cap: usize,
    pub strategy: StrategyKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::default(),
            cooldown_bars: DEFAULT_COOLDOWN_BARS,
            signal_cap: DEFAULT_SIGNAL_CAP,
            strategy: StrategyKind::FinyxAdvanced,
        }
    }
}

/// Everything the rule trees look at for one index.
///
/// Extraction is pure: the same buffer and index always yield the same
/// features, so prior-index questions (trend changes, yesterday's dip)
/// are answered by re-extraction rather than by cached state.
#[derive(Debug, Clone)]
pub struct Features {
    pub trend: Trend,
    pub trend_change_up: bool,
    pub trend_change_down: bool,
    pub rsi: f64,
    pub macd: Macd,
    pub macd_bullish: bool,
    pub macd_bearish: bool,
    pub pivot_high: bool,
    pub perfect_dip: bool,
    pub perfect_peak: bool,
    pub golden_zone: bool,
    pub volume: f64,
    pub volume_avg: f64,
    pub volume_surge: bool,
    pub volume_above_normal: bool,
    pub big_volume_up: bool,
    pub big_volume_down: bool,
    /// Close-vs-open move of the current candle, in percent.
    pub price_change_pct: f64,
    pub ema_fast: f64,
    pub ema_long: f64,
    /// 0.618 retracement level of the trailing 50-candle range.
    pub fib_618: f64,
    pub close: f64,
    pub open: f64,
    pub prev_high: f64,
}

impl Features {
    /// Extract the full feature vector at `index`.
    pub fn extract(candles: &CandleBuffer, index: usize, timeframe: Timeframe) -> Self {
        let current = &candles[index];
        let lookback = pivot_lookback(timeframe);

        let volume_avg = sma(candles, index, 20, CandleField::Volume);
        let surge_factor = if timeframe.is_low_tf() { 2.0 } else { 1.8 };

        let trend = trend::classify(candles, index);
        let macd = macd(candles, index);
        let prev_histogram = if index > 0 {
            crate::indicator::macd(candles, index - 1).histogram
        } else {
            0.0
        };

        let pivot_high = pivot_high(candles, index, lookback);
        let golden_zone = golden_zone(candles, index);

        let prev_close = if index > 0 { candles[index - 1].close } else { current.close };
        let prev_high = if index > 0 { candles[index - 1].high } else { current.high };
        let big_volume = current.volume > volume_avg * 2.5;

        Self {
            trend,
            trend_change_up: trend::change_up(candles, index, trend),
            trend_change_down: trend::change_down(candles, index, trend),
            rsi: rsi(candles, index, 14),
            macd,
            macd_bullish: macd.line > macd.signal && macd.histogram > prev_histogram,
            macd_bearish: macd.line < macd.signal && macd.histogram < prev_histogram,
            pivot_high,
            perfect_dip: perfect_dip(candles, index, timeframe),
            perfect_peak: perfect_peak(candles, index, timeframe),
            golden_zone,
            volume: current.volume,
            volume_avg,
            volume_surge: current.volume > volume_avg * surge_factor,
            volume_above_normal: current.volume > volume_avg * 1.4,
            big_volume_up: current.is_bullish() && big_volume && current.close > prev_close,
            big_volume_down: current.close < current.open
                && big_volume
                && current.close < prev_close,
            price_change_pct: if current.open != 0.0 {
                (current.close - current.open) / current.open * 100.0
            } else {
                0.0
            },
            ema_fast: crate::indicator::ema(candles, index, 12),
            ema_long: crate::indicator::ema(candles, index, 100),
            fib_618: fibonacci(candles, index, 50).level(0.618),
            close: current.close,
            open: current.open,
            prev_high,
        }
    }
}

/// Pivot confirmation window: tighter on fast timeframes.
pub fn pivot_lookback(timeframe: Timeframe) -> usize {
    if timeframe.is_low_tf() {
        5
    } else {
        8
    }
}

/// Price sits in the golden-ratio band of the trailing 89-candle high.
pub fn golden_zone(candles: &CandleBuffer, index: usize) -> bool {
    let high = highest(candles, index, 89, CandleField::High);
    if high <= 0.0 {
        return false;
    }
    let ratio = candles[index].close / high;
    (0.618 - 0.08..=0.618 + 0.08).contains(&ratio)
}

/// Confirmed local bottom: a pivot low on elevated volume, or a
/// three-candle V (lows falling into `index - 1`, recovering at
/// `index`) confirmed by above-average volume.
pub fn perfect_dip(candles: &CandleBuffer, index: usize, timeframe: Timeframe) -> bool {
    let volume_avg = sma(candles, index, 20, CandleField::Volume);
    let volume = candles[index].volume;

    let strong_dip =
        pivot_low(candles, index, pivot_lookback(timeframe)) && volume > volume_avg * 1.2;

    let v_shape = index >= 2
        && candles[index - 2].low > candles[index - 1].low
        && candles[index].low > candles[index - 1].low
        && volume > volume_avg;

    strong_dip || v_shape
}

/// Mirror of [`perfect_dip`]: pivot high on volume, or an inverted V in
/// the highs.
pub fn perfect_peak(candles: &CandleBuffer, index: usize, timeframe: Timeframe) -> bool {
    let volume_avg = sma(candles, index, 20, CandleField::Volume);
    let volume = candles[index].volume;

    let strong_peak =
        pivot_high(candles, index, pivot_lookback(timeframe)) && volume > volume_avg * 1.2;

    let inverted_v = index >= 2
        && candles[index - 2].high < candles[index - 1].high
        && candles[index].high < candles[index - 1].high
        && volume > volume_avg;

    strong_peak || inverted_v
}

/// Stateful evaluation driver: runs the configured strategy per index
/// and enforces the cooldown between emissions.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: EngineConfig,
    last_signal_bar: Option<usize>,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            last_signal_bar: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Full pass over the buffer, replacing any cooldown state.
    ///
    /// Deterministic: re-running over an unchanged buffer produces an
    /// identical signal list.
    pub fn evaluate_all(&mut self, candles: &CandleBuffer) -> Vec<Signal> {
        self.last_signal_bar = None;
        if candles.len() < MIN_CANDLES {
            return Vec::new();
        }

        let mut signals = Vec::new();
        for index in MIN_CANDLES..candles.len() {
            if let Some(signal) = self.evaluate_index(candles, index) {
                signals.push(signal);
            }
        }
        signals
    }

    /// Evaluate only the newest index, preserving cooldown state from
    /// previous evaluations. Used for incremental stream updates.
    ///
    /// The first `MIN_CANDLES` positions are warmup and are never
    /// evaluated, matching [`SignalEngine::evaluate_all`]: a signal
    /// fired incrementally must also appear in a from-scratch rescan of
    /// the same buffer.
    pub fn evaluate_latest(&mut self, candles: &CandleBuffer) -> Option<Signal> {
        if candles.len() <= MIN_CANDLES {
            return None;
        }
        self.evaluate_index(candles, candles.len() - 1)
    }

    /// Keep the cooldown's bar-distance semantics across an eviction of
    /// the oldest candle: all indices shift down by one.
    pub fn shift_for_eviction(&mut self) {
        self.last_signal_bar = self.last_signal_bar.and_then(|bar| bar.checked_sub(1));
    }

    fn evaluate_index(&mut self, candles: &CandleBuffer, index: usize) -> Option<Signal> {
        let allowed = self
            .last_signal_bar
            .map_or(true, |last| index.saturating_sub(last) >= self.config.cooldown_bars);
        if !allowed {
            return None;
        }

        let kind = self
            .config
            .strategy
            .as_strategy()
            .evaluate(candles, index, self.config.timeframe)?;

        self.last_signal_bar = Some(index);
        let current = &candles[index];
        Some(Signal {
            index,
            kind,
            price: current.close,
            time: current.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Candle;

    fn flat_candle(time: i64) -> Candle {
        Candle {
            time,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
        }
    }

    fn flat_history(n: usize) -> Vec<Candle> {
        (0..n).map(|i| flat_candle(i as i64 * 60_000)).collect()
    }

    #[test]
    fn test_declines_below_min_candles() {
        let candles = CandleBuffer::seed(500, flat_history(99)).unwrap();
        let mut engine = SignalEngine::new(EngineConfig::default());
        assert!(engine.evaluate_all(&candles).is_empty());
        assert!(engine.evaluate_latest(&candles).is_none());
    }

    #[test]
    fn test_flat_spike_scenario_rsi_pins_at_100() {
        // 100 flat candles then one high-volume green candle: RSI has no
        // losses, so nothing requiring RSI < 40 may fire.
        let mut history = flat_history(100);
        history.push(Candle {
            time: 100 * 60_000,
            open: 100.0,
            high: 105.5,
            low: 99.5,
            close: 105.0,
            volume: 5000.0,
        });
        let candles = CandleBuffer::seed(500, history).unwrap();

        let last = candles.len() - 1;
        assert_eq!(rsi(&candles, last, 14), 100.0);

        let features = Features::extract(&candles, last, Timeframe::M5);
        assert!(features.volume_surge);

        let mut engine = SignalEngine::new(EngineConfig::default());
        let signals = engine.evaluate_all(&candles);
        assert!(
            !signals.iter().any(|s| s.kind == SignalKind::Buy),
            "BUY requires depressed RSI and must not fire at RSI 100"
        );
    }

    #[test]
    fn test_v_shape_dip_detected_at_final_index() {
        // Flat base, then lows 95 / 93 / 97 with the recovery candle
        // green and on triple volume.
        let mut history = flat_history(100);
        let t = |i: i64| (100 + i) * 60_000;
        history.push(Candle { time: t(0), open: 100.0, high: 100.5, low: 95.0, close: 96.0, volume: 1000.0 });
        history.push(Candle { time: t(1), open: 96.0, high: 96.5, low: 93.0, close: 94.0, volume: 1000.0 });
        history.push(Candle { time: t(2), open: 97.5, high: 99.0, low: 97.0, close: 98.5, volume: 3000.0 });
        let candles = CandleBuffer::seed(500, history).unwrap();

        let last = candles.len() - 1;
        assert!(perfect_dip(&candles, last, Timeframe::M5));
        assert!(!perfect_peak(&candles, last, Timeframe::M5));
    }

    #[test]
    fn test_cooldown_invariant_over_full_pass() {
        // Noisy data to provoke multiple emissions, then verify spacing.
        let mut history = Vec::new();
        for i in 0..400i64 {
            let wave = (i as f64 * 0.35).sin() * 8.0;
            let close = 100.0 + wave;
            let open = 100.0 + ((i - 1) as f64 * 0.35).sin() * 8.0;
            let volume = if i % 7 == 0 { 4000.0 } else { 900.0 };
            history.push(Candle {
                time: i * 60_000,
                open,
                high: open.max(close) + 1.5,
                low: open.min(close) - 1.5,
                close,
                volume,
            });
        }
        let candles = CandleBuffer::seed(500, history).unwrap();

        let mut engine = SignalEngine::new(EngineConfig::default());
        let signals = engine.evaluate_all(&candles);
        for pair in signals.windows(2) {
            assert!(
                pair[1].index - pair[0].index >= DEFAULT_COOLDOWN_BARS,
                "cooldown violated between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_full_pass_is_idempotent() {
        let mut history = Vec::new();
        for i in 0..300i64 {
            let close = 100.0 + (i as f64 * 0.5).sin() * 6.0;
            history.push(Candle {
                time: i * 60_000,
                open: close - 0.5,
                high: close + 2.0,
                low: close - 2.0,
                close,
                volume: if i % 5 == 0 { 3000.0 } else { 1000.0 },
            });
        }
        let candles = CandleBuffer::seed(500, history).unwrap();

        let mut engine = SignalEngine::new(EngineConfig::default());
        let first = engine.evaluate_all(&candles);
        let second = engine.evaluate_all(&candles);
        assert_eq!(first, second);
    }

    #[test]
    fn test_latest_agrees_with_full_pass_at_warmup_boundary() {
        // Decline into a volume-confirmed V-dip right at the warmup
        // edge. Incremental and from-scratch evaluation must agree on
        // every buffer length.
        let mut history: Vec<Candle> = (0..98)
            .map(|i| {
                let close = 200.0 - i as f64 * 0.5;
                Candle {
                    time: i as i64 * 60_000,
                    open: close + 0.5,
                    high: close + 1.0,
                    low: close - 0.5,
                    close,
                    volume: 1000.0,
                }
            })
            .collect();
        let t = |i: i64| (98 + i) * 60_000;
        history.push(Candle { time: t(0), open: 151.0, high: 151.5, low: 148.0, close: 150.0, volume: 1000.0 });
        history.push(Candle { time: t(1), open: 150.0, high: 150.5, low: 146.0, close: 149.0, volume: 1000.0 });
        history.push(Candle { time: t(2), open: 149.0, high: 150.0, low: 148.5, close: 149.5, volume: 2000.0 });

        // Exactly MIN_CANDLES: still warmup on both paths.
        let boundary = CandleBuffer::seed(500, history[..MIN_CANDLES].to_vec()).unwrap();
        let mut engine = SignalEngine::new(EngineConfig::default());
        assert!(engine.evaluate_all(&boundary).is_empty());
        assert!(engine.evaluate_latest(&boundary).is_none());

        // One candle past warmup the dip fires, identically on both.
        let candles = CandleBuffer::seed(500, history).unwrap();
        let mut full_engine = SignalEngine::new(EngineConfig::default());
        let full = full_engine.evaluate_all(&candles);
        let mut latest_engine = SignalEngine::new(EngineConfig::default());
        let latest = latest_engine.evaluate_latest(&candles);
        assert!(latest.is_some(), "expected the dip to fire at index 100");
        assert_eq!(full.last().copied(), latest);
    }

    #[test]
    fn test_cooldown_suppresses_reevaluation_of_same_bar() {
        let mut engine = SignalEngine::new(EngineConfig::default());
        engine.last_signal_bar = Some(150);

        let candles = CandleBuffer::seed(500, flat_history(151)).unwrap();
        // Same bar: distance 0 < cooldown, suppressed regardless of the
        // strategy outcome.
        assert!(engine.evaluate_latest(&candles).is_none());
    }

    #[test]
    fn test_shift_for_eviction() {
        let mut engine = SignalEngine::new(EngineConfig::default());
        engine.last_signal_bar = Some(1);
        engine.shift_for_eviction();
        assert_eq!(engine.last_signal_bar, Some(0));
        engine.shift_for_eviction();
        assert_eq!(engine.last_signal_bar, None);
    }
}
