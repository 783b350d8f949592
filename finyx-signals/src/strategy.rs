//! Signal strategies: named rule trees evaluated per index.
//!
//! The production rule set is [`FinyxAdvanced`]. [`EmaCrossover`] is the
//! earlier, simpler tree kept as a selectable variant; the two are
//! never merged.

use crate::candle::CandleBuffer;
use crate::engine::{perfect_dip, Features};
use crate::indicator::{ema, fibonacci, rsi};
use crate::signal::SignalKind;
use crate::timeframe::Timeframe;
use crate::trend::Trend;

/// A rule tree turning one buffer index into at most one signal kind.
///
/// Implementations must be stateless: cooldown and retention are the
/// engine's business.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        candles: &CandleBuffer,
        index: usize,
        timeframe: Timeframe,
    ) -> Option<SignalKind>;
}

/// Configuration-selectable strategy identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    FinyxAdvanced,
    EmaCrossover,
}

impl StrategyKind {
    pub fn as_strategy(&self) -> &'static dyn Strategy {
        match self {
            StrategyKind::FinyxAdvanced => &FinyxAdvanced,
            StrategyKind::EmaCrossover => &EmaCrossover,
        }
    }
}

/// The canonical FinyX Advanced rule tree.
///
/// Priority BUY, SELL, PUMP: the first tree that passes (net of its
/// avoid-filter) claims the index.
pub struct FinyxAdvanced;

impl Strategy for FinyxAdvanced {
    fn name(&self) -> &'static str {
        "finyx-advanced"
    }

    fn evaluate(
        &self,
        candles: &CandleBuffer,
        index: usize,
        timeframe: Timeframe,
    ) -> Option<SignalKind> {
        let f = Features::extract(candles, index, timeframe);

        let buy_dip = f.perfect_dip
            && f.trend.is_downtrend()
            && f.rsi < 40.0
            && f.volume_above_normal;
        let buy_reversal = f.trend_change_up && f.macd_bullish && f.rsi < 50.0 && f.volume_surge;
        let buy_accumulation =
            f.trend == Trend::Sideways && f.perfect_dip && f.rsi < 35.0 && f.big_volume_up;
        let avoid_buy =
            f.trend == Trend::StrongUp || f.rsi > 60.0 || f.close > f.ema_long * 1.05;
        if (buy_dip || buy_reversal || buy_accumulation) && !avoid_buy {
            return Some(SignalKind::Buy);
        }

        let sell_peak = f.perfect_peak
            && f.trend.is_uptrend()
            && f.rsi > 60.0
            && f.volume_above_normal;
        let sell_reversal =
            f.trend_change_down && f.macd_bearish && f.rsi > 45.0 && f.volume_surge;
        let sell_distribution =
            f.trend == Trend::Sideways && f.perfect_peak && f.rsi > 65.0 && f.big_volume_down;
        let sell_pivot = f.pivot_high && f.rsi > 55.0 && f.volume > f.volume_avg * 1.3;
        let sell_exhaustion = f.trend == Trend::StrongUp && f.rsi > 70.0 && f.macd_bearish;
        let sell_golden = f.golden_zone && f.macd_bearish && f.rsi > 60.0;
        let sell_fib_reject = f.close < f.fib_618 && f.pivot_high && f.volume_above_normal;
        let avoid_sell =
            f.trend == Trend::StrongDown || f.rsi < 35.0 || f.close < f.ema_long * 0.92;
        if (sell_peak
            || sell_reversal
            || sell_distribution
            || sell_pivot
            || sell_exhaustion
            || sell_golden
            || sell_fib_reject)
            && !avoid_sell
        {
            return Some(SignalKind::Sell);
        }

        let pump_threshold = if timeframe.is_low_tf() { 1.2 } else { 0.8 };
        let pump_breakout = index >= 1
            && perfect_dip(candles, index - 1, timeframe)
            && f.close > f.prev_high
            && f.volume_surge
            && f.price_change_pct > pump_threshold;
        let pump_reversal = f.trend_change_up && f.big_volume_up && f.close > f.ema_fast * 1.008;
        let pump_golden = f.golden_zone
            && f.macd_bullish
            && f.volume > f.volume_avg * 1.6
            && f.close > f.open;
        let avoid_pump = f.trend == Trend::StrongUp && f.rsi > 70.0;
        if (pump_breakout || pump_reversal || pump_golden) && !avoid_pump {
            return Some(SignalKind::Pump);
        }

        None
    }
}

/// Superseded basic tree: a stacked short-EMA crossover with an RSI band
/// and a Fibonacci-level filter.
pub struct EmaCrossover;

impl Strategy for EmaCrossover {
    fn name(&self) -> &'static str {
        "ema-crossover"
    }

    fn evaluate(
        &self,
        candles: &CandleBuffer,
        index: usize,
        _timeframe: Timeframe,
    ) -> Option<SignalKind> {
        if index == 0 {
            return None;
        }

        let ema3 = ema(candles, index, 3);
        let ema6 = ema(candles, index, 6);
        let ema9 = ema(candles, index, 9);
        let ema21 = ema(candles, index, 21);
        let rsi = rsi(candles, index, 14);
        let fib = fibonacci(candles, index, 20);
        let close = candles[index].close;
        let prev_close = candles[index - 1].close;

        let buy = ema3 > ema6
            && ema6 > ema9
            && ema9 > ema21
            && rsi > 30.0
            && rsi < 70.0
            && close > prev_close
            && close > fib.level(0.618);
        if buy {
            return Some(SignalKind::Buy);
        }

        let sell = ema3 < ema6
            && ema6 < ema9
            && ema9 < ema21
            && (rsi > 70.0 || rsi < 30.0)
            && close < prev_close
            && close < fib.level(0.382);
        if sell {
            return Some(SignalKind::Sell);
        }

        None
    }
}
