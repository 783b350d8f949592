//! Trend classification from the stacked EMA system.

use serde::{Deserialize, Serialize};

use crate::candle::CandleBuffer;
use crate::indicator::ema;

/// Mutually exclusive market trend at one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    StrongUp,
    StrongDown,
    WeakUp,
    WeakDown,
    Sideways,
}

impl Trend {
    pub fn is_uptrend(&self) -> bool {
        matches!(self, Trend::StrongUp | Trend::WeakUp)
    }

    pub fn is_downtrend(&self) -> bool {
        matches!(self, Trend::StrongDown | Trend::WeakDown)
    }
}

/// Classify the trend at `index` from EMA(12/26/50/100) and the close.
///
/// Strong trends need the full EMA stack ordered and the close beyond
/// the fast EMA; weak trends only the fast pair. Anything else is
/// sideways.
pub fn classify(candles: &CandleBuffer, index: usize) -> Trend {
    let ema_fast = ema(candles, index, 12);
    let ema_medium = ema(candles, index, 26);
    let ema_slow = ema(candles, index, 50);
    let ema_long = ema(candles, index, 100);
    let close = candles[index].close;

    let strong_up =
        ema_fast > ema_medium && ema_medium > ema_slow && ema_slow > ema_long && close > ema_fast;
    let strong_down =
        ema_fast < ema_medium && ema_medium < ema_slow && ema_slow < ema_long && close < ema_fast;

    if strong_up {
        Trend::StrongUp
    } else if strong_down {
        Trend::StrongDown
    } else if ema_fast > ema_medium && close > ema_fast {
        Trend::WeakUp
    } else if ema_fast < ema_medium && close < ema_fast {
        Trend::WeakDown
    } else {
        Trend::Sideways
    }
}

/// Previous index classified weak-down, current index has flattened or
/// turned up.
///
/// The prior classification is recomputed, never cached: indicator
/// values are index-pure and the previous candle may have been replaced
/// since it was last evaluated.
pub fn change_up(candles: &CandleBuffer, index: usize, current: Trend) -> bool {
    index >= 1
        && classify(candles, index - 1) == Trend::WeakDown
        && matches!(current, Trend::Sideways | Trend::WeakUp)
}

/// Mirror of [`change_up`].
pub fn change_down(candles: &CandleBuffer, index: usize, current: Trend) -> bool {
    index >= 1
        && classify(candles, index - 1) == Trend::WeakUp
        && matches!(current, Trend::Sideways | Trend::WeakDown)
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
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000.0,
            })
            .collect();
        CandleBuffer::seed(1000, history).unwrap()
    }

    #[test]
    fn test_sustained_rally_classifies_strong_up() {
        let closes: Vec<f64> = (0..160).map(|i| 100.0 * 1.005f64.powi(i)).collect();
        let candles = buffer_from_closes(&closes);
        assert_eq!(classify(&candles, 159), Trend::StrongUp);
    }

    #[test]
    fn test_sustained_decline_classifies_strong_down() {
        let closes: Vec<f64> = (0..160).map(|i| 100.0 * 0.995f64.powi(i)).collect();
        let candles = buffer_from_closes(&closes);
        assert_eq!(classify(&candles, 159), Trend::StrongDown);
    }

    #[test]
    fn test_flat_market_classifies_sideways() {
        let closes = vec![100.0; 160];
        let candles = buffer_from_closes(&closes);
        // All EMAs equal: no ordering holds.
        assert_eq!(classify(&candles, 159), Trend::Sideways);
    }

    #[test]
    fn test_change_up_requires_prior_weak_down() {
        // A long rise keeps the slow EMAs bullishly ordered, so the
        // following shallow decline classifies weak-down (not strong);
        // the recovery bars then flip the close back above the fast EMA.
        let mut closes: Vec<f64> = (0..120).map(|i| 100.0 + i as f64 * 0.5).collect();
        closes.extend((0..15).map(|i| 158.5 - i as f64));
        closes.extend(std::iter::repeat(150.0).take(5));
        let candles = buffer_from_closes(&closes);

        let last = candles.len() - 1;
        for i in 125..=last {
            let current = classify(&candles, i);
            if change_up(&candles, i, current) {
                assert_eq!(classify(&candles, i - 1), Trend::WeakDown);
                assert!(matches!(current, Trend::Sideways | Trend::WeakUp));
                return;
            }
        }
        panic!("expected a trend change somewhere in the recovery tail");
    }
}
