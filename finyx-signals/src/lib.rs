//! # FinyX Signals
//!
//! Deterministic technical-analysis core for OHLCV candle streams:
//!
//! - [`candle`]: the validated [`Candle`](candle::Candle) record and the
//!   capacity-bounded rolling [`CandleBuffer`](candle::CandleBuffer).
//! - [`indicator`]: pure, index-addressed indicator functions (SMA, EMA,
//!   RSI, MACD, pivots, Fibonacci retracement, windowed extremes).
//! - [`trend`]: stacked-EMA trend classification and change detection.
//! - [`engine`]: feature extraction, cooldown enforcement and the
//!   [`SignalEngine`](engine::SignalEngine) evaluation driver.
//! - [`strategy`]: named rule trees behind the
//!   [`Strategy`](strategy::Strategy) trait.
//!
//! Everything here is synchronous and allocation-light; asynchronous
//! orchestration (stream reconciliation, multi-symbol scanning) lives
//! in `finyx-scanner`.

pub mod candle;
pub mod engine;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod timeframe;
pub mod trend;

// Re-export the types most consumers need.
pub use candle::{Applied, Candle, CandleBuffer, CandleError, CandleField, DEFAULT_CAPACITY};
pub use engine::{EngineConfig, Features, SignalEngine, DEFAULT_COOLDOWN_BARS, MIN_CANDLES};
pub use indicator::{indicator_series, IndicatorKind, Macd};
pub use signal::{Signal, SignalKind, SignalLog, DEFAULT_SIGNAL_CAP};
pub use strategy::{Strategy, StrategyKind};
pub use timeframe::Timeframe;
pub use trend::Trend;
