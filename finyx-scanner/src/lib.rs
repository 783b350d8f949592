//! # FinyX Scanner
//!
//! Asynchronous orchestration over the `finyx-signals` core:
//!
//! - [`market`]: the [`MarketData`](market::MarketData) backend trait
//!   and live [`CandleUpdate`](market::CandleUpdate) stream types.
//! - [`binance`]: Binance USDT-margined futures backend (REST klines,
//!   exchange info, self-reconnecting kline websocket).
//! - [`tracker`]: per-symbol stream reconciliation and incremental
//!   evaluation.
//! - [`scanner`]: batched, cancellable multi-symbol scan runs.

pub mod binance;
pub mod error;
pub mod market;
pub mod scanner;
pub mod tracker;

pub use binance::BinanceFutures;
pub use error::MarketError;
pub use market::{CandleUpdate, MarketData, Symbol, UpdateKind};
pub use scanner::{ScanConfig, ScanHandle, ScanResult, Scanner};
pub use tracker::{SignalEvent, SymbolTracker};
