//! The [`MarketData`] abstraction separating signal logic from any
//! concrete exchange transport.

use async_trait::async_trait;
use finyx_signals::{Candle, Timeframe};
use smol_str::SmolStr;
use tokio::sync::mpsc;

use crate::error::MarketError;

/// Exchange symbol identifier, eg. "BTCUSDT".
pub type Symbol = SmolStr;

/// Whether an update carries a provisional or a finalised candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// The bar is still forming; later updates for the same open time
    /// supersede it.
    Open,
    /// The bar has closed and will not change again.
    Closed,
}

/// One candle update from a live stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleUpdate {
    pub kind: UpdateKind,
    pub candle: Candle,
}

impl CandleUpdate {
    pub fn is_closed(&self) -> bool {
        self.kind == UpdateKind::Closed
    }
}

/// A source of historical and live OHLCV data.
///
/// Implementations own their transport (REST, websocket, fixtures) and
/// surface failures as [`MarketError`] so the scanner can degrade per
/// symbol rather than abort.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch up to `limit` most recent candles for `symbol`, oldest
    /// first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError>;

    /// List the symbols this backend considers scannable.
    async fn fetch_symbols(&self) -> Result<Vec<Symbol>, MarketError>;

    /// Open a live update stream for one symbol and timeframe.
    ///
    /// The backend keeps the stream alive across transport drops; the
    /// channel only closes when the backend gives up or the receiver
    /// is dropped.
    async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<mpsc::Receiver<CandleUpdate>, MarketError>;
}
