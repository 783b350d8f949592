//! Binance USDT-margined futures backend: REST klines and symbol
//! listing, plus a self-reconnecting kline websocket stream.

use std::time::Duration;

use async_trait::async_trait;
use finyx_signals::{Candle, Timeframe};
use futures::StreamExt;
use serde::Deserialize;
use smol_str::SmolStr;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::error::MarketError;
use crate::market::{CandleUpdate, MarketData, Symbol, UpdateKind};

const FUTURES_REST_URL: &str = "https://fapi.binance.com";
const FUTURES_WS_URL: &str = "wss://fstream.binance.com";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Updates buffered per subscription before backpressure kicks in.
const STREAM_BUFFER: usize = 1024;

/// Kline row as returned by `/fapi/v1/klines`: a positional array with
/// prices and volumes as strings.
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // open time (ms)
    String, // open
    String, // high
    String, // low
    String, // close
    String, // volume
    i64,    // close time (ms)
    String, // quote volume
    i64,    // trade count
    String, // taker buy base volume
    String, // taker buy quote volume
    String, // unused
);

impl BinanceKline {
    fn into_candle(self) -> Option<Candle> {
        Some(Candle {
            time: self.0,
            open: self.1.parse().ok()?,
            high: self.2.parse().ok()?,
            low: self.3.parse().ok()?,
            close: self.4.parse().ok()?,
            volume: self.5.parse().ok()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    #[serde(default)]
    contract_type: String,
    quote_asset: String,
}

/// Kline event pushed on `<symbol>@kline_<interval>` streams.
#[derive(Debug, Deserialize)]
struct KlineEvent {
    k: KlineData,
}

/// Envelope used on `/stream` combined-stream endpoints.
#[derive(Debug, Deserialize)]
struct CombinedFrame {
    data: KlineEvent,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    /// Open time (ms).
    t: i64,
    o: String,
    h: String,
    l: String,
    c: String,
    v: String,
    /// Whether this kline is closed.
    x: bool,
}

/// First 100 characters of a frame for log context, cut on a char
/// boundary so multi-byte text cannot panic the stream task.
fn frame_preview(text: &str) -> &str {
    let end = text.char_indices().nth(100).map_or(text.len(), |(i, _)| i);
    &text[..end]
}

fn parse_kline_frame(text: &str) -> Option<CandleUpdate> {
    // Raw `/ws/` frames carry the event directly; combined `/stream`
    // frames wrap it in an envelope.
    let event: KlineEvent = serde_json::from_str(text)
        .or_else(|_| serde_json::from_str::<CombinedFrame>(text).map(|frame| frame.data))
        .ok()?;
    let k = event.k;
    let candle = Candle {
        time: k.t,
        open: k.o.parse().ok()?,
        high: k.h.parse().ok()?,
        low: k.l.parse().ok()?,
        close: k.c.parse().ok()?,
        volume: k.v.parse().ok()?,
    };
    let kind = if k.x { UpdateKind::Closed } else { UpdateKind::Open };
    Some(CandleUpdate { kind, candle })
}

/// Binance USDT-margined perpetual futures market data.
pub struct BinanceFutures {
    client: reqwest::Client,
    rest_url: String,
    ws_url: String,
}

impl BinanceFutures {
    pub fn new() -> Self {
        Self::with_urls(FUTURES_REST_URL, FUTURES_WS_URL)
    }

    /// Point the adapter at alternative endpoints (testnet, fixtures).
    pub fn with_urls(rest_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            rest_url: rest_url.into(),
            ws_url: ws_url.into(),
        }
    }
}

impl Default for BinanceFutures {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for BinanceFutures {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.rest_url,
            symbol,
            timeframe.as_str(),
            limit
        );

        let response = self.client.get(&url).timeout(HTTP_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(MarketError::Api(format!(
                "klines for {symbol}: http {}",
                response.status()
            )));
        }

        let klines: Vec<BinanceKline> = response.json().await.map_err(MarketError::parse)?;
        let candles: Vec<Candle> = klines
            .into_iter()
            .filter_map(BinanceKline::into_candle)
            .collect();
        Ok(candles)
    }

    async fn fetch_symbols(&self) -> Result<Vec<Symbol>, MarketError> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.rest_url);

        let response = self.client.get(&url).timeout(HTTP_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(MarketError::Api(format!(
                "exchangeInfo: http {}",
                response.status()
            )));
        }

        let info: ExchangeInfo = response.json().await.map_err(MarketError::parse)?;
        let symbols: Vec<Symbol> = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.status == "TRADING" && s.contract_type == "PERPETUAL" && s.quote_asset == "USDT"
            })
            .map(|s| SmolStr::new(s.symbol))
            .collect();

        info!(count = symbols.len(), "fetched tradable perpetual symbols");
        Ok(symbols)
    }

    async fn subscribe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<mpsc::Receiver<CandleUpdate>, MarketError> {
        let url = format!(
            "{}/ws/{}@kline_{}",
            self.ws_url,
            symbol.to_lowercase(),
            timeframe.as_str()
        );
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let stream_symbol = symbol.to_string();

        tokio::spawn(async move {
            info!(symbol = %stream_symbol, %url, "starting kline stream");

            loop {
                match connect_async(&url).await {
                    Ok((ws_stream, _)) => {
                        info!(symbol = %stream_symbol, "kline stream connected");
                        let (_, mut read) = ws_stream.split();

                        while let Some(msg) = read.next().await {
                            match msg {
                                Ok(Message::Text(text)) => {
                                    match parse_kline_frame(&text) {
                                        Some(update) => {
                                            if tx.send(update).await.is_err() {
                                                debug!(
                                                    symbol = %stream_symbol,
                                                    "subscriber gone, stopping kline stream"
                                                );
                                                return;
                                            }
                                        }
                                        None => {
                                            debug!(
                                                symbol = %stream_symbol,
                                                frame = frame_preview(&text),
                                                "ignoring unparseable frame"
                                            );
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => {
                                    warn!(symbol = %stream_symbol, "kline stream closed by server");
                                    break;
                                }
                                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                                    // Heartbeat - handled automatically
                                }
                                Err(error) => {
                                    error!(symbol = %stream_symbol, %error, "kline stream error");
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(error) => {
                        error!(symbol = %stream_symbol, %error, "kline stream connect failed");
                    }
                }

                if tx.is_closed() {
                    return;
                }
                debug!(symbol = %stream_symbol, "reconnecting kline stream after delay");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });

        Ok(rx)
    }
}
