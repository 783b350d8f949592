use thiserror::Error;

/// Failures raised by a market-data backend.
///
/// Errors are scoped to one symbol request or one stream; a scan run
/// never aborts because a single symbol failed.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("http transport failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange rejected request: {0}")]
    Api(String),

    #[error("failed to parse market payload: {0}")]
    Parse(String),
}

impl MarketError {
    /// Wrap a decode failure, keeping only its message.
    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self::Parse(err.to_string())
    }
}
