use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }
}

/// Reason a single symbol could not be sampled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("symbol not found upstream")]
    NotFound,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Per-symbol failure captured by the fetcher instead of aborting the round.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to sample {symbol}: {cause}")]
pub struct FetchFailure {
    pub symbol: String,
    pub cause: FetchError,
}

impl FetchFailure {
    pub fn new(symbol: impl Into<String>, cause: FetchError) -> Self {
        Self {
            symbol: symbol.into(),
            cause,
        }
    }
}
