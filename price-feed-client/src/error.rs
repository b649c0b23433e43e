use thiserror::Error;

/// All errors generated in `price-feed-client`.
///
/// None of these reach the UI as hard failures: the reconciliation layer logs them and keeps
/// serving the last known values.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FeedError {
    #[error("invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API returned an error: {0}")]
    Api(String),

    #[error("real-time connection lost: {0}")]
    ConnectionLost(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::ConnectionLost(value.to_string())
    }
}
