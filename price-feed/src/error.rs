use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while deriving a [`PriceSample`](crate::PriceSample) from upstream data.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum PriceError {
    #[error("upstream price source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream price source returned invalid data: {0}")]
    InvalidData(String),
}

impl PriceError {
    /// Stable label used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PriceError::UpstreamUnavailable(_) => "upstream_unavailable",
            PriceError::InvalidData(_) => "invalid_data",
        }
    }

    /// Determine if the failure should simply be retried on the next tick.
    ///
    /// Every upstream failure is currently transient: the previously stored sample stays
    /// authoritative and the scheduler tries again later.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            PriceError::UpstreamUnavailable(_) | PriceError::InvalidData(_) => true,
        }
    }
}

/// Errors produced while decoding a real-time message.
///
/// These never close a connection: the offending frame is logged and dropped.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum MessageError {
    #[error("malformed real-time message: {0}")]
    Malformed(String),

    #[error("unrecognised real-time message type: {0}")]
    UnknownType(String),
}

impl From<serde_json::Error> for MessageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}
