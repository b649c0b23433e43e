use crate::error::FeedError;
use price_feed::Interval;
use rand::Rng;
use std::time::Duration;
use url::Url;

/// Whether the real-time connection is re-opened after it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// A closed connection stays closed; REST polling keeps the view fresh.
    #[default]
    Never,
    /// Exponential backoff starting at `initial`, doubling up to `max`, plus up to 10% jitter.
    Backoff { initial: Duration, max: Duration },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                Some(initial.saturating_mul(factor).min(*max))
            }
        }
    }

    /// Delay before reconnect attempt `attempt`, with jitter applied.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        self.base_delay(attempt).map(|base| {
            let jitter = rand::rng().random_range(0.0..=0.1);
            base + base.mul_f64(jitter)
        })
    }
}

/// Configuration of a mounted [`PriceFeed`](crate::feed::PriceFeed).
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Page origin, eg/ `https://example.com`. REST paths and `/ws` are resolved against it.
    pub base_url: String,
    /// How often `GET /api/prices/current` is polled.
    pub current_interval: Duration,
    /// How often `GET /api/prices/history/{interval}` is polled.
    pub history_interval: Duration,
    /// Which history buckets are polled.
    pub history_intervals: Vec<Interval>,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            current_interval: Duration::from_secs(60),
            history_interval: Duration::from_secs(5 * 60),
            history_intervals: vec![Interval::OneHour],
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_current_interval(mut self, interval: Duration) -> Self {
        self.current_interval = interval;
        self
    }

    pub fn with_history_interval(mut self, interval: Duration) -> Self {
        self.history_interval = interval;
        self
    }

    pub fn with_history_intervals(mut self, intervals: impl IntoIterator<Item = Interval>) -> Self {
        self.history_intervals = intervals.into_iter().collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    fn parse_base(&self) -> Result<Url, FeedError> {
        Url::parse(&self.base_url).map_err(|error| FeedError::InvalidUrl {
            url: self.base_url.clone(),
            reason: error.to_string(),
        })
    }

    /// REST origin (`http` or `https`).
    pub fn rest_url(&self) -> Result<Url, FeedError> {
        let url = self.parse_base()?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(FeedError::InvalidUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {scheme}"),
            }),
        }
    }

    /// Real-time endpoint: same host, `http` upgraded to `ws` and `https` to `wss`, path `/ws`.
    pub fn ws_url(&self) -> Result<Url, FeedError> {
        let mut url = self.rest_url()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };

        url.set_scheme(scheme).map_err(|_| FeedError::InvalidUrl {
            url: self.base_url.clone(),
            reason: format!("cannot use scheme {scheme}"),
        })?;
        url.set_path("/ws");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}
