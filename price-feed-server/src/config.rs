use price_feed::{
    hub::DEFAULT_HUB_BUFFER,
    scheduler::SchedulerConfig,
    source::{CurveReserveSource, HttpPriceSource, PriceSource},
};
use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Where prices are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// One JSON document holding both valuations.
    Json {
        url: String,
        base_pointer: String,
        native_pointer: String,
    },
    /// Bonding-curve reserves plus a native-to-quote rate.
    Curve {
        curve_url: String,
        quote_url: String,
        quote_pointer: String,
    },
}

impl SourceConfig {
    pub fn build(&self) -> Arc<dyn PriceSource> {
        match self {
            SourceConfig::Json {
                url,
                base_pointer,
                native_pointer,
            } => Arc::new(HttpPriceSource::new(url, base_pointer, native_pointer)),
            SourceConfig::Curve {
                curve_url,
                quote_url,
                quote_pointer,
            } => Arc::new(
                CurveReserveSource::new(curve_url, quote_url).with_quote_pointer(quote_pointer),
            ),
        }
    }
}

/// Process configuration, read from environment variables (and `.env` via `dotenvy`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub source: SourceConfig,
    pub scheduler: SchedulerConfig,
    pub ws_buffer_size: usize,
    /// Bearer token guarding `POST /api/prices/update`; unguarded when `None`.
    pub admin_token: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so configuration can be tested without touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = parse_or(&lookup, "PRICE_FEED_ADDR", || {
            SocketAddr::from_str(DEFAULT_ADDR).map_err(|_| ConfigError::Invalid {
                key: "PRICE_FEED_ADDR",
                value: DEFAULT_ADDR.to_string(),
            })
        })?;

        let url = lookup("PRICE_SOURCE_URL").ok_or(ConfigError::Missing("PRICE_SOURCE_URL"))?;
        let source = match lookup("PRICE_SOURCE_KIND").as_deref().unwrap_or("json") {
            "json" => SourceConfig::Json {
                url,
                base_pointer: lookup("PRICE_BASE_POINTER")
                    .unwrap_or_else(|| "/baseValuation".to_string()),
                native_pointer: lookup("PRICE_NATIVE_POINTER")
                    .unwrap_or_else(|| "/nativeValuation".to_string()),
            },
            "curve" => SourceConfig::Curve {
                curve_url: url,
                quote_url: lookup("NATIVE_QUOTE_URL")
                    .ok_or(ConfigError::Missing("NATIVE_QUOTE_URL"))?,
                quote_pointer: lookup("NATIVE_QUOTE_POINTER")
                    .unwrap_or_else(|| "/price".to_string()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "PRICE_SOURCE_KIND",
                    value: other.to_string(),
                });
            }
        };

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            price_interval: secs_or(&lookup, "PRICE_INTERVAL_SECS", defaults.price_interval)?,
            chart_interval: secs_or(&lookup, "CHART_INTERVAL_SECS", defaults.chart_interval)?,
            coalesce_window: secs_or(&lookup, "COALESCE_WINDOW_SECS", defaults.coalesce_window)?,
            chart_history_len: parse_or(&lookup, "CHART_HISTORY_LEN", || {
                Ok(defaults.chart_history_len)
            })?,
        };

        Ok(Self {
            addr,
            source,
            scheduler,
            ws_buffer_size: parse_or(&lookup, "WS_BUFFER_SIZE", || Ok(DEFAULT_HUB_BUFFER))?,
            admin_token: lookup("ADMIN_TOKEN").filter(|token| !token.is_empty()),
        })
    }
}

fn parse_or<F, T, D>(lookup: &F, key: &'static str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    D: FnOnce() -> Result<T, ConfigError>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default(),
    }
}

fn secs_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, key, || Ok(default.as_secs()))?;
    if secs == 0 && key != "COALESCE_WINDOW_SECS" {
        return Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
