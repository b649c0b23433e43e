use chrono::{DateTime, TimeDelta, Utc};
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Token price captured at a single point in time, denominated in two valuation bases.
///
/// Samples are immutable once stored: a new computation always produces a new sample.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct PriceSample {
    /// Price denominated in the primary quote asset.
    pub base_valuation: f64,
    /// Price denominated in the chain's native asset.
    pub native_valuation: f64,
    pub captured_at: DateTime<Utc>,
}

impl PriceSample {
    /// Both valuations are finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.base_valuation, self.native_valuation]
            .iter()
            .all(|value| value.is_finite() && *value >= 0.0)
    }

    /// True if `self` was captured strictly after `other`.
    pub fn is_newer_than(&self, other: &PriceSample) -> bool {
        self.captured_at > other.captured_at
    }
}

/// History bucket granularity.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
pub enum Interval {
    #[serde(rename = "1h")]
    #[display("1h")]
    OneHour,
    #[serde(rename = "1d")]
    #[display("1d")]
    OneDay,
    #[serde(rename = "7d")]
    #[display("7d")]
    SevenDays,
    #[serde(rename = "30d")]
    #[display("30d")]
    ThirtyDays,
}

impl Interval {
    pub const ALL: [Interval; 4] = [
        Interval::OneHour,
        Interval::OneDay,
        Interval::SevenDays,
        Interval::ThirtyDays,
    ];

    /// Number of samples retained for this interval unless overridden.
    pub fn default_capacity(&self) -> usize {
        match self {
            Interval::OneHour => 60,
            Interval::OneDay => 288,
            Interval::SevenDays => 336,
            Interval::ThirtyDays => 720,
        }
    }

    /// Minimum spacing between two retained samples in this bucket.
    ///
    /// `1h` keeps every sample, coarser buckets downsample so their capacity spans the
    /// whole window: 288 x 5m = 1d, 336 x 30m = 7d, 720 x 1h = 30d.
    pub fn resolution(&self) -> TimeDelta {
        match self {
            Interval::OneHour => TimeDelta::zero(),
            Interval::OneDay => TimeDelta::minutes(5),
            Interval::SevenDays => TimeDelta::minutes(30),
            Interval::ThirtyDays => TimeDelta::hours(1),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unknown interval: {0}, expected one of 1h, 1d, 7d, 30d")]
pub struct ParseIntervalError(pub String);

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "1h" => Ok(Interval::OneHour),
            "1d" => Ok(Interval::OneDay),
            "7d" => Ok(Interval::SevenDays),
            "30d" => Ok(Interval::ThirtyDays),
            other => Err(ParseIntervalError(other.to_string())),
        }
    }
}

/// Samples retained for one [`Interval`], ordered by `captured_at` ascending.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PriceHistory {
    pub interval: Interval,
    pub samples: Vec<PriceSample>,
}

impl PriceHistory {
    pub fn empty(interval: Interval) -> Self {
        Self::new(interval, Vec::new())
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Holder balance projection consumed by the bonding-curve UI.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderEntry {
    pub address: String,
    pub balance: f64,
    pub percentage: f64,
    pub is_developer: bool,
}

/// Bonding-curve progress towards its market cap ceiling.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapState {
    pub current_price: f64,
    /// Monotonically non-decreasing for a given token.
    pub highest_price_reached: f64,
    pub max_cap: f64,
    /// `currentPrice / maxCap * 100` clamped to `[0, 100]`.
    pub cap_percentage: f64,
}

/// Chart resynchronisation payload pushed on a coarser cadence than individual samples.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub current_price: Option<PriceSample>,
    pub recent_history: Vec<PriceSample>,
    pub premium_ratio: f64,
}
