use crate::{
    DEFAULT_PREMIUM_RATIO,
    error::PriceError,
    model::{CapState, HolderEntry, PriceSample},
    source::{PriceSource, RawQuote, parse_number},
};
use chrono::Utc;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::{cmp::Ordering, sync::Arc};
use tracing::debug;

/// Upstream reads for one bonding-curve token, as used by
/// [`PriceComputer::compute_cap_state`].
#[derive(Debug, Clone, PartialEq)]
pub struct TokenReads {
    pub token: String,
    pub current_price: f64,
    /// Highest price recorded on-chain, if the curve tracks one.
    pub recorded_high: Option<f64>,
    pub max_cap: f64,
}

/// Derives validated [`PriceSample`]s from a [`PriceSource`].
///
/// Holds the last known premium ratio and the highest price seen per token, both of which
/// only ever move in the directions their invariants allow.
pub struct PriceComputer {
    source: Arc<dyn PriceSource>,
    premium_ratio: Mutex<f64>,
    highs: Mutex<FnvHashMap<String, f64>>,
}

impl std::fmt::Debug for PriceComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceComputer")
            .field("premium_ratio", &*self.premium_ratio.lock())
            .finish_non_exhaustive()
    }
}

impl PriceComputer {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            premium_ratio: Mutex::new(DEFAULT_PREMIUM_RATIO),
            highs: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Read upstream and produce a new sample stamped with the current time.
    ///
    /// Fails with [`PriceError::UpstreamUnavailable`] if the source cannot be reached and
    /// [`PriceError::InvalidData`] if either valuation is non-numeric, non-finite or negative.
    pub async fn compute_sample(&self) -> Result<PriceSample, PriceError> {
        let quote = self.source.fetch().await?;
        let sample = validate_quote(&quote)?;
        debug!(
            base = sample.base_valuation,
            native = sample.native_valuation,
            "computed price sample"
        );
        Ok(sample)
    }

    /// `native / base` when `base > 0`, otherwise the last known ratio unchanged.
    ///
    /// Only finite, positive ratios are remembered.
    pub fn compute_premium_ratio(&self, sample: &PriceSample) -> f64 {
        let mut last = self.premium_ratio.lock();

        if sample.base_valuation > 0.0 {
            let ratio = sample.native_valuation / sample.base_valuation;
            if ratio.is_finite() && ratio > 0.0 {
                *last = ratio;
            }
        }

        *last
    }

    /// Last known premium ratio without recomputing.
    pub fn premium_ratio(&self) -> f64 {
        *self.premium_ratio.lock()
    }

    pub fn compute_cap_state(&self, reads: &TokenReads) -> CapState {
        let current_price = non_negative(reads.current_price);

        let mut highs = self.highs.lock();
        let high = highs.entry(reads.token.clone()).or_insert(0.0);
        *high = high
            .max(current_price)
            .max(reads.recorded_high.map(non_negative).unwrap_or(0.0));

        let cap_percentage = if reads.max_cap.is_finite() && reads.max_cap > 0.0 {
            (current_price / reads.max_cap * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        CapState {
            current_price,
            highest_price_reached: *high,
            max_cap: reads.max_cap,
            cap_percentage,
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn validate_valuation(value: &serde_json::Value, field: &str) -> Result<f64, PriceError> {
    let number = parse_number(value, field)?;
    if !number.is_finite() {
        return Err(PriceError::InvalidData(format!("{field}: {number} is not finite")));
    }
    if number < 0.0 {
        return Err(PriceError::InvalidData(format!("{field}: {number} is negative")));
    }
    Ok(number)
}

fn validate_quote(quote: &RawQuote) -> Result<PriceSample, PriceError> {
    Ok(PriceSample::new(
        validate_valuation(&quote.base_valuation, "baseValuation")?,
        validate_valuation(&quote.native_valuation, "nativeValuation")?,
        Utc::now(),
    ))
}

/// Project raw balances into [`HolderEntry`]s, largest holder first.
///
/// Percentages are relative to `total_supply`, or to the sum of balances when the supply is
/// unknown (zero) or smaller than what the holders own, so they never sum past 100.
pub fn holder_distribution(
    balances: &[(String, f64)],
    total_supply: f64,
    creator: &str,
) -> Vec<HolderEntry> {
    let held = balances
        .iter()
        .map(|(_, balance)| non_negative(*balance))
        .sum::<f64>();
    let denominator = if total_supply.is_finite() && total_supply >= held {
        total_supply
    } else {
        held
    };

    let mut entries = balances
        .iter()
        .map(|(address, balance)| {
            let balance = non_negative(*balance);
            HolderEntry {
                address: address.clone(),
                balance,
                percentage: if denominator > 0.0 {
                    balance / denominator * 100.0
                } else {
                    0.0
                },
                is_developer: address == creator,
            }
        })
        .collect::<Vec<_>>();

    entries.sort_by(|a, b| {
        b.balance
            .partial_cmp(&a.balance)
            .unwrap_or(Ordering::Equal)
    });
    entries
}
