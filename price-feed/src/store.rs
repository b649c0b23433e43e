use crate::model::{Interval, PriceHistory, PriceSample};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::debug;

/// Per-[`Interval`] capacities of a [`PriceStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    capacities: FnvHashMap<Interval, usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacities: Interval::ALL
                .into_iter()
                .map(|interval| (interval, interval.default_capacity()))
                .collect(),
        }
    }
}

impl StoreConfig {
    /// Override the capacity of one interval bucket (minimum 1).
    pub fn with_capacity(mut self, interval: Interval, capacity: usize) -> Self {
        self.capacities.insert(interval, capacity.max(1));
        self
    }

    pub fn capacity(&self, interval: Interval) -> usize {
        self.capacities
            .get(&interval)
            .copied()
            .unwrap_or_else(|| interval.default_capacity())
    }
}

/// Bounded FIFO ring of samples for one interval.
#[derive(Debug)]
struct Bucket {
    samples: VecDeque<PriceSample>,
    capacity: usize,
}

impl Bucket {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn latest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    /// Push a sample, rejecting anything not strictly newer than the current tail.
    fn push(&mut self, sample: PriceSample) -> bool {
        if let Some(latest) = self.latest()
            && !sample.is_newer_than(latest)
        {
            return false;
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        true
    }
}

#[derive(Debug)]
struct StoreInner {
    current: Option<PriceSample>,
    buckets: FnvHashMap<Interval, Bucket>,
}

/// Latest [`PriceSample`] plus a bounded history ring per [`Interval`].
///
/// In-memory only. Readers receive copies, so a reader never holds the lock while a caller
/// renders or serialises the result.
#[derive(Debug)]
pub struct PriceStore {
    inner: RwLock<StoreInner>,
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl PriceStore {
    pub fn new(config: StoreConfig) -> Self {
        let buckets = Interval::ALL
            .into_iter()
            .map(|interval| (interval, Bucket::new(config.capacity(interval))))
            .collect();

        Self {
            inner: RwLock::new(StoreInner {
                current: None,
                buckets,
            }),
        }
    }

    /// Latest sample, or `None` before the first successful computation.
    pub fn current(&self) -> Option<PriceSample> {
        self.inner.read().current
    }

    /// Insert a sample into the bucket for `interval`, evicting the oldest entries on
    /// overflow.
    ///
    /// Returns `false` if the sample was rejected because its `captured_at` is not strictly
    /// after the newest sample already in the bucket.
    pub fn append(&self, interval: Interval, sample: PriceSample) -> bool {
        let mut inner = self.inner.write();
        let Some(bucket) = inner.buckets.get_mut(&interval) else {
            return false;
        };

        let accepted = bucket.push(sample);
        if !accepted {
            debug!(%interval, captured_at = %sample.captured_at, "rejected out-of-order sample");
        }
        accepted
    }

    /// Make `sample` the current price and append it to every bucket whose resolution has
    /// elapsed since that bucket's newest sample.
    ///
    /// Returns the intervals the sample was appended to.
    pub fn record(&self, sample: PriceSample) -> Vec<Interval> {
        let mut inner = self.inner.write();

        match inner.current {
            Some(current) if current.is_newer_than(&sample) => {}
            _ => inner.current = Some(sample),
        }

        Interval::ALL
            .into_iter()
            .filter(|interval| {
                let Some(bucket) = inner.buckets.get_mut(interval) else {
                    return false;
                };

                let due = bucket.latest().is_none_or(|latest| {
                    sample.captured_at - latest.captured_at >= interval.resolution()
                });

                due && bucket.push(sample)
            })
            .collect()
    }

    /// Copy of the bucket for `interval`, oldest first.
    pub fn history(&self, interval: Interval) -> PriceHistory {
        let inner = self.inner.read();
        let samples = inner
            .buckets
            .get(&interval)
            .map(|bucket| bucket.samples.iter().copied().collect())
            .unwrap_or_default();

        PriceHistory::new(interval, samples)
    }

    /// The newest `len` samples of `interval`, oldest first.
    pub fn recent(&self, interval: Interval, len: usize) -> Vec<PriceSample> {
        let inner = self.inner.read();
        inner
            .buckets
            .get(&interval)
            .map(|bucket| {
                let skip = bucket.samples.len().saturating_sub(len);
                bucket.samples.iter().skip(skip).copied().collect()
            })
            .unwrap_or_default()
    }
}
