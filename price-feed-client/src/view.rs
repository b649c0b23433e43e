use fnv::FnvHashMap;
use parking_lot::RwLock;
use price_feed::{
    DEFAULT_PREMIUM_RATIO, Interval, PriceHistory, PriceSample,
    message::{ChartUpdate, ServerMessage},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Client-side view of the token price, merged from real-time pushes and REST polls.
///
/// Every `apply_*` method returns `true` if the view changed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceView {
    realtime_price: Option<PriceSample>,
    realtime_history: Vec<PriceSample>,
    premium_ratio: f64,
    is_connected: bool,
    rest_current: Option<PriceSample>,
    history: FnvHashMap<Interval, PriceHistory>,
    sequence: u64,
}

impl Default for PriceView {
    fn default() -> Self {
        Self {
            realtime_price: None,
            realtime_history: Vec::new(),
            premium_ratio: DEFAULT_PREMIUM_RATIO,
            is_connected: false,
            rest_current: None,
            history: FnvHashMap::default(),
            sequence: 0,
        }
    }
}

impl PriceView {
    /// Newest known price from either path.
    pub fn current_price(&self) -> Option<PriceSample> {
        self.realtime_price
    }

    pub fn realtime_history(&self) -> &[PriceSample] {
        &self.realtime_history
    }

    pub fn premium_ratio(&self) -> f64 {
        self.premium_ratio
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Last `GET /api/prices/current` result.
    pub fn rest_current(&self) -> Option<PriceSample> {
        self.rest_current
    }

    /// Last `GET /api/prices/history/{interval}` result for `interval`.
    pub fn history(&self, interval: Interval) -> Option<&PriceHistory> {
        self.history.get(&interval)
    }

    /// Bumped on every change, lets consumers skip redraws.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn apply_message(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::PriceUpdate(sample) => self.apply_price(*sample),
            ServerMessage::ChartDataUpdate(update) => self.apply_chart(update),
            ServerMessage::Unknown(kind) => {
                debug!(?kind, "ignoring unknown real-time message");
                false
            }
        }
    }

    /// Replace the real-time price unless the held sample is strictly newer.
    fn apply_price(&mut self, sample: PriceSample) -> bool {
        if self
            .realtime_price
            .is_some_and(|held| held.is_newer_than(&sample))
            || self.realtime_price == Some(sample)
        {
            return false;
        }
        self.realtime_price = Some(sample);
        true
    }

    fn apply_chart(&mut self, update: &ChartUpdate) -> bool {
        let mut changed = false;

        if let Some(sample) = update.current_price {
            changed |= self.apply_price(sample);
        }

        // An empty array means "nothing new", never "clear the chart"
        if let Some(history) = &update.recent_history
            && !history.is_empty()
            && *history != self.realtime_history
        {
            self.realtime_history = history.clone();
            changed = true;
        }

        if let Some(ratio) = update.premium_ratio
            && ratio.is_finite()
            && ratio > 0.0
            && ratio != self.premium_ratio
        {
            self.premium_ratio = ratio;
            changed = true;
        }

        changed
    }

    pub fn set_connected(&mut self, connected: bool) -> bool {
        let changed = self.is_connected != connected;
        self.is_connected = connected;
        changed
    }

    /// Record a REST current-price poll. The sample also competes for the real-time slot.
    pub fn apply_rest_current(&mut self, sample: PriceSample) -> bool {
        let stored = self.rest_current != Some(sample);
        self.rest_current = Some(sample);
        self.apply_price(sample) | stored
    }

    /// Record a REST history poll, keyed by its own interval.
    ///
    /// A non-empty `1h` result also seeds the chart history when its newest sample is not older
    /// than the chart's, so a view without a live connection still shows a chart.
    pub fn apply_rest_history(&mut self, interval: Interval, history: PriceHistory) -> bool {
        let seeded = interval == Interval::OneHour && self.seed_history(&history.samples);

        if self.history.get(&interval) == Some(&history) {
            return seeded;
        }
        self.history.insert(interval, history);
        true
    }

    fn seed_history(&mut self, samples: &[PriceSample]) -> bool {
        let Some(newest) = samples.last() else {
            return false;
        };
        if self
            .realtime_history
            .last()
            .is_some_and(|held| held.is_newer_than(newest))
            || self.realtime_history == samples
        {
            return false;
        }
        self.realtime_history = samples.to_vec();
        true
    }
}

#[derive(Debug)]
struct Slot {
    view: PriceView,
    detached: bool,
}

/// Shared handle to a [`PriceView`], written by the push and poll tasks.
///
/// Every change bumps [`PriceView::sequence`] and is announced on a `watch` channel. Once
/// [`ViewHandle::detach`] has been called all further writes are discarded.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    slot: Arc<RwLock<Slot>>,
    changed: Arc<watch::Sender<u64>>,
}

impl Default for ViewHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewHandle {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            slot: Arc::new(RwLock::new(Slot {
                view: PriceView::default(),
                detached: false,
            })),
            changed: Arc::new(changed),
        }
    }

    /// Cloned snapshot of the current view.
    pub fn snapshot(&self) -> PriceView {
        self.slot.read().view.clone()
    }

    /// Read the view under the lock without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&PriceView) -> R) -> R {
        f(&self.slot.read().view)
    }

    /// Receiver notified with the new sequence number on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn apply_message(&self, message: &ServerMessage) -> bool {
        self.update(|view| view.apply_message(message))
    }

    pub fn set_connected(&self, connected: bool) -> bool {
        self.update(|view| view.set_connected(connected))
    }

    pub fn apply_rest_current(&self, sample: PriceSample) -> bool {
        self.update(|view| view.apply_rest_current(sample))
    }

    pub fn apply_rest_history(&self, interval: Interval, history: PriceHistory) -> bool {
        self.update(|view| view.apply_rest_history(interval, history))
    }

    /// Stop accepting writes. Values already applied stay readable.
    pub fn detach(&self) {
        self.slot.write().detached = true;
    }

    pub fn is_detached(&self) -> bool {
        self.slot.read().detached
    }

    fn update(&self, apply: impl FnOnce(&mut PriceView) -> bool) -> bool {
        let sequence = {
            let mut slot = self.slot.write();
            if slot.detached || !apply(&mut slot.view) {
                return false;
            }
            slot.view.sequence += 1;
            slot.view.sequence
        };

        self.changed.send_replace(sequence);
        true
    }
}
