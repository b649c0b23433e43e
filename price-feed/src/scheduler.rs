use crate::{
    computer::PriceComputer,
    error::PriceError,
    hub::PriceHub,
    model::{ChartSnapshot, Interval, PriceSample},
    store::PriceStore,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

/// Cadences of a [`PriceScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often a new sample is computed and pushed as `price_update`.
    pub price_interval: Duration,
    /// How often a `chart_data_update` snapshot is pushed.
    pub chart_interval: Duration,
    /// A refresh requested within this window of a completed one reuses its result.
    pub coalesce_window: Duration,
    /// Number of `1h` samples bundled into each chart snapshot.
    pub chart_history_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            price_interval: Duration::from_secs(60),
            chart_interval: Duration::from_secs(5 * 60),
            coalesce_window: Duration::from_secs(5),
            chart_history_len: 60,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct CompletedRefresh {
    sample: PriceSample,
    finished: Instant,
}

/// Drives the [`PriceComputer`] on a fixed cadence and on demand, recording results into the
/// [`PriceStore`] and announcing them through the [`PriceHub`].
///
/// At most one computation is in flight: callers queue on an async mutex, and a caller that
/// gets the lock shortly after another computation completed reuses that result instead of
/// reading upstream again.
#[derive(Debug)]
pub struct PriceScheduler {
    store: Arc<PriceStore>,
    computer: Arc<PriceComputer>,
    hub: PriceHub,
    config: SchedulerConfig,
    last: Mutex<Option<CompletedRefresh>>,
}

impl PriceScheduler {
    pub fn new(
        store: Arc<PriceStore>,
        computer: Arc<PriceComputer>,
        hub: PriceHub,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            computer,
            hub,
            config,
            last: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<PriceStore> {
        &self.store
    }

    pub fn hub(&self) -> &PriceHub {
        &self.hub
    }

    pub fn computer(&self) -> &Arc<PriceComputer> {
        &self.computer
    }

    /// Compute, record and broadcast a new sample.
    ///
    /// On failure nothing is recorded or broadcast; the previously stored sample stays
    /// current and the error is returned for the caller to report.
    pub async fn refresh(&self) -> Result<PriceSample, PriceError> {
        let mut last = self.last.lock().await;

        if let Some(completed) = last.as_ref()
            && completed.finished.elapsed() <= self.config.coalesce_window
        {
            debug!(
                captured_at = %completed.sample.captured_at,
                "coalesced price refresh into recent result"
            );
            return Ok(completed.sample);
        }

        let sample = match self.computer.compute_sample().await {
            Ok(sample) => sample,
            Err(error) => {
                warn!(
                    kind = error.kind(),
                    %error,
                    "price refresh failed, keeping previous sample"
                );
                return Err(error);
            }
        };

        let intervals = self.store.record(sample);
        let premium_ratio = self.computer.compute_premium_ratio(&sample);
        let receivers = self.hub.publish_price(sample);

        info!(
            base = sample.base_valuation,
            native = sample.native_valuation,
            premium_ratio,
            buckets = intervals.len(),
            receivers,
            "price refreshed"
        );

        *last = Some(CompletedRefresh {
            sample,
            finished: Instant::now(),
        });

        Ok(sample)
    }

    /// Current chart state: latest sample, recent `1h` history and premium ratio.
    pub fn chart_snapshot(&self) -> ChartSnapshot {
        ChartSnapshot {
            current_price: self.store.current(),
            recent_history: self
                .store
                .recent(Interval::OneHour, self.config.chart_history_len),
            premium_ratio: self.computer.premium_ratio(),
        }
    }

    /// Push a `chart_data_update` to every open client.
    pub fn publish_chart(&self) -> usize {
        let receivers = self.hub.publish_chart(self.chart_snapshot());
        debug!(receivers, "published chart snapshot");
        receivers
    }

    /// Run both cadences until the task is aborted. Failed ticks are skipped.
    pub async fn run(self: Arc<Self>) {
        info!(
            price_interval = ?self.config.price_interval,
            chart_interval = ?self.config.chart_interval,
            "starting price scheduler"
        );

        let mut price_timer = interval(self.config.price_interval);
        price_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut chart_timer = interval(self.config.chart_interval);
        chart_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = price_timer.tick() => {
                    // Failure is already logged by refresh
                    let _ = self.refresh().await;
                }
                _ = chart_timer.tick() => {
                    self.publish_chart();
                }
            }
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
