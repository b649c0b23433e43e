use crate::{api::PriceApi, view::ViewHandle};
use futures::future::join_all;
use price_feed::Interval;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// REST fallback loop: polls the current price every `current_every` and each of `intervals`
/// every `history_every`, applying results to `view`.
///
/// Failures are logged and the view keeps its previous values. Both cadences tick immediately
/// on start.
pub async fn run_poll_loop(
    api: PriceApi,
    current_every: Duration,
    history_every: Duration,
    intervals: Vec<Interval>,
    view: ViewHandle,
) {
    let mut current_tick = tokio::time::interval(current_every);
    current_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut history_tick = tokio::time::interval(history_every);
    history_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = current_tick.tick() => poll_current(&api, &view).await,
            _ = history_tick.tick() => poll_history(&api, &intervals, &view).await,
        }
    }
}

async fn poll_current(api: &PriceApi, view: &ViewHandle) {
    match api.current().await {
        Ok(Some(sample)) => {
            view.apply_rest_current(sample);
        }
        Ok(None) => debug!("no current price available yet"),
        Err(error) => warn!(%error, "failed to poll current price"),
    }
}

/// Fetch every interval concurrently. Each result lands under its own key, so a slow or
/// failed interval never overwrites another.
async fn poll_history(api: &PriceApi, intervals: &[Interval], view: &ViewHandle) {
    let results = join_all(
        intervals
            .iter()
            .map(|interval| async move { (*interval, api.history(*interval).await) }),
    )
    .await;

    for (interval, result) in results {
        match result {
            Ok(history) => {
                view.apply_rest_history(interval, history);
            }
            Err(error) => warn!(%interval, %error, "failed to poll price history"),
        }
    }
}
