use crate::{
    api::PriceApi,
    config::FeedConfig,
    error::FeedError,
    poller::run_poll_loop,
    view::{PriceView, ViewHandle},
    websocket::run_push_loop,
};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::info;

/// Entry point of the client reconciliation layer.
#[derive(Debug)]
pub struct PriceFeed;

impl PriceFeed {
    /// Open exactly one real-time connection and start the REST poller, both writing to a
    /// fresh [`ViewHandle`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(config: FeedConfig) -> Result<MountedFeed, FeedError> {
        for (name, every) in [
            ("current_interval", config.current_interval),
            ("history_interval", config.history_interval),
        ] {
            if every == Duration::ZERO {
                return Err(FeedError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        let ws_url = config.ws_url()?;
        let api = PriceApi::new(config.rest_url()?, config.request_timeout)?;
        let view = ViewHandle::new();

        info!(%ws_url, base_url = %config.base_url, "mounting price feed");

        let push = tokio::spawn(run_push_loop(ws_url, config.reconnect, view.clone()));
        let poll = tokio::spawn(run_poll_loop(
            api.clone(),
            config.current_interval,
            config.history_interval,
            config.history_intervals.clone(),
            view.clone(),
        ));

        Ok(MountedFeed {
            view,
            api,
            push,
            poll,
        })
    }
}

/// A running feed. Dropping it has the same effect as [`MountedFeed::unmount`] without
/// waiting for the tasks to finish.
#[derive(Debug)]
pub struct MountedFeed {
    view: ViewHandle,
    api: PriceApi,
    push: JoinHandle<()>,
    poll: JoinHandle<()>,
}

impl MountedFeed {
    pub fn view(&self) -> &ViewHandle {
        &self.view
    }

    pub fn snapshot(&self) -> PriceView {
        self.view.snapshot()
    }

    /// Receiver notified with the view sequence number on every change.
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.view.subscribe()
    }

    /// REST client sharing this feed's base URL, eg/ for the admin trigger.
    pub fn api(&self) -> &PriceApi {
        &self.api
    }

    /// Stop both tasks. No state is written to the view after this returns.
    pub async fn unmount(mut self) {
        self.stop();
        let _ = (&mut self.push).await;
        let _ = (&mut self.poll).await;
        info!("price feed unmounted");
    }

    fn stop(&mut self) {
        self.view.detach();
        self.push.abort();
        self.poll.abort();
    }
}

impl Drop for MountedFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectPolicy;
    use axum::{
        Json, Router,
        extract::{
            Path,
            ws::{Message, WebSocketUpgrade},
        },
        response::Response,
        routing::get,
    };
    use price_feed::Interval;
    use serde_json::{Value, json};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn sample_json(captured_at: &str, base: f64) -> Value {
        json!({
            "baseValuation": base,
            "nativeValuation": base * 1.25,
            "capturedAt": captured_at
        })
    }

    async fn serve(connections: Arc<AtomicUsize>) -> String {
        let ws_route = move |ws: WebSocketUpgrade| {
            let connections = connections.clone();
            async move {
                connections.fetch_add(1, Ordering::SeqCst);
                let response: Response = ws.on_upgrade(|mut socket| async move {
                    let push = json!({
                        "type": "price_update",
                        "data": sample_json("2024-01-01T00:05:00Z", 110.0)
                    });
                    let _ = socket.send(Message::Text(push.to_string().into())).await;
                    // Hold the connection open until the client goes away
                    while let Some(Ok(_)) = socket.recv().await {}
                });
                response
            }
        };

        let app = Router::new()
            .route(
                "/api/prices/current",
                get(|| async {
                    Json(json!({
                        "success": true,
                        "data": sample_json("2024-01-01T00:00:00Z", 100.0)
                    }))
                }),
            )
            .route(
                "/api/prices/history/{interval}",
                get(|Path(interval): Path<String>| async move {
                    Json(json!({
                        "success": true,
                        "data": {
                            "interval": interval,
                            "samples": [sample_json("2024-01-01T00:00:00Z", 100.0)]
                        }
                    }))
                }),
            )
            .route("/ws", get(ws_route));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn wait_until(feed: &MountedFeed, ready: impl Fn(&PriceView) -> bool) {
        let mut changed = feed.changed();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !feed.view().read(&ready) {
                changed.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_mount_merges_push_and_poll() {
        let connections = Arc::new(AtomicUsize::new(0));
        let base_url = serve(connections.clone()).await;

        let config = FeedConfig::new(base_url)
            .with_history_intervals([Interval::OneHour, Interval::OneDay]);
        let feed = PriceFeed::mount(config).unwrap();

        wait_until(&feed, |view| {
            view.is_connected()
                && view.rest_current().is_some()
                && view.history(Interval::OneHour).is_some()
                && view.history(Interval::OneDay).is_some()
                && view
                    .current_price()
                    .is_some_and(|sample| sample.base_valuation == 110.0)
        })
        .await;

        let view = feed.snapshot();
        // Pushed sample is newer than the polled one
        assert_eq!(view.current_price().unwrap().base_valuation, 110.0);
        assert_eq!(view.rest_current().unwrap().base_valuation, 100.0);
        assert_eq!(
            view.history(Interval::OneDay).unwrap().interval,
            Interval::OneDay
        );
        assert_eq!(connections.load(Ordering::SeqCst), 1);

        feed.unmount().await;
    }

    #[tokio::test]
    async fn test_unmount_stops_writes() {
        let base_url = serve(Arc::new(AtomicUsize::new(0))).await;
        let feed = PriceFeed::mount(FeedConfig::new(base_url)).unwrap();
        wait_until(&feed, PriceView::is_connected).await;

        let view = feed.view().clone();
        feed.unmount().await;

        let sequence = view.snapshot().sequence();
        assert!(view.is_detached());
        assert!(!view.set_connected(false));
        assert_eq!(view.snapshot().sequence(), sequence);
    }

    #[test]
    fn test_mount_rejects_bad_config() {
        struct TestCase {
            input: FeedConfig,
        }

        let tests = vec![
            TestCase {
                // TC0: not a URL
                input: FeedConfig::new("::"),
            },
            TestCase {
                // TC1: zero poll cadence
                input: FeedConfig::default().with_current_interval(Duration::ZERO),
            },
            TestCase {
                // TC2: zero history cadence
                input: FeedConfig::default()
                    .with_history_interval(Duration::ZERO)
                    .with_reconnect(ReconnectPolicy::Never),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert!(PriceFeed::mount(test.input).is_err(), "TC{} failed", index);
        }
    }
}
