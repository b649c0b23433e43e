#![allow(dead_code)]

use async_trait::async_trait;
use price_feed::{
    computer::PriceComputer,
    error::PriceError,
    hub::PriceHub,
    scheduler::{PriceScheduler, SchedulerConfig},
    source::{PriceSource, RawQuote},
    store::PriceStore,
};
use price_feed_server::{router::router, state::AppState};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Upstream stand-in returning a fixed quote, or a configured failure.
#[derive(Debug)]
pub struct StaticSource {
    pub fetches: AtomicUsize,
    pub quote: Mutex<Result<(Value, Value), PriceError>>,
    pub delay: Duration,
}

impl StaticSource {
    pub fn new(base: f64, native: f64) -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            quote: Mutex::new(Ok((Value::from(base), Value::from(native)))),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(error: PriceError) -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            quote: Mutex::new(Err(error)),
            delay: Duration::ZERO,
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticSource {
    async fn fetch(&self) -> Result<RawQuote, PriceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let quote = self.quote.lock().unwrap().clone();
        quote.map(|(base_valuation, native_valuation)| RawQuote {
            base_valuation,
            native_valuation,
        })
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Serve the full router on an ephemeral port. The scheduler is not started: tests drive
/// refreshes themselves.
pub async fn spawn_server(source: Arc<StaticSource>, admin_token: Option<&str>) -> TestServer {
    let scheduler = Arc::new(PriceScheduler::new(
        Arc::new(PriceStore::default()),
        Arc::new(PriceComputer::new(source)),
        PriceHub::default(),
        SchedulerConfig::default(),
    ));
    let state = AppState::new(scheduler, admin_token.map(str::to_string));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    TestServer { addr, state }
}
