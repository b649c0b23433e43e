//! # Price Feed Server
//! Serves the [`price_feed`] store over REST and streams the [`price_feed::hub::PriceHub`]
//! over a single `/ws` WebSocket endpoint.
//!
//! | route | purpose |
//! |-------|---------|
//! | `GET /api/prices/current` | latest sample |
//! | `GET /api/prices/history/{interval}` | bucket contents for `1h`, `1d`, `7d` or `30d` |
//! | `POST /api/prices/update` | admin-triggered refresh |
//! | `GET /ws` | real-time `price_update` / `chart_data_update` push |
//! | `GET /health` | connected clients and whether a sample exists |

use crate::{config::ServerConfig, state::AppState};
use price_feed::{
    computer::PriceComputer,
    hub::PriceHub,
    scheduler::PriceScheduler,
    store::PriceStore,
};
use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod state;
pub mod ws;

/// Construct every component once and wire them together.
pub fn build_state(config: &ServerConfig) -> AppState {
    let store = Arc::new(PriceStore::default());
    let computer = Arc::new(PriceComputer::new(config.source.build()));
    let hub = PriceHub::new(config.ws_buffer_size);
    let scheduler = Arc::new(PriceScheduler::new(
        store,
        computer,
        hub,
        config.scheduler.clone(),
    ));

    AppState::new(scheduler, config.admin_token.clone())
}
