//! # Price Feed Client
//! Client-side reconciliation of the bonding-curve price feed.
//!
//! A mounted [`PriceFeed`] runs two independent tasks writing into one shared [`PriceView`]:
//! * a real-time push task holding exactly one WebSocket connection to `/ws`,
//! * a REST poll task fetching `/api/prices/current` and `/api/prices/history/{interval}`.
//!
//! Both paths go through the same recency rule: a held sample is only replaced by one that is
//! not older. Connection loss is surfaced as [`PriceView::is_connected`] becoming `false`, never
//! as an error, and every previously received value stays readable.
//!
//! ```no_run
//! use price_feed_client::{FeedConfig, PriceFeed};
//!
//! # async fn run() -> Result<(), price_feed_client::error::FeedError> {
//! let feed = PriceFeed::mount(FeedConfig::new("https://example.com"))?;
//! let mut changed = feed.changed();
//! while changed.changed().await.is_ok() {
//!     let view = feed.snapshot();
//!     println!("{:?} @ ratio {}", view.current_price(), view.premium_ratio());
//! }
//! # Ok(())
//! # }
//! ```

/// REST client for the price endpoints.
pub mod api;

/// [`FeedConfig`] builder and [`ReconnectPolicy`](config::ReconnectPolicy).
pub mod config;

/// All [`Error`](std::error::Error)s generated in `price-feed-client`.
pub mod error;

/// [`PriceFeed::mount`] and the [`MountedFeed`](feed::MountedFeed) lifecycle.
pub mod feed;

/// REST fallback poll loop.
pub mod poller;

/// [`PriceView`] reconciliation rules and its shared [`ViewHandle`](view::ViewHandle).
pub mod view;

/// Real-time WebSocket push loop.
pub mod websocket;

pub use config::{FeedConfig, ReconnectPolicy};
pub use feed::{MountedFeed, PriceFeed};
pub use view::{PriceView, ViewHandle};
