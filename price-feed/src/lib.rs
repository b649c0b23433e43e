//! # Price Feed
//! In-memory price distribution layer for a bonding-curve token.
//!
//! A [`PriceComputer`](computer::PriceComputer) derives [`PriceSample`]s from an upstream
//! [`PriceSource`](source::PriceSource), the [`PriceScheduler`](scheduler::PriceScheduler)
//! records them into the [`PriceStore`](store::PriceStore) and the
//! [`PriceHub`](hub::PriceHub) fans every new sample out to connected clients.
//!
//! All components are explicitly owned: construct them once at process start and inject
//! them where needed (see `price-feed-server`).

pub use model::{CapState, ChartSnapshot, HolderEntry, Interval, PriceHistory, PriceSample};

/// All errors generated in `price-feed`.
pub mod error;

/// Core data model: [`PriceSample`], [`PriceHistory`], [`Interval`], [`CapState`] and friends.
pub mod model;

/// Bounded per-interval history ring and latest-sample cache.
pub mod store;

/// Upstream price sources the [`PriceComputer`](computer::PriceComputer) reads from.
pub mod source;

/// Derives validated [`PriceSample`]s, premium ratios and cap state from upstream reads.
pub mod computer;

/// Typed real-time wire messages and their total decoder.
pub mod message;

/// Fan-out of real-time messages to every connected client.
pub mod hub;

/// Fixed-cadence and on-demand refresh with single-flight deduplication.
pub mod scheduler;

/// Neutral premium ratio used before any real sample is known.
pub const DEFAULT_PREMIUM_RATIO: f64 = 1.25;
