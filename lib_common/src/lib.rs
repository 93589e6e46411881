//! # lib_common
//!
//! Shared engine for the live stock price push server. The folder layout maps
//! one-to-one onto cargo features:
//!
//! - **`core`**: the `BroadcastManager`, its `Subscription` handles and the
//!   push-event frame codec.
//! - **`markets`**: the `StockRecord` model, the seed price list and the price
//!   transforms applied on every tick.
//! - **`utils`**: pseudo-random helpers (range mapping and a seeded
//!   Park–Miller sequence) used for tick jitter and record selection.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Broadcast manager, subscriptions and event frames.
#[cfg(feature = "core")]
pub mod core;
/// Market data models and transforms.
#[cfg(feature = "markets")]
pub mod markets;
/// Random number helpers.
#[cfg(feature = "utils")]
pub mod utils;
