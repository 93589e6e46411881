//! # Market Data Module
//!
//! Groups the market-specific data models used by the push server.
//!
//! ## Contained Modules:
//!
//! - **`stocks`**: the `StockRecord` price model (symbol, name, low, high,
//!   current), the fixed seed price list served at startup, and the price
//!   transforms that simulate live quotes on every broadcast tick.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Stock price records, seed data and price transforms.
pub mod stocks;
