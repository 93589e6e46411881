//! # Utilities Module
//!
//! General-purpose helpers that don't belong to `core` or `markets`.
//!
//! ## Contained Modules:
//!
//! - **`random`**: pseudo-random integer helpers. `RandomIntInRange` maps a
//!   uniform draw onto a closed integer interval without endpoint bias, and
//!   `SeededSequence` is a repeatable Park–Miller generator for debugging runs.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Range mapping and seeded pseudo-random generators.
pub mod random;
