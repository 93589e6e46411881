//! # Random Integer In Range
//!
//! Computes pseudo-random integers in a closed interval `[a, b]`.
//!
//! The naive `round(a + u * (b - a))` gives each endpoint only half the
//! probability of an interior value. Widening the sampled continuous range by
//! `0.499` on both sides before rounding gives every integer (endpoints
//! included) an equally wide slice. The widening stays below `0.5` so a draw
//! can never round outside the interval.
//!
//! Two flavours are provided:
//! - [`RandomIntInRange::generate_in_range`]: stateless, system RNG, no input
//!   validation.
//! - A stateful [`RandomIntInRange`] whose interval is sanitized by
//!   [`set_interval`](RandomIntInRange::set_interval) and which can draw from a
//!   lazily built [`SeededSequence`] for repeatable runs.

use rand::Rng;

use super::seeded_sequence::SeededSequence;

/// Amount added on each side of the interval to compensate endpoint bias.
const ENDPOINT_BIAS: f64 = 0.499;

/// Rounds halves towards positive infinity, so `-2.5` becomes `-2`.
/// `f64::round` would give `-3`.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Stateful random integer generator over a persisted interval.
#[derive(Debug, Clone)]
pub struct RandomIntInRange {
    /// Lower bound, already rounded to an integer (no bias applied).
    low: f64,
    /// Upper bound, already rounded to an integer (no bias applied).
    high: f64,
    /// Seed used when the seeded generator is first needed.
    seed: i64,
    /// Built on the first seeded draw.
    seeded: Option<SeededSequence>,
}

impl RandomIntInRange {
    /// Creates a generator over `[min, max]` with the given seed for seeded draws.
    ///
    /// Non-finite bounds fall back to the default interval `[0, 1]`; the seed
    /// is taken as `max(1, |seed|)`.
    pub fn new(min: f64, max: f64, seed: i64) -> Self {
        let mut range = Self {
            low: 0.0,
            high: 1.0,
            seed: seed.checked_abs().unwrap_or(i64::MAX).max(1),
            seeded: None,
        };
        range.set_interval(min, max);
        range
    }

    /// Stateless draw in `[min, max.max(min)]` from the thread-local system RNG.
    ///
    /// There is no validation of the inputs.
    pub fn generate_in_range(min: i64, max: i64) -> i64 {
        Self::generate_in_range_with(&mut rand::rng(), min, max)
    }

    /// Same as [`generate_in_range`](Self::generate_in_range) with a caller-supplied RNG.
    pub fn generate_in_range_with<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> i64 {
        let low = min as f64 - ENDPOINT_BIAS;
        let high = min.max(max) as f64 + ENDPOINT_BIAS;
        let u: f64 = rng.random();

        round_half_up(low + u * (high - low)) as i64
    }

    /// Sets a new interval.
    ///
    /// A NaN or infinite bound leaves the previous bound in place. Bounds are
    /// rounded to integers and swapped when given in reverse order.
    pub fn set_interval(&mut self, min: f64, max: f64) {
        let min = if min.is_finite() { round_half_up(min) } else { self.low };
        let max = if max.is_finite() { round_half_up(max) } else { self.high };

        if max < min {
            self.low = max;
            self.high = min;
        } else {
            self.low = min;
            self.high = max;
        }
    }

    /// Current interval as integers.
    pub fn interval(&self) -> (i64, i64) {
        (self.low as i64, self.high as i64)
    }

    /// Seed used for seeded draws.
    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Draws an integer in the current interval.
    ///
    /// With `use_seeded` the uniform variate comes from the internal
    /// [`SeededSequence`], created on first use from the configured seed;
    /// otherwise from the system RNG.
    pub fn generate(&mut self, use_seeded: bool) -> i64 {
        let u = if use_seeded {
            let seed = self.seed;
            self.seeded
                .get_or_insert_with(|| SeededSequence::new(seed))
                .as_number()
        } else {
            rand::rng().random::<f64>()
        };

        self.sample(u)
    }

    fn sample(&self, u: f64) -> i64 {
        let low = self.low - ENDPOINT_BIAS;
        let high = self.high + ENDPOINT_BIAS;
        round_half_up(low + u * (high - low)) as i64
    }
}

impl Default for RandomIntInRange {
    fn default() -> Self {
        Self::new(0.0, 1.0, 1)
    }
}
