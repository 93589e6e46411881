//! # Seeded Sequence
//!
//! A "game quality" Park–Miller minimal-standard generator. The whole state is
//! one 31-bit integer and every draw applies
//!
//! ```text
//! state <- (16807 * state) mod (2^31 - 1)
//! ```
//!
//! Two sequences built from the same seed produce the same values forever,
//! which is what makes a seeded server run reproducible. Zero is an absorbing
//! state of the recurrence, so it can never be used as a seed.

/// Modulus of the recurrence, `2^31 - 1`.
pub const MODULUS: u32 = 2_147_483_647;

/// Multiplier of the recurrence.
pub const MULTIPLIER: u64 = 16_807;

/// Park–Miller's alternative multiplier, used to derive independent seeds.
const SPLIT_MULTIPLIER: u64 = 48_271;

/// Deterministic pseudo-random integer generator.
///
/// Iterating yields the raw iterates in `[1, 2^31 - 2]`; the sequence never
/// ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededSequence {
    state: u32,
}

impl SeededSequence {
    /// Creates a sequence from `seed`.
    ///
    /// The seed is taken as `max(1, |seed|)`. Seeds that are a multiple of the
    /// modulus would collapse to the absorbing zero state and are mapped to 1.
    pub fn new(seed: i64) -> Self {
        let reduced = seed.unsigned_abs() % u64::from(MODULUS);
        let state = u32::try_from(reduced).unwrap_or(1).max(1);
        Self { state }
    }

    /// The current state, i.e. the last value returned (or the seed).
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Advances the sequence and returns the new iterate in `[1, 2^31 - 2]`.
    pub fn next_value(&mut self) -> u32 {
        let next = (MULTIPLIER * u64::from(self.state)) % u64::from(MODULUS);
        // next < MODULUS, so the narrowing is lossless.
        self.state = next as u32;
        self.state
    }

    /// A second sequence for a different consumer of the same seed. Its state
    /// is `48271 * state mod (2^31 - 1)`, which never equals `state` because
    /// the modulus is prime. Does not advance `self`.
    pub fn split(&self) -> SeededSequence {
        let state = (SPLIT_MULTIPLIER * u64::from(self.state)) % u64::from(MODULUS);
        Self { state: state as u32 }
    }

    /// Advances the sequence and returns the iterate normalized into `(0, 1)`.
    pub fn as_number(&mut self) -> f64 {
        f64::from(self.next_value()) / f64::from(MODULUS)
    }
}

impl Default for SeededSequence {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Iterator for SeededSequence {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        Some(self.next_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn seed_one_reproduces_minimal_standard_vector() {
        let drawn: Vec<u32> = SeededSequence::new(1).take(5).collect();
        assert_eq!(drawn, vec![16_807, 282_475_249, 1_622_650_073, 984_943_658, 1_144_108_930]);
    }

    #[test]
    fn zero_and_negative_seeds_are_clamped() {
        let one: Vec<u32> = SeededSequence::new(1).take(20).collect();
        let zero: Vec<u32> = SeededSequence::new(0).take(20).collect();
        assert_eq!(zero, one);

        let minus_one: Vec<u32> = SeededSequence::new(-1).take(20).collect();
        assert_eq!(minus_one, one);

        let minus_seven: Vec<u32> = SeededSequence::new(-7).take(20).collect();
        let seven: Vec<u32> = SeededSequence::new(7).take(20).collect();
        assert_eq!(minus_seven, seven);
    }

    #[test]
    fn multiple_of_modulus_is_not_absorbing() {
        let seq = SeededSequence::new(i64::from(MODULUS) * 3);
        assert_eq!(seq.state(), 1);
        assert!(seq.take(100).all(|v| v != 0));
    }

    #[test]
    fn equal_seeds_give_equal_sequences() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let seed: i64 = rng.random_range(-1_000_000_000_000..1_000_000_000_000);
            let len = rng.random_range(1..2_000);
            let a: Vec<u32> = SeededSequence::new(seed).take(len).collect();
            let b: Vec<u32> = SeededSequence::new(seed).take(len).collect();
            assert_eq!(a, b, "seed {seed} diverged");
        }
    }

    #[test]
    fn iterates_stay_in_range() {
        let mut seq = SeededSequence::new(42);
        for _ in 0..10_000 {
            let v = seq.next_value();
            assert!((1..MODULUS).contains(&v), "{v} outside [1, 2^31 - 2]");
        }
    }

    #[test]
    fn normalized_draws_are_in_open_unit_interval() {
        let mut seq = SeededSequence::new(2_024);
        for _ in 0..10_000 {
            let u = seq.as_number();
            assert!(u > 0.0 && u < 1.0, "{u} outside (0, 1)");
        }
    }

    #[test]
    fn split_never_shares_the_parent_state() {
        for seed in [0, -1, 1, 2, 16_807, i64::from(MODULUS) - 1, i64::MAX, i64::MIN] {
            let parent = SeededSequence::new(seed);
            let child = parent.split();
            assert_ne!(child.state(), parent.state(), "seed {seed}");
            assert!((1..MODULUS).contains(&child.state()));
        }
        assert_eq!(SeededSequence::new(1).split().state(), 48_271);
    }
}
