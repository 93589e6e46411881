/// Unbiased integers in a closed interval, system or seeded RNG.
pub mod range_random;
/// Park–Miller linear congruential generator.
pub mod seeded_sequence;

pub use range_random::RandomIntInRange;
pub use seeded_sequence::SeededSequence;
