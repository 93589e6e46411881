//! # Price Transforms
//!
//! The broadcast manager does not know how prices move. It is handed a
//! [`RecordTransform`] at construction and applies it to one record per tick.
//! Any `Fn(&StockRecord) -> StockRecord + Send + Sync` is a transform, so plain
//! functions and closures plug in directly.

use rand::Rng;

use super::record::StockRecord;

/// A replaceable price-update policy.
pub trait RecordTransform: Send + Sync {
    /// Returns the updated record. Must keep `low <= current <= high`.
    fn transform(&self, record: &StockRecord) -> StockRecord;
}

impl<F> RecordTransform for F
where
    F: Fn(&StockRecord) -> StockRecord + Send + Sync,
{
    fn transform(&self, record: &StockRecord) -> StockRecord {
        self(record)
    }
}

/// Leaves the record unchanged. Used when no transform is supplied.
pub fn identity_transform(record: &StockRecord) -> StockRecord {
    record.clone()
}

/// Simulated quote: moves `current` up or down (equal odds) by 1–5% of the
/// record's `high - low` range, then widens `low`/`high` to bracket it.
pub fn basic_transform(record: &StockRecord) -> StockRecord {
    basic_transform_with(&mut rand::rng(), record)
}

/// [`basic_transform`] driven by a caller-supplied RNG.
pub fn basic_transform_with<R: Rng + ?Sized>(rng: &mut R, record: &StockRecord) -> StockRecord {
    let range = record.high - record.low;
    let percent = 1.0 + 4.0 * rng.random::<f64>();
    let amount = 0.01 * percent * range;
    let direction = if rng.random_bool(0.5) { -1.0 } else { 1.0 };

    let current = record.current + direction * amount;

    StockRecord {
        symbol: record.symbol.clone(),
        name: record.name.clone(),
        low: record.low.min(current),
        high: record.high.max(current),
        current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn step_is_one_to_five_percent_of_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let record = StockRecord::new("T", "Test", 10.0, 20.0, 15.0);
        for _ in 0..10_000 {
            let next = basic_transform_with(&mut rng, &record);
            let step = (next.current - record.current).abs();
            assert!((14.5..=15.5).contains(&next.current), "current {}", next.current);
            assert!(step >= 0.1 - 1e-9 && step < 0.5, "step {step}");
            assert_eq!((next.low, next.high), (10.0, 20.0));
        }
    }

    #[test]
    fn both_directions_occur() {
        let mut rng = StdRng::seed_from_u64(5);
        let record = StockRecord::new("T", "Test", 10.0, 20.0, 15.0);
        let ups = (0..2_000)
            .filter(|_| basic_transform_with(&mut rng, &record).current > record.current)
            .count();
        assert!((800..1_200).contains(&ups), "{ups} upward moves out of 2000");
    }

    #[test]
    fn bounds_widen_and_never_narrow() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut record = StockRecord::new("AMD", "Advanced Micro Dev.", 10.025, 10.5, 10.5);
        for _ in 0..5_000 {
            let next = basic_transform_with(&mut rng, &record);
            assert!(next.is_bracketed(), "{next:?}");
            assert!(next.low <= record.low && next.high >= record.high);
            record = next;
        }
    }

    #[test]
    fn flat_range_stays_put() {
        let record = StockRecord::new("F", "Flat", 5.0, 5.0, 5.0);
        assert_eq!(basic_transform(&record), record);
    }

    #[test]
    fn closures_and_identity_are_transforms() {
        let record = StockRecord::new("T", "Test", 1.0, 2.0, 1.5);
        let bump = |r: &StockRecord| StockRecord { current: r.high, ..r.clone() };
        assert_eq!(bump.transform(&record).current, 2.0);
        assert_eq!(identity_transform.transform(&record), record);
    }
}
