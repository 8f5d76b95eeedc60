//! Level randomizer.
//!
//! Levels follow a geometric distribution with p = 1/4: a single random
//! `u64` is drawn and every pair of trailing zero bits adds one level.
//!
//! ```text
//!   Level 1: 3/4
//!   Level 2: 3/16
//!   Level N: 3/4 * (1/4)^(N-1)
//! ```
//!
//! The result is additionally capped near log4(elements) so a nearly empty
//! list does not grow towers it cannot use. `fastrand` keeps a thread-local
//! generator, so concurrent inserts never contend on the randomness source.

/// Returns a level in `1..=max_level` for a list currently holding
/// `elements` elements.
#[inline]
pub fn random_level(max_level: usize, elements: u64) -> usize {
    let ceiling = level_ceiling(max_level, elements);
    let random_bits = fastrand::u64(..);

    // Two trailing zero bits per extra level: P(extra >= k) = (1/4)^k
    let extra_levels = (random_bits.trailing_zeros() / 2) as usize;

    (1 + extra_levels).min(ceiling)
}

/// Highest level worth building for `elements` elements: about log4(n) + 1.
#[inline]
pub(crate) fn level_ceiling(max_level: usize, elements: u64) -> usize {
    let significant_bits = (u64::BITS - elements.leading_zeros()) as usize;
    (significant_bits / 2 + 1).clamp(1, max_level.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_LEVEL;

    #[test]
    fn test_levels_stay_in_bounds() {
        for _ in 0..100_000 {
            let level = random_level(MAX_LEVEL, u64::MAX);
            assert!((1..=MAX_LEVEL).contains(&level), "level {} out of range", level);
        }
    }

    #[test]
    fn test_distribution_decreases_with_level() {
        let mut histogram = [0usize; MAX_LEVEL + 1];
        for _ in 0..100_000 {
            histogram[random_level(MAX_LEVEL, u64::MAX)] += 1;
        }

        assert_eq!(histogram[0], 0);
        // Beyond level 7 the expected counts are too small to compare
        for level in 1..7 {
            assert!(
                histogram[level] >= histogram[level + 1],
                "level {} drawn {} times, level {} drawn {} times",
                level,
                histogram[level],
                level + 1,
                histogram[level + 1]
            );
        }
        // Roughly three quarters of all nodes stay at level 1
        assert!(histogram[1] > 70_000 && histogram[1] < 80_000);
    }

    #[test]
    fn test_small_lists_get_short_towers() {
        for _ in 0..10_000 {
            assert_eq!(random_level(MAX_LEVEL, 0), 1);
            assert!(random_level(MAX_LEVEL, 16) <= 3);
        }
    }

    #[test]
    fn test_ceiling_respects_max_level() {
        assert_eq!(level_ceiling(MAX_LEVEL, 0), 1);
        assert_eq!(level_ceiling(MAX_LEVEL, 1), 1);
        assert_eq!(level_ceiling(MAX_LEVEL, 4), 2);
        assert_eq!(level_ceiling(MAX_LEVEL, 1 << 20), 11);
        assert_eq!(level_ceiling(MAX_LEVEL, u64::MAX), MAX_LEVEL);
        assert_eq!(level_ceiling(4, u64::MAX), 4);
    }
}
