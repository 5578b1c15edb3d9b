//! Random streams and transect selection

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{ResampleStrategy, TransectUnit};

/// Independent generator for draw `draw_index` of a run.
pub fn draw_rng(seed: u64, draw_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(draw_index as u64);
    rng
}

/// Group transects, already in survey order, into adjacent pairs.
///
/// With an odd count the last transect joins the final pair, so every
/// group of a stratum with at least two transects has two or three members.
pub fn adjacent_pairs<T: Clone>(ordered: &[T]) -> Vec<Vec<T>> {
    let mut groups: Vec<Vec<T>> = ordered.chunks(2).map(<[T]>::to_vec).collect();
    if groups.len() > 1 && groups.last().is_some_and(|g| g.len() == 1) {
        if let Some(tail) = groups.pop()
            && let Some(last) = groups.last_mut()
        {
            last.extend(tail);
        }
    }
    groups
}

/// Indices of `n_pairs` pairs drawn with replacement.
pub fn draw_pairs<R: Rng>(n_pairs: usize, rng: &mut R) -> Vec<usize> {
    (0..n_pairs).map(|_| rng.gen_range(0..n_pairs)).collect()
}

/// Number of transects kept from a stratum of `n` in a subsample draw.
pub fn subsample_size(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64).round() as usize).max(2).min(n)
}

/// Select transects in each stratum, strata in ascending order.
///
/// Each pool must be sorted by transect number.
pub fn draw_transects<R: Rng>(
    strata: &BTreeMap<i64, Vec<TransectUnit>>,
    strategy: ResampleStrategy,
    fraction: f64,
    rng: &mut R,
) -> Vec<TransectUnit> {
    let mut selected = Vec::new();
    for pool in strata.values() {
        let n = pool.len();
        match strategy {
            ResampleStrategy::Bootstrap => {
                selected.extend((0..n).map(|_| pool[rng.gen_range(0..n)]));
            }
            ResampleStrategy::JollyHampton => {
                let pairs = adjacent_pairs(pool);
                for i in draw_pairs(pairs.len(), rng) {
                    selected.extend_from_slice(&pairs[i]);
                }
            }
            ResampleStrategy::Subsample => {
                let mut picked: Vec<TransectUnit> = pool
                    .choose_multiple(rng, subsample_size(n, fraction))
                    .copied()
                    .collect();
                picked.sort_unstable();
                selected.extend(picked);
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(numbers: std::ops::RangeInclusive<i64>) -> BTreeMap<i64, Vec<TransectUnit>> {
        let units = numbers
            .map(|transect_num| TransectUnit {
                stratum_num: 1,
                transect_num,
            })
            .collect();
        BTreeMap::from([(1, units)])
    }

    #[test]
    fn test_adjacent_pairs() {
        assert_eq!(adjacent_pairs(&[1, 2, 3, 4]), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(adjacent_pairs(&[1, 2, 3, 4, 5]), vec![vec![1, 2], vec![3, 4, 5]]);
        assert_eq!(adjacent_pairs(&[1, 2, 3]), vec![vec![1, 2, 3]]);
        assert_eq!(adjacent_pairs(&[7, 9]), vec![vec![7, 9]]);
    }

    #[test]
    fn test_jolly_hampton_draw_is_made_of_pairs() {
        let strata = pool(1..=6);
        for draw_index in 0..20 {
            let mut rng = draw_rng(3, draw_index);
            let picked = draw_transects(&strata, ResampleStrategy::JollyHampton, 0.5, &mut rng);
            assert_eq!(picked.len(), 6);
            for pair in picked.chunks(2) {
                assert_eq!(pair[0].transect_num % 2, 1, "{picked:?}");
                assert_eq!(pair[1].transect_num, pair[0].transect_num + 1, "{picked:?}");
            }
        }
    }

    #[test]
    fn test_subsample_size() {
        assert_eq!(subsample_size(10, 0.75), 8);
        assert_eq!(subsample_size(4, 0.75), 3);
        assert_eq!(subsample_size(3, 0.1), 2);
        assert_eq!(subsample_size(2, 1.0), 2);
        assert_eq!(subsample_size(5, 1.0), 5);
    }

    #[test]
    fn test_streams_are_independent() {
        let a: Vec<u32> = (0..4).map(|_| draw_rng(5, 0).gen_range(0..1_000_000)).collect();
        assert!(a.windows(2).all(|w| w[0] == w[1]), "same stream repeats");

        let mut r0 = draw_rng(5, 0);
        let mut r1 = draw_rng(5, 1);
        let s0: Vec<u32> = (0..8).map(|_| r0.gen_range(0..1_000_000)).collect();
        let s1: Vec<u32> = (0..8).map(|_| r1.gen_range(0..1_000_000)).collect();
        assert_ne!(s0, s1);
    }
}
