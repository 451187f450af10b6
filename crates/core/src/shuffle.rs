//! Uniform in-place permutation used for question and option order.

use rand::Rng;

/// Fisher–Yates (Durstenfeld) shuffle.
///
/// Walks `i` from the last index down to 1 and swaps slot `i` with a slot
/// drawn uniformly from `[0, i]`. Every permutation is equally likely given
/// a uniform generator. Each call consumes fresh draws from `rng`.
pub fn fisher_yates<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Returns a shuffled permutation of `0..len`.
pub fn shuffled_indices<R>(len: usize, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let mut indices: Vec<usize> = (0..len).collect();
    fisher_yates(&mut indices, rng);
    indices
}

/// True when `candidate` holds every index of `0..len` exactly once.
#[must_use]
pub fn is_index_permutation(candidate: &[usize], len: usize) -> bool {
    if candidate.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &idx in candidate {
        match seen.get_mut(idx) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn shuffle_keeps_the_same_elements() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut items: Vec<u32> = (1..=50).collect();
        fisher_yates(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_handles_tiny_slices() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u8> = Vec::new();
        fisher_yates(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut one = vec![9];
        fisher_yates(&mut one, &mut rng);
        assert_eq!(one, vec![9]);
    }

    #[test]
    fn every_permutation_of_three_shows_up() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..600 {
            seen.insert(shuffled_indices(3, &mut rng));
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn consecutive_shuffles_draw_independently() {
        let mut rng = StdRng::seed_from_u64(3);
        let first = shuffled_indices(20, &mut rng);
        let second = shuffled_indices(20, &mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn index_permutation_check() {
        assert!(is_index_permutation(&[2, 0, 1], 3));
        assert!(!is_index_permutation(&[0, 0, 1], 3));
        assert!(!is_index_permutation(&[0, 1, 3], 3));
        assert!(!is_index_permutation(&[0, 1], 3));
        assert!(is_index_permutation(&[], 0));
    }
}
