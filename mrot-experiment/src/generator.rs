//! Balanced, randomized trial sequences.
//!
//! A block is drawn from the full character × angle × orientation cross
//! product: the pool is shuffled once and truncated. When more trials are
//! requested than the pool holds, the block is capped at the pool size so no
//! stimulus repeats within a block.

use mrot_core::{Orientation, TrialSpec};
use rand::Rng;

pub fn generate<R: Rng + ?Sized>(
    block_size: usize,
    angles: &[u16],
    characters: &[char],
    rng: &mut R,
) -> Vec<TrialSpec> {
    let mut pool = cross_product(angles, characters);
    shuffle(&mut pool, rng);
    pool.truncate(block_size);

    pool.into_iter()
        .enumerate()
        .map(|(sequence_index, (character, angle, orientation))| TrialSpec {
            character,
            orientation,
            angle,
            sequence_index,
        })
        .collect()
}

/// Fisher–Yates: walk from the last index down to 1, swapping each element
/// with a uniformly chosen one at or before it.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

fn cross_product(angles: &[u16], characters: &[char]) -> Vec<(char, u16, Orientation)> {
    let mut chars = characters.to_vec();
    dedup_in_order(&mut chars);
    let mut angles = angles.to_vec();
    dedup_in_order(&mut angles);

    let mut pool = Vec::with_capacity(chars.len() * angles.len() * 2);
    for &c in &chars {
        for &a in &angles {
            for o in Orientation::BOTH {
                pool.push((c, a, o));
            }
        }
    }
    pool
}

fn dedup_in_order<T: PartialEq + Copy>(items: &mut Vec<T>) {
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for &item in items.iter() {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    *items = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    const ANGLES: [u16; 6] = [0, 60, 120, 180, 240, 300];

    #[test]
    fn twelve_distinct_specs_from_two_characters() {
        let mut rng = StdRng::seed_from_u64(7);
        let block = generate(12, &ANGLES, &['R', 'J'], &mut rng);

        assert_eq!(block.len(), 12);
        let keys: HashSet<_> = block.iter().map(TrialSpec::key).collect();
        assert_eq!(keys.len(), 12);
        for spec in &block {
            assert!(['R', 'J'].contains(&spec.character));
            assert!(ANGLES.contains(&spec.angle));
        }
        let indices: Vec<_> = block.iter().map(|s| s.sequence_index).collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn oversized_blocks_are_capped_at_the_cross_product() {
        let mut rng = StdRng::seed_from_u64(1);
        let block = generate(100, &ANGLES, &['R', 'J'], &mut rng);

        assert_eq!(block.len(), 24);
        let keys: HashSet<_> = block.iter().map(TrialSpec::key).collect();
        assert_eq!(keys.len(), 24);
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = generate(20, &ANGLES, &['R', 'J', 'G'], &mut StdRng::seed_from_u64(42));
        let b = generate(20, &ANGLES, &['R', 'J', 'G'], &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_inputs_give_empty_blocks() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(generate(10, &[], &['R'], &mut rng).is_empty());
        assert!(generate(10, &ANGLES, &[], &mut rng).is_empty());
        assert!(generate(0, &ANGLES, &['R'], &mut rng).is_empty());
    }

    #[test]
    fn repeated_inputs_do_not_produce_repeats() {
        let mut rng = StdRng::seed_from_u64(3);
        let block = generate(50, &[0, 0, 90], &['R', 'R'], &mut rng);
        assert_eq!(block.len(), 4);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut items: Vec<u32> = (0..50).collect();
        shuffle(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}
