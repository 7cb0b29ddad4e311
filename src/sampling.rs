/*
 * ParBPR
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */


use rand::{Rng, SeedableRng, XorShiftRng};

use crate::types::{ItemId, ItemSet};

/// Number of draws before we give up looking for a negative item.
pub const MAX_TRIALS: usize = 10;

/// Rejection sampler for items a user has not interacted with. Each worker owns its own sampler,
/// generators are never shared between threads.
pub struct NegativeSampler {
    num_items: usize,
    rng: XorShiftRng,
}

impl NegativeSampler {

    pub fn new(num_items: usize) -> Self {
        NegativeSampler { num_items, rng: rand::weak_rng() }
    }

    pub fn with_seed(num_items: usize, seed: [u32; 4]) -> Self {
        NegativeSampler { num_items, rng: XorShiftRng::from_seed(seed) }
    }

    /// Draws items uniformly from the catalog until one is outside the user's history. Returns
    /// `None` after `MAX_TRIALS` rejections, in which case the caller skips the training example.
    /// Users whose history covers most of the catalog will therefore rarely get a negative.
    pub fn sample(&mut self, history: &ItemSet) -> Option<ItemId> {
        if self.num_items == 0 {
            return None;
        }

        for _ in 0..MAX_TRIALS {
            let candidate = self.rng.gen_range(0, self.num_items) as ItemId;
            if !history.contains(&candidate) {
                return Some(candidate);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {

    use rand::{Rng, SeedableRng, XorShiftRng};

    use super::{NegativeSampler, MAX_TRIALS};
    use crate::types::ItemSet;

    #[test]
    fn never_returns_history_items() {
        let history: ItemSet = [0, 2, 4, 6, 8].iter().cloned().collect();
        let mut sampler = NegativeSampler::with_seed(10, [1, 2, 3, 4]);

        for _ in 0..1000 {
            if let Some(item) = sampler.sample(&history) {
                assert!(item < 10);
                assert_eq!(item % 2, 1);
            }
        }
    }

    #[test]
    fn empty_history_always_yields_a_negative() {
        let history = ItemSet::default();
        let mut sampler = NegativeSampler::with_seed(3, [7, 7, 7, 7]);

        let mut seen = [false; 3];
        for _ in 0..300 {
            let item = sampler.sample(&history).unwrap();
            seen[item as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn gives_up_when_history_covers_catalog() {
        let history: ItemSet = (0..5).collect();
        let mut sampler = NegativeSampler::with_seed(5, [11, 12, 13, 14]);

        for _ in 0..100 {
            assert_eq!(sampler.sample(&history), None);
        }
    }

    #[test]
    fn gives_up_after_ten_draws() {
        assert_eq!(MAX_TRIALS, 10);

        // Only item 9 is a valid negative. Replaying the same generator tells us how many draws
        // each call needed.
        let history: ItemSet = (0..9).collect();
        let seed = [21, 22, 23, 24];
        let mut sampler = NegativeSampler::with_seed(10, seed);
        let mut replay = XorShiftRng::from_seed(seed);

        let mut found = 0;
        let mut skipped = 0;

        for _ in 0..500 {
            let mut expected = None;
            for _ in 0..10 {
                if replay.gen_range(0usize, 10) == 9 {
                    expected = Some(9);
                    break;
                }
            }

            assert_eq!(sampler.sample(&history), expected);

            match expected {
                Some(_) => found += 1,
                None => skipped += 1,
            }
        }

        // About 35% of the calls see ten misses in a row.
        assert!(found > 0);
        assert!(skipped > 0);
    }
}
