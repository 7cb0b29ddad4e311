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


//! Offline evaluation of top-N lists against held-out interactions.

use std::ops::Add;

use rayon::prelude::*;

use crate::error::Result;
use crate::recommend::{Recommender, Strategy};
use crate::types::Interaction;

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Evaluation {
    /// Number of test interactions for which we computed a top-N list.
    pub num_recs: u64,
    /// Number of test items found in their user's top-N list.
    pub hits: u64,
    pub reciprocal_rank_sum: f64,
}

impl Evaluation {

    pub fn hit_rate(&self) -> f64 {
        if self.num_recs == 0 { 0.0 } else { self.hits as f64 / self.num_recs as f64 }
    }

    /// Mean reciprocal rank, where misses count as zero.
    pub fn mrr(&self) -> f64 {
        if self.num_recs == 0 { 0.0 } else { self.reciprocal_rank_sum / self.num_recs as f64 }
    }
}

impl Add for Evaluation {
    type Output = Evaluation;

    fn add(self, other: Evaluation) -> Evaluation {
        Evaluation {
            num_recs: self.num_recs + other.num_recs,
            hits: self.hits + other.hits,
            reciprocal_rank_sum: self.reciprocal_rank_sum + other.reciprocal_rank_sum,
        }
    }
}

/// Computes a top-N list for the user of every test interaction and checks whether, and at
/// which rank, the held-out item shows up. Test users without a training history are skipped.
pub fn evaluate(
    recommender: &Recommender,
    test_interactions: &[Interaction],
    n: usize,
    strategy: Strategy,
) -> Result<Evaluation> {

    test_interactions.par_iter()
        .filter(|(user, _)| recommender.histories().is_known(*user))
        .map(|&(user, item)| {
            let top_n = recommender.top_n(user, n, strategy)?;

            let evaluation = match top_n.iter().position(|recommended| *recommended == item) {
                Some(rank) => Evaluation {
                    num_recs: 1,
                    hits: 1,
                    reciprocal_rank_sum: 1.0 / (rank + 1) as f64,
                },
                None => Evaluation { num_recs: 1, ..Evaluation::default() },
            };

            Ok(evaluation)
        })
        .try_reduce(Evaluation::default, |a, b| Ok(a + b))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::factors::{FactorMatrix, FactorStore};
    use crate::history::HistoryIndex;

    #[test]
    fn hit_rate_and_mrr() {
        let users = FactorMatrix::from_rows(vec![vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let items = FactorMatrix::from_rows(
            vec![vec![4.0], vec![3.0], vec![2.0], vec![1.0]]).unwrap();
        let factors = FactorStore::from_parts(users, items).unwrap();
        let histories = HistoryIndex::from_interactions(&[(0, 0), (1, 3)]);
        let recommender = Recommender::new(&factors, &histories);

        // User 0 gets [1, 2], user 1 gets [2, 1], user 2 has no history and is skipped.
        let test_interactions = vec![(0, 2), (1, 2), (0, 3), (2, 0)];

        let evaluation = evaluate(&recommender, &test_interactions, 2, Strategy::Heap).unwrap();

        assert_eq!(evaluation.num_recs, 3);
        assert_eq!(evaluation.hits, 2);
        assert!((evaluation.hit_rate() - 2.0 / 3.0).abs() < 1e-12);
        assert!((evaluation.mrr() - 1.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_test_set() {
        let evaluation = Evaluation::default();
        assert_eq!(evaluation.hit_rate(), 0.0);
        assert_eq!(evaluation.mrr(), 0.0);
    }
}
