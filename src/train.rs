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


//! Parallel pairwise ranking (BPR) training with asynchronous, lock-free SGD.

use std::ops::Add;
use std::time::Instant;

use rand::Rng;
use rayon::ThreadPoolBuilder;

use crate::config::Hyperparams;
use crate::error::{Error, Result};
use crate::factors::FactorStore;
use crate::history::HistoryIndex;
use crate::hogwild::SharedFactorMatrix;
use crate::sampling::NegativeSampler;
use crate::types::Interaction;
use crate::utils;

/// Logistic function, split at zero so that `exp` never overflows for large `|x|`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x > 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let ex = x.exp();
        ex / (1.0 + ex)
    }
}

/// Counts of what the workers did during a training run.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainingSummary {
    /// Number of gradient steps applied.
    pub steps: u64,
    /// Number of drawn examples skipped because no negative item was found.
    pub skipped: u64,
}

impl Add for TrainingSummary {
    type Output = TrainingSummary;

    fn add(self, other: TrainingSummary) -> TrainingSummary {
        TrainingSummary {
            steps: self.steps + other.steps,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Number of epochs a worker runs. The remainder of `num_epochs / num_workers` goes to the first
/// workers, so that all workers together draw exactly `num_epochs` times the number of examples.
pub fn epochs_for_worker(num_epochs: usize, num_workers: usize, worker: usize) -> usize {
    let extra = if worker < num_epochs % num_workers { 1 } else { 0 };
    num_epochs / num_workers + extra
}

/// Applies one BPR update for user `u`, positive item `i` and negative item `j`, and returns
/// `x = P_u · (Q_i - Q_j)` as observed before the update. For every factor, all three new values
/// are computed from the values read at the start of that factor's update.
pub(crate) fn sgd_step(
    users: &SharedFactorMatrix,
    items: &SharedFactorMatrix,
    user: usize,
    positive: usize,
    negative: usize,
    hyperparams: &Hyperparams,
) -> f64 {

    let num_factors = users.num_factors();

    let mut x = 0.0;
    for f in 0..num_factors {
        x += users.get(user, f) * (items.get(positive, f) - items.get(negative, f));
    }

    let delta = 1.0 - sigmoid(x);
    let eta = hyperparams.learning_rate;

    for f in 0..num_factors {
        let p_u = users.get(user, f);
        let q_i = items.get(positive, f);
        let q_j = items.get(negative, f);

        users.set(user, f, p_u + eta * (delta * (q_i - q_j) - hyperparams.reg_user * p_u));
        items.set(positive, f, q_i + eta * (delta * p_u - hyperparams.reg_positive * q_i));
        items.set(negative, f, q_j + eta * (-delta * p_u - hyperparams.reg_negative * q_j));
    }

    x
}

/// Learns user and item factors from positive-only interactions. A fixed pool of workers runs
/// bootstrap-sampled SGD epochs concurrently on the same factor matrices without any locking.
pub struct PairwiseRankTrainer<'a> {
    interactions: &'a [Interaction],
    histories: &'a HistoryIndex,
    hyperparams: &'a Hyperparams,
}

impl<'a> PairwiseRankTrainer<'a> {

    pub fn new(
        interactions: &'a [Interaction],
        histories: &'a HistoryIndex,
        hyperparams: &'a Hyperparams,
    ) -> Result<Self> {
        hyperparams.validate()?;
        Ok(PairwiseRankTrainer { interactions, histories, hyperparams })
    }

    /// Trains the given factors in place and hands them back once all workers are done.
    pub fn train(&self, factors: FactorStore) -> Result<(FactorStore, TrainingSummary)> {

        if self.interactions.is_empty() {
            info!("No interactions to train on, leaving factors untouched.");
            return Ok((factors, TrainingSummary::default()));
        }

        self.check_ids(&factors)?;

        let num_items = factors.num_items();
        let num_workers = self.hyperparams.num_threads;

        let (users, items) = factors.into_parts();
        let users = SharedFactorMatrix::from(users);
        let items = SharedFactorMatrix::from(items);

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|index| format!("bpr-worker-{}", index))
            .build()?;

        info!(
            "Training on {} interactions with {} workers for {} epochs",
            self.interactions.len(),
            num_workers,
            self.hyperparams.num_epochs,
        );

        let training_start = Instant::now();

        let mut summaries = vec![TrainingSummary::default(); num_workers];

        pool.scope(|scope| {
            for (worker, summary) in summaries.iter_mut().enumerate() {

                let num_epochs = epochs_for_worker(self.hyperparams.num_epochs, num_workers, worker);
                let users = &users;
                let items = &items;

                scope.spawn(move |_| {
                    *summary = self.run_worker(worker, num_epochs, users, items, num_items);
                });
            }
        });

        let summary = summaries.into_iter()
            .fold(TrainingSummary::default(), |total, summary| total + summary);

        info!(
            "{} gradient steps, {} skipped examples, {}ms training time",
            summary.steps,
            summary.skipped,
            utils::to_millis(training_start.elapsed()),
        );

        let draws = summary.steps + summary.skipped;
        if summary.skipped * 10 > draws {
            warn!(
                "No negative item found for {} of {} drawn examples, some histories cover most of \
                the catalog",
                summary.skipped,
                draws,
            );
        }

        let factors = FactorStore::from_parts(users.into_inner(), items.into_inner())?;

        Ok((factors, summary))
    }

    fn check_ids(&self, factors: &FactorStore) -> Result<()> {
        let num_users = factors.num_users();
        let num_items = factors.num_items();

        for &(user, item) in self.interactions {
            if user as usize >= num_users {
                return Err(Error::IdOutOfRange { kind: "user", id: user, bound: num_users });
            }
            if item as usize >= num_items {
                return Err(Error::IdOutOfRange { kind: "item", id: item, bound: num_items });
            }
        }

        Ok(())
    }

    fn run_worker(
        &self,
        worker: usize,
        num_epochs: usize,
        users: &SharedFactorMatrix,
        items: &SharedFactorMatrix,
        num_items: usize,
    ) -> TrainingSummary {

        let mut data_rng = rand::weak_rng();
        let mut sampler = NegativeSampler::new(num_items);
        let mut summary = TrainingSummary::default();

        let num_examples = self.interactions.len();

        for epoch in 0..num_epochs {
            // Examples are drawn with replacement, an epoch does not necessarily visit each one.
            for _ in 0..num_examples {
                let (user, positive) = self.interactions[data_rng.gen_range(0, num_examples)];

                match sampler.sample(self.histories.items(user)) {
                    Some(negative) => {
                        sgd_step(
                            users,
                            items,
                            user as usize,
                            positive as usize,
                            negative as usize,
                            self.hyperparams,
                        );
                        summary.steps += 1;
                    },
                    None => summary.skipped += 1,
                }
            }

            debug!("Worker {} finished epoch {}/{}", worker, epoch + 1, num_epochs);
        }

        summary
    }
}

#[cfg(test)]
mod tests {

    use proptest::prelude::*;

    use super::*;
    use crate::factors::FactorMatrix;

    fn hyperparams(num_epochs: usize, num_threads: usize) -> Hyperparams {
        Hyperparams {
            num_factors: 4,
            sigma: 0.1,
            learning_rate: 0.05,
            num_epochs,
            num_threads,
            ..Hyperparams::default()
        }
    }

    #[test]
    fn sigmoid_at_zero() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_eq!(sigmoid(-0.0), 0.5);
    }

    #[test]
    fn sigmoid_does_not_overflow() {
        let high = sigmoid(1000.0);
        let low = sigmoid(-1000.0);
        assert!(high.is_finite() && low.is_finite());
        assert_eq!(high, 1.0);
        assert_eq!(low, 0.0);
    }

    proptest! {
        #[test]
        fn sigmoid_is_symmetric(x in -700.0f64..700.0) {
            prop_assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-12);
        }

        #[test]
        fn sigmoid_is_monotonic(x in -20.0f64..20.0, step in 0.001f64..10.0) {
            prop_assert!(sigmoid(x + step) > sigmoid(x));
        }
    }

    #[test]
    fn repeated_steps_push_towards_zero_delta() {
        let users = FactorMatrix::from_rows(vec![vec![0.1, 0.2]]).unwrap();
        let items = FactorMatrix::from_rows(vec![vec![0.3, -0.1], vec![-0.2, 0.4]]).unwrap();
        let users = SharedFactorMatrix::from(users);
        let items = SharedFactorMatrix::from(items);

        let hyperparams = Hyperparams {
            reg_user: 0.0,
            reg_positive: 0.0,
            reg_negative: 0.0,
            learning_rate: 0.05,
            ..Hyperparams::default()
        };

        let mut previous = sgd_step(&users, &items, 0, 0, 1, &hyperparams);
        for _ in 0..100 {
            let x = sgd_step(&users, &items, 0, 0, 1, &hyperparams);
            assert!(x > previous);
            assert!(1.0 - sigmoid(x) < 1.0 - sigmoid(previous));
            previous = x;
        }
    }

    #[test]
    fn epochs_are_split_across_workers() {
        assert_eq!(epochs_for_worker(64, 4, 0), 16);
        assert_eq!(epochs_for_worker(64, 4, 3), 16);
        assert_eq!(epochs_for_worker(5, 2, 0), 3);
        assert_eq!(epochs_for_worker(5, 2, 1), 2);
        assert_eq!(epochs_for_worker(1, 3, 2), 0);

        let total: usize = (0..7).map(|worker| epochs_for_worker(30, 7, worker)).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn parallel_training_yields_finite_factors() {
        let interactions: Vec<Interaction> = (0..30)
            .map(|n| ((n % 6) as u32, ((n * 7) % 12) as u32))
            .collect();
        let histories = HistoryIndex::from_interactions(&interactions);
        let hyperparams = hyperparams(8, 4);

        let factors = FactorStore::new(6, 12, 4, 0.0, 0.1).unwrap();
        let trainer = PairwiseRankTrainer::new(&interactions, &histories, &hyperparams).unwrap();
        let (factors, summary) = trainer.train(factors).unwrap();

        assert_eq!(summary.steps + summary.skipped, 8 * 30);
        assert_eq!(factors.num_users(), 6);
        assert_eq!(factors.num_items(), 12);

        let all_finite = factors.users().rows()
            .chain(factors.items().rows())
            .all(|row| row.iter().all(|value| value.is_finite()));
        assert!(all_finite);
    }

    #[test]
    fn uneven_epoch_budget_keeps_total_draws() {
        let interactions = vec![(0, 0), (0, 1), (1, 2)];
        let histories = HistoryIndex::from_interactions(&interactions);
        let hyperparams = hyperparams(5, 2);

        let factors = FactorStore::new(2, 10, 4, 0.0, 0.1).unwrap();
        let trainer = PairwiseRankTrainer::new(&interactions, &histories, &hyperparams).unwrap();
        let (_, summary) = trainer.train(factors).unwrap();

        assert_eq!(summary.steps + summary.skipped, 15);
    }

    #[test]
    fn saturated_histories_are_skipped() {
        // The only user has seen every item, so no negative can ever be drawn.
        let interactions = vec![(0, 0), (0, 1)];
        let histories = HistoryIndex::from_interactions(&interactions);
        let hyperparams = hyperparams(3, 1);

        let factors = FactorStore::new(1, 2, 4, 0.0, 0.1).unwrap();
        let initial = factors.clone();
        let trainer = PairwiseRankTrainer::new(&interactions, &histories, &hyperparams).unwrap();
        let (factors, summary) = trainer.train(factors).unwrap();

        assert_eq!(summary, TrainingSummary { steps: 0, skipped: 6 });
        assert_eq!(factors.users(), initial.users());
        assert_eq!(factors.items(), initial.items());
    }

    #[test]
    fn empty_interactions_are_a_no_op() {
        let histories = HistoryIndex::default();
        let hyperparams = hyperparams(4, 2);

        let factors = FactorStore::new(3, 3, 4, 0.0, 0.1).unwrap();
        let initial = factors.clone();
        let trainer = PairwiseRankTrainer::new(&[], &histories, &hyperparams).unwrap();
        let (factors, summary) = trainer.train(factors).unwrap();

        assert_eq!(summary, TrainingSummary::default());
        assert_eq!(factors.users(), initial.users());
        assert_eq!(factors.items(), initial.items());
    }

    #[test]
    fn rejects_ids_beyond_the_factors() {
        let interactions = vec![(0, 0), (0, 5)];
        let histories = HistoryIndex::from_interactions(&interactions);
        let hyperparams = hyperparams(1, 1);

        let factors = FactorStore::new(1, 3, 4, 0.0, 0.1).unwrap();
        let trainer = PairwiseRankTrainer::new(&interactions, &histories, &hyperparams).unwrap();

        let result = trainer.train(factors);
        assert!(matches!(result, Err(Error::IdOutOfRange { kind: "item", id: 5, bound: 3 })));
    }
}
