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


//! Parallel Bayesian personalized ranking (BPR) matrix factorization for implicit feedback, and
//! fast top-N recommendation from the learned factors.
//!
//! Training runs a fixed number of workers which update shared user and item factors without
//! any locking. Recommendations are computed by scoring the whole catalog (with a full sort or a
//! bounded heap), or only the nearest neighbors of the items a user already interacted with.

extern crate csv;
extern crate fnv;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use std::time::Instant;

pub mod config;
pub mod error;
pub mod evaluate;
pub mod factors;
mod hogwild;
pub mod history;
pub mod io;
pub mod neighbors;
pub mod rank;
pub mod recommend;
pub mod sampling;
pub mod train;
pub mod types;
pub mod utils;

pub use crate::config::Hyperparams;
pub use crate::error::{Error, Result};
pub use crate::factors::{FactorMatrix, FactorStore};
pub use crate::history::HistoryIndex;
pub use crate::neighbors::{BruteForceNeighbors, Metric, NeighborIndex, NeighborIndexBuilder,
    NeighborTable, Selection};
pub use crate::recommend::{Recommender, Strategy};
pub use crate::train::{PairwiseRankTrainer, TrainingSummary};
pub use crate::types::{Interaction, ItemId, UserId};

/// Everything needed to serve recommendations after training.
pub struct TrainedModel {
    pub factors: FactorStore,
    pub histories: HistoryIndex,
    pub summary: TrainingSummary,
}

/// Builds the user histories, initializes gaussian factors for `num_users` users and `num_items`
/// items, and trains them on the interactions. Without interactions the factors stay at their
/// initial values, but `num_users` and `num_items` must then be given explicitly.
pub fn train(
    interactions: &[Interaction],
    num_users: usize,
    num_items: usize,
    hyperparams: &Hyperparams,
) -> Result<TrainedModel> {

    hyperparams.validate()?;

    if interactions.is_empty() && (num_users == 0 || num_items == 0) {
        return Err(Error::NoInteractions);
    }

    let start = Instant::now();

    let histories = HistoryIndex::from_interactions(interactions);

    info!(
        "Built histories for {} users from {} interactions in {}ms",
        histories.num_users(),
        interactions.len(),
        utils::to_millis(start.elapsed()),
    );

    let factors = FactorStore::new(
        num_users,
        num_items,
        hyperparams.num_factors,
        hyperparams.mu,
        hyperparams.sigma,
    )?;

    let trainer = PairwiseRankTrainer::new(interactions, &histories, hyperparams)?;
    let (factors, summary) = trainer.train(factors)?;

    Ok(TrainedModel { factors, histories, summary })
}
