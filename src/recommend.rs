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


use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::factors::FactorStore;
use crate::history::HistoryIndex;
use crate::neighbors::{self, NeighborIndex, Selection};
use crate::rank::{self, ScoredItem};
use crate::types::{ItemId, UserId};

/// How to find the best items for a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Score and sort the whole catalog.
    Exhaustive,
    /// Score the whole catalog, keep the best items in a bounded heap.
    Heap,
    /// Score only neighbors of the items in the user's history.
    NeighborRestricted(Selection),
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "exhaustive" => Ok(Strategy::Exhaustive),
            "heap" => Ok(Strategy::Heap),
            "neighbors" => Ok(Strategy::NeighborRestricted(Selection::Heap)),
            "neighbors-sorted" => Ok(Strategy::NeighborRestricted(Selection::Sort)),
            _ => Err(Error::UnknownName { what: "strategy", name: name.to_owned() }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Strategy::Exhaustive => "exhaustive",
            Strategy::Heap => "heap",
            Strategy::NeighborRestricted(Selection::Heap) => "neighbors",
            Strategy::NeighborRestricted(Selection::Sort) => "neighbors-sorted",
        };
        write!(f, "{}", name)
    }
}

/// Serves top-N lists from a trained model. Everything it references is immutable, so a single
/// recommender can be used from many threads at once.
pub struct Recommender<'a> {
    factors: &'a FactorStore,
    histories: &'a HistoryIndex,
    neighbor_index: Option<&'a dyn NeighborIndex>,
}

impl<'a> Recommender<'a> {

    pub fn new(factors: &'a FactorStore, histories: &'a HistoryIndex) -> Self {
        Recommender { factors, histories, neighbor_index: None }
    }

    /// Enables the neighbor-restricted strategy.
    pub fn with_neighbors(mut self, neighbor_index: &'a dyn NeighborIndex) -> Self {
        self.neighbor_index = Some(neighbor_index);
        self
    }

    pub fn histories(&self) -> &HistoryIndex {
        self.histories
    }

    /// The best `n` items for a user that are not in the user's history, best first. Returns
    /// fewer than `n` items if fewer candidates exist. Users without a history are ranked with
    /// an empty exclusion set, which leaves the neighbor-restricted strategy without candidates.
    pub fn scored_top_n(&self, user: UserId, n: usize, strategy: Strategy) -> Result<Vec<ScoredItem>> {

        let num_users = self.factors.num_users();
        if user as usize >= num_users {
            return Err(Error::IdOutOfRange { kind: "user", id: user, bound: num_users });
        }

        let history = self.histories.items(user);

        let top_n = match strategy {
            Strategy::Exhaustive => rank::exhaustive_top_n(self.factors, history, user, n),
            Strategy::Heap => rank::heap_top_n(self.factors, history, user, n),
            Strategy::NeighborRestricted(selection) => {
                let index = self.neighbor_index.ok_or(Error::MissingNeighborIndex)?;
                neighbors::neighbor_top_n(self.factors, history, index, user, n, selection)
            },
        };

        Ok(top_n)
    }

    pub fn top_n(&self, user: UserId, n: usize, strategy: Strategy) -> Result<Vec<ItemId>> {
        let top_n = self.scored_top_n(user, n, strategy)?;
        Ok(top_n.into_iter().map(|scored_item| scored_item.item).collect())
    }

    /// Top-N lists for every user with a row in the factors, computed in parallel.
    pub fn recommend_all(&self, n: usize, strategy: Strategy) -> Result<Vec<Vec<ItemId>>> {
        (0..self.factors.num_users() as UserId)
            .into_par_iter()
            .map(|user| self.top_n(user, n, strategy))
            .collect()
    }
}
