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


//! Candidate restriction via nearest neighbors in the item factor space.
//!
//! Ranking only needs the neighbor lists of items, how they are found is up to the index. Any
//! backend (tree-based, graph-based, hashing-based, or lists computed by an external tool) can
//! be plugged in by implementing `NeighborIndex`.

use std::str::FromStr;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::factors::{dot, FactorMatrix, FactorStore};
use crate::rank::{self, ScoredItem};
use crate::types::{self, ItemId, ItemSet, UserId};
use crate::utils;

/// Read access to precomputed item neighborhoods.
pub trait NeighborIndex: Send + Sync {
    /// Up to `k + 1` nearest items of `item` in order of increasing distance, the item itself
    /// included. Empty for items the index does not know.
    fn neighbors_of(&self, item: ItemId) -> &[ItemId];
}

/// Builds a neighbor index over item factors. The builder value carries the backend's own
/// configuration.
pub trait NeighborIndexBuilder {
    type Index: NeighborIndex;

    fn build(&self, item_factors: &FactorMatrix, k: usize) -> Result<Self::Index>;
}

/// Materialized neighbor lists, one per item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborTable {
    neighbors: Vec<Vec<ItemId>>,
}

impl NeighborTable {

    pub fn new(neighbors: Vec<Vec<ItemId>>) -> Self {
        NeighborTable { neighbors }
    }

    pub fn num_items(&self) -> usize {
        self.neighbors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item=(ItemId, &[ItemId])> {
        self.neighbors.iter()
            .enumerate()
            .map(|(item, neighbors)| (item as ItemId, neighbors.as_slice()))
    }

    /// Makes sure that all listed neighbors exist in a catalog of `num_items` items.
    pub fn check_ids(&self, num_items: usize) -> Result<()> {
        for neighbors in &self.neighbors {
            if let Some(&item) = neighbors.iter().find(|item| **item as usize >= num_items) {
                return Err(Error::IdOutOfRange { kind: "item", id: item, bound: num_items });
            }
        }
        Ok(())
    }
}

impl NeighborIndex for NeighborTable {

    fn neighbors_of(&self, item: ItemId) -> &[ItemId] {
        self.neighbors.get(item as usize)
            .map(|neighbors| neighbors.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Cosine,
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "euclidean" => Ok(Metric::Euclidean),
            "cosine" => Ok(Metric::Cosine),
            _ => Err(Error::UnknownName { what: "metric", name: name.to_owned() }),
        }
    }
}

/// Exact k-nearest-neighbor search by comparing every pair of items, parallel over items.
/// Quadratic in the number of items, meant for moderate catalogs and as a reference backend.
#[derive(Clone, Copy, Debug)]
pub struct BruteForceNeighbors {
    pub metric: Metric,
}

impl BruteForceNeighbors {

    pub fn new(metric: Metric) -> Self {
        BruteForceNeighbors { metric }
    }
}

impl NeighborIndexBuilder for BruteForceNeighbors {
    type Index = NeighborTable;

    fn build(&self, item_factors: &FactorMatrix, k: usize) -> Result<NeighborTable> {

        let build_start = Instant::now();

        let num_items = item_factors.num_rows();
        let metric = self.metric;

        let norms: Vec<f64> = item_factors.rows().map(|row| dot(row, row).sqrt()).collect();

        // Higher similarity means closer, so we can reuse the top-n selection of the rankers.
        let similarity = |a: usize, b: usize| -> f64 {
            let row_a = item_factors.row(a);
            let row_b = item_factors.row(b);
            match metric {
                Metric::Euclidean => {
                    -row_a.iter().zip(row_b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>()
                },
                Metric::Cosine => {
                    let norm = norms[a] * norms[b];
                    if norm > 0.0 { dot(row_a, row_b) / norm } else { 0.0 }
                },
            }
        };

        let neighbors: Vec<Vec<ItemId>> = (0..num_items)
            .into_par_iter()
            .map(|item| {
                let others = (0..num_items)
                    .filter(|other| *other != item)
                    .map(|other| ScoredItem { item: other as ItemId, score: similarity(item, other) });

                let closest = rank::select_top_n(others, k);

                let mut neighbors = Vec::with_capacity(closest.len() + 1);
                neighbors.push(item as ItemId);
                neighbors.extend(closest.iter().map(|scored_item| scored_item.item));
                neighbors
            })
            .collect();

        info!(
            "Computed {} nearest neighbors for {} items in {}ms",
            k,
            num_items,
            utils::to_millis(build_start.elapsed()),
        );

        Ok(NeighborTable::new(neighbors))
    }
}

/// How to pick the best items from a restricted candidate pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Sort,
    Heap,
}

/// Union of the neighbor lists of all items in a history, without the history items themselves
/// and without duplicates. Empty for an empty history. Neighbor ids at or above `num_items` are
/// dropped.
pub fn neighbor_candidates(
    history: &ItemSet,
    index: &dyn NeighborIndex,
    num_items: usize,
) -> Vec<ItemId> {

    let mut seen = types::new_item_set(history.len() * 10);
    let mut candidates = Vec::new();

    for history_item in history.iter() {
        for &neighbor in index.neighbors_of(*history_item) {
            if neighbor as usize >= num_items || history.contains(&neighbor) {
                continue;
            }
            if seen.insert(neighbor) {
                candidates.push(neighbor);
            }
        }
    }

    candidates
}

/// Ranks only the neighbors of a user's history items. Much cheaper than scoring the whole
/// catalog when histories are short, at the price of missing good items outside of the
/// neighborhoods.
pub fn neighbor_top_n(
    factors: &FactorStore,
    history: &ItemSet,
    index: &dyn NeighborIndex,
    user: UserId,
    n: usize,
    selection: Selection,
) -> Vec<ScoredItem> {

    let candidates = neighbor_candidates(history, index, factors.num_items());
    let scored_items = rank::score_items(factors, user, candidates);

    match selection {
        Selection::Heap => rank::select_top_n(scored_items, n),
        Selection::Sort => rank::sort_top_n(scored_items.collect(), n),
    }
}

#[cfg(test)]
mod tests {

    use proptest::collection::vec;
    use proptest::prelude::*;

    use super::*;

    fn points(coordinates: &[&[f64]]) -> FactorMatrix {
        FactorMatrix::from_rows(coordinates.iter().map(|row| row.to_vec())).unwrap()
    }

    #[test]
    fn brute_force_finds_closest_items() {
        let item_factors = points(&[&[0.0], &[1.0], &[5.0], &[6.5]]);
        let table = BruteForceNeighbors::new(Metric::Euclidean).build(&item_factors, 1).unwrap();

        assert_eq!(table.num_items(), 4);
        assert_eq!(table.neighbors_of(0), &[0, 1]);
        assert_eq!(table.neighbors_of(1), &[1, 0]);
        assert_eq!(table.neighbors_of(2), &[2, 3]);
        assert_eq!(table.neighbors_of(3), &[3, 2]);
        assert!(table.neighbors_of(4).is_empty());
    }

    #[test]
    fn brute_force_caps_lists_at_catalog_size() {
        let item_factors = points(&[&[0.0, 1.0], &[1.0, 0.0], &[5.0, 4.0]]);
        let table = BruteForceNeighbors::new(Metric::Euclidean).build(&item_factors, 10).unwrap();

        for (item, neighbors) in table.iter() {
            assert_eq!(neighbors.len(), 3);
            assert_eq!(neighbors[0], item);
        }
        assert_eq!(table.neighbors_of(2), &[2, 1, 0]);
    }

    #[test]
    fn cosine_ignores_magnitude() {
        let item_factors = points(&[&[1.0, 0.0], &[0.0, 1.0], &[10.0, 0.5]]);
        let table = BruteForceNeighbors::new(Metric::Cosine).build(&item_factors, 1).unwrap();

        assert_eq!(table.neighbors_of(0), &[0, 2]);
        assert_eq!(table.neighbors_of(2), &[2, 0]);
    }

    #[test]
    fn metric_names() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("euclidean".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!("manhattan".parse::<Metric>().is_err());
    }

    #[test]
    fn table_id_check() {
        let table = NeighborTable::new(vec![vec![0, 1], vec![1, 7]]);
        assert!(table.check_ids(8).is_ok());
        assert!(matches!(table.check_ids(3), Err(Error::IdOutOfRange { id: 7, .. })));
    }

    #[test]
    fn restricted_ranking_scores_neighbors_only() {
        let users = FactorMatrix::from_rows(vec![vec![1.0]]).unwrap();
        let items = points(&[&[0.0], &[4.0], &[3.0], &[9.0], &[1.0]]);
        let factors = FactorStore::from_parts(users, items).unwrap();

        let table = NeighborTable::new(vec![
            vec![0, 4, 2],
            vec![1, 2, 0],
            vec![2, 1, 4],
            vec![3, 1, 2],
            vec![4, 0, 2],
        ]);

        let history: ItemSet = [0, 2].iter().cloned().collect();

        for &selection in &[Selection::Heap, Selection::Sort] {
            let top_n = neighbor_top_n(&factors, &history, &table, 0, 5, selection);
            let items: Vec<ItemId> = top_n.iter().map(|scored_item| scored_item.item).collect();
            // Item 3 scores best, but is no neighbor of the history.
            assert_eq!(items, vec![1, 4]);

            let top_one = neighbor_top_n(&factors, &history, &table, 0, 1, selection);
            assert_eq!(top_one[0].item, 1);
        }

        let empty = ItemSet::default();
        assert!(neighbor_top_n(&factors, &empty, &table, 0, 5, Selection::Heap).is_empty());
    }

    #[test]
    fn neighbors_outside_the_catalog_are_dropped() {
        let users = FactorMatrix::from_rows(vec![vec![1.0]]).unwrap();
        let items = points(&[&[1.0], &[2.0]]);
        let factors = FactorStore::from_parts(users, items).unwrap();

        let table = NeighborTable::new(vec![vec![0, 5, 1, 4000000000]]);
        let history: ItemSet = [0].iter().cloned().collect();

        assert_eq!(neighbor_candidates(&history, &table, 2), vec![1]);

        for &selection in &[Selection::Heap, Selection::Sort] {
            let top_n = neighbor_top_n(&factors, &history, &table, 0, 3, selection);
            let items: Vec<ItemId> = top_n.iter().map(|scored_item| scored_item.item).collect();
            assert_eq!(items, vec![1]);
        }
    }

    fn table_and_history() -> impl Strategy<Value=(usize, Vec<Vec<u32>>, Vec<u32>)> {
        (1usize..30).prop_flat_map(|num_items| {
            let max_id = num_items as u32;
            (
                Just(num_items),
                vec(vec(0..max_id, 0..6), num_items),
                vec(0..max_id, 0..8),
            )
        })
    }

    proptest! {
        #[test]
        fn candidate_pool_properties((num_items, lists, history_items) in table_and_history()) {
            let table = NeighborTable::new(lists);
            let history: ItemSet = history_items.into_iter().collect();

            let candidates = neighbor_candidates(&history, &table, num_items);
            let unique: ItemSet = candidates.iter().cloned().collect();

            prop_assert_eq!(unique.len(), candidates.len());
            prop_assert!(candidates.iter().all(|item| (*item as usize) < num_items));
            prop_assert!(candidates.iter().all(|item| !history.contains(item)));

            if history.is_empty() {
                prop_assert!(candidates.is_empty());
            }

            for history_item in history.iter() {
                for neighbor in table.neighbors_of(*history_item) {
                    prop_assert!(history.contains(neighbor) || unique.contains(neighbor));
                }
            }
        }
    }
}
