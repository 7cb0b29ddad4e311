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


use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::factors::{dot, FactorStore};
use crate::types::{ItemId, ItemSet, UserId};

/// An item with its predicted score for some user.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ScoredItem {
    pub item: ItemId,
    pub score: f64,
}

/// Ordering for our heaps: higher scores compare as smaller, so that a `BinaryHeap` keeps the
/// lowest score at its top and an ascending sort ranks the best item first. NaN scores rank below
/// every other score, including negative infinity, so degenerate items end up last and never
/// break sorting. Items with equal scores compare as equal, their relative rank is unspecified.
fn cmp_reverse(scored_item_a: &ScoredItem, scored_item_b: &ScoredItem) -> Ordering {
    rank_key(scored_item_b.score).cmp(&rank_key(scored_item_a.score))
}

#[inline]
fn rank_key(score: f64) -> (bool, OrderedFloat<f64>) {
    (!score.is_nan(), OrderedFloat(score))
}

impl Eq for ScoredItem {}

impl Ord for ScoredItem {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_reverse(self, other)
    }
}

impl PartialOrd for ScoredItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(cmp_reverse(self, other))
    }
}

/// Offers an item to a heap holding at most `n` items. Once the heap is full, the current worst
/// item is only replaced by a strictly better one.
#[inline]
pub(crate) fn offer(heap: &mut BinaryHeap<ScoredItem>, n: usize, scored_item: ScoredItem) {
    if heap.len() < n {
        heap.push(scored_item);
    } else if let Some(mut top) = heap.peek_mut() {
        if scored_item < *top {
            *top = scored_item;
        }
    }
}

/// Selects the `n` best items with a bounded heap, best first. Returns fewer than `n` items if
/// fewer are offered.
pub fn select_top_n<I>(scored_items: I, n: usize) -> Vec<ScoredItem>
    where I: IntoIterator<Item=ScoredItem> {

    let mut heap = BinaryHeap::with_capacity(n);
    for scored_item in scored_items {
        offer(&mut heap, n, scored_item);
    }

    // Draining the heap would give us the worst item first, the reversed ordering makes the
    // sorted vector start with the best one.
    heap.into_sorted_vec()
}

/// Selects the `n` best items by fully sorting them, best first.
pub fn sort_top_n(mut scored_items: Vec<ScoredItem>, n: usize) -> Vec<ScoredItem> {
    scored_items.sort_unstable();
    scored_items.truncate(n);
    scored_items
}

/// Scores the given items for a user.
pub fn score_items<'a, I>(
    factors: &'a FactorStore,
    user: UserId,
    items: I,
) -> impl Iterator<Item=ScoredItem> + 'a
    where I: IntoIterator<Item=ItemId>, I::IntoIter: 'a {

    let user_factors = factors.users().row(user as usize);
    let item_factors = factors.items();

    items.into_iter().map(move |item| {
        ScoredItem { item, score: dot(user_factors, item_factors.row(item as usize)) }
    })
}

/// Scores every item in the catalog, sorts all of them and returns the first `n` which are not
/// in the user's history. Costs `O(|I| F + |I| log |I|)`.
pub fn exhaustive_top_n(
    factors: &FactorStore,
    history: &ItemSet,
    user: UserId,
    n: usize,
) -> Vec<ScoredItem> {

    let all_items = 0..factors.num_items() as ItemId;
    let mut scored_items: Vec<ScoredItem> = score_items(factors, user, all_items).collect();

    scored_items.sort_unstable();

    scored_items.into_iter()
        .filter(|scored_item| !history.contains(&scored_item.item))
        .take(n)
        .collect()
}

/// Scores every item outside of the user's history and keeps the best `n` in a bounded heap.
/// Costs `O(|I| F + |I| log n)`.
pub fn heap_top_n(
    factors: &FactorStore,
    history: &ItemSet,
    user: UserId,
    n: usize,
) -> Vec<ScoredItem> {

    let unseen_items = (0..factors.num_items() as ItemId)
        .filter(|item| !history.contains(item));

    select_top_n(score_items(factors, user, unseen_items), n)
}
