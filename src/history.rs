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


use crate::types::{self, Interaction, ItemId, ItemSet, UserId};

/// The set of items each user has interacted with. Built once, read-only afterwards, and shared
/// between training workers and rankers without synchronization.
#[derive(Clone, Debug, Default)]
pub struct HistoryIndex {
    histories: Vec<ItemSet>,
    empty: ItemSet,
}

impl HistoryIndex {

    /// Single pass over the interactions; repeated pairs are stored once.
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut index = HistoryIndex::default();
        for &(user, item) in interactions {
            index.insert(user, item);
        }
        index
    }

    pub(crate) fn insert(&mut self, user: UserId, item: ItemId) {
        let user_idx = user as usize;
        if user_idx >= self.histories.len() {
            self.histories.resize_with(user_idx + 1, || types::new_item_set(10));
        }
        self.histories[user_idx].insert(item);
    }

    /// The items of a user, empty for users without any interactions.
    pub fn items(&self, user: UserId) -> &ItemSet {
        self.histories.get(user as usize).unwrap_or(&self.empty)
    }

    pub fn contains(&self, user: UserId, item: ItemId) -> bool {
        self.items(user).contains(&item)
    }

    /// Whether we observed at least one interaction for the user.
    pub fn is_known(&self, user: UserId) -> bool {
        !self.items(user).is_empty()
    }

    /// One past the largest user id seen.
    pub fn num_users(&self) -> usize {
        self.histories.len()
    }

    pub fn num_interactions(&self) -> usize {
        self.histories.iter().map(|items| items.len()).sum()
    }

    /// Iterates over all users with a non-empty history.
    pub fn iter(&self) -> impl Iterator<Item=(UserId, &ItemSet)> {
        self.histories.iter()
            .enumerate()
            .filter(|(_, items)| !items.is_empty())
            .map(|(user, items)| (user as UserId, items))
    }
}

impl<'a> std::iter::FromIterator<(UserId, &'a [ItemId])> for HistoryIndex {

    fn from_iter<I: IntoIterator<Item=(UserId, &'a [ItemId])>>(iter: I) -> Self {
        let mut index = HistoryIndex::default();
        for (user, items) in iter {
            for &item in items {
                index.insert(user, item);
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {

    use super::HistoryIndex;

    #[test]
    fn builds_sets_per_user() {
        let index = HistoryIndex::from_interactions(&[(0, 5), (0, 5), (0, 7), (1, 2)]);

        assert_eq!(index.num_users(), 2);
        assert_eq!(index.num_interactions(), 3);

        let mut first: Vec<_> = index.items(0).iter().cloned().collect();
        first.sort();
        assert_eq!(first, vec![5, 7]);

        let second: Vec<_> = index.items(1).iter().cloned().collect();
        assert_eq!(second, vec![2]);
    }

    #[test]
    fn unknown_users_have_empty_histories() {
        let index = HistoryIndex::from_interactions(&[(2, 1)]);

        assert!(!index.is_known(0));
        assert!(index.items(0).is_empty());
        assert!(index.items(17).is_empty());
        assert!(index.is_known(2));
        assert!(index.contains(2, 1));
        assert!(!index.contains(2, 0));

        let users: Vec<_> = index.iter().map(|(user, _)| user).collect();
        assert_eq!(users, vec![2]);
    }

    #[test]
    fn collects_from_item_lists() {
        let lists: Vec<(u32, Vec<u32>)> = vec![(0, vec![3, 4]), (2, vec![1])];
        let index: HistoryIndex = lists.iter()
            .map(|(user, items)| (*user, items.as_slice()))
            .collect();

        assert!(index.contains(0, 4));
        assert!(index.contains(2, 1));
        assert!(!index.is_known(1));
    }
}
