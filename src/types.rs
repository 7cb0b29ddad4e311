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


use fnv::FnvHashSet;

/// Users and items are identified by dense, zero-based integer ids.
pub type UserId = u32;
pub type ItemId = u32;

/// An observed positive interaction between a user and an item.
pub type Interaction = (UserId, ItemId);

pub type ItemSet = FnvHashSet<ItemId>;

pub fn new_item_set(capacity: usize) -> ItemSet {
    FnvHashSet::with_capacity_and_hasher(capacity, Default::default())
}

/// Infers the number of users and items from the largest ids in the data.
pub fn dimensions(interactions: &[Interaction]) -> (usize, usize) {
    interactions.iter().fold((0, 0), |(num_users, num_items), &(user, item)| {
        (num_users.max(user as usize + 1), num_items.max(item as usize + 1))
    })
}
