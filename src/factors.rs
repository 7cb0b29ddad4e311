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


//! Dense user and item factor matrices.

use std::slice::ChunksExact;

use rand::distributions::{IndependentSample, Normal};

use crate::error::{Error, Result};
use crate::types::{ItemId, UserId};

/// A dense matrix with one row of latent factors per id, stored row-major in a single buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct FactorMatrix {
    num_rows: usize,
    num_factors: usize,
    values: Vec<f64>,
}

impl FactorMatrix {

    /// Draws every entry independently from a normal distribution with mean `mu` and standard
    /// deviation `sigma`. The generator is seeded from the thread's entropy source, two calls
    /// never produce the same matrix.
    pub fn gaussian(num_rows: usize, num_factors: usize, mu: f64, sigma: f64) -> Result<Self> {

        if num_rows == 0 || num_factors == 0 {
            return Err(Error::EmptyMatrix);
        }

        if !mu.is_finite() || !sigma.is_finite() || sigma < 0.0 {
            return Err(Error::InvalidConfig(
                format!("cannot sample from N({}, {})", mu, sigma)));
        }

        let normal = Normal::new(mu, sigma);
        let mut rng = rand::thread_rng();

        let values = (0..num_rows * num_factors)
            .map(|_| normal.ind_sample(&mut rng))
            .collect();

        Ok(FactorMatrix { num_rows, num_factors, values })
    }

    /// Builds a matrix from explicit rows, which must all have the same non-zero length.
    pub fn from_rows<I>(rows: I) -> Result<Self>
        where I: IntoIterator<Item=Vec<f64>> {

        let mut num_rows = 0;
        let mut num_factors = 0;
        let mut values = Vec::new();

        for row in rows {
            if num_rows == 0 {
                num_factors = row.len();
            } else if row.len() != num_factors {
                return Err(Error::RaggedRow { row: num_rows, expected: num_factors, found: row.len() });
            }
            values.extend(row);
            num_rows += 1;
        }

        if num_rows == 0 || num_factors == 0 {
            return Err(Error::EmptyMatrix);
        }

        Ok(FactorMatrix { num_rows, num_factors, values })
    }

    pub(crate) fn from_values(num_rows: usize, num_factors: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), num_rows * num_factors);
        FactorMatrix { num_rows, num_factors, values }
    }

    pub(crate) fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_factors(&self) -> usize {
        self.num_factors
    }

    #[inline]
    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.num_factors;
        &self.values[start..start + self.num_factors]
    }

    #[inline]
    pub fn row_mut(&mut self, index: usize) -> &mut [f64] {
        let start = index * self.num_factors;
        &mut self.values[start..start + self.num_factors]
    }

    pub fn rows(&self) -> ChunksExact<f64> {
        self.values.chunks_exact(self.num_factors)
    }
}

#[inline(always)]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// The learned model: user factors `P` and item factors `Q` with a shared dimensionality.
#[derive(Clone, Debug)]
pub struct FactorStore {
    users: FactorMatrix,
    items: FactorMatrix,
}

impl FactorStore {

    pub fn new(
        num_users: usize,
        num_items: usize,
        num_factors: usize,
        mu: f64,
        sigma: f64,
    ) -> Result<Self> {
        let users = FactorMatrix::gaussian(num_users, num_factors, mu, sigma)?;
        let items = FactorMatrix::gaussian(num_items, num_factors, mu, sigma)?;
        Ok(FactorStore { users, items })
    }

    pub fn from_parts(users: FactorMatrix, items: FactorMatrix) -> Result<Self> {
        if users.num_factors() != items.num_factors() {
            return Err(Error::DimensionMismatch {
                users: users.num_factors(),
                items: items.num_factors(),
            });
        }
        Ok(FactorStore { users, items })
    }

    pub(crate) fn into_parts(self) -> (FactorMatrix, FactorMatrix) {
        (self.users, self.items)
    }

    pub fn users(&self) -> &FactorMatrix {
        &self.users
    }

    pub fn items(&self) -> &FactorMatrix {
        &self.items
    }

    pub fn num_users(&self) -> usize {
        self.users.num_rows()
    }

    pub fn num_items(&self) -> usize {
        self.items.num_rows()
    }

    pub fn num_factors(&self) -> usize {
        self.users.num_factors()
    }

    /// Predicted preference of a user for an item, `P_u · Q_i`.
    #[inline]
    pub fn score(&self, user: UserId, item: ItemId) -> f64 {
        dot(self.users.row(user as usize), self.items.row(item as usize))
    }
}
