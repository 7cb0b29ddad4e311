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


//! Lock-free view of a factor matrix for asynchronous parallel SGD.
//!
//! All workers read and write the same rows at the same time. There is no lock, no versioning
//! and no read-modify-write atomic: every entry is a whole 64-bit word that is loaded and stored
//! with relaxed ordering, so concurrent updates of the same row may observe stale values or
//! overwrite each other. Training tolerates this, its correctness is statistical.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::factors::FactorMatrix;

pub(crate) struct SharedFactorMatrix {
    num_rows: usize,
    num_factors: usize,
    values: Vec<AtomicU64>,
}

impl SharedFactorMatrix {

    #[inline(always)]
    fn offset(&self, row: usize, factor: usize) -> usize {
        row * self.num_factors + factor
    }

    pub(crate) fn num_factors(&self) -> usize {
        self.num_factors
    }

    #[inline(always)]
    pub(crate) fn get(&self, row: usize, factor: usize) -> f64 {
        f64::from_bits(self.values[self.offset(row, factor)].load(Ordering::Relaxed))
    }

    #[inline(always)]
    pub(crate) fn set(&self, row: usize, factor: usize, value: f64) {
        self.values[self.offset(row, factor)].store(value.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn into_inner(self) -> FactorMatrix {
        let values = self.values.into_iter()
            .map(|value| f64::from_bits(value.into_inner()))
            .collect();

        FactorMatrix::from_values(self.num_rows, self.num_factors, values)
    }
}

impl From<FactorMatrix> for SharedFactorMatrix {

    fn from(matrix: FactorMatrix) -> Self {
        let num_rows = matrix.num_rows();
        let num_factors = matrix.num_factors();

        let values = matrix.into_values().into_iter()
            .map(|value| AtomicU64::new(value.to_bits()))
            .collect();

        SharedFactorMatrix { num_rows, num_factors, values }
    }
}

#[cfg(test)]
mod tests {

    use super::SharedFactorMatrix;
    use crate::factors::FactorMatrix;

    #[test]
    fn values_survive_sharing() {
        let matrix = FactorMatrix::from_rows(vec![vec![1.5, -0.25], vec![1e-300, -0.0]]).unwrap();
        let shared = SharedFactorMatrix::from(matrix.clone());

        assert_eq!(shared.get(1, 0), 1e-300);
        assert_eq!(shared.get(0, 1), -0.25);

        shared.set(0, 1, 4.0);
        let mut expected = matrix;
        expected.row_mut(0)[1] = 4.0;

        assert_eq!(shared.into_inner(), expected);
    }
}
