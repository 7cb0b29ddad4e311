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


use std::io;

use thiserror::Error;

/// Errors surfaced by training, ranking and the interchange formats. Conditions which the
/// algorithms treat as normal (exhausted negative sampling, empty training data, cold users,
/// fewer candidates than requested) are not errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not parse '{value}' as {expected} on line {line}")]
    Parse {
        value: String,
        expected: &'static str,
        line: u64,
    },

    #[error("invalid hyperparameter: {0}")]
    InvalidConfig(String),

    #[error("{kind} id {id} is out of range, expected an id below {bound}")]
    IdOutOfRange {
        kind: &'static str,
        id: u32,
        bound: usize,
    },

    #[error("a factor matrix needs at least one row and one column")]
    EmptyMatrix,

    #[error("no interactions to train on and no catalog size given")]
    NoInteractions,

    #[error("row {row} has {found} factors, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("user factors have {users} dimensions, item factors have {items}")]
    DimensionMismatch { users: usize, items: usize },

    #[error("neighbor-restricted ranking requires a neighbor index")]
    MissingNeighborIndex,

    #[error("unknown {what} '{name}'")]
    UnknownName { what: &'static str, name: String },

    #[error("could not start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
