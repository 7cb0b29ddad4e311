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


//! Plain-text interchange formats: interaction files, factor matrices, user histories,
//! neighbor lists and recommendations.

use std::fs::File;
use std::io::{stdout, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::factors::FactorMatrix;
use crate::history::HistoryIndex;
use crate::neighbors::NeighborTable;
use crate::types::{Interaction, ItemId, UserId};

pub fn open_file<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

pub fn create_file<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes to the file at `path` if one is given, to stdout otherwise.
pub fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    let out: Box<dyn Write> = match path {
        Some(path) => Box::new(create_file(path)?),
        None => Box::new(stdout()),
    };
    Ok(out)
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, |position| position.line())
}

fn parse_id(field: &str, line: u64) -> Result<u32> {
    field.trim().parse().map_err(|_| Error::Parse {
        value: field.to_owned(),
        expected: "an id",
        line,
    })
}

fn check_id(kind: &'static str, id: u32, bound: usize) -> Result<()> {
    if id as usize >= bound {
        return Err(Error::IdOutOfRange { kind, id, bound });
    }
    Ok(())
}

fn parse_value(field: &str, line: u64) -> Result<f64> {
    field.trim().parse().map_err(|_| Error::Parse {
        value: field.to_owned(),
        expected: "a number",
        line,
    })
}

/// Reads interactions with a user id in the first and an item id in the second column. Further
/// columns (such as a relevance value) are ignored.
pub fn interactions_from_reader<R: Read>(
    reader: R,
    delimiter: u8,
    skip_header: bool,
) -> Result<Vec<Interaction>> {

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(skip_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let mut interactions = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);

        let user = parse_id(record.get(0).unwrap_or(""), line)?;
        let item = parse_id(record.get(1).unwrap_or(""), line)?;

        interactions.push((user, item));
    }

    Ok(interactions)
}

pub fn read_interactions<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    skip_header: bool,
) -> Result<Vec<Interaction>> {
    interactions_from_reader(open_file(path)?, delimiter, skip_header)
}

/// Writes one row of factors per line, comma-separated.
pub fn write_factors<W: Write>(writer: W, matrix: &FactorMatrix) -> Result<()> {

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    for row in matrix.rows() {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_factors<R: Read>(reader: R) -> Result<FactorMatrix> {

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);

        let row = record.iter()
            .map(|field| parse_value(field, line))
            .collect::<Result<Vec<f64>>>()?;

        rows.push(row);
    }

    FactorMatrix::from_rows(rows)
}

/// Writes lists of ids keyed by an id, one `id \t id,id,...` line per list.
fn write_id_lists<W, I>(writer: W, lists: I) -> Result<()>
    where W: Write, I: IntoIterator<Item=(u32, Vec<u32>)> {

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(writer);

    for (id, list) in lists {
        let joined = list.iter()
            .map(|other| other.to_string())
            .collect::<Vec<_>>()
            .join(",");

        writer.write_record(&[id.to_string(), joined])?;
    }

    writer.flush()?;
    Ok(())
}

fn read_id_lists<R: Read>(reader: R) -> Result<Vec<(u32, Vec<u32>)>> {

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let mut lists = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);

        let id = parse_id(record.get(0).unwrap_or(""), line)?;

        let list = record.get(1).unwrap_or("")
            .split(',')
            .filter(|field| !field.trim().is_empty())
            .map(|field| parse_id(field, line))
            .collect::<Result<Vec<u32>>>()?;

        lists.push((id, list));
    }

    Ok(lists)
}

/// Writes the history of every known user, items in ascending order.
pub fn write_histories<W: Write>(writer: W, histories: &HistoryIndex) -> Result<()> {
    let lists = histories.iter().map(|(user, items)| {
        let mut items: Vec<ItemId> = items.iter().cloned().collect();
        items.sort_unstable();
        (user, items)
    });

    write_id_lists(writer, lists)
}

/// Reads histories of users below `num_users` over items below `num_items`. Other ids are
/// rejected before anything is allocated for them.
pub fn read_histories<R: Read>(
    reader: R,
    num_users: usize,
    num_items: usize,
) -> Result<HistoryIndex> {

    let lists = read_id_lists(reader)?;

    for (user, items) in lists.iter() {
        check_id("user", *user, num_users)?;
        for item in items {
            check_id("item", *item, num_items)?;
        }
    }

    let histories = lists.iter()
        .map(|(user, items)| (*user as UserId, items.as_slice()))
        .collect();

    Ok(histories)
}

pub fn write_neighbors<W: Write>(writer: W, table: &NeighborTable) -> Result<()> {
    write_id_lists(writer, table.iter().map(|(item, neighbors)| (item, neighbors.to_vec())))
}

/// Reads neighbor lists for a catalog of `num_items` items, for example as computed by an
/// external approximate nearest neighbor library. Items without a line get an empty list.
pub fn read_neighbors<R: Read>(reader: R, num_items: usize) -> Result<NeighborTable> {
    let lists = read_id_lists(reader)?;

    let mut neighbors = vec![Vec::new(); num_items];

    for (item, list) in lists {
        check_id("item", item, num_items)?;
        neighbors[item as usize] = list;
    }

    let table = NeighborTable::new(neighbors);
    table.check_ids(num_items)?;

    Ok(table)
}

/// Struct used for JSON serialization of recommendations. Field names will be used in JSON.
#[derive(Serialize)]
struct Recommendations<'a> {
    for_user: UserId,
    recommended_items: &'a [ItemId],
}

/// Outputs one JSON object per user and line.
pub fn write_recommendations<W: Write>(
    mut writer: W,
    recommendations: &[Vec<ItemId>],
) -> Result<()> {

    for (user, recommended_items) in recommendations.iter().enumerate() {
        let for_user = Recommendations {
            for_user: user as UserId,
            recommended_items,
        };

        serde_json::to_writer(&mut writer, &for_user)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
