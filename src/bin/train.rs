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


extern crate env_logger;
extern crate getopts;
extern crate parbpr;
#[macro_use]
extern crate log;

use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::str::FromStr;
use std::time::Instant;

use getopts::{Matches, Options};

use parbpr::{io, types, utils, Hyperparams};

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("i", "inputfile", "Input file name (required). The input consists of interactions \
        between users and items, one pair of integer ids per line. Further columns are ignored.",
        "PATH");
    opts.optopt("d", "delimiter", "Column delimiter of the input file (optional, defaults to a \
        tab). Use 'tab' or a single character.", "CHAR");
    opts.optflag("", "skip-header", "Skip the first line of the input file.");
    opts.optopt("c", "config", "JSON file with hyperparameters (optional). Missing fields take \
        their default values, command line options override the file.", "PATH");
    opts.optopt("f", "num-factors", "Number of latent factors (optional, defaults to 40).",
        "NUMBER");
    opts.optopt("e", "num-epochs", "Number of epochs, split across all threads (optional, \
        defaults to 64).", "NUMBER");
    opts.optopt("t", "num-threads", "Number of training threads (optional, defaults to the \
        number of cpus).", "NUMBER");
    opts.optopt("l", "learning-rate", "SGD learning rate (optional, defaults to 0.01).",
        "NUMBER");
    opts.optopt("", "num-users", "Number of users (optional, inferred from the largest user id \
        by default).", "NUMBER");
    opts.optopt("", "num-items", "Number of items (optional, inferred from the largest item id \
        by default).", "NUMBER");
    opts.optopt("o", "outputdir", "Directory to write factorP.csv, factorQ.csv and \
        userHistory.csv to (optional, defaults to the current directory).", "PATH");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, &opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, &opts, None);
    }

    let interactions_path = match matches.opt_str("i") {
        Some(path) => path,
        None => return print_usage_and_exit(
            &program,
            &opts,
            Some("Please specify an inputfile via --inputfile."),
        ),
    };

    let delimiter = match parse_delimiter(matches.opt_str("d")) {
        Ok(delimiter) => delimiter,
        Err(hint) => return print_usage_and_exit(&program, &opts, Some(&hint)),
    };

    let mut hyperparams = match matches.opt_str("c") {
        Some(path) => match Hyperparams::from_json_file(&path) {
            Ok(hyperparams) => hyperparams,
            Err(failure) => {
                let hint = format!("Unable to read config file {}: {}", path, failure);
                return print_usage_and_exit(&program, &opts, Some(&hint))
            },
        },
        None => Hyperparams::default(),
    };

    let overrides = override_opt(&matches, "f", &mut hyperparams.num_factors)
        .and_then(|_| override_opt(&matches, "e", &mut hyperparams.num_epochs))
        .and_then(|_| override_opt(&matches, "t", &mut hyperparams.num_threads))
        .and_then(|_| override_opt(&matches, "l", &mut hyperparams.learning_rate));

    if let Err(hint) = overrides {
        return print_usage_and_exit(&program, &opts, Some(&hint));
    }

    let mut num_users: Option<usize> = None;
    let mut num_items: Option<usize> = None;

    let dimensions = optional_opt(&matches, "num-users", &mut num_users)
        .and_then(|_| optional_opt(&matches, "num-items", &mut num_items));

    if let Err(hint) = dimensions {
        return print_usage_and_exit(&program, &opts, Some(&hint));
    }

    let output_dir = matches.opt_str("o").unwrap_or_else(|| ".".to_owned());

    let result = train_and_write(
        &interactions_path,
        delimiter,
        matches.opt_present("skip-header"),
        &hyperparams,
        num_users,
        num_items,
        &output_dir,
    );

    if let Err(failure) = result {
        error!("Training failed: {}", failure);
        process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: &Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));

    process::exit(if hint.is_some() { 1 } else { 0 });
}

fn parse_delimiter(value: Option<String>) -> Result<u8, String> {
    match value.as_ref().map(String::as_str) {
        None | Some("tab") | Some("\\t") => Ok(b'\t'),
        Some(value) if value.len() == 1 => Ok(value.as_bytes()[0]),
        Some(value) => Err(format!("Unsupported delimiter '{}'.", value)),
    }
}

fn override_opt<T: FromStr>(matches: &Matches, name: &str, target: &mut T) -> Result<(), String>
    where T::Err: ToString
{
    match matches.opt_get::<T>(name) {
        Ok(Some(value)) => {
            *target = value;
            Ok(())
        },
        Ok(None) => Ok(()),
        Err(failure) => Err(format!("Problem with option '{}': {}", name, failure.to_string())),
    }
}

fn optional_opt<T: FromStr>(
    matches: &Matches,
    name: &str,
    target: &mut Option<T>,
) -> Result<(), String>
    where T::Err: ToString
{
    match matches.opt_get::<T>(name) {
        Ok(value) => {
            *target = value;
            Ok(())
        },
        Err(failure) => Err(format!("Problem with option '{}': {}", name, failure.to_string())),
    }
}

fn train_and_write(
    interactions_path: &str,
    delimiter: u8,
    skip_header: bool,
    hyperparams: &Hyperparams,
    num_users: Option<usize>,
    num_items: Option<usize>,
    output_dir: &str,
) -> parbpr::Result<()> {

    let start = Instant::now();

    info!("Reading interactions from {}", interactions_path);
    let interactions = io::read_interactions(interactions_path, delimiter, skip_header)?;

    if interactions.is_empty() && (num_users.is_none() || num_items.is_none()) {
        info!("Pass --num-users and --num-items to write untrained factors for an empty input");
        return Err(parbpr::Error::NoInteractions);
    }

    let (inferred_users, inferred_items) = types::dimensions(&interactions);
    let num_users = num_users.unwrap_or(inferred_users);
    let num_items = num_items.unwrap_or(inferred_items);

    info!(
        "Read {} interactions between {} users and {} items in {}ms",
        interactions.len(),
        num_users,
        num_items,
        utils::to_millis(start.elapsed()),
    );

    info!(
        "Training {} factors for {} epochs with {} threads",
        hyperparams.num_factors,
        hyperparams.num_epochs,
        hyperparams.num_threads,
    );

    let model = parbpr::train(&interactions, num_users, num_items, hyperparams)?;

    let output_dir = Path::new(output_dir);
    fs::create_dir_all(output_dir)?;

    let write_start = Instant::now();

    io::write_factors(io::create_file(output_dir.join("factorP.csv"))?, model.factors.users())?;
    io::write_factors(io::create_file(output_dir.join("factorQ.csv"))?, model.factors.items())?;
    io::write_histories(io::create_file(output_dir.join("userHistory.csv"))?, &model.histories)?;

    info!(
        "Wrote model to {} in {}ms, {}ms in total",
        output_dir.display(),
        utils::to_millis(write_start.elapsed()),
        utils::to_millis(start.elapsed()),
    );

    Ok(())
}
