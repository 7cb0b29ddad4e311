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
extern crate serde_json;
#[macro_use]
extern crate log;

use std::env;
use std::io::Write;
use std::path::Path;
use std::process;
use std::time::Instant;

use getopts::Options;

use parbpr::evaluate;
use parbpr::{io, utils};
use parbpr::{BruteForceNeighbors, FactorStore, HistoryIndex, Metric, NeighborIndexBuilder,
    NeighborTable, Recommender, Strategy};

struct Settings {
    model_dir: String,
    strategy: Strategy,
    n: usize,
    k: usize,
    metric: Metric,
    neighbors_path: Option<String>,
    test_path: Option<String>,
    output_path: Option<String>,
}

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("m", "modeldir", "Directory holding factorP.csv, factorQ.csv and userHistory.csv \
        as written by parbpr-train (required).", "PATH");
    opts.optopt("s", "strategy", "Ranking strategy, one of 'exhaustive', 'heap', 'neighbors' or \
        'neighbors-sorted' (optional, defaults to 'heap').", "NAME");
    opts.optopt("n", "num-recommendations", "Number of items to recommend per user (optional, \
        defaults to 10).", "NUMBER");
    opts.optopt("k", "num-neighbors", "Number of nearest neighbors per item for the neighbor \
        strategies (optional, defaults to 10).", "NUMBER");
    opts.optopt("", "metric", "Distance for computing item neighbors, 'euclidean' or 'cosine' \
        (optional, defaults to 'euclidean').", "NAME");
    opts.optopt("", "neighbor-file", "Precomputed neighbor lists, one 'item<TAB>item,item,...' \
        line per item (optional, computed exactly from the item factors by default).", "PATH");
    opts.optopt("t", "testfile", "Held-out interactions, one tab-separated user and item pair per \
        line. If given, hit rate and mean reciprocal rank are reported instead of writing \
        recommendations.", "PATH");
    opts.optopt("o", "outputfile", "Output file name (optional, output will be written to stdout \
        by default).", "PATH");
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

    let model_dir = match matches.opt_str("m") {
        Some(path) => path,
        None => return print_usage_and_exit(
            &program,
            &opts,
            Some("Please specify a model directory via --modeldir."),
        ),
    };

    let strategy: Strategy = match matches.opt_get_default("s", Strategy::Heap) {
        Ok(strategy) => strategy,
        Err(failure) => {
            let hint = format!("Problem with option 's': {}", failure);
            return print_usage_and_exit(&program, &opts, Some(&hint))
        },
    };

    let n: usize = match matches.opt_get_default("n", 10) {
        Ok(n) => n,
        Err(failure) => {
            let hint = format!("Problem with option 'n': {}", failure);
            return print_usage_and_exit(&program, &opts, Some(&hint))
        },
    };

    let k: usize = match matches.opt_get_default("k", 10) {
        Ok(k) => k,
        Err(failure) => {
            let hint = format!("Problem with option 'k': {}", failure);
            return print_usage_and_exit(&program, &opts, Some(&hint))
        },
    };

    let metric: Metric = match matches.opt_get_default("metric", Metric::Euclidean) {
        Ok(metric) => metric,
        Err(failure) => {
            let hint = format!("Problem with option 'metric': {}", failure);
            return print_usage_and_exit(&program, &opts, Some(&hint))
        },
    };

    let settings = Settings {
        model_dir,
        strategy,
        n,
        k,
        metric,
        neighbors_path: matches.opt_str("neighbor-file"),
        test_path: matches.opt_str("t"),
        output_path: matches.opt_str("o"),
    };

    if let Err(failure) = recommend(&settings) {
        error!("Recommendation failed: {}", failure);
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

fn load_model(model_dir: &str) -> parbpr::Result<(FactorStore, HistoryIndex)> {

    let model_dir = Path::new(model_dir);

    let users = io::read_factors(io::open_file(model_dir.join("factorP.csv"))?)?;
    let items = io::read_factors(io::open_file(model_dir.join("factorQ.csv"))?)?;
    let factors = FactorStore::from_parts(users, items)?;

    let histories = io::read_histories(
        io::open_file(model_dir.join("userHistory.csv"))?,
        factors.num_users(),
        factors.num_items(),
    )?;

    Ok((factors, histories))
}

fn load_neighbors(settings: &Settings, factors: &FactorStore) -> parbpr::Result<NeighborTable> {
    match settings.neighbors_path {
        Some(ref path) => {
            info!("Reading neighbor lists from {}", path);
            io::read_neighbors(io::open_file(path)?, factors.num_items())
        },
        None => BruteForceNeighbors::new(settings.metric).build(factors.items(), settings.k),
    }
}

fn recommend(settings: &Settings) -> parbpr::Result<()> {

    let start = Instant::now();

    let (factors, histories) = load_model(&settings.model_dir)?;

    info!(
        "Loaded {} user and {} item factors of dimension {}, histories of {} users in {}ms",
        factors.num_users(),
        factors.num_items(),
        factors.num_factors(),
        histories.num_users(),
        utils::to_millis(start.elapsed()),
    );

    let neighbor_index = match settings.strategy {
        Strategy::NeighborRestricted(_) => Some(load_neighbors(settings, &factors)?),
        _ => None,
    };

    let mut recommender = Recommender::new(&factors, &histories);
    if let Some(ref neighbor_index) = neighbor_index {
        recommender = recommender.with_neighbors(neighbor_index);
    }

    let serving_start = Instant::now();
    let mut out = io::open_output(settings.output_path.as_ref().map(String::as_str))?;

    match settings.test_path {
        Some(ref test_path) => {
            let test_interactions = io::read_interactions(test_path, b'\t', false)?;
            let evaluation = evaluate::evaluate(
                &recommender,
                &test_interactions,
                settings.n,
                settings.strategy,
            )?;

            info!(
                "Evaluated {} recommendation lists with strategy '{}' in {}ms",
                evaluation.num_recs,
                settings.strategy,
                utils::to_millis(serving_start.elapsed()),
            );

            let report = serde_json::json!({
                "strategy": settings.strategy.to_string(),
                "n": settings.n,
                "num_recs": evaluation.num_recs,
                "hits": evaluation.hits,
                "hit_rate": evaluation.hit_rate(),
                "mrr": evaluation.mrr(),
            });

            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
            out.flush()?;
        },
        None => {
            let recommendations = recommender.recommend_all(settings.n, settings.strategy)?;

            info!(
                "Computed top-{} lists for {} users with strategy '{}' in {}ms",
                settings.n,
                recommendations.len(),
                settings.strategy,
                utils::to_millis(serving_start.elapsed()),
            );

            io::write_recommendations(out, &recommendations)?;
        },
    }

    Ok(())
}
