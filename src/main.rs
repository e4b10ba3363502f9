//! # dsquery CLI
//!
//! Demo command-line front end for the dsquery engine. Builds an
//! engine over a small synthetic corpus (real index/metadata loading
//! is out of scope — see crate docs) and either runs a single query
//! passed on the command line or drops into a REPL.
//!
//! ## Usage
//!
//! ```bash
//! dsquery --query "kw('germany')"
//! dsquery --mode low_memory
//! ```
//!
//! In REPL mode, enter query text directly or use:
//! - `.mode <low_memory|full_precision|full_recall|exact>` - switch evaluation mode
//! - `.highlight` - toggle highlighting
//! - `.quit` - exit

use clap::Parser;
use dsquery::indices::keyword_index::{DocumentFields, InMemoryKeywordIndex};
use dsquery::indices::name_index::HnswNameIndex;
use dsquery::indices::percentile_index::{Histogram, InMemoryPercentileIndex};
use dsquery::indices::EvaluationMode;
use dsquery::{Config, DocId, EngineError, Metadata, QueryEngine};
use std::collections::HashMap;
use std::io::{self, Write};
use std::str::FromStr;

/// Query a synthetic dataset-discovery corpus.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single query and exit instead of starting the REPL.
    #[arg(short, long)]
    query: Option<String>,

    /// Evaluation mode: low_memory, full_precision, full_recall, exact.
    #[arg(short, long, default_value = "full_precision")]
    mode: String,

    /// Include `<mark>`-highlighted snippets in the output.
    #[arg(long)]
    highlight: bool,

    /// Path to a config.toml to load instead of the compiled-in defaults.
    #[arg(long)]
    config: Option<String>,
}

fn demo_engine(config: Config) -> anyhow::Result<QueryEngine> {
    let mut docs = HashMap::new();
    docs.insert(
        DocId(0),
        DocumentFields(HashMap::from([
            ("name".to_string(), "Berlin Weather Station Archive".to_string()),
            ("description".to_string(), "Hourly weather observations for germany, 1990-2020".to_string()),
        ])),
    );
    docs.insert(
        DocId(1),
        DocumentFields(HashMap::from([
            ("name".to_string(), "France Population Census".to_string()),
            ("description".to_string(), "Decennial population counts by department".to_string()),
        ])),
    );
    docs.insert(
        DocId(2),
        DocumentFields(HashMap::from([
            ("name".to_string(), "Global Climate Indicators".to_string()),
            ("description".to_string(), "Long-run temperature and precipitation trends, germany included".to_string()),
        ])),
    );
    let keyword = InMemoryKeywordIndex::new(docs);

    let mut hists = HashMap::new();
    hists.insert(dsquery::HistId(0), Histogram::new(-10.0, 40.0, vec![5, 20, 40, 60, 30, 10]));
    hists.insert(dsquery::HistId(1), Histogram::new(0.0, 2_000_000.0, vec![50, 20, 10, 5, 2, 1]));
    hists.insert(dsquery::HistId(2), Histogram::new(0.0, 100.0, vec![1, 2, 5, 10, 40, 100]));
    let percentile = InMemoryPercentileIndex::new(hists);

    let name = HnswNameIndex::new(vec![
        ("Temperature (°C)".to_string(), vec![dsquery::ColId(0)]),
        ("Population".to_string(), vec![dsquery::ColId(1)]),
        ("Humidity (%)".to_string(), vec![dsquery::ColId(2)]),
    ]);

    let metadata = Metadata::from_tables(
        vec![vec![dsquery::ColId(0)], vec![dsquery::ColId(1)], vec![dsquery::ColId(2)]],
        vec![DocId(0), DocId(1), DocId(2)],
        HashMap::new(),
        vec![],
        3,
    )?;

    Ok(QueryEngine::new(metadata, config, Box::new(keyword), Box::new(percentile), Box::new(name))?)
}

fn run_query(engine: &QueryEngine, text: &str, mode: EvaluationMode, highlight: bool) {
    match engine.query(text, mode, highlight) {
        Ok(outcome) => {
            println!("{} result(s):", outcome.docs.len());
            for doc in outcome.docs {
                println!("  {doc}");
                if let Some(snippets) = outcome.highlights.docs.get(&doc) {
                    for (field, text) in snippets {
                        println!("    {field}: {text}");
                    }
                }
            }
        }
        Err(e) => print_error(&e),
    }
}

fn print_error(err: &EngineError) {
    println!("error: {err}");
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_default(),
    };
    let mode = EvaluationMode::from_str(&args.mode).map_err(|e| anyhow::anyhow!(e))?;

    let engine = demo_engine(config)?;

    if let Some(query) = args.query {
        run_query(&engine, &query, mode, args.highlight);
        return Ok(());
    }

    println!("dsquery REPL");
    println!("============\n");
    println!("Enter query text, or:");
    println!("  .mode <low_memory|full_precision|full_recall|exact>");
    println!("  .highlight");
    println!("  .quit\n");

    let mut mode = mode;
    let mut highlight = args.highlight;

    loop {
        print!("dsquery[{mode}]> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == ".quit" || input == ".exit" {
            break;
        }
        if input == ".highlight" {
            highlight = !highlight;
            println!("highlighting: {highlight}");
            continue;
        }
        if let Some(rest) = input.strip_prefix(".mode") {
            match EvaluationMode::from_str(rest.trim()) {
                Ok(m) => {
                    mode = m;
                    println!("mode: {mode}");
                }
                Err(e) => println!("error: {e}"),
            }
            continue;
        }

        run_query(&engine, input, mode, highlight);
    }

    Ok(())
}
