//! qgraph CLI
//!
//! Inspection and smoke-test commands for query record files:
//! - `demo`: pull batches from a small synthetic formula population
//! - `stats`: population per query type and formula
//! - `batch`: build tensor batches from a record file and id tables
//! - `clean`: drop test queries that also occur in a training file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use qgraph_batch::io::{
    load_queries_by_formula, load_queries_by_type, load_test_queries_by_formula, save_queries,
};
use qgraph_batch::{
    clean_test, get_queries_iterator, BatchTensors, DataIterator, FormulaGroups, FormulaSampler,
    IdTables, LoaderConfig,
};
use qgraph_formula::{QueryType, Relation};

#[derive(Parser)]
#[command(name = "qgraph")]
#[command(author, version, about = "Formula-grouped query batching for graph query embeddings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull batches from a synthetic formula → query population.
    Demo {
        /// Number of batches to print
        #[arg(long, default_value_t = 50)]
        batches: usize,
        #[arg(long, default_value_t = 4)]
        batch_size: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Count queries per type and formula.
    Stats {
        /// Query record file
        input: PathBuf,
        /// Treat the file as held-out queries and split by negative count
        #[arg(long)]
        held_out: bool,
    },

    /// Build tensor batches for every query type in a record file.
    Batch {
        /// Query record file
        input: PathBuf,
        /// Encoder id tables (JSON)
        #[arg(long)]
        ids: PathBuf,
        /// Loader configuration (JSON); defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// Batches to pull per query type
        #[arg(long, default_value_t = 1)]
        batches: usize,
    },

    /// Remove test queries that also appear in the training queries.
    Clean {
        #[arg(long)]
        train: PathBuf,
        #[arg(long)]
        test: PathBuf,
        /// Output record file
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            batches,
            batch_size,
            seed,
        } => cmd_demo(batches, batch_size, seed),
        Commands::Stats { input, held_out } => cmd_stats(&input, held_out),
        Commands::Batch {
            input,
            ids,
            config,
            batches,
        } => cmd_batch(&input, &ids, config.as_deref(), batches),
        Commands::Clean { train, test, out } => cmd_clean(&train, &test, &out),
    }
}

// ============================================================================
// demo
// ============================================================================

fn demo_population() -> Vec<(Relation, Vec<String>)> {
    [
        (Relation::new("protein", "0", "protein"), "a", 10),
        (Relation::new("protein", "0", "function"), "b", 20),
        (Relation::new("function", "0", "function"), "c", 30),
    ]
    .into_iter()
    .map(|(rel, prefix, n)| (rel, (0..n).map(|i| format!("{prefix}{i}")).collect()))
    .collect()
}

fn cmd_demo(batches: usize, batch_size: usize, seed: u64) -> Result<()> {
    let sampler = FormulaSampler::new(demo_population())?;
    let config = LoaderConfig {
        batch_size,
        seed,
        ..LoaderConfig::default()
    };
    let mut iter = DataIterator::new(sampler, config)?;
    for i in 0..batches {
        let batch = iter.next_batch()?;
        println!(
            "{:>3} {} {:?}",
            i,
            batch.formula.to_string().cyan(),
            batch.queries
        );
    }
    eprintln!(
        "{} {} batches, {} restarts",
        "ok".green().bold(),
        batches,
        iter.passes_completed()
    );
    Ok(())
}

// ============================================================================
// stats
// ============================================================================

fn print_groups(query_type: QueryType, groups: &FormulaGroups) {
    println!(
        "{} {} queries, {} formulas",
        query_type.to_string().bold(),
        groups.num_queries(),
        groups.num_formulas()
    );
    for (formula, count) in groups.counts() {
        println!("  {} {count:>8}  {formula}", "→".cyan());
    }
}

fn cmd_stats(input: &Path, held_out: bool) -> Result<()> {
    if held_out {
        let split = load_test_queries_by_formula(input)
            .with_context(|| format!("loading {}", input.display()))?;
        for (label, side) in [("full_neg", &split.full_neg), ("one_neg", &split.one_neg)] {
            println!("{}", label.yellow().bold());
            for (query_type, groups) in side {
                print_groups(*query_type, groups);
            }
        }
        return Ok(());
    }

    let by_type = load_queries_by_formula(input)
        .with_context(|| format!("loading {}", input.display()))?;
    for (query_type, groups) in &by_type {
        print_groups(*query_type, groups);
    }
    Ok(())
}

// ============================================================================
// batch
// ============================================================================

fn load_loader_config(path: Option<&Path>) -> Result<LoaderConfig> {
    let Some(path) = path else {
        return Ok(LoaderConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn describe(batch: &BatchTensors) -> String {
    format!(
        "B={} anchors={:?} vars={:?} edge_index={:?} edge_types={} batch_idx={} targets={}",
        batch.batch_size(),
        batch.anchor_ids.dim(),
        batch.var_ids.dim(),
        batch.edge_index.dim(),
        batch.edge_types.len(),
        batch.batch_idx.len(),
        batch.targets.len(),
    )
}

fn cmd_batch(input: &Path, ids: &Path, config: Option<&Path>, batches: usize) -> Result<()> {
    let config = load_loader_config(config)?;
    let tables = IdTables::load(ids).with_context(|| format!("loading {}", ids.display()))?;
    tracing::info!(
        modes = tables.mode_ids.len(),
        relations = tables.rel_ids.len(),
        entities = tables.num_entities,
        "loaded id tables"
    );
    let by_type = load_queries_by_formula(input)
        .with_context(|| format!("loading {}", input.display()))?;

    for (query_type, groups) in &by_type {
        let mut iter = get_queries_iterator(groups, config.clone(), &tables)
            .with_context(|| format!("building {query_type} tensors"))?;
        println!(
            "{} {} queries",
            query_type.to_string().bold(),
            iter.source().len()
        );
        for _ in 0..batches {
            let batch = iter.next_batch()?;
            println!("  {} {}", "→".cyan(), describe(&batch));
        }
    }
    Ok(())
}

// ============================================================================
// clean
// ============================================================================

fn cmd_clean(train: &Path, test: &Path, out: &Path) -> Result<()> {
    let train_queries =
        load_queries_by_type(train, false).with_context(|| format!("loading {}", train.display()))?;
    let test_queries =
        load_queries_by_type(test, true).with_context(|| format!("loading {}", test.display()))?;
    let before: usize = test_queries.values().map(Vec::len).sum();

    let cleaned = clean_test(&train_queries, test_queries);
    let kept: Vec<_> = cleaned.into_values().flatten().collect();
    save_queries(out, &kept).with_context(|| format!("writing {}", out.display()))?;

    eprintln!(
        "{} kept {} of {} test queries",
        "ok".green().bold(),
        kept.len(),
        before
    );
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}
