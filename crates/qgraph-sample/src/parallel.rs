//! Fan-out query sampling.
//!
//! Every worker clones the source graph, optionally prunes held-out edges
//! from its copy, samples depth-2 and depth-3 queries and writes them to its
//! own shard files. The caller joins all workers and then reads every
//! shard back. Workers share nothing mutable; a failed worker is only logged
//! and shows up as an unreadable shard.

use std::fs;
use std::io;

use anyhow::{Context, Result};
use qgraph_batch::io::{load_queries, save_queries};
use qgraph_formula::Query;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::graph::{held_out_edges, HeldOutEdge, QueryGraph};
use crate::layout::DataLayout;

const DEPTHS: [usize; 2] = [2, 3];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelSampleConfig {
    pub num_workers: usize,
    pub samples_per_worker: usize,
    /// Test-style sampling: 100 negatives per query instead of 1.
    pub test: bool,
    /// Remove the held-out test and validation edges from every worker's
    /// graph before sampling.
    pub prune_held_out: bool,
    /// Id of the first worker, so shards from several runs do not collide.
    pub start_index: usize,
}

impl ParallelSampleConfig {
    pub fn negatives_per_query(&self) -> usize {
        if self.test {
            100
        } else {
            1
        }
    }

    pub fn worker_ids(&self) -> std::ops::Range<usize> {
        self.start_index..self.start_index + self.num_workers
    }
}

impl Default for ParallelSampleConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            samples_per_worker: 10_000,
            test: false,
            prune_held_out: false,
            start_index: 0,
        }
    }
}

/// Run all workers and return the concatenated `(depth-2, depth-3)` queries
/// in worker order.
pub fn parallel_sample<G: QueryGraph>(
    graph: &G,
    layout: &DataLayout,
    config: &ParallelSampleConfig,
) -> Result<(Vec<Query>, Vec<Query>)> {
    let held_out = if config.prune_held_out {
        tracing::info!("loading held-out test/val edges");
        let mut edges = load_queries(&layout.test_edges(), false)
            .with_context(|| format!("loading {}", layout.test_edges().display()))?;
        edges.extend(
            load_queries(&layout.val_edges(), false)
                .with_context(|| format!("loading {}", layout.val_edges().display()))?,
        );
        held_out_edges(&edges)
    } else {
        Vec::new()
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers.max(1))
        .thread_name(|i| format!("qgraph-sampler-{i}"))
        .build()
        .context("building sampler thread pool")?;

    clear_shards(layout, config)?;

    let workers: Vec<usize> = config.worker_ids().collect();
    pool.install(|| {
        workers.par_iter().for_each(|&worker| {
            if let Err(err) = run_worker(worker, graph.clone(), layout, config, &held_out) {
                tracing::error!(worker, error = %format!("{err:#}"), "sampling worker failed");
            }
        })
    });

    let mut queries_2 = Vec::new();
    let mut queries_3 = Vec::new();
    for worker in config.worker_ids() {
        for (depth, out) in DEPTHS.into_iter().zip([&mut queries_2, &mut queries_3]) {
            let path = layout.shard(depth, worker);
            let shard = load_queries(&path, true).with_context(|| {
                format!("reading depth-{depth} shard of worker {worker} ({})", path.display())
            })?;
            out.extend(shard);
        }
    }
    tracing::info!(
        workers = config.num_workers,
        depth_2 = queries_2.len(),
        depth_3 = queries_3.len(),
        "collected sampled shards"
    );
    Ok((queries_2, queries_3))
}

/// Remove shards left by an earlier run so a failed worker cannot be masked
/// by stale output.
fn clear_shards(layout: &DataLayout, config: &ParallelSampleConfig) -> Result<()> {
    for worker in config.worker_ids() {
        for depth in DEPTHS {
            let path = layout.shard(depth, worker);
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed stale shard"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("removing {}", path.display()))
                }
            }
        }
    }
    Ok(())
}

fn run_worker<G: QueryGraph>(
    worker: usize,
    mut graph: G,
    layout: &DataLayout,
    config: &ParallelSampleConfig,
    held_out: &[HeldOutEdge],
) -> Result<()> {
    if !held_out.is_empty() {
        graph.remove_edges(held_out);
    }
    tracing::info!(worker, "running sampling worker");
    for depth in DEPTHS {
        let queries = graph.sample_queries(
            depth,
            config.samples_per_worker,
            config.negatives_per_query(),
        )?;
        save_queries(&layout.shard(depth, worker), &queries)
            .with_context(|| format!("writing depth-{depth} shard"))?;
    }
    tracing::info!(worker, "sampling worker done");
    Ok(())
}
