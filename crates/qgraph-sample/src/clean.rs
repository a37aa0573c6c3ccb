//! Held-out test and validation query sets.

use ahash::AHashSet;
use anyhow::{Context, Result};
use qgraph_batch::io::{load_queries, save_queries};
use qgraph_formula::{Query, QueryType};
use serde::{Deserialize, Serialize};

use crate::graph::{held_out_edges, QueryGraph};
use crate::layout::DataLayout;

/// One `sample_test_queries` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRound {
    pub num_samples: usize,
    pub neg_sample_max: usize,
}

impl SampleRound {
    pub const fn new(num_samples: usize, neg_sample_max: usize) -> Self {
        Self {
            num_samples,
            neg_sample_max,
        }
    }
}

/// Sampling rounds for every query shape of one depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthPlan {
    pub depth: usize,
    pub test: Vec<SampleRound>,
    pub val: Vec<SampleRound>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanTestPlan {
    pub depths: Vec<DepthPlan>,
}

impl Default for CleanTestPlan {
    fn default() -> Self {
        Self {
            depths: vec![
                DepthPlan {
                    depth: 2,
                    test: vec![SampleRound::new(9000, 1), SampleRound::new(1000, 1000)],
                    val: vec![SampleRound::new(10, 900), SampleRound::new(100, 1000)],
                },
                DepthPlan {
                    depth: 3,
                    test: vec![SampleRound::new(9000, 1), SampleRound::new(1000, 1000)],
                    val: vec![SampleRound::new(900, 1), SampleRound::new(100, 1000)],
                },
            ],
        }
    }
}

/// Query counts written per depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanTestSummary {
    /// `(depth, test queries, validation queries)`
    pub written: Vec<(usize, usize, usize)>,
}

/// Sample clean test and validation queries.
///
/// Two graph instances are loaded: a train view with every held-out test
/// and validation edge removed, and an untouched test view that samples
/// queries depending on those edges. Validation queries that also occur in
/// the test set are dropped before anything is written.
pub fn sample_clean_test<G, F>(
    graph_loader: F,
    layout: &DataLayout,
    plan: &CleanTestPlan,
) -> Result<CleanTestSummary>
where
    G: QueryGraph,
    F: Fn() -> Result<G>,
{
    let mut train_graph = graph_loader().context("loading train graph")?;
    let test_graph = graph_loader().context("loading test graph")?;

    let test_edges = load_queries(&layout.test_edges(), false)
        .with_context(|| format!("loading {}", layout.test_edges().display()))?;
    let val_edges = load_queries(&layout.val_edges(), false)
        .with_context(|| format!("loading {}", layout.val_edges().display()))?;
    let held_out = held_out_edges(test_edges.iter().chain(&val_edges));
    tracing::info!(edges = held_out.len(), "removing held-out edges from train graph");
    train_graph.remove_edges(&held_out);

    let mut summary = CleanTestSummary::default();
    for depth_plan in &plan.depths {
        let depth = depth_plan.depth;
        let query_types: Vec<QueryType> = QueryType::with_depth(depth).collect();

        let test = sample_rounds(&test_graph, &train_graph, &query_types, &depth_plan.test)?;
        let val = sample_rounds(&test_graph, &train_graph, &query_types, &depth_plan.val)?;
        let sampled_val = val.len();
        let val = subtract_queries(val, &test);
        tracing::info!(
            depth,
            test = test.len(),
            val = val.len(),
            dropped = sampled_val - val.len(),
            "sampled clean held-out queries"
        );

        save_queries(&layout.clean_test_queries(depth), &test)
            .with_context(|| format!("writing depth-{depth} test queries"))?;
        save_queries(&layout.clean_val_queries(depth), &val)
            .with_context(|| format!("writing depth-{depth} validation queries"))?;
        summary.written.push((depth, test.len(), val.len()));
    }
    Ok(summary)
}

fn sample_rounds<G: QueryGraph>(
    test_graph: &G,
    train_graph: &G,
    query_types: &[QueryType],
    rounds: &[SampleRound],
) -> Result<Vec<Query>> {
    let mut out = Vec::new();
    for round in rounds {
        out.extend(test_graph.sample_test_queries(
            train_graph,
            query_types,
            round.num_samples,
            round.neg_sample_max,
        )?);
    }
    Ok(out)
}

/// Set difference `queries - exclude` by query identity. Duplicates within
/// `queries` collapse to their first occurrence.
pub fn subtract_queries(queries: Vec<Query>, exclude: &[Query]) -> Vec<Query> {
    let mut seen: AHashSet<Query> = exclude.iter().cloned().collect();
    queries.into_iter().filter(|q| seen.insert(q.clone())).collect()
}
