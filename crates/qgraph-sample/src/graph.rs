//! The source-graph collaborator.

use qgraph_formula::{NodeId, Query, QueryType, Relation};

/// An edge removed from a graph before sampling, in stored direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeldOutEdge {
    pub source: NodeId,
    pub relation: Relation,
    pub target: NodeId,
}

/// A graph that can sample queries.
///
/// Sampled queries must keep their ground edges so they can be written
/// back out.
pub trait QueryGraph: Clone + Send + Sync {
    fn remove_edges(&mut self, edges: &[HeldOutEdge]);

    /// Sample `num_samples` queries spread over the shapes with `depth` hops,
    /// each with up to `neg_sample_max` negatives.
    fn sample_queries(
        &self,
        depth: usize,
        num_samples: usize,
        neg_sample_max: usize,
    ) -> anyhow::Result<Vec<Query>>;

    /// Sample queries of `query_types` whose answers need at least one edge
    /// that is missing from `train`.
    fn sample_test_queries(
        &self,
        train: &Self,
        query_types: &[QueryType],
        num_samples: usize,
        neg_sample_max: usize,
    ) -> anyhow::Result<Vec<Query>>;
}

/// The graph edge behind each held-out 1-chain query.
pub fn held_out_edges<'a>(queries: impl IntoIterator<Item = &'a Query>) -> Vec<HeldOutEdge> {
    queries
        .into_iter()
        .map(|q| {
            let (source, relation, target) = q.first_edge();
            HeldOutEdge {
                source,
                relation: relation.clone(),
                target,
            }
        })
        .collect()
}
