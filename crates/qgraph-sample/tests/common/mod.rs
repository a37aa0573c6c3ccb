#![allow(dead_code)]

use anyhow::{bail, Result};
use qgraph_formula::{FormulaInterner, NodeId, Query, QueryRecord, QueryType, Relation};
use qgraph_sample::{HeldOutEdge, QueryGraph};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

/// Deterministic stand-in for a real graph sampler.
///
/// Node ids come from a small universe so that repeated sampling produces
/// duplicate queries. Test queries record how many edges had been removed
/// from the train graph in their hard negatives.
#[derive(Debug, Clone)]
pub struct ToyGraph {
    pub seed: u64,
    pub universe: NodeId,
    pub removed: Vec<HeldOutEdge>,
    pub fail_depth: Option<usize>,
}

impl ToyGraph {
    pub fn new(seed: u64, universe: NodeId) -> Self {
        Self {
            seed,
            universe,
            removed: Vec::new(),
            fail_depth: None,
        }
    }

    fn generate(
        &self,
        stream: u64,
        query_types: &[QueryType],
        num_samples: usize,
        neg_sample_max: usize,
        hard_neg: Option<Vec<NodeId>>,
    ) -> Vec<Query> {
        let mut rng = XorShiftRng::seed_from_u64(self.seed ^ stream.wrapping_mul(0x9e37_79b9));
        let mut interner = FormulaInterner::new();
        (0..num_samples)
            .map(|i| {
                let t = query_types[i % query_types.len()];
                let nodes: Vec<NodeId> = (0..t.n_nodes())
                    .map(|_| rng.random_range(0..self.universe))
                    .collect();
                let negs = (0..neg_sample_max)
                    .map(|_| rng.random_range(0..self.universe))
                    .collect();
                let record = QueryRecord {
                    query_type: t,
                    edges: t.ground_edges(&nodes, &rels(t)).unwrap(),
                    neg_samples: Some(negs),
                    hard_neg_samples: hard_neg.clone(),
                };
                Query::from_record(record, true, &mut interner).unwrap()
            })
            .collect()
    }
}

pub fn rels(t: QueryType) -> Vec<Relation> {
    let s = t.schema();
    (0..s.n_edges())
        .map(|j| {
            let (src, dst) = s.stored_endpoints(j).unwrap();
            Relation::new(format!("m{src}"), format!("r{j}"), format!("m{dst}"))
        })
        .collect()
}

impl QueryGraph for ToyGraph {
    fn remove_edges(&mut self, edges: &[HeldOutEdge]) {
        self.removed.extend_from_slice(edges);
    }

    fn sample_queries(
        &self,
        depth: usize,
        num_samples: usize,
        neg_sample_max: usize,
    ) -> Result<Vec<Query>> {
        if self.fail_depth == Some(depth) {
            bail!("walk failed at depth {depth}");
        }
        let types: Vec<QueryType> = QueryType::with_depth(depth).collect();
        let removed = Some(vec![self.removed.len() as NodeId]);
        Ok(self.generate(depth as u64, &types, num_samples, neg_sample_max, removed))
    }

    fn sample_test_queries(
        &self,
        train: &Self,
        query_types: &[QueryType],
        num_samples: usize,
        neg_sample_max: usize,
    ) -> Result<Vec<Query>> {
        let stream = (num_samples * 1_000 + neg_sample_max) as u64;
        let removed = Some(vec![train.removed.len() as NodeId]);
        Ok(self.generate(stream, query_types, num_samples, neg_sample_max, removed))
    }
}

/// 1-chain queries standing for held-out graph edges.
pub fn edge_queries(ids: &[(NodeId, NodeId)]) -> Vec<Query> {
    let mut interner = FormulaInterner::new();
    ids.iter()
        .map(|&(anchor, target)| {
            let t = QueryType::OneChain;
            let record = QueryRecord {
                query_type: t,
                edges: t.ground_edges(&[anchor, target], &rels(t)).unwrap(),
                neg_samples: None,
                hard_neg_samples: None,
            };
            Query::from_record(record, true, &mut interner).unwrap()
        })
        .collect()
}
