//! Concrete queries and their persisted record form.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FormulaError;
use crate::formula::{Formula, FormulaInterner, Relation};
use crate::query_type::QueryType;

/// Entity id in the source graph.
pub type NodeId = u32;

/// One concrete edge of a stored query, in stored (target-rooted) direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundEdge {
    pub source: NodeId,
    pub relation: Relation,
    pub target: NodeId,
}

/// Persisted query: shape, concrete relation path and negatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_type: QueryType,
    pub edges: Vec<GroundEdge>,
    pub neg_samples: Option<Vec<NodeId>>,
    pub hard_neg_samples: Option<Vec<NodeId>>,
}

impl QueryRecord {
    /// Number of soft negatives carried by the record.
    pub fn num_negatives(&self) -> usize {
        self.neg_samples.as_ref().map_or(0, Vec::len)
    }
}

/// One instance of a formula.
///
/// Identity is `(formula, target, anchors)`: two queries that differ only in
/// their negatives compare equal.
#[derive(Debug, Clone)]
pub struct Query {
    pub formula: Arc<Formula>,
    pub anchor_nodes: Vec<NodeId>,
    pub target_node: NodeId,
    pub neg_samples: Option<Vec<NodeId>>,
    pub hard_neg_samples: Option<Vec<NodeId>>,
    graph: Option<Vec<GroundEdge>>,
}

impl Query {
    /// Rebuild a query from its record.
    ///
    /// With `keep_graph == false` the ground edges are discarded after the
    /// anchors and target are extracted.
    pub fn from_record(
        record: QueryRecord,
        keep_graph: bool,
        interner: &mut FormulaInterner,
    ) -> Result<Self, FormulaError> {
        let QueryRecord {
            query_type,
            edges,
            neg_samples,
            hard_neg_samples,
        } = record;

        let rels = edges.iter().map(|e| e.relation.clone()).collect();
        let formula = interner.intern(Formula::new(query_type, rels)?);
        let nodes = local_nodes(query_type, &edges)?;
        let n_anchors = query_type.n_anchors();

        Ok(Self {
            formula,
            anchor_nodes: nodes[..n_anchors].to_vec(),
            target_node: nodes[n_anchors],
            neg_samples,
            hard_neg_samples,
            graph: keep_graph.then_some(edges),
        })
    }

    pub fn to_record(&self) -> Result<QueryRecord, FormulaError> {
        let edges = self.graph.clone().ok_or(FormulaError::GraphDropped)?;
        Ok(QueryRecord {
            query_type: self.formula.query_type(),
            edges,
            neg_samples: self.neg_samples.clone(),
            hard_neg_samples: self.hard_neg_samples.clone(),
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.formula.query_type()
    }

    pub fn graph(&self) -> Option<&[GroundEdge]> {
        self.graph.as_deref()
    }

    pub fn drop_graph(&mut self) {
        self.graph = None;
    }

    pub fn num_negatives(&self) -> usize {
        self.neg_samples.as_ref().map_or(0, Vec::len)
    }

    /// The stored edge from the target to the first anchor.
    ///
    /// Only meaningful for 1-chain queries, where it is the held-out graph
    /// edge itself.
    pub fn first_edge(&self) -> (NodeId, &Relation, NodeId) {
        (self.target_node, &self.formula.rels()[0], self.anchor_nodes[0])
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.target_node == other.target_node
            && self.anchor_nodes == other.anchor_nodes
            && self.formula == other.formula
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.formula.hash(state);
        self.target_node.hash(state);
        self.anchor_nodes.hash(state);
    }
}

/// Concrete id of every local node, checking that shared nodes agree.
fn local_nodes(query_type: QueryType, edges: &[GroundEdge]) -> Result<Vec<NodeId>, FormulaError> {
    let schema = query_type.schema();
    let mut nodes: Vec<Option<NodeId>> = vec![None; schema.n_nodes()];
    for (j, edge) in edges.iter().enumerate() {
        let Some((s, t)) = schema.stored_endpoints(j) else {
            continue;
        };
        for (node, id) in [(s, edge.source), (t, edge.target)] {
            match nodes[node] {
                None => nodes[node] = Some(id),
                Some(prev) if prev == id => {}
                Some(prev) => {
                    return Err(FormulaError::NodeMismatch {
                        query_type,
                        node,
                        first: prev,
                        second: id,
                    })
                }
            }
        }
    }
    Ok(nodes.into_iter().map(Option::unwrap_or_default).collect())
}
