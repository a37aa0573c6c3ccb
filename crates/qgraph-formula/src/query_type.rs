//! The seven supported query shapes and their structure tables.
//!
//! Every shape is described over a *local* node numbering: anchors occupy
//! `0..n_anchors`, the target is `n_anchors`, and any intermediate variables
//! follow. Edges are emitted anchor → target, i.e. in the reverse direction
//! of the stored (target-rooted) relation path.
//!
//! ```text
//!  2-chain            3-inter_chain          3-chain_inter
//!  a0 ─► v2 ─► t1     a0 ─────────► t2       a0 ─► v3 ◄─ a1
//!                     a1 ─► v3 ─────┘               │
//!                                                   ▼
//!                                                   t2
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormulaError;
use crate::formula::Relation;
use crate::query::{GroundEdge, NodeId};

/// Closed set of query shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryType {
    #[serde(rename = "1-chain")]
    OneChain,
    #[serde(rename = "2-chain")]
    TwoChain,
    #[serde(rename = "3-chain")]
    ThreeChain,
    #[serde(rename = "2-inter")]
    TwoInter,
    #[serde(rename = "3-inter")]
    ThreeInter,
    #[serde(rename = "3-inter_chain")]
    ThreeInterChain,
    #[serde(rename = "3-chain_inter")]
    ThreeChainInter,
}

/// Static structure of one query shape.
#[derive(Debug, PartialEq, Eq)]
pub struct QuerySchema {
    pub n_anchors: usize,
    /// Hop count used when asking a graph to sample this shape.
    pub depth: usize,
    /// Source local node of each edge slot.
    pub edge_sources: &'static [usize],
    /// Destination local node of each edge slot.
    pub edge_targets: &'static [usize],
    /// For each edge slot, the index of the stored relation that labels it.
    pub edge_label_index: &'static [usize],
    /// Positions of variable nodes in [`crate::Formula::nodes`], in local
    /// order (target first).
    pub variable_node_positions: &'static [usize],
}

const ONE_CHAIN: QuerySchema = QuerySchema {
    n_anchors: 1,
    depth: 1,
    edge_sources: &[0],
    edge_targets: &[1],
    edge_label_index: &[0],
    variable_node_positions: &[0],
};

const TWO_CHAIN: QuerySchema = QuerySchema {
    n_anchors: 1,
    depth: 2,
    edge_sources: &[0, 2],
    edge_targets: &[2, 1],
    edge_label_index: &[1, 0],
    variable_node_positions: &[0, 2],
};

const THREE_CHAIN: QuerySchema = QuerySchema {
    n_anchors: 1,
    depth: 3,
    edge_sources: &[0, 3, 2],
    edge_targets: &[3, 2, 1],
    edge_label_index: &[2, 1, 0],
    variable_node_positions: &[0, 2, 4],
};

const TWO_INTER: QuerySchema = QuerySchema {
    n_anchors: 2,
    depth: 2,
    edge_sources: &[0, 1],
    edge_targets: &[2, 2],
    edge_label_index: &[0, 1],
    variable_node_positions: &[0],
};

const THREE_INTER: QuerySchema = QuerySchema {
    n_anchors: 3,
    depth: 3,
    edge_sources: &[0, 1, 2],
    edge_targets: &[3, 3, 3],
    edge_label_index: &[0, 1, 2],
    variable_node_positions: &[0],
};

const THREE_INTER_CHAIN: QuerySchema = QuerySchema {
    n_anchors: 2,
    depth: 3,
    edge_sources: &[0, 1, 3],
    edge_targets: &[2, 3, 2],
    edge_label_index: &[0, 2, 1],
    variable_node_positions: &[0, 3],
};

const THREE_CHAIN_INTER: QuerySchema = QuerySchema {
    n_anchors: 2,
    depth: 3,
    edge_sources: &[0, 1, 3],
    edge_targets: &[3, 3, 2],
    edge_label_index: &[1, 2, 0],
    variable_node_positions: &[0, 2],
};

impl QuerySchema {
    pub fn n_edges(&self) -> usize {
        self.edge_label_index.len()
    }

    pub fn n_variables(&self) -> usize {
        self.variable_node_positions.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.n_anchors + self.n_variables()
    }

    /// Local `(source, target)` nodes of stored relation `rel`.
    ///
    /// The edge slot labelled by `rel` runs the other way round, so the stored
    /// source is the slot's destination.
    pub fn stored_endpoints(&self, rel: usize) -> Option<(usize, usize)> {
        let slot = self.edge_label_index.iter().position(|&j| j == rel)?;
        Some((self.edge_targets[slot], self.edge_sources[slot]))
    }
}

impl QueryType {
    pub const ALL: [QueryType; 7] = [
        QueryType::OneChain,
        QueryType::TwoChain,
        QueryType::ThreeChain,
        QueryType::TwoInter,
        QueryType::ThreeInter,
        QueryType::ThreeInterChain,
        QueryType::ThreeChainInter,
    ];

    pub const fn schema(self) -> &'static QuerySchema {
        match self {
            QueryType::OneChain => &ONE_CHAIN,
            QueryType::TwoChain => &TWO_CHAIN,
            QueryType::ThreeChain => &THREE_CHAIN,
            QueryType::TwoInter => &TWO_INTER,
            QueryType::ThreeInter => &THREE_INTER,
            QueryType::ThreeInterChain => &THREE_INTER_CHAIN,
            QueryType::ThreeChainInter => &THREE_CHAIN_INTER,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            QueryType::OneChain => "1-chain",
            QueryType::TwoChain => "2-chain",
            QueryType::ThreeChain => "3-chain",
            QueryType::TwoInter => "2-inter",
            QueryType::ThreeInter => "3-inter",
            QueryType::ThreeInterChain => "3-inter_chain",
            QueryType::ThreeChainInter => "3-chain_inter",
        }
    }

    pub fn n_anchors(self) -> usize {
        self.schema().n_anchors
    }

    pub fn n_edges(self) -> usize {
        self.schema().n_edges()
    }

    pub fn n_variables(self) -> usize {
        self.schema().n_variables()
    }

    pub fn n_nodes(self) -> usize {
        self.schema().n_nodes()
    }

    pub fn depth(self) -> usize {
        self.schema().depth
    }

    /// All shapes sampled by a graph walk of the given depth.
    pub fn with_depth(depth: usize) -> impl Iterator<Item = QueryType> {
        Self::ALL.into_iter().filter(move |t| t.depth() == depth)
    }

    /// Build the stored ground edges of a query from its local nodes.
    ///
    /// `local_nodes` uses the anchors-first numbering; `rels` is the stored
    /// relation path. This is the inverse of [`crate::Query::from_record`].
    pub fn ground_edges(
        self,
        local_nodes: &[NodeId],
        rels: &[Relation],
    ) -> Result<Vec<GroundEdge>, FormulaError> {
        let schema = self.schema();
        check_arity(self, "nodes", schema.n_nodes(), local_nodes.len())?;
        check_arity(self, "relations", schema.n_edges(), rels.len())?;

        // label index is a permutation, so sorting slots by it yields stored order
        let mut slots: Vec<usize> = (0..schema.n_edges()).collect();
        slots.sort_unstable_by_key(|&slot| schema.edge_label_index[slot]);
        Ok(slots
            .into_iter()
            .map(|slot| GroundEdge {
                source: local_nodes[schema.edge_targets[slot]],
                relation: rels[schema.edge_label_index[slot]].clone(),
                target: local_nodes[schema.edge_sources[slot]],
            })
            .collect())
    }
}

pub(crate) fn check_arity(
    query_type: QueryType,
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), FormulaError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FormulaError::ArityMismatch {
            query_type,
            what,
            expected,
            actual,
        })
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FormulaError::UnknownQueryType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_type_name() {
        for t in QueryType::ALL {
            assert_eq!(t.as_str().parse::<QueryType>().unwrap(), t);
        }
        assert!(matches!(
            "4-chain".parse::<QueryType>(),
            Err(FormulaError::UnknownQueryType(_))
        ));
    }

    #[test]
    fn node_counts() {
        let counts: Vec<_> = QueryType::ALL.iter().map(|t| t.n_nodes()).collect();
        assert_eq!(counts, vec![2, 3, 4, 3, 4, 4, 4]);
        assert_eq!(QueryType::with_depth(2).count(), 2);
        assert_eq!(QueryType::with_depth(3).count(), 4);
    }

    #[test]
    fn stored_endpoints_of_two_chain() {
        // target(1) -r0-> mid(2) -r1-> anchor(0)
        let s = QueryType::TwoChain.schema();
        assert_eq!(s.stored_endpoints(0), Some((1, 2)));
        assert_eq!(s.stored_endpoints(1), Some((2, 0)));
        assert_eq!(s.stored_endpoints(2), None);
    }
}
