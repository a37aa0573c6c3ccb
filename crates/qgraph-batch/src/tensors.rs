//! Tensor batches for relational GNN query encoders.
//!
//! A [`QueryTensorSet`] holds one row per query for every query of a single
//! query type. Slicing it with an index list produces a [`BatchTensors`]: the
//! selected query graphs laid side by side as one disjoint-union graph, with
//! node ids of row `r` shifted into `[r * n_nodes, (r + 1) * n_nodes)`.
//!
//! All arrays are query-major: everything belonging to row `r` precedes
//! everything belonging to row `r + 1`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use qgraph_formula::{Formula, FormulaError, Query, QueryType};
use rand::Rng;

use crate::error::{BatchError, Result};
use crate::loader::BatchSource;
use crate::lookup::EncoderLookup;
use crate::store::FormulaGroups;

/// Marks a query that carries no (hard) negative sample.
pub const NO_NEGATIVE: i64 = -1;

/// Pre-built per-query arrays for one query type.
#[derive(Debug, Clone)]
pub struct QueryTensorSet {
    query_type: QueryType,
    /// `[n_queries, n_anchors]` anchor entity ids.
    anchor_nodes: Array2<i64>,
    /// `[n_queries, n_vars]` entity-type ids of the variable nodes.
    var_nodes: Array2<i64>,
    /// `[n_queries, n_edges]` relation ids per edge slot.
    edge_types: Array2<i64>,
    target_nodes: Array1<i64>,
    neg_nodes: Array1<i64>,
    hard_neg: Array1<i64>,
    /// `[2, n_edges]` local edge template of the query type.
    edge_index: Array2<i64>,
    num_entities: u32,
}

/// Aligned arrays for one batch of `B` queries.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTensors {
    /// `[B, n_anchors]`
    pub anchor_ids: Array2<i64>,
    /// `[B, n_vars]`
    pub var_ids: Array2<i64>,
    /// `[2, B * n_edges]`
    pub edge_index: Array2<i64>,
    /// `[B * n_edges]`
    pub edge_types: Array1<i64>,
    /// `[B * n_nodes]`: originating row of every node.
    pub batch_idx: Array1<i64>,
    /// `[B]`
    pub targets: Array1<i64>,
    /// `[B]`; [`NO_NEGATIVE`] where a query has none.
    pub neg_targets: Array1<i64>,
    /// `[B]`; [`NO_NEGATIVE`] where a query has none.
    pub hard_negatives: Array1<i64>,
}

impl BatchTensors {
    pub fn batch_size(&self) -> usize {
        self.targets.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.anchor_ids.ncols() + self.var_ids.ncols()
    }
}

impl QueryTensorSet {
    /// Build the arrays for every query in `groups`.
    ///
    /// All formulas must share one query type, and every formula must have at
    /// least one query.
    pub fn build(groups: &FormulaGroups, lookup: &impl EncoderLookup) -> Result<Self> {
        let query_type = groups.query_type()?;
        let n_queries = groups.num_queries();
        let (n_anchors, n_vars, n_edges) = (
            query_type.n_anchors(),
            query_type.n_variables(),
            query_type.n_edges(),
        );
        let num_entities = lookup.num_entities();
        if query_type.n_nodes() == 2 && num_entities == 0 {
            return Err(BatchError::NoEntities);
        }

        let mut anchor_nodes = Array2::zeros((n_queries, n_anchors));
        let mut var_nodes = Array2::zeros((n_queries, n_vars));
        let mut edge_types = Array2::zeros((n_queries, n_edges));
        let mut target_nodes = Array1::zeros(n_queries);
        let mut neg_nodes = Array1::from_elem(n_queries, NO_NEGATIVE);
        let mut hard_neg = Array1::from_elem(n_queries, NO_NEGATIVE);

        let mut row = 0;
        for (formula, queries) in groups.iter() {
            if queries.is_empty() {
                return Err(BatchError::NoQueries {
                    formula: formula.to_string(),
                });
            }
            let var_ids = lookup.variable_type_ids(formula)?;
            let edge_type = lookup.edge_type_ids(formula)?;

            for query in queries {
                if query.anchor_nodes.len() != n_anchors {
                    return Err(FormulaError::ArityMismatch {
                        query_type,
                        what: "anchors",
                        expected: n_anchors,
                        actual: query.anchor_nodes.len(),
                    }
                    .into());
                }
                for (slot, &a) in query.anchor_nodes.iter().enumerate() {
                    anchor_nodes[[row, slot]] = i64::from(a);
                }
                var_nodes.row_mut(row).assign(&ArrayView1::from(&var_ids[..]));
                edge_types.row_mut(row).assign(&ArrayView1::from(&edge_type[..]));
                target_nodes[row] = i64::from(query.target_node);

                if let Some(&neg) = query.neg_samples.as_deref().and_then(<[_]>::first) {
                    neg_nodes[row] = i64::from(neg);
                }
                if let Some(&neg) = query.hard_neg_samples.as_deref().and_then(<[_]>::first) {
                    hard_neg[row] = i64::from(neg);
                }
                row += 1;
            }
        }

        tracing::debug!(
            %query_type,
            formulas = groups.num_formulas(),
            queries = n_queries,
            "built query tensor set"
        );

        Ok(Self {
            query_type,
            anchor_nodes,
            var_nodes,
            edge_types,
            target_nodes,
            neg_nodes,
            hard_neg,
            edge_index: edge_template(query_type),
            num_entities,
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn len(&self) -> usize {
        self.target_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target_nodes.is_empty()
    }

    /// Gather the rows in `idx` into one batch graph.
    ///
    /// 1-chain queries (two nodes) get a fresh uniform negative target per
    /// row on every call; deeper queries use their stored soft negative.
    pub fn collate<R: Rng + ?Sized>(&self, idx: &[usize], rng: &mut R) -> Result<BatchTensors> {
        if idx.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        if let Some(&index) = idx.iter().find(|&&i| i >= self.len()) {
            return Err(BatchError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let batch_size = idx.len();
        let anchor_ids = self.anchor_nodes.select(Axis(0), idx);
        let var_ids = self.var_nodes.select(Axis(0), idx);
        let n_nodes = anchor_ids.ncols() + var_ids.ncols();

        let edge_index = tile_edge_index(self.edge_index.view(), batch_size, n_nodes);
        let edge_types = self
            .edge_types
            .select(Axis(0), idx)
            .iter()
            .copied()
            .collect::<Array1<i64>>();
        let batch_idx = membership_index(batch_size, n_nodes);

        let targets = self.target_nodes.select(Axis(0), idx);
        let hard_negatives = self.hard_neg.select(Axis(0), idx);
        let neg_targets = if n_nodes == 2 {
            (0..batch_size)
                .map(|_| i64::from(rng.random_range(0..self.num_entities)))
                .collect()
        } else {
            self.neg_nodes.select(Axis(0), idx)
        };

        Ok(BatchTensors {
            anchor_ids,
            var_ids,
            edge_index,
            edge_types,
            batch_idx,
            targets,
            neg_targets,
            hard_negatives,
        })
    }
}

impl BatchSource for QueryTensorSet {
    type Batch = BatchTensors;

    fn len(&self) -> usize {
        self.target_nodes.len()
    }

    fn collate<R: Rng + ?Sized>(&self, idx: &[usize], rng: &mut R) -> Result<Self::Batch> {
        QueryTensorSet::collate(self, idx, rng)
    }
}

/// Batch graph for queries of one formula, without targets or negatives.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGraphBatch {
    pub anchor_ids: Array2<i64>,
    pub var_ids: Array2<i64>,
    pub edge_index: Array2<i64>,
    pub edge_types: Array1<i64>,
    pub batch_idx: Array1<i64>,
}

/// Build the disjoint-union graph of `queries`, all of which share `formula`.
pub fn query_graph(
    formula: &Formula,
    queries: &[Query],
    lookup: &impl EncoderLookup,
) -> Result<QueryGraphBatch> {
    if queries.is_empty() {
        return Err(BatchError::NoQueries {
            formula: formula.to_string(),
        });
    }
    let query_type = formula.query_type();
    let batch_size = queries.len();
    let n_anchors = query_type.n_anchors();

    let mut anchor_ids = Array2::zeros((batch_size, n_anchors));
    for (row, query) in queries.iter().enumerate() {
        if query.formula.as_ref() != formula {
            return Err(BatchError::ForeignQuery {
                expected: formula.to_string(),
                found: query.formula.to_string(),
            });
        }
        for (slot, &a) in query.anchor_nodes.iter().enumerate().take(n_anchors) {
            anchor_ids[[row, slot]] = i64::from(a);
        }
    }

    let var_types = lookup.variable_type_ids(formula)?;
    let var_ids = Array2::from_shape_fn((batch_size, var_types.len()), |(_, c)| var_types[c]);

    let edge_type = lookup.edge_type_ids(formula)?;
    let edge_types = (0..batch_size)
        .flat_map(|_| edge_type.iter().copied())
        .collect::<Array1<i64>>();

    let n_nodes = query_type.n_nodes();
    Ok(QueryGraphBatch {
        anchor_ids,
        var_ids,
        edge_index: tile_edge_index(edge_template(query_type).view(), batch_size, n_nodes),
        edge_types,
        batch_idx: membership_index(batch_size, n_nodes),
    })
}

/// `[2, n_edges]` local edge index of a query type.
fn edge_template(query_type: QueryType) -> Array2<i64> {
    let schema = query_type.schema();
    let n_edges = schema.n_edges();
    Array2::from_shape_fn((2, n_edges), |(side, e)| {
        let node = if side == 0 {
            schema.edge_sources[e]
        } else {
            schema.edge_targets[e]
        };
        node as i64
    })
}

/// Repeat a `[2, E]` template `batch_size` times, shifting copy `r` by
/// `r * n_nodes`. Result is `[2, batch_size * E]`.
pub(crate) fn tile_edge_index(
    template: ArrayView2<'_, i64>,
    batch_size: usize,
    n_nodes: usize,
) -> Array2<i64> {
    let n_edges = template.ncols();
    Array2::from_shape_fn((2, batch_size * n_edges), |(side, col)| {
        let row = col / n_edges;
        template[[side, col % n_edges]] + (row * n_nodes) as i64
    })
}

/// `[0; n_nodes] ++ [1; n_nodes] ++ ... ++ [batch_size - 1; n_nodes]`.
pub(crate) fn membership_index(batch_size: usize, n_nodes: usize) -> Array1<i64> {
    Array1::from_shape_fn(batch_size * n_nodes, |k| (k / n_nodes) as i64)
}
