#![allow(dead_code)]

use qgraph_batch::{FormulaGroups, IdTables};
use qgraph_formula::{FormulaInterner, NodeId, Query, QueryRecord, QueryType, Relation};

/// Stored relation path for `t` where local node `i` has mode `m{i}`.
/// `variant` changes the relation names and so yields a distinct formula.
pub fn rels_for(t: QueryType, variant: usize) -> Vec<Relation> {
    let s = t.schema();
    (0..s.n_edges())
        .map(|j| {
            let (src, dst) = s.stored_endpoints(j).unwrap();
            Relation::new(format!("m{src}"), format!("r{j}v{variant}"), format!("m{dst}"))
        })
        .collect()
}

pub fn record(
    t: QueryType,
    variant: usize,
    nodes: &[NodeId],
    neg: Option<Vec<NodeId>>,
    hard_neg: Option<Vec<NodeId>>,
) -> QueryRecord {
    QueryRecord {
        query_type: t,
        edges: t.ground_edges(nodes, &rels_for(t, variant)).unwrap(),
        neg_samples: neg,
        hard_neg_samples: hard_neg,
    }
}

pub fn query(t: QueryType, variant: usize, nodes: &[NodeId], neg: Option<Vec<NodeId>>) -> Query {
    Query::from_record(
        record(t, variant, nodes, neg, None),
        true,
        &mut FormulaInterner::new(),
    )
    .unwrap()
}

/// `count` queries of formula `(t, variant)`; query `k` uses node ids
/// `base + k * 10 + local`.
pub fn population(t: QueryType, variant: usize, count: usize, base: NodeId) -> Vec<Query> {
    (0..count as NodeId)
        .map(|k| {
            let nodes: Vec<NodeId> = (0..t.n_nodes() as NodeId)
                .map(|local| base + k * 10 + local)
                .collect();
            query(t, variant, &nodes, Some(vec![base + k * 10 + 9, 1]))
        })
        .collect()
}

/// Id tables covering every mode and reversed relation in `groups`.
pub fn tables_for(groups: &FormulaGroups, num_entities: u32) -> IdTables {
    let mut tables = IdTables {
        num_entities,
        ..IdTables::default()
    };
    for i in 0..4 {
        tables.mode_ids.insert(format!("m{i}"), 100 + i);
    }
    for formula in groups.formulas() {
        for rel in formula.edge_relations() {
            let next = tables.rel_ids.len() as i64;
            tables.rel_ids.entry(rel).or_insert(next);
        }
    }
    tables
}
