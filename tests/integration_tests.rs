//! Integration tests for the complete query batching pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Query records → bincode file → formula-grouped populations
//! - Populations + id tables → tensor sets → endless batch iteration
//! - Held-out splits → cleaning → evaluation batch graphs
//!
//! Run with: cargo test --test integration_tests

use std::collections::BTreeMap;

use qgraph_batch::io::{
    load_queries_by_formula, load_queries_by_type, load_test_queries_by_formula, save_records,
};
use qgraph_batch::{
    clean_test, get_queries_iterator, query_graph, DataIterator, EncoderLookup, FormulaSampler,
    IdTables, LoaderConfig, NO_NEGATIVE,
};
use qgraph_formula::{NodeId, QueryRecord, QueryType, Relation};
use tempfile::tempdir;

const MODES: [&str; 3] = ["protein", "function", "drug"];
const NUM_ENTITIES: u32 = 5_000;

// ============================================================================
// Fixtures
// ============================================================================

fn mode_of(local: usize) -> &'static str {
    MODES[local % MODES.len()]
}

/// Stored relation path of `t`; `variant` picks the relation names.
fn rels(t: QueryType, variant: usize) -> Vec<Relation> {
    let s = t.schema();
    (0..s.n_edges())
        .map(|j| {
            let (src, dst) = s.stored_endpoints(j).unwrap();
            Relation::new(mode_of(src), format!("rel{}", (j + variant) % 4), mode_of(dst))
        })
        .collect()
}

fn records(t: QueryType, variant: usize, count: u32, negatives: usize) -> Vec<QueryRecord> {
    (0..count)
        .map(|k| {
            let base = (t as u32 * 1_000) + (variant as u32 * 500) + k * 8;
            let nodes: Vec<NodeId> = (0..t.n_nodes() as NodeId).map(|l| base + l).collect();
            QueryRecord {
                query_type: t,
                edges: t.ground_edges(&nodes, &rels(t, variant)).unwrap(),
                neg_samples: Some((0..negatives as NodeId).map(|n| base + 7 + n).collect()),
                hard_neg_samples: (k % 2 == 0).then(|| vec![base + 6]),
            }
        })
        .collect()
}

fn corpus() -> Vec<QueryRecord> {
    let mut out = Vec::new();
    for (i, t) in QueryType::ALL.into_iter().enumerate() {
        out.extend(records(t, 0, 20 + i as u32, 1));
        if t.n_edges() > 1 {
            out.extend(records(t, 1, 7, 1));
        }
    }
    out
}

/// Id tables JSON covering every mode and reversed relation name.
fn id_tables_json() -> String {
    let mut rel_ids = Vec::new();
    for src in MODES {
        for dst in MODES {
            for name in 0..4 {
                let id = rel_ids.len();
                rel_ids.push(format!(
                    r#"{{"source_mode": "{src}", "name": "rel{name}", "target_mode": "{dst}", "id": {id}}}"#
                ));
            }
        }
    }
    format!(
        r#"{{"mode_ids": {{"protein": 0, "function": 1, "drug": 2}}, "rel_ids": [{}], "num_entities": {NUM_ENTITIES}}}"#,
        rel_ids.join(", ")
    )
}

// ============================================================================
// Training pipeline
// ============================================================================

#[test]
fn test_records_to_endless_tensor_batches() {
    let dir = tempdir().unwrap();
    let queries_path = dir.path().join("train_queries.bin");
    let ids_path = dir.path().join("ids.json");
    save_records(&queries_path, &corpus()).unwrap();
    std::fs::write(&ids_path, id_tables_json()).unwrap();

    let tables = IdTables::load(&ids_path).unwrap();
    let by_type = load_queries_by_formula(&queries_path).unwrap();
    assert_eq!(by_type.len(), QueryType::ALL.len());
    assert_eq!(by_type[&QueryType::OneChain].num_formulas(), 1);
    assert_eq!(by_type[&QueryType::ThreeInter].num_formulas(), 2);

    let config = LoaderConfig {
        batch_size: 8,
        seed: 17,
        ..LoaderConfig::default()
    };
    for (query_type, groups) in &by_type {
        let mut iter = get_queries_iterator(groups, config.clone(), &tables).unwrap();
        let n = groups.num_queries();
        assert_eq!(iter.source().len(), n);

        let pulls = n / config.batch_size + 3;
        for _ in 0..pulls {
            let batch = iter.next_batch().unwrap();
            let b = batch.batch_size();
            assert!(b >= 1 && b <= config.batch_size);
            assert_eq!(batch.n_nodes(), query_type.n_nodes());
            assert_eq!(batch.edge_index.dim(), (2, b * query_type.n_edges()));
            assert_eq!(batch.batch_idx.len(), b * query_type.n_nodes());
            assert!(batch.var_ids.iter().all(|&m| (0..3).contains(&m)));
            assert!(batch
                .hard_negatives
                .iter()
                .all(|&h| h == NO_NEGATIVE || h > 0));
            if *query_type == QueryType::OneChain {
                assert!(batch
                    .neg_targets
                    .iter()
                    .all(|&n| (0..i64::from(NUM_ENTITIES)).contains(&n)));
            } else {
                assert!(batch
                    .targets
                    .iter()
                    .zip(&batch.neg_targets)
                    .all(|(&t, &n)| n == t - query_type.n_anchors() as i64 + 7));
            }
        }
        assert!(iter.passes_completed() >= 1);
    }
}

#[test]
fn test_formula_sampler_over_loaded_populations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("train_queries.bin");
    save_records(&path, &corpus()).unwrap();

    let mut by_type = load_queries_by_formula(&path).unwrap();
    let groups = by_type.remove(&QueryType::TwoChain).unwrap();
    let counts: Vec<usize> = groups.counts().map(|(_, n)| n).collect();
    assert_eq!(counts, vec![21, 7]);

    let sampler = FormulaSampler::from_groups(groups).unwrap();
    assert_eq!(sampler.total(), 28);
    let config = LoaderConfig {
        batch_size: 5,
        seed: 3,
        ..LoaderConfig::default()
    };
    let mut iter = DataIterator::new(sampler, config).unwrap();
    for _ in 0..40 {
        let batch = iter.next_batch().unwrap();
        assert!(!batch.queries.is_empty());
        assert!(batch.queries.iter().all(|q| q.formula == batch.formula));
    }
}

// ============================================================================
// Held-out evaluation
// ============================================================================

#[test]
fn test_held_out_split_clean_and_evaluate() {
    let dir = tempdir().unwrap();
    let train_path = dir.path().join("train_queries.bin");
    let test_path = dir.path().join("test_queries.bin");
    let ids_path = dir.path().join("ids.json");
    std::fs::write(&ids_path, id_tables_json()).unwrap();
    let tables = IdTables::load(&ids_path).unwrap();

    // train overlaps the first 5 test queries of the 2-inter formula
    let mut train = records(QueryType::TwoInter, 0, 5, 1);
    train.extend(records(QueryType::ThreeChain, 0, 10, 1));
    save_records(&train_path, &train).unwrap();

    let mut test = records(QueryType::TwoInter, 0, 12, 50);
    test.extend(records(QueryType::TwoInter, 1, 4, 1));
    save_records(&test_path, &test).unwrap();

    let split = load_test_queries_by_formula(&test_path).unwrap();
    assert_eq!(split.full_neg[&QueryType::TwoInter].num_queries(), 12);
    assert_eq!(split.one_neg[&QueryType::TwoInter].num_queries(), 4);

    let full = &split.full_neg[&QueryType::TwoInter];
    let (formula, queries) = full.iter().next().unwrap();
    let graph = query_graph(formula, queries, &tables).unwrap();
    assert_eq!(graph.anchor_ids.dim(), (12, 2));
    assert_eq!(graph.edge_types.len(), 24);
    assert_eq!(graph.edge_types.to_vec(), {
        let mut ids = Vec::new();
        for _ in 0..12 {
            ids.extend(tables.edge_type_ids(formula).unwrap());
        }
        ids
    });

    let train_by_type = load_queries_by_type(&train_path, false).unwrap();
    let test_by_type = load_queries_by_type(&test_path, false).unwrap();
    let cleaned: BTreeMap<_, _> = clean_test(&train_by_type, test_by_type);
    let kept = &cleaned[&QueryType::TwoInter];
    assert_eq!(kept.len(), 11);
    assert!(kept.iter().all(|q| !train_by_type[&QueryType::TwoInter].contains(q)));
}
