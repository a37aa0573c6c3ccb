//! Query record files.
//!
//! A record file is a `bincode`-encoded `Vec<QueryRecord>`. Loading goes
//! through one [`FormulaInterner`] per file, so all queries of a formula
//! share a single `Arc<Formula>`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use qgraph_formula::{FormulaInterner, Query, QueryRecord, QueryType};

use crate::error::{BatchError, Result};
use crate::store::{group_by_type, group_by_type_and_formula, split_by_negatives};
use crate::store::{FormulaGroups, TestQuerySplit};

pub fn save_records(path: &Path, records: &[QueryRecord]) -> Result<()> {
    let io_err = |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, records).map_err(|source| BatchError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

pub fn load_records(path: &Path) -> Result<Vec<QueryRecord>> {
    let file = File::open(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| BatchError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize queries; every query must still hold its ground edges.
pub fn save_queries(path: &Path, queries: &[Query]) -> Result<()> {
    let records = queries
        .iter()
        .map(Query::to_record)
        .collect::<Result<Vec<_>, _>>()?;
    save_records(path, &records)
}

pub fn queries_from_records(
    records: impl IntoIterator<Item = QueryRecord>,
    keep_graph: bool,
) -> Result<Vec<Query>> {
    let mut interner = FormulaInterner::new();
    let queries = records
        .into_iter()
        .map(|r| Query::from_record(r, keep_graph, &mut interner))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
        queries = queries.len(),
        formulas = interner.len(),
        "decoded query records"
    );
    Ok(queries)
}

pub fn load_queries(path: &Path, keep_graph: bool) -> Result<Vec<Query>> {
    queries_from_records(load_records(path)?, keep_graph)
}

pub fn load_queries_by_formula(path: &Path) -> Result<BTreeMap<QueryType, FormulaGroups>> {
    Ok(group_by_type_and_formula(load_queries(path, false)?))
}

pub fn load_queries_by_type(
    path: &Path,
    keep_graph: bool,
) -> Result<BTreeMap<QueryType, Vec<Query>>> {
    Ok(group_by_type(load_queries(path, keep_graph)?))
}

/// Load held-out queries split into `full_neg` / `one_neg`.
pub fn load_test_queries_by_formula(path: &Path) -> Result<TestQuerySplit> {
    Ok(split_by_negatives(load_queries(path, false)?))
}
