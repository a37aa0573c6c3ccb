//! Read-only id tables owned by the encoder/decoder model.

use std::collections::HashMap;
use std::path::Path;

use ahash::AHashMap;
use qgraph_formula::{Formula, Relation};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

/// Entity-type ids, relation ids and the entity count of a model.
pub trait EncoderLookup {
    fn mode_id(&self, mode: &str) -> Option<i64>;

    fn rel_id(&self, rel: &Relation) -> Option<i64>;

    fn num_entities(&self) -> u32;

    /// Type id of each variable node of `formula`, target first.
    fn variable_type_ids(&self, formula: &Formula) -> Result<Vec<i64>> {
        formula
            .variable_modes()
            .into_iter()
            .map(|m| self.mode_id(m).ok_or_else(|| BatchError::UnknownMode(m.to_string())))
            .collect()
    }

    /// Relation id of each edge slot of `formula`. Stored relations are
    /// reversed first, since edges run anchor → target.
    fn edge_type_ids(&self, formula: &Formula) -> Result<Vec<i64>> {
        formula
            .edge_relations()
            .iter()
            .map(|r| self.rel_id(r).ok_or_else(|| BatchError::UnknownRelation(r.to_string())))
            .collect()
    }
}

/// In-memory id tables, loadable from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "IdTablesFile", into = "IdTablesFile")]
pub struct IdTables {
    pub mode_ids: AHashMap<String, i64>,
    pub rel_ids: AHashMap<Relation, i64>,
    pub num_entities: u32,
}

impl IdTables {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl EncoderLookup for IdTables {
    fn mode_id(&self, mode: &str) -> Option<i64> {
        self.mode_ids.get(mode).copied()
    }

    fn rel_id(&self, rel: &Relation) -> Option<i64> {
        self.rel_ids.get(rel).copied()
    }

    fn num_entities(&self) -> u32 {
        self.num_entities
    }
}

// JSON object keys must be strings, so relation ids are stored as a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdTablesFile {
    mode_ids: HashMap<String, i64>,
    rel_ids: Vec<RelationIdEntry>,
    num_entities: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelationIdEntry {
    #[serde(flatten)]
    relation: Relation,
    id: i64,
}

impl From<IdTablesFile> for IdTables {
    fn from(file: IdTablesFile) -> Self {
        Self {
            mode_ids: file.mode_ids.into_iter().collect(),
            rel_ids: file
                .rel_ids
                .into_iter()
                .map(|e| (e.relation, e.id))
                .collect(),
            num_entities: file.num_entities,
        }
    }
}

impl From<IdTables> for IdTablesFile {
    fn from(tables: IdTables) -> Self {
        let mut rel_ids: Vec<RelationIdEntry> = tables
            .rel_ids
            .into_iter()
            .map(|(relation, id)| RelationIdEntry { relation, id })
            .collect();
        rel_ids.sort_by_key(|e| e.id);
        Self {
            mode_ids: tables.mode_ids.into_iter().collect(),
            rel_ids,
            num_entities: tables.num_entities,
        }
    }
}
