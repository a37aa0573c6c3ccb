use std::path::PathBuf;

use qgraph_formula::{FormulaError, QueryType};
use thiserror::Error;

pub type Result<T, E = BatchError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("no queries of formula {formula}")]
    NoQueries { formula: String },

    #[error("query of formula {found} batched under formula {expected}")]
    ForeignQuery { expected: String, found: String },

    #[error("query population is empty")]
    EmptyPopulation,

    #[error("tensor set mixes query types: expected {expected}, found {found}")]
    MixedQueryTypes {
        expected: QueryType,
        found: QueryType,
    },

    #[error("no id for entity type `{0}`")]
    UnknownMode(String),

    #[error("no id for relation {0}")]
    UnknownRelation(String),

    #[error("1-chain negatives need num_entities > 0")]
    NoEntities,

    #[error("batch index list is empty")]
    EmptyBatch,

    #[error("batch index {index} out of range for {len} queries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("batch size must be > 0")]
    InvalidBatchSize,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to parse id tables: {0}")]
    Json(#[from] serde_json::Error),
}
