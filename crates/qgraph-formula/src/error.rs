use thiserror::Error;

use crate::query_type::QueryType;

/// Structural errors. None of these are recoverable: they indicate a
/// programming error or corrupted query data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("unknown query type `{0}`")]
    UnknownQueryType(String),

    #[error("{query_type} expects {expected} {what}, got {actual}")]
    ArityMismatch {
        query_type: QueryType,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{query_type}: local node {node} is both `{first}` and `{second}`")]
    ModeMismatch {
        query_type: QueryType,
        node: usize,
        first: String,
        second: String,
    },

    #[error("{query_type}: local node {node} is bound to both {first} and {second}")]
    NodeMismatch {
        query_type: QueryType,
        node: usize,
        first: u32,
        second: u32,
    },

    #[error("query graph was dropped at load time; reload with keep_graph to serialize")]
    GraphDropped,
}
