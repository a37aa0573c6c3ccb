//! Query batching for graph query embedding models.
//!
//! Pipeline, leaf to root:
//!
//! 1. [`store`]: group loaded queries by formula and by query type.
//! 2. [`sampler`]: pick a formula with probability proportional to its
//!    population and cut a window out of its queries.
//! 3. [`tensors`]: pack same-type queries into flat integer arrays and slice
//!    them into disjoint-union batch graphs for a relational GNN.
//! 4. [`loader`]: shuffle, batch and restart forever.
//!
//! Entity-type and relation ids come from the model through
//! [`EncoderLookup`]; record files are read and written by [`io`].

pub mod error;
pub mod io;
pub mod loader;
pub mod lookup;
pub mod sampler;
pub mod store;
pub mod tensors;

pub use error::{BatchError, Result};
pub use loader::{get_queries_iterator, BatchSource, DataIterator, IndexBatches, LoaderConfig};
pub use lookup::{EncoderLookup, IdTables};
pub use sampler::{window_range, FormulaBatch, FormulaSampler};
pub use store::{
    clean_test, group_by_formula, group_by_type, group_by_type_and_formula, split_by_negatives,
    FormulaGroups, TestQuerySplit,
};
pub use tensors::{query_graph, BatchTensors, QueryGraphBatch, QueryTensorSet, NO_NEGATIVE};
