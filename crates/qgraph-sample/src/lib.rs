//! Offline query generation against a source graph.
//!
//! The graph itself (storage, random-walk sampling) lives behind the
//! [`QueryGraph`] trait. This crate orchestrates it:
//!
//! - [`sample_clean_test`]: held-out test/validation query sets with no
//!   validation query repeated in the test set.
//! - [`parallel_sample`]: fan sampling out over workers that each own a copy
//!   of the graph and write their own shard files.
//!
//! All files live under a [`DataLayout`].

pub mod clean;
pub mod graph;
pub mod layout;
pub mod parallel;

pub use clean::{
    sample_clean_test, subtract_queries, CleanTestPlan, CleanTestSummary, DepthPlan, SampleRound,
};
pub use graph::{held_out_edges, HeldOutEdge, QueryGraph};
pub use layout::DataLayout;
pub use parallel::{parallel_sample, ParallelSampleConfig};
