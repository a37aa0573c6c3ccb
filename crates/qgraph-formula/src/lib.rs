//! Query shapes and formulas for graph query embedding.
//!
//! A *query* is a small typed sub-structure of a knowledge graph: one to three
//! hops, anchored at known entities and resolving to an unknown target. This
//! crate defines the closed set of supported shapes ([`QueryType`]) together
//! with their static structure tables, the [`Formula`] that identifies a
//! typed shape, and concrete [`Query`] instances plus their persisted
//! [`QueryRecord`] form.
//!
//! Everything structural (which local node is an anchor, which edge carries
//! which stored relation) is read from the per-type [`QuerySchema`]. Other
//! crates must not hard-code shapes.

pub mod error;
pub mod formula;
pub mod query;
pub mod query_type;

pub use error::FormulaError;
pub use formula::{Formula, FormulaInterner, Relation};
pub use query::{GroundEdge, NodeId, Query, QueryRecord};
pub use query_type::{QuerySchema, QueryType};
