//! Formulas: the typed structure of a query, independent of node ids.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::FormulaError;
use crate::query_type::{check_arity, QuerySchema, QueryType};

/// A typed relation `source_mode -name-> target_mode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub source_mode: String,
    pub name: String,
    pub target_mode: String,
}

impl Relation {
    pub fn new(
        source_mode: impl Into<String>,
        name: impl Into<String>,
        target_mode: impl Into<String>,
    ) -> Self {
        Self {
            source_mode: source_mode.into(),
            name: name.into(),
            target_mode: target_mode.into(),
        }
    }

    /// The same relation traversed the other way round.
    pub fn reverse(&self) -> Self {
        Self {
            source_mode: self.target_mode.clone(),
            name: self.name.clone(),
            target_mode: self.source_mode.clone(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.source_mode, self.name, self.target_mode)
    }
}

/// Structural type of a query: its shape plus the entity types and relations
/// along it. Equality and hashing cover the full content, so formulas work as
/// map keys.
///
/// Fields are only reachable through accessors, and deserialization goes
/// through [`Formula::new`], so every formula has passed its shape checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "FormulaParts", into = "FormulaParts")]
pub struct Formula {
    query_type: QueryType,
    /// Entity types of the anchors, in local order.
    anchor_modes: Vec<String>,
    /// Stored relation path, rooted at the target.
    rels: Vec<Relation>,
}

/// Serialized form: the anchor types are derived on load.
#[derive(Serialize, Deserialize)]
struct FormulaParts {
    query_type: QueryType,
    rels: Vec<Relation>,
}

impl TryFrom<FormulaParts> for Formula {
    type Error = FormulaError;

    fn try_from(parts: FormulaParts) -> Result<Self, Self::Error> {
        Formula::new(parts.query_type, parts.rels)
    }
}

impl From<Formula> for FormulaParts {
    fn from(formula: Formula) -> Self {
        Self {
            query_type: formula.query_type,
            rels: formula.rels,
        }
    }
}

impl Formula {
    /// Validate `rels` against the shape and derive the anchor types.
    pub fn new(query_type: QueryType, rels: Vec<Relation>) -> Result<Self, FormulaError> {
        let schema = query_type.schema();
        check_arity(query_type, "relations", schema.n_edges(), rels.len())?;
        let modes = local_modes(query_type, schema, &rels)?;
        let anchor_modes = modes[..schema.n_anchors].to_vec();
        Ok(Self {
            query_type,
            anchor_modes,
            rels,
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn anchor_modes(&self) -> &[String] {
        &self.anchor_modes
    }

    /// Stored relation path, rooted at the target.
    pub fn rels(&self) -> &[Relation] {
        &self.rels
    }

    pub fn schema(&self) -> &'static QuerySchema {
        self.query_type.schema()
    }

    pub fn target_mode(&self) -> &str {
        &self.rels[0].source_mode
    }

    /// Endpoint types of every stored relation, flattened as
    /// `[rel0.source, rel0.target, rel1.source, ...]`.
    pub fn nodes(&self) -> Vec<&str> {
        self.rels
            .iter()
            .flat_map(|r| [r.source_mode.as_str(), r.target_mode.as_str()])
            .collect()
    }

    /// Entity types of the variable nodes, target first.
    pub fn variable_modes(&self) -> Vec<&str> {
        let nodes = self.nodes();
        self.schema()
            .variable_node_positions
            .iter()
            .map(|&i| nodes[i])
            .collect()
    }

    /// Relation carried by each edge slot, already reversed to run
    /// anchor → target.
    pub fn edge_relations(&self) -> Vec<Relation> {
        self.schema()
            .edge_label_index
            .iter()
            .map(|&j| self.rels[j].reverse())
            .collect()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.query_type)?;
        for (i, rel) in self.rels.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{rel}")?;
        }
        f.write_str("]")
    }
}

/// Entity type of each local node, checking that shared nodes agree.
fn local_modes(
    query_type: QueryType,
    schema: &QuerySchema,
    rels: &[Relation],
) -> Result<Vec<String>, FormulaError> {
    let mut modes: Vec<Option<&str>> = vec![None; schema.n_nodes()];
    for (j, rel) in rels.iter().enumerate() {
        let Some((s, t)) = schema.stored_endpoints(j) else {
            continue;
        };
        for (node, mode) in [(s, rel.source_mode.as_str()), (t, rel.target_mode.as_str())] {
            match modes[node] {
                None => modes[node] = Some(mode),
                Some(prev) if prev == mode => {}
                Some(prev) => {
                    return Err(FormulaError::ModeMismatch {
                        query_type,
                        node,
                        first: prev.to_string(),
                        second: mode.to_string(),
                    })
                }
            }
        }
    }
    Ok(modes
        .into_iter()
        .map(|m| m.unwrap_or_default().to_string())
        .collect())
}

/// Shares one allocation per distinct formula across a loaded population.
#[derive(Debug, Default)]
pub struct FormulaInterner {
    formulas: AHashMap<Formula, Arc<Formula>>,
}

impl FormulaInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, formula: Formula) -> Arc<Formula> {
        if let Some(shared) = self.formulas.get(&formula) {
            return Arc::clone(shared);
        }
        let shared = Arc::new(formula.clone());
        self.formulas.insert(formula, Arc::clone(&shared));
        shared
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str, n: &str, t: &str) -> Relation {
        Relation::new(s, n, t)
    }

    #[test]
    fn inter_chain_anchor_modes() {
        let f = Formula::new(
            QueryType::ThreeInterChain,
            vec![
                rel("protein", "0", "drug"),
                rel("protein", "1", "function"),
                rel("function", "2", "disease"),
            ],
        )
        .unwrap();
        assert_eq!(f.anchor_modes(), ["drug", "disease"]);
        assert_eq!(f.variable_modes(), vec!["protein", "function"]);
        assert_eq!(f.target_mode(), "protein");
    }

    #[test]
    fn chain_inter_anchor_modes() {
        let f = Formula::new(
            QueryType::ThreeChainInter,
            vec![
                rel("protein", "0", "function"),
                rel("function", "1", "drug"),
                rel("function", "2", "disease"),
            ],
        )
        .unwrap();
        assert_eq!(f.anchor_modes(), ["drug", "disease"]);
        assert_eq!(f.variable_modes(), vec!["protein", "function"]);
    }

    #[test]
    fn broken_chain_is_rejected() {
        let err = Formula::new(
            QueryType::TwoChain,
            vec![rel("protein", "0", "drug"), rel("function", "1", "disease")],
        )
        .unwrap_err();
        assert!(matches!(err, FormulaError::ModeMismatch { node: 2, .. }));
    }

    #[test]
    fn wrong_relation_count_is_rejected() {
        let err = Formula::new(QueryType::ThreeInter, vec![rel("a", "0", "b")]).unwrap_err();
        assert!(matches!(
            err,
            FormulaError::ArityMismatch {
                expected: 3,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn edge_relations_are_reversed_in_slot_order() {
        let f = Formula::new(
            QueryType::TwoChain,
            vec![rel("protein", "0", "drug"), rel("drug", "1", "disease")],
        )
        .unwrap();
        assert_eq!(
            f.edge_relations(),
            vec![rel("disease", "1", "drug"), rel("drug", "0", "protein")]
        );
    }

    #[test]
    fn deserialization_runs_shape_checks() {
        let f = Formula::new(
            QueryType::TwoChain,
            vec![rel("protein", "0", "drug"), rel("drug", "1", "disease")],
        )
        .unwrap();
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(serde_json::from_str::<Formula>(&json).unwrap(), f);

        let short = r#"{"query_type": "3-chain", "rels": [
            {"source_mode": "protein", "name": "0", "target_mode": "drug"}
        ]}"#;
        let err = serde_json::from_str::<Formula>(short).unwrap_err();
        assert!(err.to_string().contains("expects 3 relations"));

        let broken = r#"{"query_type": "2-chain", "rels": [
            {"source_mode": "protein", "name": "0", "target_mode": "drug"},
            {"source_mode": "function", "name": "1", "target_mode": "disease"}
        ]}"#;
        assert!(serde_json::from_str::<Formula>(broken).is_err());
    }

    #[test]
    fn interner_shares_equal_formulas() {
        let mut interner = FormulaInterner::new();
        let f = Formula::new(QueryType::OneChain, vec![rel("a", "r", "b")]).unwrap();
        let x = interner.intern(f.clone());
        let y = interner.intern(f);
        assert!(Arc::ptr_eq(&x, &y));
        assert_eq!(interner.len(), 1);
    }
}
