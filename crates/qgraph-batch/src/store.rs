//! Query populations grouped by formula and by query type.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use qgraph_formula::{Formula, Query, QueryType};

use crate::error::{BatchError, Result};

/// Queries grouped by formula, in first-seen formula order.
///
/// Every query stored under a formula has that formula as its own.
#[derive(Debug, Clone, Default)]
pub struct FormulaGroups {
    formulas: Vec<Arc<Formula>>,
    queries: Vec<Vec<Query>>,
    index: AHashMap<Arc<Formula>, usize>,
}

impl FormulaGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, query: Query) {
        let slot = match self.index.get(query.formula.as_ref()) {
            Some(&slot) => slot,
            None => self.new_slot(Arc::clone(&query.formula)),
        };
        self.queries[slot].push(query);
    }

    fn new_slot(&mut self, formula: Arc<Formula>) -> usize {
        let slot = self.formulas.len();
        self.index.insert(Arc::clone(&formula), slot);
        self.formulas.push(formula);
        self.queries.push(Vec::new());
        slot
    }

    pub fn get(&self, formula: &Formula) -> Option<&[Query]> {
        self.index.get(formula).map(|&i| self.queries[i].as_slice())
    }

    /// Queries of `formula`; a missing or empty group is an error.
    pub fn queries_for(&self, formula: &Formula) -> Result<&[Query]> {
        match self.get(formula) {
            Some(qs) if !qs.is_empty() => Ok(qs),
            _ => Err(BatchError::NoQueries {
                formula: formula.to_string(),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Formula>, &[Query])> {
        self.formulas
            .iter()
            .zip(self.queries.iter().map(Vec::as_slice))
    }

    pub fn formulas(&self) -> &[Arc<Formula>] {
        &self.formulas
    }

    /// Population size of each formula.
    pub fn counts(&self) -> impl Iterator<Item = (&Arc<Formula>, usize)> {
        self.iter().map(|(f, qs)| (f, qs.len()))
    }

    pub fn num_formulas(&self) -> usize {
        self.formulas.len()
    }

    pub fn num_queries(&self) -> usize {
        self.queries.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_queries() == 0
    }

    /// The single query type shared by every formula.
    pub fn query_type(&self) -> Result<QueryType> {
        let mut types = self.formulas.iter().map(|f| f.query_type());
        let expected = types.next().ok_or(BatchError::EmptyPopulation)?;
        match types.find(|&t| t != expected) {
            Some(found) => Err(BatchError::MixedQueryTypes { expected, found }),
            None => Ok(expected),
        }
    }

    pub fn into_groups(self) -> impl Iterator<Item = (Arc<Formula>, Vec<Query>)> {
        self.formulas.into_iter().zip(self.queries)
    }
}

impl FromIterator<Query> for FormulaGroups {
    fn from_iter<I: IntoIterator<Item = Query>>(iter: I) -> Self {
        let mut groups = Self::new();
        for q in iter {
            groups.push(q);
        }
        groups
    }
}

impl Extend<Query> for FormulaGroups {
    fn extend<I: IntoIterator<Item = Query>>(&mut self, iter: I) {
        for q in iter {
            self.push(q);
        }
    }
}

pub fn group_by_formula(queries: impl IntoIterator<Item = Query>) -> FormulaGroups {
    queries.into_iter().collect()
}

pub fn group_by_type(
    queries: impl IntoIterator<Item = Query>,
) -> BTreeMap<QueryType, Vec<Query>> {
    let mut out: BTreeMap<QueryType, Vec<Query>> = BTreeMap::new();
    for q in queries {
        out.entry(q.query_type()).or_default().push(q);
    }
    out
}

pub fn group_by_type_and_formula(
    queries: impl IntoIterator<Item = Query>,
) -> BTreeMap<QueryType, FormulaGroups> {
    let mut out: BTreeMap<QueryType, FormulaGroups> = BTreeMap::new();
    for q in queries {
        out.entry(q.query_type()).or_default().push(q);
    }
    out
}

/// Held-out test queries split by how many negatives they carry.
#[derive(Debug, Clone, Default)]
pub struct TestQuerySplit {
    /// Queries with more than one soft negative (ranked against all of them).
    pub full_neg: BTreeMap<QueryType, FormulaGroups>,
    /// Queries with at most one soft negative.
    pub one_neg: BTreeMap<QueryType, FormulaGroups>,
}

pub fn split_by_negatives(queries: impl IntoIterator<Item = Query>) -> TestQuerySplit {
    let mut split = TestQuerySplit::default();
    for q in queries {
        let side = if q.num_negatives() > 1 {
            &mut split.full_neg
        } else {
            &mut split.one_neg
        };
        side.entry(q.query_type()).or_default().push(q);
    }
    split
}

/// Drop test queries that also occur among the training queries of the same
/// type. Types with no training queries are left untouched.
pub fn clean_test(
    train: &BTreeMap<QueryType, Vec<Query>>,
    mut test: BTreeMap<QueryType, Vec<Query>>,
) -> BTreeMap<QueryType, Vec<Query>> {
    for (query_type, train_queries) in train {
        let Some(test_queries) = test.get_mut(query_type) else {
            continue;
        };
        let seen: AHashSet<&Query> = train_queries.iter().collect();
        let before = test_queries.len();
        test_queries.retain(|q| !seen.contains(q));
        tracing::debug!(
            %query_type,
            removed = before - test_queries.len(),
            "cleaned test queries"
        );
    }
    test
}
