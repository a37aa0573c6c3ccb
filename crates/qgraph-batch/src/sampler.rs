//! Formula-weighted batch selection.
//!
//! Each draw picks one formula with probability `n_f / Σ n_f`, then cuts a
//! window of that formula's queries. Windows never wrap: a window that would
//! run past the end of a formula is clamped to the end, so batches near the
//! boundary come out short.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use qgraph_formula::{Formula, Query};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::error::{BatchError, Result};
use crate::loader::BatchSource;
use crate::store::FormulaGroups;

/// Slice of one formula's population for the index window `[min_idx, max_idx]`.
///
/// `start = min_idx mod n`, `end = (max_idx + 1) mod n`, and when
/// `end <= start` the slice runs to `n`.
pub fn window_range(n: usize, min_idx: usize, max_idx: usize) -> Range<usize> {
    debug_assert!(n > 0);
    let start = min_idx % n;
    let end = (max_idx + 1) % n;
    let end = if end <= start { n } else { end };
    start..end
}

/// Weighted sampler over populations keyed by formula.
///
/// Generic over the key and item so that any grouped population can be
/// sampled; [`FormulaSampler::from_groups`] builds the usual
/// `Formula → [Query]` instance.
#[derive(Debug, Clone)]
pub struct FormulaSampler<K = Arc<Formula>, T = Query> {
    entries: Vec<(K, Vec<T>)>,
    weights: WeightedIndex<u64>,
    total: usize,
    max_len: usize,
}

/// One sampled batch: a formula and a window of its queries.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaBatch<K, T> {
    pub formula: K,
    pub queries: Vec<T>,
}

impl<K: fmt::Display, T> FormulaSampler<K, T> {
    pub fn new(entries: impl IntoIterator<Item = (K, Vec<T>)>) -> Result<Self> {
        let entries: Vec<(K, Vec<T>)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(BatchError::EmptyPopulation);
        }
        if let Some((key, _)) = entries.iter().find(|(_, items)| items.is_empty()) {
            return Err(BatchError::NoQueries {
                formula: key.to_string(),
            });
        }

        let counts: Vec<u64> = entries.iter().map(|(_, items)| items.len() as u64).collect();
        let weights = WeightedIndex::new(&counts).map_err(|_| BatchError::EmptyPopulation)?;
        let total = entries.iter().map(|(_, items)| items.len()).sum();
        let max_len = entries
            .iter()
            .map(|(_, items)| items.len())
            .max()
            .unwrap_or_default();

        Ok(Self {
            entries,
            weights,
            total,
            max_len,
        })
    }

    /// Number of indices one pass should cover: the largest population.
    pub fn len(&self) -> usize {
        self.max_len
    }

    pub fn is_empty(&self) -> bool {
        self.max_len == 0
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn num_formulas(&self) -> usize {
        self.entries.len()
    }

    pub fn key(&self, formula_index: usize) -> &K {
        &self.entries[formula_index].0
    }

    /// Selection probability of each formula, in entry order.
    pub fn probabilities(&self) -> Vec<f64> {
        self.entries
            .iter()
            .map(|(_, items)| items.len() as f64 / self.total as f64)
            .collect()
    }

    /// Draw a formula index.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.weights.sample(rng)
    }

    /// Draw a formula and return the window of its items covered by `idx`.
    pub fn sample<R: Rng + ?Sized>(&self, idx: &[usize], rng: &mut R) -> Result<(&K, &[T])> {
        let (Some(&min_idx), Some(&max_idx)) = (idx.iter().min(), idx.iter().max()) else {
            return Err(BatchError::EmptyBatch);
        };
        let (key, items) = &self.entries[self.pick(rng)];
        let range = window_range(items.len(), min_idx, max_idx);
        Ok((key, &items[range]))
    }
}

impl FormulaSampler {
    pub fn from_groups(groups: FormulaGroups) -> Result<Self> {
        Self::new(groups.into_groups())
    }
}

impl<K: fmt::Display + Clone, T: Clone> BatchSource for FormulaSampler<K, T> {
    type Batch = FormulaBatch<K, T>;

    fn len(&self) -> usize {
        self.max_len
    }

    fn collate<R: Rng + ?Sized>(&self, idx: &[usize], rng: &mut R) -> Result<Self::Batch> {
        let (formula, queries) = self.sample(idx, rng)?;
        Ok(FormulaBatch {
            formula: formula.clone(),
            queries: queries.to_vec(),
        })
    }
}
