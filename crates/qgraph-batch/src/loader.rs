//! Endless shuffled batch iteration.
//!
//! A [`DataIterator`] walks shuffled index batches over a [`BatchSource`]
//! and, when a pass runs out, silently starts a new shuffled pass. It never
//! yields `None`; callers stop by not asking for more.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};
use crate::lookup::EncoderLookup;
use crate::store::FormulaGroups;
use crate::tensors::QueryTensorSet;

/// Anything that turns a list of row indices into a batch.
pub trait BatchSource {
    type Batch;

    /// Number of indices in one pass.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collate<R: Rng + ?Sized>(&self, idx: &[usize], rng: &mut R) -> Result<Self::Batch>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    /// Seed of the generator owned by the iterator.
    pub seed: u64,
    /// Shuffle indices at the start of every pass.
    pub shuffle: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 512,
            seed: 0,
            shuffle: true,
        }
    }
}

/// One pass over `0..len`, cut into batches of `batch_size`. The final batch
/// may be shorter.
#[derive(Debug, Clone)]
pub struct IndexBatches {
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl IndexBatches {
    pub fn sequential(len: usize, batch_size: usize) -> Self {
        Self {
            order: (0..len).collect(),
            batch_size: batch_size.max(1),
            cursor: 0,
        }
    }

    pub fn shuffled<R: Rng + ?Sized>(len: usize, batch_size: usize, rng: &mut R) -> Self {
        let mut batches = Self::sequential(len, batch_size);
        batches.order.shuffle(rng);
        batches
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }
}

impl Iterator for IndexBatches {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let batch = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        Some(batch)
    }
}

/// Unbounded batch sequence over a [`BatchSource`].
#[derive(Debug)]
pub struct DataIterator<S, R = XorShiftRng> {
    source: S,
    config: LoaderConfig,
    rng: R,
    pass: IndexBatches,
    passes_completed: u64,
}

impl<S: BatchSource> DataIterator<S> {
    pub fn new(source: S, config: LoaderConfig) -> Result<Self> {
        let rng = XorShiftRng::seed_from_u64(config.seed);
        Self::with_rng(source, config, rng)
    }
}

impl<S: BatchSource, R: Rng> DataIterator<S, R> {
    pub fn with_rng(source: S, config: LoaderConfig, mut rng: R) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(BatchError::InvalidBatchSize);
        }
        if source.is_empty() {
            return Err(BatchError::EmptyPopulation);
        }
        let pass = new_pass(source.len(), &config, &mut rng);
        Ok(Self {
            source,
            config,
            rng,
            pass,
            passes_completed: 0,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn passes_completed(&self) -> u64 {
        self.passes_completed
    }

    /// Next batch, starting a new pass first if the current one is spent.
    pub fn next_batch(&mut self) -> Result<S::Batch> {
        let idx = match self.pass.next() {
            Some(idx) => idx,
            None => {
                self.passes_completed += 1;
                tracing::trace!(passes = self.passes_completed, "restarting batch pass");
                self.pass = new_pass(self.source.len(), &self.config, &mut self.rng);
                self.pass.next().ok_or(BatchError::EmptyPopulation)?
            }
        };
        self.source.collate(&idx, &mut self.rng)
    }
}

impl<S: BatchSource, R: Rng> Iterator for DataIterator<S, R> {
    type Item = Result<S::Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}

fn new_pass<R: Rng + ?Sized>(len: usize, config: &LoaderConfig, rng: &mut R) -> IndexBatches {
    if config.shuffle {
        IndexBatches::shuffled(len, config.batch_size, rng)
    } else {
        IndexBatches::sequential(len, config.batch_size)
    }
}

/// Tensor set plus endless shuffled loader for one formula-grouped corpus.
pub fn get_queries_iterator(
    groups: &FormulaGroups,
    config: LoaderConfig,
    lookup: &impl EncoderLookup,
) -> Result<DataIterator<QueryTensorSet>> {
    let tensors = QueryTensorSet::build(groups, lookup)?;
    DataIterator::new(tensors, config)
}
