use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File names used by offline generation, all under one data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLayout {
    pub data_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Held-out 1-chain test edges.
    pub fn test_edges(&self) -> PathBuf {
        self.data_dir.join("test_edges.bin")
    }

    /// Held-out 1-chain validation edges.
    pub fn val_edges(&self) -> PathBuf {
        self.data_dir.join("val_edges.bin")
    }

    pub fn clean_test_queries(&self, depth: usize) -> PathBuf {
        self.data_dir.join(format!("test_queries_{depth}-newclean.bin"))
    }

    pub fn clean_val_queries(&self, depth: usize) -> PathBuf {
        self.data_dir.join(format!("val_queries_{depth}-newclean.bin"))
    }

    /// Shard written by one sampling worker.
    pub fn shard(&self, depth: usize, worker: usize) -> PathBuf {
        self.data_dir.join(format!("queries_{depth}-{worker}.bin"))
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("./data")
    }
}
