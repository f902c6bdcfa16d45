//! Grid search configuration

use crate::training::Scorer;
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};

/// Configuration for an exhaustive hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchConfig {
    /// Internal stratified folds per candidate
    pub n_folds: usize,

    /// Worker pool for candidate × fold jobs
    pub parallel: ParallelConfig,

    /// Score used to rank candidates
    pub scoring: Scorer,

    /// Shuffle seed for the internal folds
    pub random_state: Option<u64>,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            parallel: ParallelConfig::default(),
            scoring: Scorer::Accuracy,
            random_state: None,
        }
    }
}

impl GridSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    /// Fixed worker count; `None` keeps the core-fraction default
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.parallel.n_threads = n_jobs;
        self
    }

    pub fn with_scoring(mut self, scoring: Scorer) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }
}
