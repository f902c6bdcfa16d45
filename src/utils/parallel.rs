//! Worker pool sizing for grid-search fan-out

use crate::error::{PolyError, Result};
use serde::{Deserialize, Serialize};

/// Share of available cores handed to grid search by default
pub const DEFAULT_CORE_FRACTION: f64 = 0.75;

/// Configuration for parallel processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = fraction of available cores)
    pub n_threads: Option<usize>,
    /// Fraction of available cores used when `n_threads` is unset
    pub core_fraction: f64,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            n_threads: None,
            core_fraction: DEFAULT_CORE_FRACTION,
        }
    }
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads
            .unwrap_or_else(|| workers_for_fraction(available_cores(), self.core_fraction))
            .max(1)
    }

    /// Build a dedicated rayon pool of `num_threads()` workers
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .thread_name(|i| format!("polyclass-worker-{}", i))
            .build()
            .map_err(|e| PolyError::config(format!("cannot build worker pool: {}", e)))
    }
}

/// Cores visible to this process
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// `floor(cores * fraction)`, never below one worker
pub fn workers_for_fraction(cores: usize, fraction: f64) -> usize {
    ((cores as f64 * fraction).floor() as usize).max(1)
}

/// Default grid-search worker count: three quarters of the cores
pub fn default_workers() -> usize {
    workers_for_fraction(available_cores(), DEFAULT_CORE_FRACTION)
}
