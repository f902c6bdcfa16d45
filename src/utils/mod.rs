//! Utility functions and types

mod parallel;
pub mod data_loader;

pub use parallel::{
    available_cores, default_workers, workers_for_fraction, ParallelConfig,
    DEFAULT_CORE_FRACTION,
};
pub use data_loader::{ArrayFormat, DataLoader};
