//! Hyperparameter selection
//!
//! [`GridSearch`] evaluates every combination of a [`ParamGrid`] with
//! internal stratified folds on a dedicated worker pool and refits the best
//! one.

mod config;
mod param_grid;
mod grid_search;

pub use config::GridSearchConfig;
pub use param_grid::ParamGrid;
pub use grid_search::{GridSearch, Study, TrialResult};
