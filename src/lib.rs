//! Polyclass - Cross-validated classifier benchmarking
//!
//! This crate evaluates a roster of classifiers on one dataset:
//! - Stratified k-fold partitioning with per-fold standardization
//! - Eight classifier families behind one [`training::Classifier`] trait
//! - Parallel grid search over hyperparameter grids
//! - Per-fold scoring with binary or weighted F1
//! - CSV and SVG comparison reports
//!
//! # Modules
//!
//! ## Core
//! - [`dataset`] - Validated feature matrix and label vector
//! - [`preprocessing`] - Feature standardization
//! - [`training`] - Classifiers, folds and metrics
//! - [`optimizer`] - Grid search with internal cross-validation
//! - [`evaluation`] - Roster evaluation over shared folds
//! - [`report`] - Result tables, summaries and charts
//!
//! ## Utilities
//! - [`utils`] - Array loading and worker pool sizing
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod dataset;
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod evaluation;
pub mod report;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{PolyError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PolyError, Result};

    // Data
    pub use crate::dataset::Dataset;
    pub use crate::preprocessing::StandardScaler;
    pub use crate::utils::DataLoader;

    // Training
    pub use crate::training::{Classifier, ParamSet, ParamValue, Partitioner, Scorer, StratifiedKFold};

    // Optimization
    pub use crate::optimizer::{GridSearch, GridSearchConfig, ParamGrid};

    // Evaluation and reports
    pub use crate::evaluation::{default_roster, ClassifierKind, ClassifierSpec, Evaluator, EvaluatorConfig, ResultSet};
    pub use crate::report::{export, summarize, ExportPaths, ScoreSummary};
}
