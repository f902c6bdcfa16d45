//! Benchmark evaluation
//!
//! A roster of [`ClassifierSpec`]s is evaluated by an [`Evaluator`] over one
//! shared set of stratified folds, producing a [`ResultSet`] of held-out
//! scores per classifier.

mod evaluator;
mod roster;

pub use evaluator::{Evaluator, EvaluatorConfig, ResultSet};
pub use roster::{default_roster, load_roster, logspace, validate_roster, ClassifierKind, ClassifierSpec};
