//! Classifier trait and hyperparameter values

use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value as found in configurations and grids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Integral value; floats with no fractional part are accepted
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match *self {
            ParamValue::Int(v) if v >= 0 => Ok(v as usize),
            ParamValue::Float(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            _ => Err(invalid_value(name, self, "expected a non-negative integer")),
        }
    }

    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match *self {
            ParamValue::Int(v) => Ok(v as f64),
            ParamValue::Float(v) => Ok(v),
            _ => Err(invalid_value(name, self, "expected a number")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(s) => Ok(s),
            _ => Err(invalid_value(name, self, "expected a string")),
        }
    }

    /// `None` is spelled as the string "none" or a null-like value
    pub fn as_optional_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Text(s) if s.eq_ignore_ascii_case("none") => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

/// Named hyperparameter assignment
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Render a parameter set as `a=1, b=rbf` for logs
pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn invalid_value(name: &str, value: &ParamValue, reason: &str) -> PolyError {
    PolyError::config(format!("invalid value {} for parameter '{}': {}", value, name, reason))
}

pub(crate) fn unknown_param(classifier: &str, name: &str) -> PolyError {
    PolyError::config(format!("{} has no parameter '{}'", classifier, name))
}

/// Common interface of every benchmarked classifier
pub trait Classifier: Send + Sync {
    /// Short identifier of the algorithm
    fn name(&self) -> &str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Current values of the tunable hyperparameters
    fn params(&self) -> ParamSet;

    /// Seed the model's random number generator; deterministic models ignore it
    fn set_random_state(&mut self, _seed: u64) {}

    /// Clone into a fresh box (used to fan out grid-search candidates)
    fn box_clone(&self) -> Box<dyn Classifier>;

    /// Apply several hyperparameters in order
    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}

impl Clone for Box<dyn Classifier> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Sorted distinct integral class codes in `y`
pub(crate) fn unique_classes(y: &Array1<f64>) -> Vec<i64> {
    let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Shared fit-time input checks
pub(crate) fn check_fit_input(classifier: &str, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PolyError::shape(
            format!("y length = {}", x.nrows()),
            format!("y length = {}", y.len()),
        ));
    }
    if x.nrows() == 0 {
        return Err(PolyError::fit(classifier, "empty training set"));
    }
    Ok(())
}

pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(PolyError::shape(
            format!("{} features", expected),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}
