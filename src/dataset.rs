//! Labeled dataset shared read-only by the partitioner and the evaluator

use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Feature matrix (rows = samples) with an aligned vector of class labels.
///
/// Labels are integral class codes stored as `f64`, which is how the
/// classifiers consume them.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<f64>,
}

impl Dataset {
    /// Validate and wrap a feature matrix and label vector
    pub fn new(features: Array2<f64>, labels: Array1<f64>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(PolyError::shape(
                format!("{} labels (one per feature row)", features.nrows()),
                format!("{} labels", labels.len()),
            ));
        }
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(PolyError::shape(
                "non-empty feature matrix",
                format!("{} x {}", features.nrows(), features.ncols()),
            ));
        }
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            let (row, col) = (pos / features.ncols(), pos % features.ncols());
            return Err(PolyError::shape(
                "finite feature values",
                format!("{} at row {}, column {}", features[[row, col]], row, col),
            ));
        }
        validate_labels(&labels)?;

        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Sorted distinct class codes
    pub fn classes(&self) -> Vec<i64> {
        class_counts(&self.labels).into_keys().collect()
    }

    pub fn class_counts(&self) -> BTreeMap<i64, usize> {
        class_counts(&self.labels)
    }
}

/// Reject labels that are not finite integral class codes
pub fn validate_labels(labels: &Array1<f64>) -> Result<()> {
    for (i, &v) in labels.iter().enumerate() {
        if !v.is_finite() || (v - v.round()).abs() > 1e-9 {
            return Err(PolyError::shape(
                "integral class labels",
                format!("label {} at sample {}", v, i),
            ));
        }
    }
    Ok(())
}

/// Number of samples per class, keyed by class code in ascending order
pub fn class_counts(labels: &Array1<f64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &v in labels.iter() {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    counts
}
