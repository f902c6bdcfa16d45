//! Classification scores used to rank classifiers
//!
//! F-measures follow the usual conventions: precision or recall with an empty
//! denominator counts as 0, and so does an F-measure whose precision and
//! recall are both 0.

use crate::dataset::class_counts;
use crate::error::{PolyError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Scoring function applied to (true labels, predicted labels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scorer {
    /// F-measure of a single positive class
    BinaryF1 { positive: i64 },
    /// Per-class F-measure averaged with class-support weights
    WeightedF1,
    /// Fraction of correct predictions
    Accuracy,
}

impl Scorer {
    /// Pick the score for a label vector: binary F1 for two classes,
    /// support-weighted F1 for three or more.
    pub fn for_labels(labels: &Array1<f64>) -> Result<Self> {
        let counts = class_counts(labels);
        match counts.len() {
            0 | 1 => Err(PolyError::config(format!(
                "classification needs at least 2 classes, found {}",
                counts.len()
            ))),
            // Larger code is the positive class, i.e. 1 for 0/1 labels
            2 => Ok(Scorer::BinaryF1 {
                positive: counts.keys().copied().last().unwrap_or(1),
            }),
            _ => Ok(Scorer::WeightedF1),
        }
    }

    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(PolyError::shape(
                format!("{} predictions", y_true.len()),
                format!("{} predictions", y_pred.len()),
            ));
        }
        if y_true.is_empty() {
            return Err(PolyError::shape("at least one sample to score", "0 samples"));
        }

        Ok(match *self {
            Scorer::BinaryF1 { positive } => f1_for_class(y_true, y_pred, positive),
            Scorer::WeightedF1 => weighted_f1(y_true, y_pred),
            Scorer::Accuracy => accuracy(y_true, y_pred),
        })
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Scorer::BinaryF1 { .. })
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scorer::BinaryF1 { positive } => write!(f, "binary F1 (positive class {})", positive),
            Scorer::WeightedF1 => write!(f, "weighted F1"),
            Scorer::Accuracy => write!(f, "accuracy"),
        }
    }
}

/// One-vs-rest confusion counts for `class`: (tp, fp, tn, fn)
pub fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: i64) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        let t_pos = t.round() as i64 == class;
        let p_pos = p.round() as i64 == class;

        match (t_pos, p_pos) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

/// Precision, recall and F-measure of `class`
pub fn precision_recall_f1(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: i64) -> (f64, f64, f64) {
    let (tp, fp, _, fn_) = confusion_counts(y_true, y_pred, class);

    let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
    let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    (precision, recall, f1)
}

pub fn f1_for_class(y_true: &Array1<f64>, y_pred: &Array1<f64>, class: i64) -> f64 {
    precision_recall_f1(y_true, y_pred, class).2
}

/// Support-weighted mean of per-class F-measures.
///
/// Classes that only occur in predictions have zero support and weigh nothing.
pub fn weighted_f1(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let support = class_counts(y_true);
    let total = y_true.len() as f64;
    if total == 0.0 {
        return 0.0;
    }

    support
        .iter()
        .map(|(&class, &count)| f1_for_class(y_true, y_pred, class) * count as f64 / total)
        .sum()
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t.round() as i64 == p.round() as i64)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Summary of a set of predictions, logged at debug level per fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F-measure
    pub f1_score: f64,
    pub n_samples: usize,
    pub n_classes: usize,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let support = class_counts(y_true);
        let total = y_true.len().max(1) as f64;

        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut f1_score = 0.0;
        for (&class, &count) in &support {
            let (p, r, f) = precision_recall_f1(y_true, y_pred, class);
            let w = count as f64 / total;
            precision += p * w;
            recall += r * w;
            f1_score += f * w;
        }

        let n_classes = support
            .keys()
            .copied()
            .chain(y_pred.iter().map(|&v| v.round() as i64))
            .collect::<BTreeSet<_>>()
            .len();

        Self {
            accuracy: accuracy(y_true, y_pred),
            precision,
            recall,
            f1_score,
            n_samples: y_true.len(),
            n_classes,
        }
    }
}
