//! Gaussian Naive Bayes for continuous features

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

use super::models::{check_fit_input, check_n_features, unique_classes, unknown_param, Classifier, ParamSet, ParamValue};
use crate::error::{PolyError, Result};

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Mean of each feature for each class
    means: HashMap<i64, Vec<f64>>,
    /// Variance of each feature for each class
    variances: HashMap<i64, Vec<f64>>,
    /// Prior probability of each class
    priors: HashMap<i64, f64>,
    classes: Vec<i64>,
    n_features: usize,
    /// Portion of the largest feature variance added to every variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: HashMap::new(),
            variances: HashMap::new(),
            priors: HashMap::new(),
            classes: Vec::new(),
            n_features: 0,
            var_smoothing: 1e-9,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Predict normalized log probabilities, columns ordered by class code
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(PolyError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut log_probs = Array2::zeros((x.nrows(), self.classes.len()));

        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, &class) in self.classes.iter().enumerate() {
                log_probs[[i, j]] = self.priors[&class].ln() + self.log_likelihood(row, class);
            }
        }

        // Normalize (log-sum-exp trick)
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum: f64 = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            row.mapv_inplace(|v| v - max_val - log_sum);
        }

        Ok(log_probs)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }

    fn log_likelihood(&self, x: ArrayView1<f64>, class: i64) -> f64 {
        let means = &self.means[&class];
        let vars = &self.variances[&class];

        x.iter()
            .zip(means.iter())
            .zip(vars.iter())
            .map(|((&xi, &mean), &var)| -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln()))
            .sum()
    }

    pub fn class_priors(&self) -> &HashMap<i64, f64> {
        &self.priors
    }

    pub fn feature_means(&self) -> &HashMap<i64, Vec<f64>> {
        &self.means
    }
}

impl Classifier for GaussianNaiveBayes {
    fn name(&self) -> &str {
        "GaussianNB"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let max_var = x.var_axis(Axis(0), 0.0).iter().cloned().fold(0.0, f64::max);
        let epsilon = (self.var_smoothing * max_var).max(f64::MIN_POSITIVE);

        self.classes = unique_classes(y);
        self.n_features = n_features;
        self.means.clear();
        self.variances.clear();
        self.priors.clear();

        for &class in &self.classes {
            let class_indices: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &yi)| yi.round() as i64 == class)
                .map(|(i, _)| i)
                .collect();
            let n_class = class_indices.len();

            // Single-pass Welford's algorithm for mean and variance
            let mut feature_means = vec![0.0; n_features];
            let mut feature_m2 = vec![0.0; n_features];
            for (count, &idx) in class_indices.iter().enumerate() {
                let count = count + 1;
                for (j, &val) in x.row(idx).iter().enumerate() {
                    let delta = val - feature_means[j];
                    feature_means[j] += delta / count as f64;
                    feature_m2[j] += delta * (val - feature_means[j]);
                }
            }
            let feature_vars: Vec<f64> = feature_m2.iter().map(|&m2| m2 / n_class as f64 + epsilon).collect();

            self.priors.insert(class, n_class as f64 / n_samples as f64);
            self.means.insert(class, feature_means);
            self.variances.insert(class, feature_vars);
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let log_probs = self.predict_log_proba(x)?;

        Ok(log_probs
            .rows()
            .into_iter()
            .map(|row| {
                let max_idx = row
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.classes[max_idx] as f64
            })
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "var_smoothing" => self.var_smoothing = value.as_f64(name)?,
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("var_smoothing".to_string(), self.var_smoothing.into());
        params
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
