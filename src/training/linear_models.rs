//! Linear model implementations

use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::models::{check_fit_input, check_n_features, unique_classes, unknown_param, Classifier, ParamSet, ParamValue};

/// Weights of one binary logistic model
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogisticModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LogisticModel {
    fn decision(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }
}

/// L2-regularized logistic regression trained with batch gradient descent.
///
/// `c` is the inverse regularization strength: the penalty on the mean log
/// loss is `||w||² / (2 * C * n_samples)`. Three or more classes are handled
/// one-vs-rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    pub learning_rate: f64,
    models: Vec<LogisticModel>,
    classes: Vec<i64>,
    n_features: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            models: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Gradient descent on one 0/1 target
    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> LogisticModel {
        let n_samples = x.nrows() as f64;
        let alpha = 1.0 / (self.c * n_samples);
        let lr = self.learning_rate;

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        LogisticModel {
            coefficients: weights,
            intercept: bias,
        }
    }

    /// Probability of the positive class for binary problems, or one column
    /// per class (unnormalized one-vs-rest probabilities) otherwise
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.models.is_empty() {
            return Err(PolyError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut proba = Array2::zeros((x.nrows(), self.models.len()));
        for (j, model) in self.models.iter().enumerate() {
            proba.column_mut(j).assign(&Self::sigmoid(&model.decision(x)));
        }
        Ok(proba)
    }

    pub fn coefficients(&self) -> Vec<&Array1<f64>> {
        self.models.iter().map(|m| &m.coefficients).collect()
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "LogisticRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        if self.c <= 0.0 {
            return Err(PolyError::fit(self.name(), format!("C must be positive, got {}", self.c)));
        }

        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(PolyError::fit(self.name(), "at least 2 distinct classes are required"));
        }

        let positives: Vec<i64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        self.models = positives
            .iter()
            .map(|&positive| {
                let target = y.mapv(|v| if v.round() as i64 == positive { 1.0 } else { 0.0 });
                self.fit_binary(x, &target)
            })
            .collect();
        self.classes = classes;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;

        if self.classes.len() == 2 {
            return Ok(proba.column(0).mapv(|p| {
                if p >= 0.5 {
                    self.classes[1] as f64
                } else {
                    self.classes[0] as f64
                }
            }));
        }

        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (j, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = j;
                    }
                }
                self.classes[best] as f64
            })
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "C" | "c" => self.c = value.as_f64(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "learning_rate" => self.learning_rate = value.as_f64(name)?,
            "tol" => self.tol = value.as_f64(name)?,
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("C".to_string(), self.c.into());
        params.insert("max_iter".to_string(), self.max_iter.into());
        params
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
