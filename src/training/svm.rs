//! Support vector classifier trained with SMO (Sequential Minimal Optimization)
//!
//! Two classes are handled by a single machine; three or more by one-vs-rest,
//! predicting the class whose machine returns the largest decision value.

use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{
    check_fit_input, check_n_features, invalid_value, unique_classes, unknown_param, Classifier, ParamSet,
    ParamValue,
};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error instead of allocating n² floats.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: 1.0 }
    }
}

impl KernelType {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match *self {
            KernelType::Linear => a.dot(&b),
            KernelType::RBF { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of sweeps over the training set
    pub max_iter: usize,
    /// Seed for the second-multiplier choice
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

impl SVMConfig {
    pub fn linear(c: f64) -> Self {
        Self {
            c,
            kernel: KernelType::Linear,
            ..Default::default()
        }
    }

    pub fn rbf(gamma: f64, c: f64) -> Self {
        Self {
            c,
            kernel: KernelType::RBF { gamma },
            ..Default::default()
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

/// A single binary machine (+1 vs -1)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    /// alpha_i * y_i per support vector
    coefficients: Array1<f64>,
    bias: f64,
}

impl BinarySVM {
    fn decision(&self, kernel: &KernelType, sample: ArrayView1<f64>) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.coefficients.iter())
            .map(|(sv, &coef)| coef * kernel.eval(sample, sv))
            .sum::<f64>()
            + self.bias
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    classes: Vec<i64>,
    /// One machine for binary problems, one per class otherwise
    machines: Vec<BinarySVM>,
    n_features: usize,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            machines: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    fn train_machine(&self, x: &Array2<f64>, kernel_matrix: &Array2<f64>, y: &Array1<f64>) -> BinarySVM {
        let (alphas, bias) = self.smo_train(kernel_matrix, y);

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut coefficients = Array1::zeros(support.len());
        for (k, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            coefficients[k] = alphas[idx] * y[idx];
        }

        BinarySVM {
            support_vectors,
            coefficients,
            bias,
        }
    }

    /// Simplified SMO: returns (alphas, bias)
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        if n <= 1 {
            return (alphas, bias);
        }

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            (0..n).map(|i| alphas[i] * y[i] * k[[i, idx]]).sum::<f64>() + bias
        };

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];

                // KKT violation
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, i]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, j]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[j, j]];

                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Kernel matrix, upper-triangle rows computed in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let kernel = self.config.kernel;

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| kernel.eval(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }
}

impl Classifier for SVMClassifier {
    fn name(&self) -> &str {
        "SVC"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;

        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PolyError::fit(
                self.name(),
                format!(
                    "{} samples exceed the kernel matrix limit of {}; subsample or use another classifier",
                    n, MAX_KERNEL_MATRIX_SAMPLES
                ),
            ));
        }
        if self.config.c <= 0.0 {
            return Err(PolyError::fit(self.name(), format!("C must be positive, got {}", self.config.c)));
        }

        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(PolyError::fit(self.name(), "at least 2 distinct classes are required"));
        }

        let kernel_matrix = self.compute_kernel_matrix(x);
        let positives: Vec<i64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let machines = positives
            .iter()
            .map(|&positive| {
                let y_binary = y.mapv(|v| if v.round() as i64 == positive { 1.0 } else { -1.0 });
                self.train_machine(x, &kernel_matrix, &y_binary)
            })
            .collect();

        self.classes = classes;
        self.machines = machines;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.machines.is_empty() {
            return Err(PolyError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;
        let kernel = &self.config.kernel;

        if self.classes.len() == 2 {
            let machine = &self.machines[0];
            return Ok(x
                .rows()
                .into_iter()
                .map(|row| {
                    if machine.decision(kernel, row) >= 0.0 {
                        self.classes[1] as f64
                    } else {
                        self.classes[0] as f64
                    }
                })
                .collect());
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut best_score = f64::NEG_INFINITY;
                let mut best_class = self.classes[0];
                for (machine, &class) in self.machines.iter().zip(self.classes.iter()) {
                    let score = machine.decision(kernel, row);
                    if score > best_score {
                        best_score = score;
                        best_class = class;
                    }
                }
                best_class as f64
            })
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "C" | "c" => self.config.c = value.as_f64(name)?,
            "kernel" => {
                self.config.kernel = match (value.as_str(name)?, self.config.kernel) {
                    ("linear", _) => KernelType::Linear,
                    ("rbf", KernelType::RBF { gamma }) => KernelType::RBF { gamma },
                    ("rbf", KernelType::Linear) => KernelType::default(),
                    _ => return Err(invalid_value(name, value, "expected linear or rbf")),
                }
            }
            "gamma" => {
                let gamma = value.as_f64(name)?;
                if gamma <= 0.0 {
                    return Err(invalid_value(name, value, "gamma must be positive"));
                }
                // gamma implies the RBF kernel
                self.config.kernel = KernelType::RBF { gamma };
            }
            "max_iter" => self.config.max_iter = value.as_usize(name)?,
            "tol" => self.config.tol = value.as_f64(name)?,
            "random_state" => self.config.random_state = Some(value.as_usize(name)? as u64),
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("C".to_string(), self.config.c.into());
        match self.config.kernel {
            KernelType::Linear => {
                params.insert("kernel".to_string(), "linear".into());
            }
            KernelType::RBF { gamma } => {
                params.insert("kernel".to_string(), "rbf".into());
                params.insert("gamma".to_string(), gamma.into());
            }
        }
        params
    }

    fn set_random_state(&mut self, seed: u64) {
        self.config.random_state = Some(seed);
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
