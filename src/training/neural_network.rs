//! Multi-Layer Perceptron classifier
//!
//! A feedforward network with `n_deep` hidden layers of `n_hidden` units,
//! a softmax output and cross-entropy loss, trained by mini-batch SGD with
//! momentum. An L1 penalty and early stopping on a held-out slice of the
//! training rows keep it from overfitting small benchmark datasets.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{
    check_fit_input, check_n_features, invalid_value, unique_classes, unknown_param, Classifier, ParamSet,
    ParamValue,
};
use crate::error::{PolyError, Result};

/// Hidden-layer activation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    ReLU,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(f64::tanh),
        }
    }

    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => {
                let sig = self.apply(z);
                &sig * &(1.0 - &sig)
            }
            Activation::Tanh => {
                let t = z.mapv(f64::tanh);
                1.0 - &t * &t
            }
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Units per hidden layer
    pub n_hidden: usize,
    /// Number of hidden layers
    pub n_deep: usize,
    /// L1 penalty on the weights
    pub l1_norm: f64,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    pub activation: Activation,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub momentum: f64,
    /// Fraction of the training rows held out for early stopping
    pub validation_split: f64,
    pub random_state: Option<u64>,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            n_hidden: 100,
            n_deep: 2,
            l1_norm: 0.0,
            patience: 10,
            activation: Activation::ReLU,
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 32,
            momentum: 0.9,
            validation_split: 0.1,
            random_state: Some(42),
        }
    }
}

impl MLPConfig {
    pub fn with_layers(mut self, n_hidden: usize, n_deep: usize) -> Self {
        self.n_hidden = n_hidden;
        self.n_deep = n_deep;
        self
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    classes: Vec<i64>,
    /// Epochs actually run by the last fit
    epochs_run: usize,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            classes: Vec::new(),
            epochs_run: 0,
        }
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    /// Softmax class probabilities, columns ordered by class code
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.weights.is_empty() {
            return Err(PolyError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;
        let (mut activations, _) = self.forward(x);
        activations.pop().ok_or(PolyError::ModelNotFitted)
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(std::iter::repeat(self.config.n_hidden).take(self.config.n_deep));
        layer_sizes.push(self.classes.len());

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);

            // Xavier/Glorot initialization
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen::<f64>() * 2.0 * scale - scale);

            self.weights.push(weights);
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Layer activations (input first, softmax output last) and hidden pre-activations
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len() - 1;

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                self.config.activation.apply(&z)
            } else {
                softmax(&z)
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y_onehot.nrows() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // Cross-entropy gradient with softmax
        let mut delta = (&activations[activations.len() - 1] - y_onehot) / n;

        for i in (0..self.weights.len()).rev() {
            let mut grad_w = activations[i].t().dot(&delta);
            if self.config.l1_norm > 0.0 {
                grad_w = grad_w + self.weights[i].mapv(f64::signum) * self.config.l1_norm;
            }
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.config.activation.derivative(&z_values[i - 1]);
            }
        }

        gradients.reverse();
        gradients
    }

    fn to_onehot(&self, y: &Array1<f64>) -> Array2<f64> {
        let mut onehot = Array2::zeros((y.len(), self.classes.len()));
        for (i, &label) in y.iter().enumerate() {
            let class_idx = self.classes.binary_search(&(label.round() as i64)).unwrap_or(0);
            onehot[[i, class_idx]] = 1.0;
        }
        onehot
    }

    fn cross_entropy(&self, x: &Array2<f64>, y_onehot: &Array2<f64>) -> f64 {
        let (activations, _) = self.forward(x);
        let proba = &activations[activations.len() - 1];
        let loss: f64 = proba
            .iter()
            .zip(y_onehot.iter())
            .filter(|(_, &t)| t > 0.0)
            .map(|(&p, _)| -(p.max(1e-15)).ln())
            .sum();
        loss / x.nrows().max(1) as f64
    }
}

impl Classifier for MLPClassifier {
    fn name(&self) -> &str {
        "MLPClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        if self.config.n_hidden == 0 || self.config.batch_size == 0 {
            return Err(PolyError::fit(self.name(), "n_hidden and batch_size must be positive"));
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = unique_classes(y);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.initialize_weights(&mut rng);

        // Random held-out slice for early stopping
        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut rng);
        let val_size = ((n_samples as f64 * self.config.validation_split) as usize).min(n_samples - 1);
        let (val_idx, train_idx) = order.split_at(val_size);

        let y_onehot = self.to_onehot(y);
        let x_train = x.select(Axis(0), train_idx);
        let y_train = y_onehot.select(Axis(0), train_idx);
        let x_val = x.select(Axis(0), val_idx);
        let y_val = y_onehot.select(Axis(0), val_idx);
        let train_size = train_idx.len();

        let mut velocities_w: Vec<Array2<f64>> = self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let mut velocities_b: Vec<Array1<f64>> = self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let mut best_val_loss = f64::INFINITY;
        let mut best_state: Option<(Vec<Array2<f64>>, Vec<Array1<f64>>)> = None;
        let mut patience_counter = 0;
        let mut epochs_run = 0;

        for _epoch in 0..self.config.max_epochs {
            epochs_run += 1;
            let mut indices: Vec<usize> = (0..train_size).collect();
            indices.shuffle(&mut rng);

            for batch_indices in indices.chunks(self.config.batch_size) {
                let x_batch = x_train.select(Axis(0), batch_indices);
                let y_batch = y_train.select(Axis(0), batch_indices);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum - &grad_b * self.config.learning_rate;
                    self.weights[i] += &velocities_w[i];
                    self.biases[i] += &velocities_b[i];
                }
            }

            if val_size > 0 {
                let val_loss = self.cross_entropy(&x_val, &y_val);
                if val_loss < best_val_loss {
                    best_val_loss = val_loss;
                    best_state = Some((self.weights.clone(), self.biases.clone()));
                    patience_counter = 0;
                } else {
                    patience_counter += 1;
                    if patience_counter >= self.config.patience {
                        break;
                    }
                }
            }
        }

        if let Some((weights, biases)) = best_state {
            self.weights = weights;
            self.biases = biases;
        }
        self.epochs_run = epochs_run;
        debug!(
            "MLP stopped after {} epochs (best validation loss {:.4})",
            epochs_run, best_val_loss
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;

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
            "n_hidden" => self.config.n_hidden = value.as_usize(name)?,
            "n_deep" => self.config.n_deep = value.as_usize(name)?,
            "l1_norm" => self.config.l1_norm = value.as_f64(name)?,
            "patience" => self.config.patience = value.as_usize(name)?,
            "learning_rate" => self.config.learning_rate = value.as_f64(name)?,
            "max_epochs" => self.config.max_epochs = value.as_usize(name)?,
            "batch_size" => self.config.batch_size = value.as_usize(name)?,
            "random_state" => self.config.random_state = Some(value.as_usize(name)? as u64),
            "activation" => {
                self.config.activation = match value.as_str(name)? {
                    "relu" => Activation::ReLU,
                    "sigmoid" | "logistic" => Activation::Sigmoid,
                    "tanh" => Activation::Tanh,
                    _ => return Err(invalid_value(name, value, "expected relu, sigmoid or tanh")),
                }
            }
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_hidden".to_string(), self.config.n_hidden.into());
        params.insert("n_deep".to_string(), self.config.n_deep.into());
        params.insert("l1_norm".to_string(), self.config.l1_norm.into());
        params.insert("patience".to_string(), self.config.patience.into());
        params
    }

    fn set_random_state(&mut self, seed: u64) {
        self.config.random_state = Some(seed);
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

/// Row-wise softmax
fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| (i as f64) * 0.05 - 5.0).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 0.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_mlp_classifier() {
        let (x, y) = create_classification_data();
        let config = MLPConfig::default().with_layers(16, 2).with_max_epochs(100);

        let mut mlp = MLPClassifier::new(config);
        mlp.fit(&x, &y).unwrap();

        let predictions = mlp.predict(&x).unwrap();
        let correct = y.iter().zip(predictions.iter()).filter(|(a, b)| a == b).count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.7, "Accuracy ({}) should be above 70%", accuracy);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = create_classification_data();
        let mut mlp = MLPClassifier::new(MLPConfig::default().with_layers(8, 1).with_max_epochs(5));
        mlp.fit(&x, &y).unwrap();
        for row in mlp.predict_proba(&x).unwrap().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_early_stopping_respects_patience() {
        let (x, y) = create_classification_data();
        let mut config = MLPConfig::default().with_layers(8, 2).with_max_epochs(500);
        config.patience = 1;
        let mut mlp = MLPClassifier::new(config);
        mlp.fit(&x, &y).unwrap();
        assert!(mlp.epochs_run() < 500);
    }

    #[test]
    fn test_grid_params() {
        let mut mlp = MLPClassifier::new(MLPConfig::default());
        mlp.set_param("n_hidden", &ParamValue::Int(50)).unwrap();
        mlp.set_param("n_deep", &ParamValue::Int(3)).unwrap();
        mlp.set_param("l1_norm", &ParamValue::Float(0.001)).unwrap();
        mlp.set_param("patience", &ParamValue::Int(50)).unwrap();
        assert_eq!(mlp.config().n_hidden, 50);
        assert_eq!(mlp.config().n_deep, 3);
        assert_eq!(mlp.params()["l1_norm"], ParamValue::Float(0.001));
        assert!(mlp.set_param("dropout", &ParamValue::Float(0.5)).is_err());
    }

    #[test]
    fn test_activation_functions() {
        let z = Array2::from_shape_vec((2, 3), vec![-1.0, 0.0, 1.0, -2.0, 0.5, 2.0]).unwrap();
        let relu = Activation::ReLU.apply(&z);
        assert_eq!(relu[[0, 0]], 0.0);
        assert_eq!(relu[[0, 2]], 1.0);
        let sigmoid = Activation::Sigmoid.apply(&z);
        assert!((sigmoid[[0, 1]] - 0.5).abs() < 0.001);
    }
}
