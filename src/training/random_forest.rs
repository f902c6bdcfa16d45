//! Random Forest classifier

use super::decision_tree::{Criterion, DecisionTree, MaxFeatures};
use super::models::{check_fit_input, check_n_features, unique_classes, unknown_param, Classifier, ParamSet, ParamValue};
use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bagged ensemble of decision trees with per-split feature sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<i64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "RandomForestClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        if self.n_estimators == 0 {
            return Err(PolyError::fit(self.name(), "n_estimators must be at least 1"));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let base_seed = self.random_state.unwrap_or(42);

        // Build trees in parallel
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let (x_sample, y_sample) = if self.bootstrap {
                    let sample_indices: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    (
                        x.select(ndarray::Axis(0), &sample_indices),
                        y.select(ndarray::Axis(0), &sample_indices),
                    )
                } else {
                    (x.clone(), y.clone())
                };

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(self.max_features)
                    .with_criterion(self.criterion)
                    .with_random_state(seed);
                tree.max_depth = self.max_depth;

                tree.fit(&x_sample, &y_sample)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.classes = unique_classes(y);
        self.n_features = n_features;
        self.trees = trees;
        Ok(())
    }

    /// Majority vote over the trees; ties go to the smallest class code
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PolyError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let tree_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        Ok((0..x.nrows())
            .map(|row| {
                let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
                for preds in &tree_predictions {
                    *votes.entry(preds[row].round() as i64).or_insert(0) += 1;
                }
                let mut best: Option<(i64, usize)> = None;
                for (class, count) in votes {
                    if best.map_or(true, |(_, c)| count > c) {
                        best = Some((class, count));
                    }
                }
                best.map(|(class, _)| class as f64)
                    .unwrap_or_else(|| self.classes.first().copied().unwrap_or(0) as f64)
            })
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "max_depth" => self.max_depth = value.as_optional_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "bootstrap" => {
                self.bootstrap = match value {
                    ParamValue::Bool(b) => *b,
                    _ => return Err(super::models::invalid_value(name, value, "expected true or false")),
                }
            }
            "random_state" => self.random_state = Some(value.as_usize(name)? as u64),
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_estimators".to_string(), self.n_estimators.into());
        params.insert(
            "max_depth".to_string(),
            self.max_depth.map_or_else(|| "none".into(), ParamValue::from),
        );
        params
    }

    fn set_random_state(&mut self, seed: u64) {
        self.random_state = Some(seed);
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn create_classification_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        let x = Array2::from_shape_fn((n, 3), |(i, _)| y[i] * 3.0 + noise.sample(&mut rng));
        (x, y)
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = create_classification_data(60);
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let correct = y.iter().zip(predictions.iter()).filter(|(a, b)| a == b).count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.9, "Accuracy {} should be > 0.9", accuracy);
        assert_eq!(rf.n_trees(), 10);
    }

    #[test]
    fn test_random_forest_is_reproducible() {
        let (x, y) = create_classification_data(40);
        let mut a = RandomForest::new(5).with_random_state(1);
        let mut b = RandomForest::new(5).with_random_state(1);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_n_estimators_param() {
        let mut rf = RandomForest::new(10);
        rf.set_param("n_estimators", &ParamValue::Int(7)).unwrap();
        assert_eq!(rf.params()["n_estimators"], ParamValue::Int(7));
        assert!(rf.set_param("learning_rate", &ParamValue::Float(0.1)).is_err());
    }
}
