//! Decision tree classifier

use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::models::{
    check_fit_input, check_n_features, invalid_value, unique_classes, unknown_param, Classifier, ParamSet,
    ParamValue,
};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node predicting `classes[class_idx]`
    Leaf { class_idx: usize, n_samples: usize },
    /// Internal node: rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
}

/// Number of features examined per split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Parse `"sqrt"`, `"auto"`, `"log2"`, `"none"`, an integer or a fraction
    pub fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Text(s) => match s.to_lowercase().as_str() {
                "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "none" | "all" => Ok(MaxFeatures::All),
                _ => Err(invalid_value(name, value, "expected sqrt, auto, log2 or none")),
            },
            ParamValue::Int(n) if *n > 0 => Ok(MaxFeatures::Fixed(*n as usize)),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            _ => Err(invalid_value(name, value, "expected a positive count or a fraction in (0, 1]")),
        }
    }

    fn as_param(&self) -> ParamValue {
        match *self {
            MaxFeatures::Sqrt => "sqrt".into(),
            MaxFeatures::Log2 => "log2".into(),
            MaxFeatures::Fraction(f) => f.into(),
            MaxFeatures::Fixed(n) => n.into(),
            MaxFeatures::All => "none".into(),
        }
    }
}

/// CART classification tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth (None = grow until pure)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    /// Seed for per-split feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<i64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

struct BuildContext<'a> {
    x: &'a Array2<f64>,
    /// Class index of every training row
    y_idx: &'a [usize],
    n_classes: usize,
    max_features: usize,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
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

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Depth of the fitted tree (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    fn build_tree(
        &self,
        ctx: &BuildContext<'_>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = class_histogram(ctx, &indices);
        let parent_impurity = impurity(self.criterion, &counts, n_samples);
        let leaf = TreeNode::Leaf {
            class_idx: majority(&counts),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || parent_impurity <= f64::EPSILON;
        if should_stop {
            return leaf;
        }

        let Some((feature_idx, threshold, _)) =
            self.find_best_split(ctx, &indices, &counts, parent_impurity, rng)
        else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| ctx.x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build_tree(ctx, left_indices, depth + 1, rng));
        let right = Box::new(self.build_tree(ctx, right_indices, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    /// Best (feature, threshold, weighted child impurity).
    ///
    /// Features are examined `max_features` at a time in random order; the
    /// search continues past the first batch only if it found no split that
    /// lowers the impurity.
    fn find_best_split(
        &self,
        ctx: &BuildContext<'_>,
        indices: &[usize],
        parent_counts: &[usize],
        parent_impurity: f64,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Option<(usize, f64, f64)> {
        let n_features = ctx.x.ncols();
        let mut order: Vec<usize> = (0..n_features).collect();
        if ctx.max_features < n_features {
            order.shuffle(rng);
        }

        for batch in order.chunks(ctx.max_features) {
            // Each feature independently finds its best threshold
            let best = batch
                .par_iter()
                .filter_map(|&f| self.best_threshold(ctx, indices, parent_counts, f).map(|(t, imp)| (f, t, imp)))
                .collect::<Vec<_>>()
                .into_iter()
                .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

            if let Some(split) = best {
                if split.2 < parent_impurity - 1e-12 {
                    return Some(split);
                }
            }
        }
        None
    }

    fn best_threshold(
        &self,
        ctx: &BuildContext<'_>,
        indices: &[usize],
        parent_counts: &[usize],
        feature_idx: usize,
    ) -> Option<(f64, f64)> {
        let n = indices.len();
        let mut sorted: Vec<(f64, usize)> = indices.iter().map(|&i| (ctx.x[[i, feature_idx]], ctx.y_idx[i])).collect();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut left = vec![0usize; ctx.n_classes];
        let mut right = parent_counts.to_vec();
        let mut best: Option<(f64, f64)> = None;

        for pos in 0..n - 1 {
            let (value, class) = sorted[pos];
            left[class] += 1;
            right[class] -= 1;

            let next_value = sorted[pos + 1].0;
            if next_value <= value {
                continue;
            }
            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let weighted = (n_left as f64 * impurity(self.criterion, &left, n_left)
                + n_right as f64 * impurity(self.criterion, &right, n_right))
                / n as f64;
            if best.map_or(true, |(_, b)| weighted < b) {
                best = Some(((value + next_value) / 2.0, weighted));
            }
        }
        best
    }

    fn predict_row(&self, root: &TreeNode, x: &Array2<f64>, row: usize) -> f64 {
        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { class_idx, .. } => return self.classes[*class_idx] as f64,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if x[[row, *feature_idx]] <= *threshold { left } else { right };
                }
            }
        }
    }
}

impl Classifier for DecisionTree {
    fn name(&self) -> &str {
        "DecisionTreeClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(self.name(), x, y)?;
        let n_features = x.ncols();

        self.classes = unique_classes(y);
        self.n_features = n_features;

        let y_idx: Vec<usize> = y
            .iter()
            .map(|&v| self.classes.binary_search(&(v.round() as i64)).unwrap_or(0))
            .collect();

        let ctx = BuildContext {
            x,
            y_idx: &y_idx,
            n_classes: self.classes.len(),
            max_features: self.max_features.resolve(n_features),
        };

        let mut rng = match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.root = Some(self.build_tree(&ctx, (0..x.nrows()).collect(), 0, &mut rng));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PolyError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok((0..x.nrows()).map(|row| self.predict_row(root, x, row)).collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = value.as_optional_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "random_state" => self.random_state = Some(value.as_usize(name)? as u64),
            "criterion" => {
                self.criterion = match value.as_str(name)? {
                    "gini" => Criterion::Gini,
                    "entropy" => Criterion::Entropy,
                    _ => return Err(invalid_value(name, value, "expected gini or entropy")),
                }
            }
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert(
            "max_depth".to_string(),
            self.max_depth.map_or_else(|| "none".into(), ParamValue::from),
        );
        params.insert("max_features".to_string(), self.max_features.as_param());
        params.insert("min_samples_split".to_string(), self.min_samples_split.into());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.into());
        params
    }

    fn set_random_state(&mut self, seed: u64) {
        self.random_state = Some(seed);
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

fn class_histogram(ctx: &BuildContext<'_>, indices: &[usize]) -> Vec<usize> {
    let mut counts = vec![0usize; ctx.n_classes];
    for &i in indices {
        counts[ctx.y_idx[i]] += 1;
    }
    counts
}

fn impurity(criterion: Criterion, counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    match criterion {
        Criterion::Gini => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
        Criterion::Entropy => -counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                p * p.ln()
            })
            .sum::<f64>(),
    }
}

/// Most frequent class index, ties to the smallest
fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0],
            [1.5, 1.8],
            [2.0, 2.2],
            [1.2, 2.1],
            [5.0, 8.0],
            [6.0, 9.0],
            [5.5, 8.5],
            [6.5, 9.5],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_decision_tree_classifier() {
        let (x, y) = create_classification_data();
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(16, |i| (i % 2) as f64);
        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_multiclass_tree() {
        let x = array![[0.0], [0.1], [1.0], [1.1], [2.0], [2.1]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_sqrt_features_still_finds_split() {
        // Only the last of four features carries signal
        let x = Array2::from_shape_fn((20, 4), |(i, j)| if j == 3 { (i / 10) as f64 } else { 1.0 });
        let y = Array1::from_shape_fn(20, |i| (i / 10) as f64);
        let mut tree = DecisionTree::new().with_max_features(MaxFeatures::Sqrt).with_random_state(3);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_max_features_param() {
        let mut tree = DecisionTree::new();
        tree.set_param("max_features", &"auto".into()).unwrap();
        assert_eq!(tree.max_features, MaxFeatures::Sqrt);
        assert_eq!(MaxFeatures::Sqrt.resolve(4), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        tree.set_param("max_depth", &"None".into()).unwrap();
        assert_eq!(tree.max_depth, None);
    }

    #[test]
    fn test_impurity() {
        assert!((impurity(Criterion::Gini, &[5, 5], 10) - 0.5).abs() < 1e-12);
        assert_eq!(impurity(Criterion::Gini, &[10, 0], 10), 0.0);
        assert!((impurity(Criterion::Entropy, &[5, 5], 10) - 2f64.ln()).abs() < 1e-12);
    }
}
