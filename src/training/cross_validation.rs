//! Stratified cross-validation
//!
//! [`StratifiedKFold`] assigns every sample to exactly one test fold while
//! keeping class proportions per fold as even as the counts allow.
//! [`Partitioner`] binds those assignments to a dataset and materializes
//! (optionally standardized) train/test partitions fold by fold.

use crate::dataset::{class_counts, validate_labels, Dataset};
use crate::error::{PolyError, Result};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A single train/test split expressed as row indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-Fold splitter.
///
/// Classes are visited in ascending label order and each class's rows in
/// ascending row order (or a seeded shuffle of it); the i-th row of a class
/// lands in test fold `i % n_splits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedKFold {
    n_splits: usize,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            random_state: None,
        }
    }

    /// Shuffle rows within each class with a fixed seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Check the fold count against the class distribution of `y`
    pub fn validate(&self, y: &Array1<f64>) -> Result<()> {
        if self.n_splits < 2 {
            return Err(PolyError::config(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }

        let counts = class_counts(y);
        if let Some((&class, &count)) = counts.iter().min_by_key(|&(_, &c)| c) {
            if self.n_splits > count {
                return Err(PolyError::config(format!(
                    "n_splits={} cannot be greater than the number of members in each class; \
                     class {} has only {} samples",
                    self.n_splits, class, count
                )));
            }
        } else {
            return Err(PolyError::config("cannot split an empty label vector"));
        }
        Ok(())
    }

    /// Generate train/test splits for `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        validate_labels(y)?;
        self.validate(y)?;

        // Group samples by class; BTreeMap keeps class order deterministic
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if let Some(seed) = self.random_state {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        let mut test_fold = vec![0usize; y.len()];
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                test_fold[idx] = i % self.n_splits;
            }
        }

        let splits = (0..self.n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| test_fold[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Rows of one side of a fold
#[derive(Debug, Clone)]
pub struct Split {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub indices: Vec<usize>,
}

impl Split {
    fn select(dataset: &Dataset, indices: &[usize]) -> Self {
        Self {
            features: dataset.features().select(Axis(0), indices),
            labels: dataset.labels().select(Axis(0), indices),
            indices: indices.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// One train/test partition of the dataset
#[derive(Debug, Clone)]
pub struct Fold {
    pub index: usize,
    pub train: Split,
    pub test: Split,
}

/// Stratified fold sequence over a fixed dataset.
///
/// Fold assignments are computed once in [`Partitioner::new`]; every call to
/// [`Partitioner::folds`] returns a fresh iterator starting from the first
/// fold, so each consumer gets its own complete pass.
#[derive(Debug, Clone)]
pub struct Partitioner {
    dataset: Dataset,
    splits: Vec<CVSplit>,
    standardize: bool,
}

impl Partitioner {
    /// Build stratified folds for `dataset`.
    ///
    /// Fails with a configuration error when `n_folds < 2` or when the
    /// smallest class has fewer samples than `n_folds`.
    pub fn new(dataset: Dataset, n_folds: usize, standardize: bool) -> Result<Self> {
        Self::with_splitter(dataset, StratifiedKFold::new(n_folds), standardize)
    }

    pub fn with_splitter(dataset: Dataset, splitter: StratifiedKFold, standardize: bool) -> Result<Self> {
        let splits = splitter.split(dataset.labels())?;
        debug!(
            n_folds = splits.len(),
            n_samples = dataset.n_samples(),
            standardize,
            "Computed stratified folds"
        );

        Ok(Self {
            dataset,
            splits,
            standardize,
        })
    }

    pub fn n_folds(&self) -> usize {
        self.splits.len()
    }

    pub fn standardize(&self) -> bool {
        self.standardize
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Index-level splits, in fold order
    pub fn splits(&self) -> &[CVSplit] {
        &self.splits
    }

    /// Lazy pass over all folds, starting at the first
    pub fn folds(&self) -> Folds<'_> {
        Folds {
            partitioner: self,
            cursor: 0,
        }
    }

    /// All folds, materialized in order
    pub fn collect_folds(&self) -> Result<Vec<Fold>> {
        self.folds().collect()
    }

    /// Materialize fold `index`
    pub fn fold(&self, index: usize) -> Result<Fold> {
        let split = self.splits.get(index).ok_or_else(|| {
            PolyError::config(format!("fold {} out of range (n_folds = {})", index, self.splits.len()))
        })?;

        let mut train = Split::select(&self.dataset, &split.train_indices);
        let mut test = Split::select(&self.dataset, &split.test_indices);

        if self.standardize {
            let mut scaler = StandardScaler::new();
            train.features = scaler.fit_transform(&train.features)?;
            test.features = scaler.transform(&test.features)?;
        }

        Ok(Fold { index, train, test })
    }
}

/// Iterator over the folds of a [`Partitioner`]; yields exactly `n_folds` items
pub struct Folds<'a> {
    partitioner: &'a Partitioner,
    cursor: usize,
}

impl Iterator for Folds<'_> {
    type Item = Result<Fold>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.partitioner.n_folds() {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        info!("Working on fold {}", index + 1);
        Some(self.partitioner.fold(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.partitioner.n_folds() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Folds<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_dataset() -> Dataset {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // 5 samples of class 0
            1.0, 1.0, 1.0, 1.0, 1.0, // 5 samples of class 1
        ]);

        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        // Each fold holds one sample from each class
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let classes: Vec<f64> = split.test_indices.iter().map(|&i| y[i]).collect();
            assert!(classes.contains(&0.0) && classes.contains(&1.0));
        }
    }

    #[test]
    fn test_stratified_is_deterministic() {
        let y = array![1.0, 0.0, 2.0, 1.0, 0.0, 2.0, 1.0, 0.0, 2.0];
        let a = StratifiedKFold::new(3).split(&y).unwrap();
        let b = StratifiedKFold::new(3).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeded_shuffle_still_exhaustive() {
        let y = Array1::from_shape_fn(30, |i| (i % 3) as f64);
        let splits = StratifiedKFold::new(5).with_random_state(7).split(&y).unwrap();
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_many_folds_for_minority_class() {
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        let err = StratifiedKFold::new(3).split(&y).unwrap_err();
        assert!(matches!(err, PolyError::ConfigurationError(_)));
    }

    #[test]
    fn test_single_fold_rejected() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        assert!(matches!(
            StratifiedKFold::new(1).split(&y),
            Err(PolyError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_folds_restart_from_first() {
        let partitioner = Partitioner::new(toy_dataset(), 3, false).unwrap();
        let first: Vec<usize> = partitioner.folds().map(|f| f.unwrap().index).collect();
        let second: Vec<usize> = partitioner.folds().map(|f| f.unwrap().index).collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(first, second);
        assert_eq!(partitioner.folds().len(), 3);
    }

    #[test]
    fn test_fold_partitions_are_disjoint_and_exhaustive() {
        let partitioner = Partitioner::new(toy_dataset(), 3, false).unwrap();
        for fold in partitioner.collect_folds().unwrap() {
            assert_eq!(fold.train.len() + fold.test.len(), 12);
            assert!(fold.test.indices.iter().all(|i| !fold.train.indices.contains(i)));
            assert_eq!(fold.train.features.nrows(), fold.train.labels.len());
        }
    }

    #[test]
    fn test_unscaled_fold_copies_rows() {
        let partitioner = Partitioner::new(toy_dataset(), 2, false).unwrap();
        let fold = partitioner.fold(0).unwrap();
        let row = fold.test.indices[0];
        assert_eq!(fold.test.features.row(0), partitioner.dataset().features().row(row));
    }

    #[test]
    fn test_standardized_train_statistics() {
        let partitioner = Partitioner::new(toy_dataset(), 3, true).unwrap();
        for fold in partitioner.folds() {
            let fold = fold.unwrap();
            for col in fold.train.features.axis_iter(Axis(1)) {
                let mean = col.mean().unwrap();
                let var = col.mapv(|v| (v - mean).powi(2)).mean().unwrap();
                assert!(mean.abs() < 1e-9);
                assert!((var - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_fold_out_of_range() {
        let partitioner = Partitioner::new(toy_dataset(), 2, false).unwrap();
        assert!(partitioner.fold(2).is_err());
    }
}
