//! Cross-validated evaluation of a classifier roster

use super::roster::{validate_roster, ClassifierSpec};
use crate::dataset::Dataset;
use crate::error::{PolyError, Result};
use crate::optimizer::{GridSearch, GridSearchConfig};
use crate::training::{format_params, Classifier, ClassificationReport, Partitioner, Scorer, StratifiedKFold};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Outer stratified folds
    pub n_folds: usize,
    /// Standardize features per fold (fit on train only)
    pub standardize: bool,
    /// Grid-search workers (None = three quarters of the cores)
    pub n_jobs: Option<usize>,
    /// Grid-search internal folds (None = `n_folds`)
    pub inner_folds: Option<usize>,
    /// Seed for fold shuffling and stochastic classifiers
    pub random_state: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            standardize: true,
            n_jobs: None,
            inner_folds: None,
            random_state: None,
        }
    }
}

impl EvaluatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_inner_folds(mut self, inner_folds: usize) -> Self {
        self.inner_folds = Some(inner_folds);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Internal fold count used by grid search
    pub fn effective_inner_folds(&self) -> usize {
        self.inner_folds.unwrap_or(self.n_folds)
    }
}

/// Per-fold held-out scores by classifier, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    entries: Vec<(String, Vec<f64>)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a classifier's scores; a name can only be stored once
    pub fn insert(&mut self, name: &str, scores: Vec<f64>) -> Result<()> {
        if self.get(name).is_some() {
            return Err(PolyError::config(format!("results for '{}' already recorded", name)));
        }
        self.entries.push((name.to_string(), scores));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, scores)| scores.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold count shared by every entry (None when empty)
    pub fn n_folds(&self) -> Option<usize> {
        self.entries.first().map(|(_, s)| s.len())
    }
}

/// Runs every roster entry through the same stratified folds
pub struct Evaluator {
    config: EvaluatorConfig,
    roster: Vec<ClassifierSpec>,
    partitioner: Partitioner,
    scorer: Scorer,
    results: ResultSet,
    timings: Vec<(String, Duration)>,
}

impl Evaluator {
    /// Validates the roster, computes the folds and picks the scorer; every
    /// configuration problem surfaces here, before any classifier is fit.
    pub fn new(dataset: Dataset, config: EvaluatorConfig, roster: Vec<ClassifierSpec>) -> Result<Self> {
        validate_roster(&roster)?;
        if let Some(inner) = config.inner_folds {
            if inner < 2 {
                return Err(PolyError::config(format!("inner_folds must be at least 2, got {}", inner)));
            }
        }

        let scorer = Scorer::for_labels(dataset.labels())?;

        let mut splitter = StratifiedKFold::new(config.n_folds);
        if let Some(seed) = config.random_state {
            splitter = splitter.with_random_state(seed);
        }
        let partitioner = Partitioner::with_splitter(dataset, splitter, config.standardize)?;

        info!(
            "Evaluating {} classifiers on {} samples x {} features, {} folds, scoring with {}",
            roster.len(),
            partitioner.dataset().n_samples(),
            partitioner.dataset().n_features(),
            partitioner.n_folds(),
            scorer
        );

        Ok(Self {
            config,
            roster,
            partitioner,
            scorer,
            results: ResultSet::new(),
            timings: Vec::new(),
        })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn roster(&self) -> &[ClassifierSpec] {
        &self.roster
    }

    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    pub fn scorer(&self) -> Scorer {
        self.scorer
    }

    /// Results recorded so far (partial after a failed run)
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Wall time per completed classifier
    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    /// The classifier evaluated for `spec`: wrapped in a grid search when the
    /// spec has a grid, the configured base classifier otherwise
    pub fn build_classifier(&self, spec: &ClassifierSpec) -> Result<Box<dyn Classifier>> {
        let base = spec.build(self.config.random_state)?;
        let Some(grid) = spec.search_grid() else {
            return Ok(base);
        };

        let search_config = GridSearchConfig::new()
            .with_n_folds(self.config.effective_inner_folds())
            .with_n_jobs(self.config.n_jobs)
            .with_random_state(self.config.random_state);
        Ok(Box::new(GridSearch::new(base, grid.clone(), search_config)?))
    }

    /// Held-out score of `spec` on every fold, in fold order
    pub fn evaluate(&self, spec: &ClassifierSpec) -> Result<Vec<f64>> {
        let template = self.build_classifier(spec)?;
        let mut scores = Vec::with_capacity(self.partitioner.n_folds());

        for fold in self.partitioner.folds() {
            let fold = fold?;
            let mut clf = template.box_clone();
            clf.fit(&fold.train.features, &fold.train.labels)?;

            let train_pred = clf.predict(&fold.train.features)?;
            let test_pred = clf.predict(&fold.test.features)?;
            let train_score = self.scorer.score(&fold.train.labels, &train_pred)?;
            let test_score = self.scorer.score(&fold.test.labels, &test_pred)?;

            info!("train/test F1: {:.1}/{:.1}", train_score * 100.0, test_score * 100.0);
            let report = ClassificationReport::compute(&fold.test.labels, &test_pred);
            debug!(
                "fold {} [{}]: accuracy {:.3}, precision {:.3}, recall {:.3}",
                fold.index + 1,
                format_params(&clf.params()),
                report.accuracy,
                report.precision,
                report.recall
            );

            scores.push(test_score);
        }

        Ok(scores)
    }

    /// Evaluate the whole roster in order.
    ///
    /// Stops at the first error; classifiers finished before it stay
    /// available through [`Evaluator::results`].
    pub fn run(&mut self) -> Result<&ResultSet> {
        self.results = ResultSet::new();
        self.timings.clear();

        for idx in 0..self.roster.len() {
            let spec = &self.roster[idx];
            info!("Classifier: {}", spec.name);
            let start = Instant::now();

            let scores = self.evaluate(spec)?;
            let name = spec.name.clone();
            let elapsed = start.elapsed();

            let mean = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
            info!("{}: mean {} {:.3} in {:.2?}", name, self.scorer, mean, elapsed);

            self.results.insert(&name, scores)?;
            self.timings.push((name, elapsed));
        }

        Ok(&self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::roster::ClassifierKind;
    use crate::optimizer::ParamGrid;
    use ndarray::{Array1, Array2};

    fn toy_dataset(n_classes: usize) -> Dataset {
        let n = 30;
        let y = Array1::from_shape_fn(n, |i| (i % n_classes) as f64);
        let x = Array2::from_shape_fn((n, 2), |(i, j)| y[i] * 4.0 + ((i * 7 + j * 3) % 5) as f64 * 0.1);
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn test_result_set_rejects_duplicates() {
        let mut results = ResultSet::new();
        results.insert("a", vec![0.5, 0.6]).unwrap();
        assert!(results.insert("a", vec![0.1, 0.2]).is_err());
        assert_eq!(results.n_folds(), Some(2));
        assert_eq!(results.names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_no_grid_fits_directly() {
        let roster = vec![
            ClassifierSpec::new("NB", ClassifierKind::GaussianNaiveBayes),
            ClassifierSpec::new("kNN", ClassifierKind::KNearestNeighbors)
                .with_grid(ParamGrid::new().with("n_neighbors", [1i64, 3])),
        ];
        let evaluator = Evaluator::new(toy_dataset(2), EvaluatorConfig::new().with_n_folds(3), roster).unwrap();

        let direct = evaluator.build_classifier(&evaluator.roster()[0]).unwrap();
        assert_eq!(direct.name(), "GaussianNB");
        let searched = evaluator.build_classifier(&evaluator.roster()[1]).unwrap();
        assert!(searched.name().starts_with("GridSearchCV"));
    }

    #[test]
    fn test_run_records_every_classifier() {
        let roster = vec![
            ClassifierSpec::new("NB", ClassifierKind::GaussianNaiveBayes),
            ClassifierSpec::new("kNN", ClassifierKind::KNearestNeighbors)
                .with_grid(ParamGrid::new().with("n_neighbors", [1i64, 3])),
        ];
        let config = EvaluatorConfig::new().with_n_folds(3).with_n_jobs(2);
        let mut evaluator = Evaluator::new(toy_dataset(3), config, roster).unwrap();
        assert_eq!(evaluator.scorer(), Scorer::WeightedF1);

        let results = evaluator.run().unwrap();
        assert_eq!(results.len(), 2);
        for (_, scores) in results.iter() {
            assert_eq!(scores.len(), 3);
            assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        }
        assert_eq!(evaluator.timings().len(), 2);
    }

    #[test]
    fn test_failure_keeps_partial_results() {
        let roster = vec![
            ClassifierSpec::new("NB", ClassifierKind::GaussianNaiveBayes),
            // more neighbors than any training partition holds
            ClassifierSpec::new("kNN", ClassifierKind::KNearestNeighbors).with_param("n_neighbors", 100i64),
        ];
        let mut evaluator = Evaluator::new(toy_dataset(2), EvaluatorConfig::new().with_n_folds(3), roster).unwrap();
        assert!(matches!(evaluator.run(), Err(PolyError::FitError { .. })));
        assert_eq!(evaluator.results().len(), 1);
        assert!(evaluator.results().get("NB").is_some());
    }

    #[test]
    fn test_duplicate_roster_names() {
        let roster = vec![
            ClassifierSpec::new("X", ClassifierKind::GaussianNaiveBayes),
            ClassifierSpec::new("X", ClassifierKind::GaussianNaiveBayes),
        ];
        let result = Evaluator::new(toy_dataset(2), EvaluatorConfig::new(), roster);
        assert!(matches!(result, Err(PolyError::ConfigurationError(_))));
    }

    #[test]
    fn test_full_range_seed() {
        let roster = vec![
            ClassifierSpec::new("Tree", ClassifierKind::DecisionTree),
            ClassifierSpec::new("Forest", ClassifierKind::RandomForest)
                .with_grid(ParamGrid::new().with("n_estimators", [3i64, 4])),
            ClassifierSpec::new("MLP", ClassifierKind::MultilayerPerceptron)
                .with_param("n_hidden", 4i64)
                .with_param("max_epochs", 5i64),
        ];
        let config = EvaluatorConfig::new().with_n_folds(3).with_n_jobs(2).with_random_state(u64::MAX);
        let mut evaluator = Evaluator::new(toy_dataset(2), config, roster).unwrap();

        let results = evaluator.run().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, scores)| scores.len() == 3));
    }
}
