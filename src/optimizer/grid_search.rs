//! Exhaustive hyperparameter search with internal cross-validation

use super::{config::GridSearchConfig, param_grid::ParamGrid};
use crate::error::{PolyError, Result};
use crate::training::{check_fit_input, format_params, Classifier, ParamSet, ParamValue, StratifiedKFold};
use crate::dataset::class_counts;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of one parameter candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position in the grid's candidate order
    pub trial_id: usize,
    pub params: ParamSet,
    /// Mean internal score
    pub value: f64,
    /// Internal score per fold
    pub fold_scores: Vec<f64>,
}

/// All candidates of one search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    pub best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
}

impl Study {
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&ParamSet> {
        self.best_trial().map(|t| &t.params)
    }

    /// Record a trial; only a strictly higher score replaces the best, so
    /// ties go to the earlier candidate
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = match self.best_trial() {
            None => true,
            Some(best) => result.value > best.value,
        };
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }
}

/// A classifier that picks its own hyperparameters.
///
/// On `fit` every grid candidate is scored by stratified internal folds of
/// the training rows it receives; the best candidate is then refit on all of
/// them and used for prediction.
#[derive(Clone)]
pub struct GridSearch {
    name: String,
    base: Box<dyn Classifier>,
    grid: ParamGrid,
    config: GridSearchConfig,
    best: Option<Box<dyn Classifier>>,
    study: Option<Study>,
}

impl GridSearch {
    pub fn new(base: Box<dyn Classifier>, grid: ParamGrid, config: GridSearchConfig) -> Result<Self> {
        grid.validate()?;
        Ok(Self {
            name: format!("GridSearchCV({})", base.name()),
            base,
            grid,
            config,
            best: None,
            study: None,
        })
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    /// Parameters of the winning candidate
    pub fn best_params(&self) -> Option<&ParamSet> {
        self.study.as_ref().and_then(Study::best_params)
    }

    /// Mean internal score of the winning candidate
    pub fn best_score(&self) -> Option<f64> {
        self.study.as_ref().and_then(Study::best_value)
    }

    pub fn study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    /// The refit winner
    pub fn best_estimator(&self) -> Option<&dyn Classifier> {
        self.best.as_deref()
    }

    /// Internal fold count, lowered to what the rarest class in `y` allows
    fn inner_folds(&self, y: &Array1<f64>) -> Result<usize> {
        let min_count = class_counts(y).values().copied().min().unwrap_or(0);
        if min_count < 2 {
            return Err(PolyError::fit(
                self.name.as_str(),
                format!("internal cross-validation needs 2 samples per class, rarest class has {}", min_count),
            ));
        }
        if self.config.n_folds > min_count {
            warn!(
                "{}: rarest class has only {} samples, using {} internal folds instead of {}",
                self.name, min_count, min_count, self.config.n_folds
            );
            return Ok(min_count);
        }
        Ok(self.config.n_folds)
    }

    fn build_candidate(&self, params: &ParamSet) -> Result<Box<dyn Classifier>> {
        let mut clf = self.base.box_clone();
        clf.set_params(params)?;
        Ok(clf)
    }
}

impl Classifier for GridSearch {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(&self.name, x, y)?;
        let start = Instant::now();

        let candidates = self.grid.candidates()?;
        // Bad parameter names or values surface as configuration errors
        for params in &candidates {
            self.build_candidate(params)?;
        }

        let mut splitter = StratifiedKFold::new(self.inner_folds(y)?);
        if let Some(seed) = self.config.random_state {
            splitter = splitter.with_random_state(seed);
        }
        let splits = splitter.split(y)?;

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..splits.len()).map(move |s| (c, s)))
            .collect();

        let scoring = self.config.scoring;
        let pool = self.config.parallel.build_pool()?;
        let scores: Vec<Result<f64>> = pool.install(|| {
            jobs.par_iter()
                .map(|&(c, s)| {
                    let split = &splits[s];
                    let mut clf = self.build_candidate(&candidates[c])?;
                    clf.fit(
                        &x.select(Axis(0), &split.train_indices),
                        &y.select(Axis(0), &split.train_indices),
                    )?;
                    let predictions = clf.predict(&x.select(Axis(0), &split.test_indices))?;
                    scoring.score(&y.select(Axis(0), &split.test_indices), &predictions)
                })
                .collect()
        });

        let mut study = Study::default();
        let mut scores = scores.into_iter();
        for (trial_id, params) in candidates.into_iter().enumerate() {
            let fold_scores = scores
                .by_ref()
                .take(splits.len())
                .collect::<Result<Vec<f64>>>()
                .map_err(|e| PolyError::fit(self.name.as_str(), format!("candidate {}: {}", format_params(&params), e)))?;
            let value = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!("{} candidate {} [{}]: {} {:.4}", self.name, trial_id, format_params(&params), scoring, value);
            study.add_trial(TrialResult {
                trial_id,
                params,
                value,
                fold_scores,
            });
        }

        let best_params = study
            .best_params()
            .cloned()
            .ok_or_else(|| PolyError::fit(self.name.as_str(), "grid produced no candidates"))?;
        let mut best = self.build_candidate(&best_params)?;
        best.fit(x, y)?;

        study.total_duration_secs = start.elapsed().as_secs_f64();
        debug!(
            "{} best [{}] with {} {:.4} in {:.2}s",
            self.name,
            format_params(&best_params),
            scoring,
            study.best_value().unwrap_or(0.0),
            study.total_duration_secs
        );

        self.best = Some(best);
        self.study = Some(study);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.best.as_ref().ok_or(PolyError::ModelNotFitted)?.predict(x)
    }

    /// Sets a fixed parameter on the base classifier; grid values override it
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        self.base.set_param(name, value)
    }

    fn params(&self) -> ParamSet {
        match &self.best {
            Some(best) => best.params(),
            None => self.base.params(),
        }
    }

    fn set_random_state(&mut self, seed: u64) {
        self.base.set_random_state(seed);
    }

    fn box_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
