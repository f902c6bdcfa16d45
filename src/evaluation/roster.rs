//! Classifier rosters: which models to benchmark and how to tune them

use crate::error::{PolyError, Result};
use crate::optimizer::ParamGrid;
use crate::training::{
    Classifier, DecisionTree, GaussianNaiveBayes, KNNClassifier, LogisticRegression, MLPClassifier, MLPConfig,
    MaxFeatures, ParamSet, ParamValue, RandomForest, SVMClassifier, SVMConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    MultilayerPerceptron,
    KNearestNeighbors,
    LinearSvm,
    RbfSvm,
    DecisionTree,
    RandomForest,
    LogisticRegression,
    GaussianNaiveBayes,
}

impl ClassifierKind {
    /// Base classifier with the family's default configuration
    pub fn base(&self) -> Box<dyn Classifier> {
        match self {
            ClassifierKind::MultilayerPerceptron => Box::new(MLPClassifier::new(MLPConfig::default())),
            ClassifierKind::KNearestNeighbors => Box::new(KNNClassifier::with_k(3)),
            ClassifierKind::LinearSvm => Box::new(SVMClassifier::new(SVMConfig::linear(1.0))),
            ClassifierKind::RbfSvm => Box::new(SVMClassifier::new(SVMConfig::rbf(2.0, 1.0))),
            ClassifierKind::DecisionTree => Box::new(DecisionTree::new().with_max_features(MaxFeatures::Sqrt)),
            ClassifierKind::RandomForest => Box::new(RandomForest::new(10)),
            ClassifierKind::LogisticRegression => Box::new(LogisticRegression::new()),
            ClassifierKind::GaussianNaiveBayes => Box::new(GaussianNaiveBayes::new()),
        }
    }

    /// Whether fitting draws random numbers
    pub fn is_stochastic(&self) -> bool {
        matches!(
            self,
            ClassifierKind::MultilayerPerceptron
                | ClassifierKind::LinearSvm
                | ClassifierKind::RbfSvm
                | ClassifierKind::DecisionTree
                | ClassifierKind::RandomForest
        )
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassifierKind::MultilayerPerceptron => "multilayer_perceptron",
            ClassifierKind::KNearestNeighbors => "k_nearest_neighbors",
            ClassifierKind::LinearSvm => "linear_svm",
            ClassifierKind::RbfSvm => "rbf_svm",
            ClassifierKind::DecisionTree => "decision_tree",
            ClassifierKind::RandomForest => "random_forest",
            ClassifierKind::LogisticRegression => "logistic_regression",
            ClassifierKind::GaussianNaiveBayes => "gaussian_naive_bayes",
        };
        write!(f, "{}", s)
    }
}

/// One roster entry: a named, configured classifier with an optional grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub name: String,
    pub kind: ClassifierKind,
    /// Fixed parameters applied to the base classifier
    #[serde(default)]
    pub params: ParamSet,
    /// Candidate values searched by internal cross-validation
    #[serde(default)]
    pub grid: Option<ParamGrid>,
}

impl ClassifierSpec {
    pub fn new(name: &str, kind: ClassifierKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            params: ParamSet::new(),
            grid: None,
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Grid to search, if any (an empty grid means no search)
    pub fn search_grid(&self) -> Option<&ParamGrid> {
        self.grid.as_ref().filter(|g| !g.is_empty())
    }

    /// Base classifier with `random_state` (for stochastic families) and the
    /// fixed parameters applied
    pub fn build(&self, random_state: Option<u64>) -> Result<Box<dyn Classifier>> {
        let mut clf = self.kind.base();
        if let (Some(seed), true) = (random_state, self.kind.is_stochastic()) {
            clf.set_random_state(seed);
        }
        clf.set_params(&self.params).map_err(|e| match e {
            PolyError::ConfigurationError(msg) => PolyError::config(format!("{}: {}", self.name, msg)),
            other => other,
        })?;
        Ok(clf)
    }
}

/// `count` values evenly spaced in log10 space from 10^start to 10^stop
pub fn logspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| 10f64.powf(start + step * i as f64)).collect()
        }
    }
}

/// The eight-classifier benchmark roster
pub fn default_roster() -> Vec<ClassifierSpec> {
    vec![
        ClassifierSpec::new("Multilayer Perceptron", ClassifierKind::MultilayerPerceptron).with_grid(
            ParamGrid::new()
                .with("n_hidden", [50i64, 100, 200])
                .with("n_deep", [2i64, 3])
                .with("l1_norm", [0.0, 0.001, 0.01])
                .with("patience", [10i64, 50]),
        ),
        ClassifierSpec::new("Nearest Neighbors", ClassifierKind::KNearestNeighbors)
            .with_grid(ParamGrid::new().with("n_neighbors", [1i64, 5, 10, 20])),
        ClassifierSpec::new("Linear SVM", ClassifierKind::LinearSvm)
            .with_grid(ParamGrid::new().with("kernel", ["linear"]).with("C", [0.01, 0.1, 1.0])),
        ClassifierSpec::new("RBF SVM", ClassifierKind::RbfSvm).with_grid(
            ParamGrid::new()
                .with("kernel", ["rbf"])
                .with("gamma", [0.1, 0.5, 1.0, 5.0])
                .with("C", [0.001, 0.01, 0.1]),
        ),
        ClassifierSpec::new("Decision Tree", ClassifierKind::DecisionTree),
        ClassifierSpec::new("Random Forest", ClassifierKind::RandomForest)
            .with_grid(ParamGrid::new().with("n_estimators", (5i64..20).collect::<Vec<_>>())),
        ClassifierSpec::new("Logistic Regression", ClassifierKind::LogisticRegression)
            .with_grid(ParamGrid::new().with("C", logspace(0.1, 3.0, 5))),
        ClassifierSpec::new("Naive Bayes", ClassifierKind::GaussianNaiveBayes),
    ]
}

/// Load a roster from a JSON array of specs
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<ClassifierSpec>> {
    let json = std::fs::read_to_string(path)?;
    let roster: Vec<ClassifierSpec> = serde_json::from_str(&json)?;
    validate_roster(&roster)?;
    Ok(roster)
}

/// Roster names must be unique and grids non-degenerate
pub fn validate_roster(roster: &[ClassifierSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in roster {
        if !seen.insert(spec.name.as_str()) {
            return Err(PolyError::config(format!("duplicate classifier name '{}'", spec.name)));
        }
        if let Some(grid) = &spec.grid {
            grid.validate()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster() {
        let roster = default_roster();
        let names: Vec<&str> = roster.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Multilayer Perceptron",
                "Nearest Neighbors",
                "Linear SVM",
                "RBF SVM",
                "Decision Tree",
                "Random Forest",
                "Logistic Regression",
                "Naive Bayes"
            ]
        );
        validate_roster(&roster).unwrap();

        let grid = |name: &str| roster.iter().find(|s| s.name == name).and_then(|s| s.search_grid());
        assert_eq!(grid("Multilayer Perceptron").unwrap().n_candidates(), 36);
        assert_eq!(grid("RBF SVM").unwrap().n_candidates(), 12);
        assert_eq!(grid("Random Forest").unwrap().n_candidates(), 15);
        assert!(grid("Decision Tree").is_none());
        assert!(grid("Naive Bayes").is_none());
    }

    #[test]
    fn test_every_default_spec_builds() {
        for spec in default_roster() {
            spec.build(Some(7)).unwrap();
            spec.build(Some(u64::MAX)).unwrap();
            if let Some(grid) = spec.search_grid() {
                for candidate in grid.candidates().unwrap() {
                    spec.build(None).unwrap().set_params(&candidate).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_logspace() {
        let values = logspace(0.1, 3.0, 5);
        assert_eq!(values.len(), 5);
        assert!((values[0] - 10f64.powf(0.1)).abs() < 1e-12);
        assert!((values[4] - 1000.0).abs() < 1e-9);
        assert!((values[2] - 10f64.powf(1.55)).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let roster = vec![
            ClassifierSpec::new("A", ClassifierKind::GaussianNaiveBayes),
            ClassifierSpec::new("A", ClassifierKind::DecisionTree),
        ];
        assert!(matches!(validate_roster(&roster), Err(PolyError::ConfigurationError(_))));
    }

    #[test]
    fn test_spec_json() {
        let json = r#"[
            {"name": "kNN", "kind": "k_nearest_neighbors", "grid": {"n_neighbors": [1, 3]}},
            {"name": "NB", "kind": "gaussian_naive_bayes", "params": {"var_smoothing": 1e-6}}
        ]"#;
        let roster: Vec<ClassifierSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(roster[0].kind, ClassifierKind::KNearestNeighbors);
        assert_eq!(roster[0].search_grid().unwrap().n_candidates(), 2);
        assert_eq!(roster[1].params["var_smoothing"], ParamValue::Float(1e-6));
        assert!(roster[1].grid.is_none());
    }

    #[test]
    fn test_unknown_param_names_the_spec() {
        let spec = ClassifierSpec::new("Naive Bayes", ClassifierKind::GaussianNaiveBayes).with_param("k", 3i64);
        let err = spec.build(None).err().unwrap();
        assert!(err.to_string().contains("Naive Bayes"));
    }
}
