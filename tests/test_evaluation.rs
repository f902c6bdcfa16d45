//! Integration test: roster evaluation end-to-end

use ndarray::{Array1, Array2};
use ndarray_npy::write_npy;
use polyclass::evaluation::{ClassifierKind, ClassifierSpec, Evaluator, EvaluatorConfig};
use polyclass::optimizer::ParamGrid;
use polyclass::report::export;
use polyclass::training::metrics::{f1_for_class, weighted_f1};
use polyclass::training::Scorer;
use polyclass::utils::DataLoader;
use polyclass::PolyError;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

fn random_arrays(n: usize, d: usize, n_classes: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n, d), |_| rng.sample::<f64, _>(StandardNormal));
    let y = Array1::from_shape_fn(n, |i| (i * n_classes / n) as f64);
    (x, y)
}

fn dataset(n: usize, n_classes: usize) -> polyclass::dataset::Dataset {
    let (x, y) = random_arrays(n, 4, n_classes, 11);
    polyclass::dataset::Dataset::new(x, y).unwrap()
}

/// Every classifier family with small grids so the suite stays quick
fn fast_roster() -> Vec<ClassifierSpec> {
    vec![
        ClassifierSpec::new("Multilayer Perceptron", ClassifierKind::MultilayerPerceptron)
            .with_param("n_hidden", 8i64)
            .with_param("max_epochs", 20i64)
            .with_grid(ParamGrid::new().with("n_deep", [1i64, 2])),
        ClassifierSpec::new("Nearest Neighbors", ClassifierKind::KNearestNeighbors)
            .with_grid(ParamGrid::new().with("n_neighbors", [1i64, 5])),
        ClassifierSpec::new("Linear SVM", ClassifierKind::LinearSvm)
            .with_grid(ParamGrid::new().with("C", [0.1, 1.0])),
        ClassifierSpec::new("RBF SVM", ClassifierKind::RbfSvm)
            .with_grid(ParamGrid::new().with("gamma", [0.1, 1.0])),
        ClassifierSpec::new("Decision Tree", ClassifierKind::DecisionTree),
        ClassifierSpec::new("Random Forest", ClassifierKind::RandomForest)
            .with_grid(ParamGrid::new().with("n_estimators", [3i64, 5])),
        ClassifierSpec::new("Logistic Regression", ClassifierKind::LogisticRegression)
            .with_grid(ParamGrid::new().with("C", [0.5, 2.0])),
        ClassifierSpec::new("Naive Bayes", ClassifierKind::GaussianNaiveBayes),
    ]
}

#[test]
fn test_end_to_end_binary() {
    let dir = tempfile::tempdir().unwrap();
    let (x, y) = random_arrays(100, 4, 2, 42);
    write_npy(dir.path().join("data.npy"), &x).unwrap();
    write_npy(dir.path().join("labels.npy"), &y).unwrap();

    let dataset = DataLoader::new()
        .load_dataset(&dir.path().join("data.npy"), &dir.path().join("labels.npy"))
        .unwrap();
    assert_eq!(dataset.n_samples(), 100);

    let config = EvaluatorConfig::new().with_n_folds(5).with_n_jobs(2).with_random_state(0);
    let mut evaluator = Evaluator::new(dataset, config, fast_roster()).unwrap();
    assert!(matches!(evaluator.scorer(), Scorer::BinaryF1 { positive: 1 }));

    let results = evaluator.run().unwrap().clone();
    assert_eq!(results.len(), 8);
    let names: Vec<&str> = results.names().collect();
    assert_eq!(names[0], "Multilayer Perceptron");
    assert_eq!(names[7], "Naive Bayes");
    for (name, scores) in results.iter() {
        assert_eq!(scores.len(), 5, "{} should have one score per fold", name);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)), "{} scores out of range", name);
    }

    let paths = export(&results, dir.path().join("data.npy")).unwrap();
    let csv = std::fs::read_to_string(&paths.csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 6, "header plus one row per fold");
    assert_eq!(lines[0].split(',').count(), 9, "fold column plus one per classifier");
    assert!(std::fs::metadata(&paths.chart).unwrap().len() > 0);
}

#[test]
fn test_scorer_selection() {
    let roster = vec![ClassifierSpec::new("NB", ClassifierKind::GaussianNaiveBayes)];
    let config = EvaluatorConfig::new().with_n_folds(3);

    let mut binary = Evaluator::new(dataset(60, 2), config.clone(), roster.clone()).unwrap();
    assert!(matches!(binary.scorer(), Scorer::BinaryF1 { positive: 1 }));
    let binary_scores = binary.run().unwrap().get("NB").unwrap().to_vec();
    assert_eq!(binary_scores.len(), 3);

    // recompute the first fold by hand
    let fold = binary.partitioner().fold(0).unwrap();
    let mut clf = binary.build_classifier(&binary.roster()[0]).unwrap();
    clf.fit(&fold.train.features, &fold.train.labels).unwrap();
    let predictions = clf.predict(&fold.test.features).unwrap();
    let expected = f1_for_class(&fold.test.labels, &predictions, 1);
    assert!((binary_scores[0] - expected).abs() < 1e-12);

    let mut multi = Evaluator::new(dataset(60, 3), config, roster).unwrap();
    assert_eq!(multi.scorer(), Scorer::WeightedF1);
    let multi_scores = multi.run().unwrap().get("NB").unwrap().to_vec();
    assert_eq!(multi_scores.len(), 3);

    let fold = multi.partitioner().fold(0).unwrap();
    let mut clf = multi.build_classifier(&multi.roster()[0]).unwrap();
    clf.fit(&fold.train.features, &fold.train.labels).unwrap();
    let predictions = clf.predict(&fold.test.features).unwrap();
    assert!((multi_scores[0] - weighted_f1(&fold.test.labels, &predictions)).abs() < 1e-12);
}

#[test]
fn test_repeated_runs_have_same_shape() {
    let roster = vec![
        ClassifierSpec::new("NB", ClassifierKind::GaussianNaiveBayes),
        ClassifierSpec::new("Tree", ClassifierKind::DecisionTree),
    ];
    let config = EvaluatorConfig::new().with_n_folds(4);
    let mut evaluator = Evaluator::new(dataset(60, 2), config, roster).unwrap();

    let first = evaluator.run().unwrap().clone();
    let second = evaluator.run().unwrap().clone();
    assert_eq!(first.len(), second.len());
    for ((n1, s1), (n2, s2)) in first.iter().zip(second.iter()) {
        assert_eq!(n1, n2);
        assert_eq!(s1.len(), s2.len());
    }
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let roster = vec![ClassifierSpec::new("Forest", ClassifierKind::RandomForest)];
    let config = EvaluatorConfig::new().with_n_folds(3).with_random_state(5);

    let mut a = Evaluator::new(dataset(60, 2), config.clone(), roster.clone()).unwrap();
    let mut b = Evaluator::new(dataset(60, 2), config, roster).unwrap();
    assert_eq!(a.run().unwrap(), b.run().unwrap());
}

#[test]
fn test_folds_exceed_minority_class() {
    let x = Array2::zeros((20, 2));
    let mut y = Array1::zeros(20);
    y[0] = 1.0;
    y[1] = 1.0;
    y[2] = 1.0;
    let dataset = polyclass::dataset::Dataset::new(x, y).unwrap();

    let roster = vec![ClassifierSpec::new("NB", ClassifierKind::GaussianNaiveBayes)];
    let result = Evaluator::new(dataset, EvaluatorConfig::new().with_n_folds(5), roster);
    assert!(matches!(result, Err(PolyError::ConfigurationError(_))));
}

#[test]
fn test_spec_without_grid_is_not_wrapped() {
    let roster = vec![
        ClassifierSpec::new("Tree", ClassifierKind::DecisionTree),
        ClassifierSpec::new("Empty grid", ClassifierKind::GaussianNaiveBayes).with_grid(ParamGrid::new()),
    ];
    let evaluator = Evaluator::new(dataset(60, 2), EvaluatorConfig::new(), roster).unwrap();

    let tree = evaluator.build_classifier(&evaluator.roster()[0]).unwrap();
    assert_eq!(tree.name(), "DecisionTreeClassifier");
    let nb = evaluator.build_classifier(&evaluator.roster()[1]).unwrap();
    assert_eq!(nb.name(), "GaussianNB");
}

#[test]
fn test_roster_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.json");
    let roster = fast_roster();
    std::fs::write(&path, serde_json::to_string_pretty(&roster).unwrap()).unwrap();

    let loaded = polyclass::evaluation::load_roster(&path).unwrap();
    assert_eq!(loaded.len(), roster.len());
    assert_eq!(loaded[1].name, "Nearest Neighbors");
    assert_eq!(loaded[1].kind, ClassifierKind::KNearestNeighbors);
}
