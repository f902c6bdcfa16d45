//! Classifiers and the cross-validation machinery around them
//!
//! Every benchmarked model implements [`Classifier`]:
//! - K-Nearest Neighbors
//! - Support Vector Machines (linear and RBF kernels)
//! - Decision trees and Random Forests
//! - Logistic regression
//! - Gaussian Naive Bayes
//! - Neural networks (MLP)

mod models;
pub mod cross_validation;
pub mod metrics;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod knn;
pub mod naive_bayes;
pub mod neural_network;
pub mod svm;

pub use models::{format_params, Classifier, ParamSet, ParamValue};
pub use cross_validation::{CVSplit, Fold, Folds, Partitioner, Split, StratifiedKFold};
pub use metrics::{ClassificationReport, Scorer};
pub use linear_models::LogisticRegression;
pub use decision_tree::{Criterion, DecisionTree, MaxFeatures, TreeNode};
pub use random_forest::RandomForest;
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use naive_bayes::GaussianNaiveBayes;
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use svm::{KernelType, SVMClassifier, SVMConfig};

pub(crate) use models::check_fit_input;
