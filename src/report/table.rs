//! Tabular views of a result set

use crate::error::{PolyError, Result};
use crate::evaluation::ResultSet;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// `fold` column (0-based) followed by one score column per classifier
pub fn results_frame(results: &ResultSet) -> Result<DataFrame> {
    let n_folds = results.n_folds().unwrap_or(0);
    let mut columns = Vec::with_capacity(results.len() + 1);
    columns.push(Column::new("fold".into(), (0..n_folds as u32).collect::<Vec<u32>>()));
    for (name, scores) in results.iter() {
        columns.push(Column::new(name.into(), scores));
    }
    Ok(DataFrame::new(columns)?)
}

/// Write the results table as CSV with a header row
pub fn write_csv(results: &ResultSet, path: impl AsRef<Path>) -> Result<()> {
    let mut df = results_frame(results)?;
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| PolyError::Report(format!("cannot write {}: {}", path.as_ref().display(), e)))
}

/// Descriptive statistics of one classifier's fold scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub name: String,
    pub mean: f64,
    /// Sample standard deviation (0 for a single fold)
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ScoreSummary {
    pub fn from_scores(name: &str, scores: &[f64]) -> Self {
        let n = scores.len();
        let mean = if n == 0 { 0.0 } else { scores.iter().sum::<f64>() / n as f64 };
        let std = if n < 2 {
            0.0
        } else {
            (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        };
        Self {
            name: name.to_string(),
            mean,
            std,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min).min(mean),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(mean),
        }
    }
}

/// One summary per classifier, in roster order
pub fn summarize(results: &ResultSet) -> Vec<ScoreSummary> {
    results
        .iter()
        .map(|(name, scores)| ScoreSummary::from_scores(name, scores))
        .collect()
}
