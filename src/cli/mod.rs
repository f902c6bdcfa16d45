//! Polyclass CLI Module
//!
//! Command-line entry point: load the arrays, benchmark the roster, export
//! the report.

use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::evaluation::{default_roster, load_roster, Evaluator, EvaluatorConfig, ResultSet};
use crate::report::{export, results_frame, summarize, ExportPaths};
use crate::utils::{default_workers, DataLoader};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn fail(s: &str) -> ColoredString   { s.truecolor(240, 110, 100) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_banner() {
    println!();
    println!("       {}", "polyclass".truecolor(120, 170, 255).bold());
    println!("       {}", dim(&format!("classifier benchmark  ·  v{}  ·  rust", env!("CARGO_PKG_VERSION"))));
    println!();
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "polyclass")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Benchmark a roster of classifiers with stratified cross-validation")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory holding the feature and label arrays
    pub data_directory: PathBuf,

    /// Feature matrix file inside the data directory
    #[arg(default_value = "data.npy")]
    pub data: String,

    /// Label vector file inside the data directory
    #[arg(default_value = "labels.npy")]
    pub label: String,

    /// Log level: `info`, anything else enables debug output
    #[arg(long, default_value = "info")]
    pub level: String,

    /// Number of stratified folds
    #[arg(long, default_value = "5")]
    pub folds: usize,

    /// Skip per-fold feature standardization
    #[arg(long)]
    pub no_standardize: bool,

    /// Grid-search workers (default: three quarters of the cores)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Grid-search internal folds (default: --folds)
    #[arg(long)]
    pub inner_folds: Option<usize>,

    /// Seed for fold shuffling and stochastic classifiers
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON roster replacing the built-in classifier list
    #[arg(long)]
    pub roster: Option<PathBuf>,
}

impl Cli {
    pub fn data_path(&self) -> PathBuf {
        self.data_directory.join(&self.data)
    }

    pub fn label_path(&self) -> PathBuf {
        self.data_directory.join(&self.label)
    }

    /// Report files are named after the feature file
    pub fn report_stem(&self) -> PathBuf {
        self.data_path()
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        let mut config = EvaluatorConfig::new()
            .with_n_folds(self.folds)
            .with_standardize(!self.no_standardize);
        if let Some(jobs) = self.jobs {
            config = config.with_n_jobs(jobs);
        }
        if let Some(inner) = self.inner_folds {
            config = config.with_inner_folds(inner);
        }
        if let Some(seed) = self.seed {
            config = config.with_random_state(seed);
        }
        config
    }
}

/// Default filter directive for a `--level` value
pub fn level_directive(level: &str) -> &'static str {
    if level.eq_ignore_ascii_case("info") {
        "polyclass=info"
    } else {
        "polyclass=debug"
    }
}

/// Install the fmt subscriber; `RUST_LOG` wins over `--level`
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_directive(level).into());
    // A subscriber may already be installed when embedded (tests, benches)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ─── Command ───────────────────────────────────────────────────────────────────

/// Run the whole benchmark. On an evaluation error the classifiers that did
/// finish are exported before the error is returned.
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    print_banner();

    section("Data");
    step_run("Loading arrays");
    let start = Instant::now();
    let dataset = DataLoader::new().load_dataset(&cli.data_path(), &cli.label_path())?;
    step_done(&format!("{:.2?}", start.elapsed()));
    println!("  {}", kv("samples ", &dataset.n_samples().to_string()));
    println!("  {}", kv("features", &dataset.n_features().to_string()));
    println!("  {}", kv("classes ", &dataset.classes().len().to_string()));

    let roster = match &cli.roster {
        Some(path) => load_roster(path)?,
        None => default_roster(),
    };
    let workers = cli.jobs.unwrap_or_else(default_workers);

    section("Benchmark");
    println!("  {}", kv("classifiers", &roster.len().to_string()));
    println!("  {}", kv("folds      ", &cli.folds.to_string()));
    println!("  {}", kv("workers    ", &workers.to_string()));

    let mut evaluator = Evaluator::new(dataset, cli.evaluator_config(), roster)?;
    println!("  {}", kv("scoring    ", &evaluator.scorer().to_string()));
    println!();

    let start = Instant::now();
    let outcome = evaluator.run().map(|_| ());
    let elapsed = start.elapsed();

    match &outcome {
        Ok(()) => step_ok(&format!("All classifiers evaluated in {:.2?}", elapsed)),
        Err(e) => println!("  {} {}", fail("✗"), e),
    }

    let results = evaluator.results();
    if !results.is_empty() {
        section("Scores");
        match results_frame(results) {
            Ok(df) => println!("{}", df),
            Err(e) => warn!("Cannot display scores: {}", e),
        }

        section("Summary");
        println!(
            "  {:<24} {:>10} {:>10} {:>10}",
            muted("classifier"),
            muted("mean"),
            muted("std"),
            muted("time")
        );
        for summary in summarize(results) {
            let time = evaluator
                .timings()
                .iter()
                .find(|(name, _)| *name == summary.name)
                .map(|(_, t)| format!("{:.2?}", t))
                .unwrap_or_default();
            println!(
                "  {:<24} {:>10.4} {:>10.4} {:>10}",
                summary.name, summary.mean, summary.std, time
            );
        }
    }

    report_outcome(outcome, results, &cli.report_stem())?;
    println!();
    Ok(())
}

/// Export whatever finished and hand back the evaluation outcome.
///
/// Nothing is written when no classifier finished, so earlier reports stay
/// in place. After a failed evaluation an export failure is only logged and
/// the evaluation error is returned.
pub fn report_outcome(outcome: Result<()>, results: &ResultSet, stem: &Path) -> Result<Option<ExportPaths>> {
    if results.is_empty() {
        return outcome.map(|()| None);
    }

    section("Report");
    match (outcome, export(results, stem)) {
        (Ok(()), exported) => {
            let paths = exported?;
            print_paths(&paths);
            Ok(Some(paths))
        }
        (Err(e), Ok(paths)) => {
            print_paths(&paths);
            Err(e)
        }
        (Err(e), Err(export_err)) => {
            warn!("Cannot export partial results: {}", export_err);
            Err(e)
        }
    }
}

fn print_paths(paths: &ExportPaths) {
    step_ok(&format!("Results {}", accent(&display(&paths.csv))));
    step_ok(&format!("Chart   {}", accent(&display(&paths.chart))));
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolyError;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["polyclass", "/tmp/run"]);
        assert_eq!(cli.data, "data.npy");
        assert_eq!(cli.label, "labels.npy");
        assert_eq!(cli.folds, 5);
        assert_eq!(cli.level, "info");
        assert!(!cli.no_standardize);
        assert_eq!(cli.data_path(), PathBuf::from("/tmp/run/data.npy"));
        assert_eq!(cli.label_path(), PathBuf::from("/tmp/run/labels.npy"));

        let config = cli.evaluator_config();
        assert!(config.standardize);
        assert_eq!(config.n_jobs, None);
        assert_eq!(config.effective_inner_folds(), 5);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "polyclass", "/tmp/run", "x.csv", "y.csv", "--level", "debug", "--folds", "3",
            "--no-standardize", "--jobs", "2", "--inner-folds", "2", "--seed", "7",
        ]);
        let config = cli.evaluator_config();
        assert_eq!(config.n_folds, 3);
        assert!(!config.standardize);
        assert_eq!(config.n_jobs, Some(2));
        assert_eq!(config.effective_inner_folds(), 2);
        assert_eq!(config.random_state, Some(7));
        assert_eq!(cli.report_stem(), PathBuf::from("/tmp/run/x.csv"));
    }

    fn finished_results() -> ResultSet {
        let mut results = ResultSet::new();
        results.insert("Naive Bayes", vec![0.8, 0.9]).unwrap();
        results
    }

    #[test]
    fn test_report_outcome_exports_finished_run() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("data.npy");
        let paths = report_outcome(Ok(()), &finished_results(), &stem).unwrap().unwrap();
        assert!(paths.csv.exists());
        assert!(paths.chart.exists());
    }

    #[test]
    fn test_evaluation_error_wins_over_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("data.npy");
        // the CSV target is a directory, so the export fails too
        std::fs::create_dir(ExportPaths::for_stem(&stem).csv).unwrap();

        let outcome = Err(PolyError::fit("KNeighborsClassifier", "n_neighbors too large"));
        let err = report_outcome(outcome, &finished_results(), &stem).unwrap_err();
        assert!(matches!(err, PolyError::FitError { .. }));
    }

    #[test]
    fn test_failed_run_without_results_keeps_old_report() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("data.npy");
        let paths = ExportPaths::for_stem(&stem);
        std::fs::write(&paths.csv, "fold,Naive Bayes\n0,0.9\n").unwrap();

        let outcome = Err(PolyError::config("bad roster"));
        let err = report_outcome(outcome, &ResultSet::new(), &stem).unwrap_err();
        assert!(matches!(err, PolyError::ConfigurationError(_)));
        assert_eq!(std::fs::read_to_string(&paths.csv).unwrap(), "fold,Naive Bayes\n0,0.9\n");
        assert!(!paths.chart.exists());

        assert_eq!(report_outcome(Ok(()), &ResultSet::new(), &stem).unwrap(), None);
    }

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("info"), "polyclass=info");
        assert_eq!(level_directive("INFO"), "polyclass=info");
        assert_eq!(level_directive("debug"), "polyclass=debug");
        assert_eq!(level_directive("anything"), "polyclass=debug");
    }
}
