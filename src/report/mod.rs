//! Report export: CSV table, SVG chart and score summaries
//!
//! Every function accepts partial and empty result sets, so a run that fails
//! halfway can still be reported.

mod chart;
mod table;

pub use chart::{plot_scores, CHART_TITLE};
pub use table::{results_frame, summarize, write_csv, ScoreSummary};

use crate::error::Result;
use crate::evaluation::ResultSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files written by [`export`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub chart: PathBuf,
}

impl ExportPaths {
    /// `<stem>_results.csv` and `<stem>.svg`
    pub fn for_stem(stem: impl AsRef<Path>) -> Self {
        let with_suffix = |suffix: &str| {
            let mut s: OsString = stem.as_ref().as_os_str().to_owned();
            s.push(suffix);
            PathBuf::from(s)
        };
        Self {
            csv: with_suffix("_results.csv"),
            chart: with_suffix(".svg"),
        }
    }
}

/// Write the CSV table and the chart next to `stem`
pub fn export(results: &ResultSet, stem: impl AsRef<Path>) -> Result<ExportPaths> {
    let paths = ExportPaths::for_stem(stem);
    write_csv(results, &paths.csv)?;
    plot_scores(results, &paths.chart)?;
    info!("Wrote {} and {}", paths.csv.display(), paths.chart.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_keep_full_file_name() {
        let paths = ExportPaths::for_stem("/data/run/data.npy");
        assert_eq!(paths.csv, PathBuf::from("/data/run/data.npy_results.csv"));
        assert_eq!(paths.chart, PathBuf::from("/data/run/data.npy.svg"));
    }
}
