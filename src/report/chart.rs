//! Bar chart of mean fold scores

use super::table::summarize;
use crate::error::{PolyError, Result};
use crate::evaluation::ResultSet;
use plotters::prelude::*;
use std::path::Path;

pub const CHART_TITLE: &str = "Classification F1 Mean +- SD";

const CHART_SIZE: (u32, u32) = (1000, 600);

fn report_err<E: std::fmt::Display>(e: E) -> PolyError {
    PolyError::Report(format!("cannot draw chart: {}", e))
}

/// SVG bar chart: one bar per classifier at its mean score with ±1 SD error
/// bars, y axis fixed to [0, 1]
pub fn plot_scores(results: &ResultSet, path: impl AsRef<Path>) -> Result<()> {
    let summaries = summarize(results);
    let names: Vec<String> = summaries.iter().map(|s| s.name.clone()).collect();
    let n_bars = summaries.len().max(1);

    let root = SVGBackend::new(path.as_ref(), CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(report_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(CHART_TITLE, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(50)
        .build_cartesian_2d((0..n_bars).into_segmented(), 0.0f64..1.0f64)
        .map_err(report_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_bars)
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => names.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .y_desc("score")
        .draw()
        .map_err(report_err)?;

    chart
        .draw_series(summaries.iter().enumerate().map(|(i, s)| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), s.mean.clamp(0.0, 1.0))],
                Palette99::pick(i).filled(),
            );
            bar.set_margin(0, 0, 12, 12);
            bar
        }))
        .map_err(report_err)?;

    chart
        .draw_series(summaries.iter().enumerate().map(|(i, s)| {
            ErrorBar::new_vertical(
                SegmentValue::CenterOf(i),
                (s.mean - s.std).max(0.0),
                s.mean,
                (s.mean + s.std).min(1.0),
                BLACK.filled(),
                12,
            )
        }))
        .map_err(report_err)?;

    root.present().map_err(report_err)?;
    Ok(())
}
