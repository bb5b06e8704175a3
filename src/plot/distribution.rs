//! Distribution of completion times.
//!
//! [`HistogramChart`] shows a single sample set with its min, median, mean, 95th percentile and
//! max marked; [`ClusterChart`] colors the bins of each k-means cluster.

use super::{draw_legend, draw_mesh, padded_range, render, Chart, Figure, PlotConfig};
use crate::{
    error::Result,
    kmeans::Cluster,
    utils::{median, percentile},
};

use plotters::{coord::Shift, prelude::*};
use statistical::mean;

use std::{ops::Range, path::Path};

/// One histogram bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Splits `range` into `bins` equal bins and counts the samples of each. The last bin is closed.
pub fn histogram(samples: &[f64], range: Range<f64>, bins: usize) -> Vec<Bin> {
    let bins = bins.max(1);
    let width = (range.end - range.start) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            lo: range.start + width * i as f64,
            hi: range.start + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    if width <= 0.0 {
        out[0].count = samples.len();
        return out;
    }
    for &x in samples {
        if x < range.start || x > range.end {
            continue;
        }
        let idx = (((x - range.start) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// Summary statistics marked on the histogram, as `(label, value)`.
pub fn markers(samples: &[f64]) -> Vec<(&'static str, f64)> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut markers = vec![("Min", sorted[0])];
    if let Some(m) = median(samples) {
        markers.push(("Median", m));
    }
    markers.push(("Mean", mean(samples)));
    if let Some(p95) = percentile(&sorted, 0.95) {
        markers.push(("95th percentile", p95));
    }
    markers.push(("Max", sorted[sorted.len() - 1]));
    markers
}

fn draw_bins<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    bins: &[Bin],
    color: RGBColor,
    label: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    chart
        .draw_series(bins.iter().filter(|b| b.count > 0).map(|b| {
            Rectangle::new([(b.lo, 0.0), (b.hi, b.count as f64)], color.mix(0.7).filled())
        }))?
        .label(label)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    Ok(())
}

/// Histogram of one sample set.
pub struct HistogramChart<'a> {
    pub samples: &'a [f64],
    pub bins: usize,
}

impl Figure for HistogramChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&config.background)?;

        let x_range = padded_range(self.samples.iter().copied());
        let bins = histogram(self.samples, x_range.clone(), self.bins);
        let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;

        let mut chart = ChartBuilder::on(&root)
            .caption(&config.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, 0.0..(max_count * 1.1))?;
        draw_mesh(&mut chart, config)?;
        draw_bins(&mut chart, &bins, config.color(0), "Completion times")?;

        for (idx, (label, value)) in markers(self.samples).into_iter().enumerate() {
            let color = config.color(idx + 1);
            chart
                .draw_series(LineSeries::new(
                    [(value, 0.0), (value, max_count * 1.05)],
                    color.stroke_width(config.line_width),
                ))?
                .label(format!("{label}: {value:.4}s"))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        draw_legend(&mut chart, config)?;
        root.present()?;
        Ok(())
    }
}

/// Draws the histogram of `samples` into `path`.
pub fn plot_histogram(
    samples: &[f64],
    path: &Path,
    bins: usize,
    config: Option<&PlotConfig>,
) -> Result<()> {
    let default_config = PlotConfig::histogram("Distribution of completion times");
    let config = config.unwrap_or(&default_config);
    render(&HistogramChart { samples, bins }, path, config)
}

/// Histogram of k-means clusters, one color per cluster.
pub struct ClusterChart<'a> {
    pub clusters: &'a [Cluster],
    pub bins: usize,
}

impl Figure for ClusterChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&config.background)?;

        let all = self.clusters.iter().flat_map(|c| c.samples.iter().copied());
        let x_range = padded_range(all);
        let per_cluster: Vec<Vec<Bin>> = self
            .clusters
            .iter()
            .map(|c| histogram(&c.samples, x_range.clone(), self.bins))
            .collect();
        let max_count = per_cluster
            .iter()
            .flatten()
            .map(|b| b.count)
            .max()
            .unwrap_or(0)
            .max(1) as f64;

        let mut chart = ChartBuilder::on(&root)
            .caption(&config.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, 0.0..(max_count * 1.1))?;
        draw_mesh(&mut chart, config)?;

        for (idx, (cluster, bins)) in self.clusters.iter().zip(&per_cluster).enumerate() {
            let label = format!(
                "Cluster {} (mean {:.4}s, {} runs)",
                idx + 1,
                cluster.mean,
                cluster.samples.len()
            );
            draw_bins(&mut chart, bins, config.color(idx), &label)?;
        }

        draw_legend(&mut chart, config)?;
        root.present()?;
        Ok(())
    }
}

/// Draws the per-cluster histogram into `path`.
pub fn plot_clusters(
    clusters: &[Cluster],
    path: &Path,
    bins: usize,
    config: Option<&PlotConfig>,
) -> Result<()> {
    let default_config = PlotConfig::histogram("Execution time clusters");
    let config = config.unwrap_or(&default_config);
    render(&ClusterChart { clusters, bins }, path, config)
}
