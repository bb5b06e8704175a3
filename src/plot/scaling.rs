//! Scaling charts: runtime, speedup and efficiency against the process count.
//!
//! One series is drawn per `(kernel, size, interface)`, its points sorted by process count.

use super::{draw_legend, draw_mesh, render, zero_based_range, Figure, PlotConfig};
use crate::{error::Result, report::ScalingPoint};

use plotters::{coord::Shift, prelude::*};

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Quantity on the vertical axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Mean runtime with ±std error bars.
    Runtime,
    /// Speedup, with the ideal linear speedup for reference.
    Speedup,
    Efficiency,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Self::Runtime, Self::Speedup, Self::Efficiency];

    pub fn name(self) -> &'static str {
        match self {
            Self::Runtime => "Runtime",
            Self::Speedup => "Speedup",
            Self::Efficiency => "Efficiency",
        }
    }

    fn value(self, p: &ScalingPoint) -> f64 {
        match self {
            Self::Runtime => p.mean,
            Self::Speedup => p.speedup,
            Self::Efficiency => p.efficiency,
        }
    }

    /// Output file name of the chart, `speedup.png` for instance.
    pub fn file_name(self, extension: &str) -> String {
        format!("{}.{extension}", self.name().to_lowercase())
    }
}

/// Points grouped into labelled series, sorted by process count.
pub fn series(points: &[ScalingPoint]) -> Vec<(String, Vec<&ScalingPoint>)> {
    let mut series: BTreeMap<(&str, &str, _), Vec<&ScalingPoint>> = BTreeMap::new();
    for p in points {
        series
            .entry((p.kernel.as_str(), p.size.as_str(), p.interface))
            .or_default()
            .push(p);
    }
    series
        .into_iter()
        .map(|((kernel, size, interface), mut pts)| {
            pts.sort_by_key(|p| p.processes);
            (format!("{kernel} {size} {interface}"), pts)
        })
        .collect()
}

/// One scaling chart.
pub struct ScalingChart<'a> {
    pub points: &'a [ScalingPoint],
    pub metric: Metric,
}

impl Figure for ScalingChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&config.background)?;

        let max_processes = self
            .points
            .iter()
            .map(|p| p.processes)
            .max()
            .unwrap_or(1) as f64;
        let y_values = self.points.iter().flat_map(|p| {
            let v = self.metric.value(p);
            match self.metric {
                Metric::Runtime => vec![v - p.std, v + p.std],
                Metric::Speedup => vec![v, p.processes as f64],
                Metric::Efficiency => vec![v, 1.0],
            }
        });
        let y_range = zero_based_range(y_values);

        let mut chart = ChartBuilder::on(&root)
            .caption(&config.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..(max_processes + 1.0), y_range)?;
        draw_mesh(&mut chart, config)?;

        if self.metric == Metric::Speedup {
            chart
                .draw_series(LineSeries::new(
                    [(1.0, 1.0), (max_processes, max_processes)],
                    BLACK.stroke_width(1),
                ))?
                .label("Ideal")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(1)));
        }

        for (idx, (label, pts)) in series(self.points).into_iter().enumerate() {
            let color = config.color(idx);
            let xy: Vec<(f64, f64)> = pts
                .iter()
                .map(|p| (p.processes as f64, self.metric.value(p)))
                .collect();

            chart
                .draw_series(LineSeries::new(
                    xy.iter().copied(),
                    color.stroke_width(config.line_width),
                ))?
                .label(label)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart.draw_series(xy.iter().map(|&p| Circle::new(p, 4, color.filled())))?;

            if self.metric == Metric::Runtime {
                chart.draw_series(pts.iter().map(|p| {
                    ErrorBar::new_vertical(
                        p.processes as f64,
                        p.mean - p.std,
                        p.mean,
                        p.mean + p.std,
                        color.stroke_width(1),
                        8,
                    )
                }))?;
            }
        }

        draw_legend(&mut chart, config)?;
        root.present()?;
        Ok(())
    }
}

/// Draws the three scaling charts into `out_dir` and returns their paths.
///
/// `config` overrides the appearance; titles and labels are still set per metric.
pub fn plot_scaling(
    points: &[ScalingPoint],
    out_dir: &Path,
    extension: &str,
    config: Option<&PlotConfig>,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for metric in Metric::ALL {
        let defaults = PlotConfig::scaling(metric.name());
        let config = match config {
            Some(c) => PlotConfig {
                title: defaults.title,
                xlabel: defaults.xlabel,
                ylabel: defaults.ylabel,
                ..c.clone()
            },
            None => defaults,
        };
        let path = out_dir.join(metric.file_name(extension));
        render(&ScalingChart { points, metric }, &path, &config)?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::Interface;

    fn point(interface: Interface, processes: usize, mean: f64) -> ScalingPoint {
        ScalingPoint {
            kernel: "gemver".to_string(),
            size: "N=4000".to_string(),
            processes,
            interface,
            mean,
            std: 0.1,
            baseline: 10.0,
            speedup: 10.0 / mean,
            efficiency: 10.0 / mean / processes as f64,
        }
    }

    #[test]
    fn series_are_grouped_and_sorted() {
        let points = vec![
            point(Interface::Mpi, 8, 2.5),
            point(Interface::Std, 1, 10.0),
            point(Interface::Mpi, 2, 5.0),
        ];
        let series = series(&points);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, "gemver N=4000 std");
        assert_eq!(series[1].0, "gemver N=4000 mpi");
        let processes: Vec<_> = series[1].1.iter().map(|p| p.processes).collect();
        assert_eq!(processes, vec![2, 8]);
    }

    #[test]
    fn file_names() {
        assert_eq!(Metric::Speedup.file_name("svg"), "speedup.svg");
        assert_eq!(Metric::Runtime.file_name("png"), "runtime.png");
    }
}
