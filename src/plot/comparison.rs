//! Interface comparison: median execution time per dataset, with its bootstrap confidence band.

use super::{draw_legend, render, zero_based_range, Figure, PlotConfig};
use crate::{error::Result, report::MedianBand};

use plotters::{coord::Shift, prelude::*};

use std::path::Path;

/// Median execution times of one kernel.
pub struct ComparisonChart<'a> {
    pub bands: &'a [MedianBand],
}

impl ComparisonChart<'_> {
    /// Dataset labels on the horizontal axis, in first-seen order.
    pub fn datasets(&self) -> Vec<&str> {
        let mut datasets: Vec<&str> = Vec::new();
        for band in self.bands {
            if !datasets.contains(&band.dataset.as_str()) {
                datasets.push(&band.dataset);
            }
        }
        datasets
    }

    /// Interfaces in first-seen order.
    pub fn interfaces(&self) -> Vec<&str> {
        let mut interfaces: Vec<&str> = Vec::new();
        for band in self.bands {
            if !interfaces.contains(&band.interface.as_str()) {
                interfaces.push(&band.interface);
            }
        }
        interfaces
    }
}

impl Figure for ComparisonChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&config.background)?;

        let datasets = self.datasets();
        let x_of = |dataset: &str| datasets.iter().position(|d| *d == dataset).unwrap_or(0) as f64;
        let y_range = zero_based_range(self.bands.iter().flat_map(|b| [b.low, b.high]));

        let mut chart = ChartBuilder::on(&root)
            .caption(&config.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..(datasets.len() as f64 - 0.5), y_range)?;

        let label_of = |x: &f64| {
            let idx = x.round();
            if (x - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            datasets
                .get(idx as usize)
                .map(|d| d.to_string())
                .unwrap_or_default()
        };
        {
            let mut mesh = chart.configure_mesh();
            mesh.x_desc(&config.xlabel)
                .y_desc(&config.ylabel)
                .x_labels(datasets.len().max(1))
                .x_label_formatter(&label_of);
            if !config.show_grid {
                mesh.disable_mesh();
            }
            mesh.draw()?;
        }

        for (idx, interface) in self.interfaces().into_iter().enumerate() {
            let color = config.color(idx);
            let mut series: Vec<&MedianBand> =
                self.bands.iter().filter(|b| b.interface == interface).collect();
            series.sort_by(|a, b| x_of(&a.dataset).total_cmp(&x_of(&b.dataset)));

            let mut band: Vec<(f64, f64)> = series.iter().map(|b| (x_of(&b.dataset), b.low)).collect();
            band.extend(series.iter().rev().map(|b| (x_of(&b.dataset), b.high)));
            chart.draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))?;

            let medians: Vec<(f64, f64)> = series.iter().map(|b| (x_of(&b.dataset), b.median)).collect();
            chart
                .draw_series(LineSeries::new(
                    medians.iter().copied(),
                    color.stroke_width(config.line_width),
                ))?
                .label(interface)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart.draw_series(medians.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
        }

        draw_legend(&mut chart, config)?;
        root.present()?;
        Ok(())
    }
}

/// Draws the comparison chart of `kernel` into `path`.
pub fn plot_comparison(
    kernel: &str,
    bands: &[MedianBand],
    path: &Path,
    config: Option<&PlotConfig>,
) -> Result<()> {
    let default_config = PlotConfig::comparison(kernel);
    let config = config.unwrap_or(&default_config);
    render(&ComparisonChart { bands }, path, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(dataset: &str, interface: &str) -> MedianBand {
        MedianBand {
            dataset: dataset.to_string(),
            interface: interface.to_string(),
            median: 1.0,
            low: 0.9,
            high: 1.1,
        }
    }

    #[test]
    fn axes_keep_first_seen_order() {
        let bands = vec![
            band("N_4000", "std"),
            band("N_4000", "omp"),
            band("N_1000", "omp"),
            band("N_1000", "std"),
        ];
        let chart = ComparisonChart { bands: &bands };
        assert_eq!(chart.datasets(), vec!["N_4000", "N_1000"]);
        assert_eq!(chart.interfaces(), vec!["std", "omp"]);
    }
}
