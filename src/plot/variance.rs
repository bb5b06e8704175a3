//! Runtime variability: mean ± std band against the data size, one series per input table.

use super::{draw_legend, draw_mesh, padded_range, render, zero_based_range, Figure, PlotConfig};
use crate::error::Result;

use plotters::{coord::Shift, prelude::*};

use std::path::Path;

/// A labelled series of `(size, mean, std)` points, sorted by size.
#[derive(Clone, Debug, PartialEq)]
pub struct VarianceSeries {
    pub label: String,
    pub points: Vec<(f64, f64, f64)>,
}

pub struct VarianceChart<'a> {
    pub series: &'a [VarianceSeries],
}

impl Figure for VarianceChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&config.background)?;

        let points = || self.series.iter().flat_map(|s| s.points.iter());
        let x_range = padded_range(points().map(|p| p.0));
        let y_range = zero_based_range(points().flat_map(|p| [p.1 - p.2, p.1 + p.2]));

        let mut chart = ChartBuilder::on(&root)
            .caption(&config.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;
        draw_mesh(&mut chart, config)?;

        for (idx, series) in self.series.iter().enumerate() {
            let color = config.color(idx);

            let mut band: Vec<(f64, f64)> =
                series.points.iter().map(|&(x, m, s)| (x, m - s)).collect();
            band.extend(series.points.iter().rev().map(|&(x, m, s)| (x, m + s)));
            chart
                .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))?
                .label(format!("{} (±std)", series.label))
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.mix(0.2).filled())
                });

            let means: Vec<(f64, f64)> = series.points.iter().map(|&(x, m, _)| (x, m)).collect();
            chart
                .draw_series(LineSeries::new(
                    means.iter().copied(),
                    color.stroke_width(config.line_width),
                ))?
                .label(format!("{} (mean)", series.label))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart.draw_series(means.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
        }

        draw_legend(&mut chart, config)?;
        root.present()?;
        Ok(())
    }
}

/// Draws the variability chart into `path`.
pub fn plot_variance(
    series: &[VarianceSeries],
    path: &Path,
    config: Option<&PlotConfig>,
) -> Result<()> {
    let default_config = PlotConfig::variance();
    let config = config.unwrap_or(&default_config);
    render(&VarianceChart { series }, path, config)
}
