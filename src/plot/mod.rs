//! Charts of benchmark results, drawn with the [`plotters`][1] crate.
//!
//! # Organization
//!
//! - **config**: shared plot configuration ([`PlotConfig`])
//! - **scaling**: runtime, speedup and efficiency against the process count
//! - **comparison**: median execution time per dataset with a bootstrap confidence band
//! - **distribution**: completion time histograms and k-means clusters
//! - **cache**: average cache misses per run directory
//! - **variance**: mean ± std band of runtime against the data size
//!
//! The backend is picked from the output file extension: `.svg` renders through `SVGBackend`,
//! anything else through `BitMapBackend`.
//!
//! [1]: https://crates.io/crates/plotters

pub mod cache;
pub mod comparison;
pub mod config;
pub mod distribution;
pub mod scaling;
pub mod variance;

pub use config::PlotConfig;

use crate::error::{Error, IoResultExt, Result};

use plotters::{
    coord::{types::RangedCoordf64, Shift},
    prelude::*,
};

use std::{fs, ops::Range, path::Path};

/// Something that can be drawn on a drawing area, whatever its backend.
pub trait Figure {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static;
}

/// Renders `figure` into `path`, creating its parent directory if needed.
pub fn render(figure: &impl Figure, path: &Path, config: &PlotConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).at(parent)?;
    }
    let size = (config.width, config.height);
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => figure.draw(SVGBackend::new(path, size).into_drawing_area(), config),
        _ => figure.draw(BitMapBackend::new(path, size).into_drawing_area(), config),
    }?;
    log::info!("wrote {}", path.display());
    Ok(())
}

impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>> for Error {
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        Self::Plot(e.to_string())
    }
}

/// Range covering `values` with a 5% margin on both sides, never empty.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return 0.0..1.0;
    }
    let margin = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - margin)..(hi + margin)
}

/// Same as [`padded_range`], but starting at 0 for non-negative data.
pub fn zero_based_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let values: Vec<f64> = values.into_iter().collect();
    let range = padded_range(values.iter().copied());
    if values.iter().all(|v| *v >= 0.0) {
        0.0..range.end
    } else {
        range
    }
}

/// Chart with floating-point axes, the only kind drawn here.
type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Draws the mesh and axis descriptions of `chart` if the config asks for a grid.
fn draw_mesh<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    config: &PlotConfig,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(&config.xlabel).y_desc(&config.ylabel);
    if !config.show_grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;
    Ok(())
}

/// Draws the legend box of `chart`.
fn draw_legend<'a, DB: DrawingBackend + 'a>(
    chart: &mut Chart<'a, DB>,
    config: &PlotConfig,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    chart
        .configure_series_labels()
        .background_style(config.background.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}
