//! Average cache misses per run directory, as grouped bars.

use super::{draw_legend, render, Figure, PlotConfig};
use crate::{error::Result, perf_stats::CacheMisses};

use plotters::{coord::Shift, prelude::*};

use std::path::Path;

pub struct CacheMissChart<'a> {
    pub misses: &'a [CacheMisses],
}

impl Figure for CacheMissChart<'_> {
    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>, config: &PlotConfig) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&config.background)?;

        let n = self.misses.len();
        let max = self
            .misses
            .iter()
            .flat_map(|m| [m.l1, m.llc])
            .fold(0.0_f64, f64::max)
            .max(1.0);

        let mut chart = ChartBuilder::on(&root)
            .caption(&config.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..(max * 1.1))?;

        let label_of = |x: &f64| {
            let idx = x.round();
            if (x - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            self.misses
                .get(idx as usize)
                .map(|m| m.name.clone())
                .unwrap_or_default()
        };
        let scientific = |y: &f64| format!("{y:.2e}");
        {
            let mut mesh = chart.configure_mesh();
            mesh.x_desc(&config.xlabel)
                .y_desc(&config.ylabel)
                .x_labels(n.max(1))
                .x_label_formatter(&label_of)
                .y_label_formatter(&scientific);
            if !config.show_grid {
                mesh.disable_mesh();
            }
            mesh.draw()?;
        }

        let width = 0.35;
        let groups: [(&str, fn(&CacheMisses) -> f64, f64); 2] = [
            ("L1 Cache Misses", |m| m.l1, -width),
            ("L3 Cache Misses", |m| m.llc, 0.0),
        ];
        for (idx, (label, value, offset)) in groups.into_iter().enumerate() {
            let color = config.color(idx);
            chart
                .draw_series(self.misses.iter().enumerate().map(|(i, m)| {
                    let x = i as f64 + offset;
                    Rectangle::new([(x, 0.0), (x + width, value(m))], color.filled())
                }))?
                .label(label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
        }

        draw_legend(&mut chart, config)?;
        root.present()?;
        Ok(())
    }
}

/// Draws the cache-miss bars into `path`.
pub fn plot_cache_misses(
    misses: &[CacheMisses],
    path: &Path,
    config: Option<&PlotConfig>,
) -> Result<()> {
    let default_config = PlotConfig::cache_misses();
    let config = config.unwrap_or(&default_config);
    render(&CacheMissChart { misses }, path, config)
}
