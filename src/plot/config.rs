//! Plot configuration shared by every chart.

use plotters::prelude::*;

/// Appearance of a chart.
///
/// Every chart function takes an optional `&PlotConfig`; `None` uses the chart's own defaults
/// (see the constructors below).
#[derive(Clone, Debug)]
pub struct PlotConfig {
    /// Image width in pixels (default: 1024)
    pub width: u32,

    /// Image height in pixels (default: 768)
    pub height: u32,

    pub title: String,
    pub xlabel: String,
    pub ylabel: String,

    /// Series colors, cycled. If `None`, uses the default palette.
    pub palette: Option<Vec<RGBColor>>,

    /// Background color (default: WHITE)
    pub background: RGBColor,

    /// Line width in pixels (default: 2)
    pub line_width: u32,

    /// Show grid lines (default: true)
    pub show_grid: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            title: "Plot".to_string(),
            xlabel: String::new(),
            ylabel: "Runtime (s)".to_string(),
            palette: None,
            background: WHITE,
            line_width: 2,
            show_grid: true,
        }
    }
}

const DEFAULT_PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

impl PlotConfig {
    pub fn new(title: impl Into<String>, xlabel: impl Into<String>, ylabel: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            xlabel: xlabel.into(),
            ylabel: ylabel.into(),
            ..Self::default()
        }
    }

    /// Runtime, speedup or efficiency against the process count.
    pub fn scaling(metric: &str) -> Self {
        let ylabel = match metric {
            "Speedup" | "Efficiency" => metric.to_string(),
            _ => "Runtime (s)".to_string(),
        };
        Self::new(format!("{metric} vs Processes"), "Processes", ylabel)
    }

    /// Median execution time of every interface of `kernel`, per dataset.
    pub fn comparison(kernel: &str) -> Self {
        Self::new(
            format!("{kernel}: median execution time (95% CI)"),
            "Dataset",
            "Execution time (s)",
        )
    }

    pub fn histogram(title: impl Into<String>) -> Self {
        Self::new(title, "Completion time (s)", "Runs")
    }

    pub fn cache_misses() -> Self {
        Self::new("Average cache misses", "Run", "Misses")
    }

    pub fn variance() -> Self {
        Self::new(
            "Runtime vs Data Size with Variability",
            "Data Size (N)",
            "Runtime (seconds)",
        )
    }

    /// Color of the `index`-th series.
    pub fn color(&self, index: usize) -> RGBColor {
        match &self.palette {
            Some(colors) if !colors.is_empty() => colors[index % colors.len()],
            _ => DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_wraps_around() {
        let config = PlotConfig::default();
        assert_eq!(config.color(0), config.color(DEFAULT_PALETTE.len()));
        assert_ne!(config.color(0), config.color(1));

        let config = PlotConfig {
            palette: Some(vec![RED, BLUE]),
            ..PlotConfig::default()
        };
        assert_eq!(config.color(2), RED);
        assert_eq!(config.color(3), BLUE);
    }

    #[test]
    fn scaling_labels() {
        assert_eq!(PlotConfig::scaling("Speedup").ylabel, "Speedup");
        assert_eq!(PlotConfig::scaling("Runtime").ylabel, "Runtime (s)");
        assert_eq!(PlotConfig::scaling("Efficiency").title, "Efficiency vs Processes");
    }
}
