//! Performance report related structures and functions.
//!
//! This module defines the data structures holding the statistics extracted from the recorded
//! execution times of the benchmarked kernels, and the rows of the aggregated tables written by
//! the result aggregator.

use crate::interface::Interface;

use serde::{Deserialize, Serialize};
use statistical::{mean, population_standard_deviation};

use std::fmt;

/// Statistics of a set of recorded runtimes, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    /// Number of runs.
    pub count: usize,
    /// Average runtime.
    pub mean: f64,
    /// Runtime population standard deviation.
    pub std: f64,
    /// Minimum recorded runtime.
    pub min: f64,
    /// Median recorded runtime.
    pub median: f64,
    /// Maximum recorded runtime.
    pub max: f64,
}

impl Summary {
    /// Computes the statistics of `durations`, or `None` when there is nothing to summarise.
    pub fn new(durations: &mut [f64]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }

        // Sort durations to avoid having to do two passes to get both min and max elements
        durations.sort_by(f64::total_cmp);

        let count = durations.len();
        let min = durations[0];
        let max = durations[count - 1];
        let median = if count % 2 == 0 {
            (durations[count / 2 - 1] + durations[count / 2]) / 2.0
        } else {
            durations[count / 2]
        };
        let mean = mean(durations);
        let std = match count {
            1 => 0.0,
            _ => population_standard_deviation(durations, Some(mean)),
        };

        Some(Self {
            count,
            mean,
            std,
            min,
            median,
            max,
        })
    }
}

/// One line of the runtime analysis: statistics of one (kernel, size, processes, interface).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    #[serde(rename = "Kernel")]
    pub kernel: String,
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Processes")]
    pub processes: usize,
    #[serde(rename = "Type")]
    pub interface: Interface,
    #[serde(rename = "Mean Runtime")]
    pub mean: f64,
    #[serde(rename = "STD")]
    pub std: f64,
    #[serde(rename = "Min Runtime")]
    pub min: f64,
    #[serde(rename = "Median Runtime")]
    pub median: f64,
    #[serde(rename = "Max Runtime")]
    pub max: f64,
    #[serde(rename = "Samples")]
    pub samples: usize,
}

impl AggregatedRow {
    pub fn new(
        kernel: &str,
        size: &str,
        processes: usize,
        interface: Interface,
        summary: Summary,
    ) -> Self {
        Self {
            kernel: kernel.to_string(),
            size: size.to_string(),
            processes,
            interface,
            mean: summary.mean,
            std: summary.std,
            min: summary.min,
            median: summary.median,
            max: summary.max,
            samples: summary.count,
        }
    }
}

impl fmt::Display for AggregatedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {:<22} np={:<3} {:<15} mean={:.6}s std={:.6}s n={}",
            self.kernel, self.size, self.processes, self.interface, self.mean, self.std, self.samples
        )
    }
}

/// One recorded run, as written to `runs.csv`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    #[serde(rename = "Kernel")]
    pub kernel: String,
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Processes")]
    pub processes: usize,
    #[serde(rename = "Type")]
    pub interface: Interface,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Runtime")]
    pub runtime: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_population_std() {
        let s = Summary::new(&mut [0.9, 0.7]).unwrap();
        assert_eq!(s.count, 2);
        assert!((s.mean - 0.8).abs() < 1e-12);
        assert!((s.std - 0.1).abs() < 1e-12);
        assert_eq!((s.min, s.max), (0.7, 0.9));
        assert!((s.median - 0.8).abs() < 1e-12);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let s = Summary::new(&mut [2.5]).unwrap();
        assert_eq!(s.std, 0.0);
        assert_eq!(s.median, 2.5);
    }

    #[test]
    fn empty_samples_have_no_summary() {
        assert!(Summary::new(&mut []).is_none());
    }

    #[test]
    fn rows_print_as_aligned_report_lines() {
        let row = AggregatedRow::new(
            "gemver",
            "N=10000",
            4,
            Interface::Mpi,
            Summary::new(&mut [1.0, 3.0]).unwrap(),
        );
        let line = row.to_string();
        let fields: Vec<_> = line.split_whitespace().collect();
        assert_eq!(
            fields,
            vec!["gemver", "N=10000", "np=4", "mpi", "mean=2.000000s", "std=1.000000s", "n=2"]
        );
        assert_eq!(line.find("np="), Some(36));
        assert_eq!(line.find("mean="), Some(59));
    }

    #[test]
    fn rows_serialize_with_report_headers() {
        let row = AggregatedRow::new(
            "gemver",
            "N=10000",
            4,
            Interface::Mpi,
            Summary::new(&mut [1.0, 3.0]).unwrap(),
        );
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&row).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Kernel,Size,Processes,Type,Mean Runtime,STD,Min Runtime,Median Runtime,Max Runtime,Samples")
        );
        assert_eq!(lines.next(), Some("gemver,N=10000,4,mpi,2.0,1.0,1.0,2.0,3.0,2"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let back: AggregatedRow = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(back, row);
    }
}
