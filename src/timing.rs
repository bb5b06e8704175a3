//! Parsing of timing values out of captured kernel output.
//!
//! Kernels print their wall time on stdout, one value per line and one line per MPI rank. Three
//! shapes are accepted:
//!
//! ```text
//! 0.123456
//! Time: 0.123456
//! Rank 3, Time: 0.123456
//! ```
//!
//! A line of `=` separates repetitions when several runs were appended to the same file. Other
//! `key: value` lines such as `N: 1000` or `Loop 1 Time: 0.1` are informational. Anything else
//! is malformed: it is skipped with a warning, never fatal.

use crate::interface::Interface;

use log::{debug, warn};

use std::path::Path;

/// Classification of one output line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Line {
    Timing(f64),
    Delimiter,
    Info,
    Blank,
    Malformed,
}

/// Classifies one line of kernel output.
pub fn classify(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if line.len() >= 3 && line.chars().all(|c| c == '=') {
        return Line::Delimiter;
    }
    if let Ok(value) = line.parse::<f64>() {
        return if value.is_finite() {
            Line::Timing(value)
        } else {
            Line::Malformed
        };
    }
    match line.rsplit_once(':') {
        Some((label, value)) => {
            let label = label.trim_end();
            // `Time:` or `Rank 3, Time:` (any spacing), but not `Loop 1 Time:` nor `Total time:`.
            let is_timing_label = label == "Time"
                || label
                    .strip_suffix("Time")
                    .is_some_and(|l| l.trim_end().ends_with(','));
            match value.trim().parse::<f64>() {
                Ok(v) if is_timing_label && v.is_finite() => Line::Timing(v),
                Ok(_) if !is_timing_label => Line::Info,
                _ => Line::Malformed,
            }
        }
        None => Line::Malformed,
    }
}

/// Timing values of one captured output file, split on delimiter lines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedOutput {
    /// Timing values of each delimited segment, in file order.
    pub segments: Vec<Vec<f64>>,
    /// Number of malformed lines skipped.
    pub skipped: usize,
}

impl ParsedOutput {
    /// All timing values, ignoring segment boundaries.
    pub fn values(&self) -> Vec<f64> {
        self.segments.iter().flatten().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Vec::is_empty)
    }

    /// Number of timing lines before the first delimiter.
    ///
    /// Hybrid MPI+OpenMP outputs written without an explicit process count print one line per
    /// rank and close every repetition with a delimiter, so the first segment's length is the
    /// process count.
    pub fn inferred_processes(&self) -> Option<usize> {
        self.segments
            .iter()
            .find(|s| !s.is_empty())
            .map(Vec::len)
    }
}

/// Parses a whole output file. `source` only labels warnings.
pub fn parse_output(text: &str, source: &Path) -> ParsedOutput {
    let mut parsed = ParsedOutput {
        segments: vec![Vec::new()],
        skipped: 0,
    };
    for (idx, line) in text.lines().enumerate() {
        match classify(line) {
            Line::Timing(v) => {
                if let Some(segment) = parsed.segments.last_mut() {
                    segment.push(v);
                }
            }
            Line::Delimiter => parsed.segments.push(Vec::new()),
            Line::Info if line.contains("Time") => warn!(
                "{}:{}: ignoring timing '{}', not a per-run time",
                source.display(),
                idx + 1,
                line.trim()
            ),
            Line::Info => debug!("{}:{}: ignoring '{}'", source.display(), idx + 1, line.trim()),
            Line::Blank => {}
            Line::Malformed => {
                warn!(
                    "{}:{}: skipping malformed line '{}'",
                    source.display(),
                    idx + 1,
                    line.trim()
                );
                parsed.skipped += 1;
            }
        }
    }
    // Trailing delimiters leave an empty segment behind.
    while parsed.segments.len() > 1 && parsed.segments.last().is_some_and(Vec::is_empty) {
        parsed.segments.pop();
    }
    parsed
}

/// Wall time of each run in `values`.
///
/// For MPI interfaces the values are per-rank times: they are chunked by `processes` and the
/// slowest rank of each chunk gates the run. Other interfaces print one value per run.
pub fn run_times(values: &[f64], interface: Interface, processes: usize, source: &Path) -> Vec<f64> {
    if !interface.uses_mpi() || processes <= 1 {
        return values.to_vec();
    }
    if values.len() % processes != 0 {
        warn!(
            "{}: {} rank timings are not a multiple of {} processes, last run is partial",
            source.display(),
            values.len(),
            processes
        );
    }
    values
        .chunks(processes)
        .map(|chunk| chunk.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> &'static Path {
        Path::new("test.out")
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(classify("0.5"), Line::Timing(0.5));
        assert_eq!(classify("  1e-3 "), Line::Timing(0.001));
        assert_eq!(classify("Time: 2.25"), Line::Timing(2.25));
        assert_eq!(classify("Rank 1, Time: 0.75"), Line::Timing(0.75));
        assert_eq!(classify("Rank 0,Time: 0.5"), Line::Timing(0.5));
        assert_eq!(classify("Rank 2 ,  Time : 0.25"), Line::Timing(0.25));
        assert_eq!(classify("N: 1000"), Line::Info);
        assert_eq!(classify("Loop 1 Time: 0.1"), Line::Info);
        assert_eq!(classify("==============="), Line::Delimiter);
        assert_eq!(classify(""), Line::Blank);
        assert_eq!(classify("Segmentation fault"), Line::Malformed);
        assert_eq!(classify("Time: fast"), Line::Malformed);
        assert_eq!(classify("nan"), Line::Malformed);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let parsed = parse_output("0.5\ngarbage\n0.7\n", src());
        assert_eq!(parsed.values(), vec![0.5, 0.7]);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn rank_lines_without_spacing_are_kept() {
        let parsed = parse_output("Rank 0,Time: 0.5\nRank 1,Time: 0.7\nLoop 1 Time: 0.1\n", src());
        assert_eq!(parsed.values(), vec![0.5, 0.7]);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn mpi_run_time_is_slowest_rank() {
        let times = run_times(&[0.5, 0.7, 0.6], Interface::Mpi, 3, src());
        assert_eq!(times, vec![0.7]);
    }

    #[test]
    fn mpi_values_are_chunked_per_run() {
        let times = run_times(&[0.5, 0.7, 0.9, 0.2], Interface::Mpi, 2, src());
        assert_eq!(times, vec![0.7, 0.9]);
        let partial = run_times(&[0.5, 0.7, 0.9], Interface::Mpi, 2, src());
        assert_eq!(partial, vec![0.7, 0.9]);
    }

    #[test]
    fn non_mpi_values_are_runs() {
        let times = run_times(&[1.0, 2.0], Interface::Omp, 8, src());
        assert_eq!(times, vec![1.0, 2.0]);
    }

    #[test]
    fn hybrid_process_count_from_delimiters() {
        let text = "Rank 0, Time: 1.0\nRank 1, Time: 1.2\nRank 2, Time: 0.9\n===============\n\
                    Rank 0, Time: 1.1\nRank 1, Time: 1.0\nRank 2, Time: 1.3\n===============\n";
        let parsed = parse_output(text, src());
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.inferred_processes(), Some(3));
        let times = run_times(&parsed.values(), Interface::MpiOmp, 3, src());
        assert_eq!(times, vec![1.2, 1.3]);
    }

    #[test]
    fn hybrid_without_delimiter_is_one_run() {
        let parsed = parse_output("Time: 1.0\nTime: 2.0\n", src());
        assert_eq!(parsed.inferred_processes(), Some(2));
        assert_eq!(parse_output("", src()).inferred_processes(), None);
        assert!(parse_output("\n\n", src()).is_empty());
    }
}
