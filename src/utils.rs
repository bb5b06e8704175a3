//! Utility functions.

use crate::{
    consts,
    error::{IoResultExt, Result},
};

use chrono::{Local, NaiveDateTime};
use rand::prelude::*;

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

/// Current local time formatted as a session timestamp.
pub fn timestamp_now() -> String {
    Local::now().format(consts::TIMESTAMP_FORMAT).to_string()
}

/// Parses a session timestamp (directory name or file stem).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, consts::TIMESTAMP_FORMAT).ok()
}

/// Sub-directories of `parent` whose name is a session timestamp, oldest first.
pub fn timestamp_dirs(parent: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(parent).at(parent)? {
        let path = entry.at(parent)?.path();
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_timestamp);
        if let (true, Some(stamp)) = (path.is_dir(), stamp) {
            dirs.push((stamp, path));
        }
    }
    dirs.sort();
    Ok(dirs.into_iter().map(|(_, p)| p).collect())
}

/// Most recent `<timestamp>.<ext>` file in `dir`.
pub fn latest_timestamped_file(dir: &Path, ext: &str) -> Result<Option<PathBuf>> {
    let mut latest: Option<(NaiveDateTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).at(dir)? {
        let path = entry.at(dir)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ext) {
            continue;
        }
        let Some(stamp) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_timestamp)
        else {
            continue;
        };
        if latest.as_ref().map_or(true, |(best, _)| stamp > *best) {
            latest = Some((stamp, path));
        }
    }
    Ok(latest.map(|(_, p)| p))
}

/// Relative path leading from `dir` back to its root, e.g. `a/b/c` → `../../..`.
///
/// `dir` is expected to be relative and free of `..` components, as registry entries are.
pub fn relative_root(dir: &Path) -> PathBuf {
    let depth = dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    if depth == 0 {
        return PathBuf::from(".");
    }
    (0..depth).map(|_| "..").collect()
}

/// Linear-interpolated percentile (`q` in `[0, 1]`) of an already sorted slice.
pub fn percentile<T: num::Float>(sorted: &[T], q: T) -> Option<T> {
    if sorted.is_empty() {
        return None;
    }
    let last = <T as num::NumCast>::from(sorted.len() - 1)?;
    let rank = q.max(T::zero()).min(T::one()) * last;
    let lo = rank.floor();
    let hi = rank.ceil();
    let (lo_idx, hi_idx) = (lo.to_usize()?, hi.to_usize()?);
    Some(sorted[lo_idx] + (sorted[hi_idx] - sorted[lo_idx]) * (rank - lo))
}

/// Median of an unsorted sample set.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(statistical::median(samples))
}

/// Bootstrap confidence interval of the median.
///
/// Resamples `samples` with replacement `resamples` times and returns the `(1 - level) / 2` and
/// `(1 + level) / 2` percentiles of the resampled medians.
pub fn bootstrap_median_ci(
    samples: &[f64],
    level: f64,
    resamples: usize,
    seed: u64,
) -> Option<(f64, f64)> {
    if samples.is_empty() || resamples == 0 {
        return None;
    }
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    let mut scratch = vec![0.0; samples.len()];
    let mut medians: Vec<f64> = (0..resamples)
        .map(|_| {
            for slot in scratch.iter_mut() {
                *slot = *samples.choose(&mut rng).unwrap_or(&samples[0]);
            }
            statistical::median(&scratch)
        })
        .collect();
    medians.sort_by(f64::total_cmp);

    let tail = (1.0 - level) / 2.0;
    Some((percentile(&medians, tail)?, percentile(&medians, 1.0 - tail)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_roots() {
        assert_eq!(
            relative_root(Path::new("linear-algebra/blas/gemver")),
            Path::new("../../..")
        );
        assert_eq!(relative_root(Path::new("./stencils/adi")), Path::new("../.."));
        assert_eq!(relative_root(Path::new("")), Path::new("."));
    }

    #[test]
    fn timestamps_round_trip() {
        let now = timestamp_now();
        assert!(parse_timestamp(&now).is_some());
        assert!(parse_timestamp("2024_12_20__09-57-12").is_some());
        assert!(parse_timestamp("data").is_none());
    }

    #[test]
    fn percentiles() {
        let v: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 0.5), Some(3.0));
        assert_eq!(percentile(&v, 1.0), Some(5.0));
        assert!((percentile(&v, 0.95).unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(percentile::<f64>(&[], 0.5), None);
    }

    #[test]
    fn bootstrap_interval_brackets_the_median() {
        let samples = [1.0, 1.1, 0.9, 1.05, 0.95, 1.02, 0.98];
        let (lo, hi) = bootstrap_median_ci(&samples, 0.95, 500, 7).unwrap();
        assert!(lo <= 1.0 && 1.0 <= hi);
        assert_eq!(
            bootstrap_median_ci(&samples, 0.95, 500, 7),
            Some((lo, hi))
        );
    }

    #[test]
    fn latest_file_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2024_12_20__09-57-12.json", "2024_12_21__08-00-00.json", "notes.json"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let latest = latest_timestamped_file(dir.path(), "json").unwrap().unwrap();
        assert!(latest.ends_with("2024_12_21__08-00-00.json"));
    }
}
