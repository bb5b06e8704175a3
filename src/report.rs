//! Derived metrics over the aggregated tables.
//!
//! Scaling metrics are computed against a sequential baseline: the mean runtime of the `std`
//! interface at one process for the same kernel and size.

use crate::{
    error::{Error, IoResultExt, Result},
    interface::Interface,
    perf_report::{AggregatedRow, Summary},
    utils::{bootstrap_median_ci, median},
};

use log::warn;
use serde::Serialize;
use statistical::mean;

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

/// Loads a `runtime_analysis.csv` table.
pub fn load_rows(path: &Path) -> Result<Vec<AggregatedRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Scaling metrics of one aggregated row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalingPoint {
    pub kernel: String,
    pub size: String,
    pub processes: usize,
    pub interface: Interface,
    pub mean: f64,
    pub std: f64,
    pub baseline: f64,
    pub speedup: f64,
    pub efficiency: f64,
}

/// Speedup and efficiency of every row.
///
/// The baseline of a `(kernel, size)` pair is the average mean runtime of its single-process
/// `std` rows, else `fallback`. A row with neither is a [`Error::NoBaseline`].
pub fn scaling(rows: &[AggregatedRow], fallback: Option<f64>) -> Result<Vec<ScalingPoint>> {
    let mut baselines: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|r| r.interface == Interface::Std && r.processes == 1)
    {
        baselines
            .entry((row.kernel.as_str(), row.size.as_str()))
            .or_default()
            .push(row.mean);
    }

    rows.iter()
        .map(|row| {
            let baseline = baselines
                .get(&(row.kernel.as_str(), row.size.as_str()))
                .map(|means| mean(means))
                .or(fallback)
                .ok_or(Error::NoBaseline)?;
            let speedup = baseline / row.mean;
            Ok(ScalingPoint {
                kernel: row.kernel.clone(),
                size: row.size.clone(),
                processes: row.processes,
                interface: row.interface,
                mean: row.mean,
                std: row.std,
                baseline,
                speedup,
                efficiency: speedup / row.processes.max(1) as f64,
            })
        })
        .collect()
}

/// Median of one (dataset, interface) series of a measurement file, with its confidence band.
#[derive(Clone, Debug, PartialEq)]
pub struct MedianBand {
    pub dataset: String,
    pub interface: String,
    pub median: f64,
    pub low: f64,
    pub high: f64,
}

/// Medians and bootstrap confidence bands of every series of a measurement file.
pub fn median_bands(
    measurements: &BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    level: f64,
    resamples: usize,
    seed: u64,
) -> Vec<MedianBand> {
    let mut bands = Vec::new();
    for (dataset, per_interface) in measurements {
        for (interface, times) in per_interface {
            let (Some(median), Some((low, high))) = (
                median(times),
                bootstrap_median_ci(times, level, resamples, seed),
            ) else {
                warn!("{dataset} {interface}: no measurement");
                continue;
            };
            bands.push(MedianBand {
                dataset: dataset.clone(),
                interface: interface.clone(),
                median,
                low,
                high,
            });
        }
    }
    bands
}

/// One line of a runtime variability table.
#[derive(Clone, Debug, PartialEq)]
pub struct VarianceRecord {
    pub kernel: String,
    pub size: f64,
    pub processes: usize,
    pub interface: String,
    pub time: f64,
}

/// Loads a `kernel size processes interface time variance` table, separated by spaces or commas.
///
/// Lines that do not have that shape are skipped with a warning.
pub fn load_variance_table(path: &Path) -> Result<Vec<VarianceRecord>> {
    let text = fs::read_to_string(path).at(path)?;
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            continue;
        }
        let record = parse_variance_fields(&fields);
        match record {
            Some(record) => records.push(record),
            None => warn!("{}:{}: skipping malformed line", path.display(), idx + 1),
        }
    }
    Ok(records)
}

fn parse_variance_fields(fields: &[&str]) -> Option<VarianceRecord> {
    let [kernel, size, processes, interface, time, ..] = fields else {
        return None;
    };
    Some(VarianceRecord {
        kernel: kernel.to_string(),
        size: size.parse().ok()?,
        processes: processes.parse().ok()?,
        interface: interface.to_string(),
        time: time.parse().ok()?,
    })
}

/// `(size, mean, std)` of the times of each size, sorted by size.
pub fn variance_by_size(records: &[VarianceRecord]) -> Vec<(f64, f64, f64)> {
    let mut by_size: Vec<(f64, Vec<f64>)> = Vec::new();
    for record in records {
        match by_size.iter_mut().find(|(s, _)| *s == record.size) {
            Some((_, times)) => times.push(record.time),
            None => by_size.push((record.size, vec![record.time])),
        }
    }
    by_size.sort_by(|a, b| a.0.total_cmp(&b.0));
    by_size
        .into_iter()
        .map(|(size, mut times)| {
            let stats = Summary::new(&mut times);
            let (m, s) = stats.map_or((0.0, 0.0), |s| (s.mean, s.std));
            (size, m, s)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(interface: Interface, processes: usize, mean: f64) -> AggregatedRow {
        AggregatedRow::new(
            "gemver",
            "N=10000",
            processes,
            interface,
            Summary::new(&mut [mean]).unwrap(),
        )
    }

    #[test]
    fn speedup_and_efficiency_against_sequential_baseline() {
        let rows = vec![row(Interface::Std, 1, 10.0), row(Interface::Mpi, 8, 2.5)];
        let points = scaling(&rows, None).unwrap();
        assert_eq!(points[1].speedup, 4.0);
        assert_eq!(points[1].efficiency, 0.5);
        assert_eq!(points[0].speedup, 1.0);
    }

    #[test]
    fn fallback_baseline_when_no_sequential_row() {
        let rows = vec![row(Interface::Omp, 4, 5.0)];
        assert!(matches!(scaling(&rows, None), Err(Error::NoBaseline)));
        let points = scaling(&rows, Some(10.0)).unwrap();
        assert_eq!(points[0].speedup, 2.0);
        assert_eq!(points[0].efficiency, 0.5);
    }

    #[test]
    fn baseline_is_per_size() {
        let mut other = row(Interface::Std, 1, 1.0);
        other.size = "N=100".to_string();
        let rows = vec![row(Interface::Std, 1, 10.0), other, row(Interface::Mpi, 2, 5.0)];
        let points = scaling(&rows, None).unwrap();
        assert_eq!(points[2].baseline, 10.0);
        assert_eq!(points[1].baseline, 1.0);
    }

    #[test]
    fn loads_aggregated_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime_analysis.csv");
        fs::write(
            &path,
            "Kernel,Size,Processes,Type,Mean Runtime,STD,Min Runtime,Median Runtime,Max Runtime,Samples\n\
             gemver,N=4000,4,mpi,0.8,0.1,0.7,0.8,0.9,2\n",
        )
        .unwrap();
        let rows = load_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].interface, Interface::Mpi);
        assert_eq!(rows[0].samples, 2);
    }

    #[test]
    fn median_bands_enclose_the_median() {
        let mut measurements = BTreeMap::new();
        measurements.insert(
            "N_1000".to_string(),
            BTreeMap::from([("std".to_string(), vec![1.0, 1.2, 0.9, 1.1, 1.0])]),
        );
        let bands = median_bands(&measurements, 0.95, 200, 7);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].median, 1.0);
        assert!(bands[0].low <= bands[0].median && bands[0].median <= bands[0].high);
    }

    #[test]
    fn variance_tables_group_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.txt");
        fs::write(
            &path,
            "gemver 10000 4 mpi 1.0 0.0\ngemver,10000,4,mpi,3.0,0.0\nbroken line\ngemver 25000 4 mpi 5.0 0\n",
        )
        .unwrap();
        let records = load_variance_table(&path).unwrap();
        assert_eq!(records.len(), 3);
        let stats = variance_by_size(&records);
        assert_eq!(stats, vec![(10000.0, 2.0, 1.0), (25000.0, 5.0, 0.0)]);
    }
}
