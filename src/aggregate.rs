//! Result aggregation.
//!
//! Reads back the run directories written by the drivers (locally, by batch jobs, or by
//! [`crate::merge`]), extracts one wall time per run and summarises every
//! `(kernel, size, processes, interface)` group into the runtime analysis tables.
//!
//! Parsing is best effort: directories outside the naming grammar are skipped, malformed lines
//! are skipped with a warning, and output files holding no timing at all are reported and
//! counted. Only an output tree without any run directory is an error.

use crate::{
    config::Dataset,
    error::{Error, IoResultExt, Result},
    interface::Interface,
    kmeans,
    layout::{self, RunDir},
    perf_report::{AggregatedRow, RunRow, Summary},
    timing,
    utils::timestamp_dirs,
};

use log::{debug, info, warn};
use rayon::prelude::*;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// How to aggregate an output tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Aggregate every timestamp directory instead of the latest one only.
    pub all: bool,
    /// Keep only the k-means fastest cluster of each group, with this many clusters.
    pub fastest_cluster: Option<usize>,
    /// Seed of the k-means initialisation.
    pub seed: u64,
}

/// Sessions to aggregate under `outputs` (an `outputs/<env>` directory): the latest timestamp
/// directory, or all of them, oldest first.
pub fn select_sessions(outputs: &Path, all: bool) -> Result<Vec<PathBuf>> {
    if !outputs.is_dir() {
        return Err(Error::NoData(outputs.to_path_buf()));
    }
    let mut sessions = timestamp_dirs(outputs)?;
    if sessions.is_empty() {
        return Err(Error::NoData(outputs.to_path_buf()));
    }
    if !all {
        sessions = sessions.split_off(sessions.len() - 1);
    }
    Ok(sessions)
}

/// Run directories of a session whose name follows the naming grammar, sorted by name.
pub fn run_dirs(session: &Path) -> Result<Vec<(RunDir, PathBuf)>> {
    let mut runs = Vec::new();
    for entry in fs::read_dir(session).at(session)? {
        let path = entry.at(session)?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match RunDir::parse(name) {
            Some(run) => runs.push((run, path)),
            None => debug!("skipping {}: not a run directory", path.display()),
        }
    }
    runs.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(runs)
}

/// Captured stdout files of a run directory: `out/*.out`, or `*.out` at the top level for merged
/// trees.
pub fn output_files(run_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for dir in [run_dir.join("out"), run_dir.to_path_buf()] {
        if !dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&dir).at(&dir)? {
            let path = entry.at(&dir)?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "out") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Wall times extracted from one run directory.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSamples {
    pub run: RunDir,
    /// `(process count, source file, wall time)` of every run.
    pub samples: Vec<(usize, PathBuf, f64)>,
    /// Output files that held no timing value.
    pub empty_files: Vec<PathBuf>,
}

/// Parses every output file of a run directory.
pub fn parse_run_dir(run: &RunDir, dir: &Path) -> Result<RunSamples> {
    let mut samples = Vec::new();
    let mut empty_files = Vec::new();

    for file in output_files(dir)? {
        let text = fs::read_to_string(&file).at(&file)?;
        let parsed = timing::parse_output(&text, &file);
        if parsed.is_empty() {
            warn!("{}: no timing value", file.display());
            empty_files.push(file);
            continue;
        }

        let processes = run
            .processes
            .or_else(|| {
                run.interface
                    .uses_mpi()
                    .then(|| parsed.inferred_processes())
                    .flatten()
            })
            .unwrap_or(1);
        for time in timing::run_times(&parsed.values(), run.interface, processes, &file) {
            samples.push((processes, file.clone(), time));
        }
    }

    Ok(RunSamples {
        run: run.clone(),
        samples,
        empty_files,
    })
}

/// Aggregated tables of one or several sessions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregation {
    pub rows: Vec<AggregatedRow>,
    pub runs: Vec<RunRow>,
    /// Output files that held no timing value.
    pub empty_files: Vec<PathBuf>,
}

type GroupKey = (String, Dataset, usize, Interface);

/// Aggregates the given sessions.
///
/// Run directories are parsed in parallel; the resulting tables are sorted by kernel, size,
/// interface and process count. Fails with [`Error::NoData`] when no session holds a run
/// directory.
pub fn aggregate(sessions: &[PathBuf], opts: &AggregateOptions) -> Result<Aggregation> {
    let mut dirs = Vec::new();
    for session in sessions {
        dirs.extend(run_dirs(session)?);
    }
    if dirs.is_empty() {
        let root = sessions
            .first()
            .and_then(|s| s.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        return Err(Error::NoData(root));
    }
    info!("Parsing {} run directories", dirs.len());

    let parsed = dirs
        .par_iter()
        .map(|(run, dir)| parse_run_dir(run, dir))
        .collect::<Result<Vec<_>>>()?;

    let mut aggregation = Aggregation::default();
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for samples in parsed {
        let run = samples.run;
        for (processes, source, time) in samples.samples {
            aggregation.runs.push(RunRow {
                kernel: run.kernel.clone(),
                size: run.dataset.size(),
                processes,
                interface: run.interface,
                source: source.display().to_string(),
                runtime: time,
            });
            groups
                .entry((run.kernel.clone(), run.dataset.clone(), processes, run.interface))
                .or_default()
                .push(time);
        }
        aggregation.empty_files.extend(samples.empty_files);
    }

    for ((kernel, dataset, processes, interface), mut times) in groups {
        if let Some(k) = opts.fastest_cluster {
            if let Some(cluster) = kmeans::fastest_cluster(&times, k, opts.seed) {
                debug!(
                    "{kernel} {dataset} np={processes} {interface}: kept {}/{} samples",
                    cluster.samples.len(),
                    times.len()
                );
                times = cluster.samples;
            }
        }
        if let Some(summary) = Summary::new(&mut times) {
            aggregation.rows.push(AggregatedRow::new(
                &kernel,
                &dataset.size(),
                processes,
                interface,
                summary,
            ));
        }
    }

    aggregation.rows.sort_by(|a, b| {
        (&a.kernel, &a.size, a.interface, a.processes).cmp(&(
            &b.kernel,
            &b.size,
            b.interface,
            b.processes,
        ))
    });
    aggregation.runs.sort_by(|a, b| {
        (&a.kernel, &a.size, a.interface, a.processes, &a.source).cmp(&(
            &b.kernel,
            &b.size,
            b.interface,
            b.processes,
            &b.source,
        ))
    });

    if !aggregation.empty_files.is_empty() {
        warn!(
            "{} output file(s) held no timing value",
            aggregation.empty_files.len()
        );
    }
    Ok(aggregation)
}

/// Writes `runtime_analysis.csv`, its JSON twin and `runs.csv` into
/// `<analysis>/<timestamp>/`, returning that directory.
pub fn write_analysis(
    analysis: &Path,
    timestamp: &str,
    aggregation: &Aggregation,
) -> Result<PathBuf> {
    let dir = layout::analysis_dir(analysis, timestamp);
    fs::create_dir_all(&dir).at(&dir)?;

    let mut writer = csv::Writer::from_path(dir.join("runtime_analysis.csv"))?;
    for row in &aggregation.rows {
        writer.serialize(row)?;
    }
    writer.flush().at(dir.join("runtime_analysis.csv"))?;

    let json = dir.join("runtime_analysis.json");
    fs::write(&json, serde_json::to_string_pretty(&aggregation.rows)?).at(&json)?;

    let mut writer = csv::Writer::from_path(dir.join("runs.csv"))?;
    for run in &aggregation.runs {
        writer.serialize(run)?;
    }
    writer.flush().at(dir.join("runs.csv"))?;

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn mpi_runs_take_the_slowest_rank() {
        let root = tempfile::tempdir().unwrap();
        let session = root.path().join("2024_12_20__09-57-12");
        let run = session.join("gemver_N_10000_np_2_mpi");
        write(&run.join("out/0.out"), "Rank 0, Time: 0.5\nRank 1, Time: 0.7\n");
        write(&run.join("out/1.out"), "Rank 0, Time: 0.9\nRank 1, Time: 0.6\n");

        let agg = aggregate(&[session], &AggregateOptions {
            all: false,
            fastest_cluster: None,
            seed: 0,
        })
        .unwrap();

        assert_eq!(agg.rows.len(), 1);
        let row = &agg.rows[0];
        assert_eq!(
            (row.kernel.as_str(), row.size.as_str(), row.processes, row.interface),
            ("gemver", "N=10000", 2, Interface::Mpi)
        );
        assert!((row.mean - 0.8).abs() < 1e-12);
        assert!((row.std - 0.1).abs() < 1e-12);
        assert_eq!(row.samples, 2);
        assert_eq!(agg.runs.len(), 2);
    }

    #[test]
    fn skips_foreign_directories_and_counts_empty_files() {
        let root = tempfile::tempdir().unwrap();
        let session = root.path().join("2024_12_20__09-57-12");
        write(&session.join("plots/readme.txt"), "hello");
        let run = session.join("atax_medium_np_1_std");
        write(&run.join("out/0.out"), "1.5\n");
        write(&run.join("out/1.out"), "Segmentation fault\n");

        let agg = aggregate(&[session], &AggregateOptions {
            all: false,
            fastest_cluster: None,
            seed: 0,
        })
        .unwrap();
        assert_eq!(agg.rows.len(), 1);
        assert_eq!(agg.rows[0].mean, 1.5);
        assert_eq!(agg.empty_files.len(), 1);
    }

    #[test]
    fn hybrid_process_count_is_inferred() {
        let root = tempfile::tempdir().unwrap();
        let session = root.path().join("2024_12_20__09-57-12");
        let run = session.join("jacobi-2d_N_1000_mpi+omp");
        write(
            &run.join("merged.out"),
            "Time: 1.0\nTime: 2.0\n===============\nTime: 3.0\nTime: 1.0\n===============\n",
        );

        let agg = aggregate(&[session], &AggregateOptions {
            all: false,
            fastest_cluster: None,
            seed: 0,
        })
        .unwrap();
        assert_eq!(agg.rows[0].processes, 2);
        assert_eq!(agg.rows[0].samples, 2);
        assert_eq!(agg.rows[0].mean, 2.5);
    }

    #[test]
    fn fastest_cluster_drops_slow_outliers() {
        let root = tempfile::tempdir().unwrap();
        let session = root.path().join("2024_12_20__09-57-12");
        let run = session.join("atax_medium_np_4_omp");
        write(&run.join("out/0.out"), "1.0\n1.0\n1.0\n5.0\n5.1\n");

        let opts = AggregateOptions {
            all: false,
            fastest_cluster: Some(2),
            seed: 3,
        };
        let agg = aggregate(&[session], &opts).unwrap();
        assert_eq!(agg.rows[0].samples, 3);
        assert_eq!(agg.rows[0].mean, 1.0);
    }

    #[test]
    fn empty_tree_is_no_data() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            select_sessions(&root.path().join("euler"), false),
            Err(Error::NoData(_))
        ));
        fs::create_dir_all(root.path().join("2024_12_20__09-57-12")).unwrap();
        let sessions = select_sessions(root.path(), false).unwrap();
        let opts = AggregateOptions {
            all: false,
            fastest_cluster: None,
            seed: 0,
        };
        assert!(matches!(aggregate(&sessions, &opts), Err(Error::NoData(_))));
    }

    #[test]
    fn latest_session_only_unless_all() {
        let root = tempfile::tempdir().unwrap();
        for ts in ["2024_12_20__09-57-12", "2024_12_21__08-00-00", "2023_01_01__00-00-00"] {
            fs::create_dir_all(root.path().join(ts)).unwrap();
        }
        let latest = select_sessions(root.path(), false).unwrap();
        assert_eq!(latest, vec![root.path().join("2024_12_21__08-00-00")]);
        let all = select_sessions(root.path(), true).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], root.path().join("2023_01_01__00-00-00"));
    }

    #[test]
    fn writes_the_analysis_tables() {
        let root = tempfile::tempdir().unwrap();
        let session = root.path().join("2024_12_20__09-57-12");
        write(&session.join("atax_small_np_1_std/out/0.out"), "2.0\n");
        let opts = AggregateOptions {
            all: false,
            fastest_cluster: None,
            seed: 0,
        };
        let agg = aggregate(&[session], &opts).unwrap();
        let dir = write_analysis(&root.path().join("analysis"), "ts", &agg).unwrap();

        let csv = fs::read_to_string(dir.join("runtime_analysis.csv")).unwrap();
        assert!(csv.starts_with("Kernel,Size,Processes,Type,Mean Runtime,"));
        assert!(csv.contains("atax,small,1,std,2.0,0.0,2.0,2.0,2.0,1"));
        assert!(dir.join("runtime_analysis.json").is_file());
        let runs = fs::read_to_string(dir.join("runs.csv")).unwrap();
        assert!(runs.starts_with("Kernel,Size,Processes,Type,Source,Runtime\n"));
    }
}
