//! Performance-counter extraction.
//!
//! Batch jobs run every kernel under `perf stat`, which reports its counters on stderr. This
//! module reads those counters back from the captured `.err` files.

use crate::{
    consts,
    error::{IoResultExt, Result},
};

use log::{debug, info};
use regex::Regex;
use statistical::mean;
use walkdir::WalkDir;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Counters extracted from each run, in column order.
pub const COUNTERS: [&str; 13] = [
    "task-clock",
    "context-switches",
    "cpu-migrations",
    "page-faults",
    "cycles",
    "instructions",
    "branches",
    "branch-misses",
    "stalled-cycles-frontend",
    "stalled-cycles-backend",
    "cache-references",
    "cache-misses",
    "time-elapsed",
];

fn counter_regexes() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        COUNTERS
            .iter()
            .map(|counter| {
                let pattern = match *counter {
                    "task-clock" => r"([\d,]+\.\d+) msec task-clock".to_string(),
                    "time-elapsed" => r"([\d,]+\.\d+) seconds time elapsed".to_string(),
                    name => format!(r"([\d,]+) +{}\b", regex::escape(name)),
                };
                Regex::new(&pattern).expect("counter patterns are valid")
            })
            .collect()
    })
}

/// Parses a `perf stat` number, dropping thousands separators.
fn parse_count(s: &str) -> Option<f64> {
    s.replace(',', "").parse().ok()
}

/// Counters of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct PerfRecord {
    /// Source file, relative to the scanned directory.
    pub filename: String,
    /// One value per [`COUNTERS`] entry; `None` when `perf` did not report it.
    pub values: Vec<Option<f64>>,
}

impl PerfRecord {
    pub fn get(&self, counter: &str) -> Option<f64> {
        let idx = COUNTERS.iter().position(|c| *c == counter)?;
        self.values.get(idx).copied().flatten()
    }
}

/// Extracts the counters of every run in `text`, runs being separated by delimiter lines.
pub fn parse_perf_output(text: &str, filename: &str) -> Vec<PerfRecord> {
    let delimiter = format!("{}\n", consts::RUN_DELIMITER);
    text.split(delimiter.as_str())
        .filter(|run| !run.trim().is_empty())
        .map(|run| PerfRecord {
            filename: filename.to_string(),
            values: counter_regexes()
                .iter()
                .map(|re| {
                    re.captures(run)
                        .and_then(|c| c.get(1))
                        .and_then(|m| parse_count(m.as_str()))
                })
                .collect(),
        })
        .collect()
}

fn err_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "err")
        })
        .map(|entry| entry.into_path())
}

/// Collects the counters of every `.err` file below `dir`.
pub fn collect(dir: &Path) -> Result<Vec<PerfRecord>> {
    let mut records = Vec::new();
    for path in err_files(dir) {
        let relative = path.strip_prefix(dir).unwrap_or(&path).display().to_string();
        debug!("Processing file: {relative}");
        let text = fs::read_to_string(&path).at(&path)?;
        records.extend(parse_perf_output(&text, &relative));
    }
    Ok(records)
}

/// Writes the records as CSV, one row per run, missing counters left empty.
pub fn write_csv(path: &Path, records: &[PerfRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(std::iter::once("filename").chain(COUNTERS))?;
    for record in records {
        let values = record
            .values
            .iter()
            .map(|v| v.map(|v| v.to_string()).unwrap_or_default());
        writer.write_record(std::iter::once(record.filename.clone()).chain(values))?;
    }
    writer.flush().at(path)?;
    info!(
        "{} successfully created with {} total rows",
        path.display(),
        records.len()
    );
    Ok(())
}

fn cache_regexes() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"(?m)^\s*([\d,]+)\s+L1-dcache-load-misses")
                .expect("L1 pattern is valid"),
            Regex::new(r"(?m)^\s*([\d,]+)\s+cache-misses").expect("LLC pattern is valid"),
        )
    })
}

/// Average cache misses of the runs of one directory.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheMisses {
    pub name: String,
    pub l1: f64,
    pub llc: f64,
}

/// Average `L1-dcache-load-misses` and `cache-misses` of each immediate sub-directory of `dir`,
/// sorted by name. Counters that never appear average to 0.
pub fn cache_misses(dir: &Path) -> Result<Vec<CacheMisses>> {
    let (l1_re, llc_re) = cache_regexes();
    let mut results = Vec::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let sub = entry.at(dir)?.path();
        if !sub.is_dir() {
            continue;
        }
        let mut l1 = Vec::new();
        let mut llc = Vec::new();
        for path in err_files(&sub) {
            let text = fs::read_to_string(&path).at(&path)?;
            l1.extend(l1_re.captures_iter(&text).filter_map(|c| parse_count(&c[1])));
            llc.extend(llc_re.captures_iter(&text).filter_map(|c| parse_count(&c[1])));
        }
        let average = |v: &[f64]| if v.is_empty() { 0.0 } else { mean(v) };
        results.push(CacheMisses {
            name: sub
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            l1: average(&l1),
            llc: average(&llc),
        });
    }
    results.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERF: &str = "
 Performance counter stats for './bin/gemver_N_4000':

          1,234.56 msec task-clock                #    0.998 CPUs utilized
                12      context-switches          #    9.720 /sec
                 0      cpu-migrations            #    0.000 /sec
             1,024      page-faults               #  829.440 /sec
     4,000,000,000      cycles                    #    3.240 GHz
       200,000,000      stalled-cycles-frontend   #    5.00% frontend cycles idle
     8,000,000,000      instructions              #    2.00  insn per cycle
         1,000,000      cache-misses              #   10.000 % of all cache refs

       1.237000000 seconds time elapsed
";

    #[test]
    fn extracts_counters_of_each_run() {
        let text = format!("{PERF}===============\n{PERF}");
        let records = parse_perf_output(&text, "run/err/0.err");
        assert_eq!(records.len(), 2);
        let r = &records[0];
        assert_eq!(r.get("task-clock"), Some(1234.56));
        assert_eq!(r.get("page-faults"), Some(1024.0));
        assert_eq!(r.get("cycles"), Some(4.0e9));
        assert_eq!(r.get("stalled-cycles-frontend"), Some(2.0e8));
        assert_eq!(r.get("cache-misses"), Some(1.0e6));
        assert_eq!(r.get("time-elapsed"), Some(1.237));
        assert_eq!(r.get("branches"), None);
        assert_eq!(r.get("cache-references"), None);
    }

    #[test]
    fn writes_one_row_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("gemver_N_4000_np_1_std/err");
        fs::create_dir_all(&run).unwrap();
        fs::write(run.join("0.err"), PERF).unwrap();
        fs::write(run.join("1.out"), "0.5\n").unwrap();

        let records = collect(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        let csv_path = dir.path().join("perf_stats.csv");
        write_csv(&csv_path, &records).unwrap();
        let text = fs::read_to_string(csv_path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("filename,task-clock,context-switches,"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("gemver_N_4000_np_1_std/err/0.err,1234.56,12,0,1024,"));
        assert!(row.contains(",,"));
    }

    #[test]
    fn averages_cache_misses_per_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a/err");
        fs::create_dir_all(&a).unwrap();
        fs::write(a.join("0.err"), "  1,000 L1-dcache-load-misses\n  10 cache-misses\n").unwrap();
        fs::write(a.join("1.err"), "  3,000 L1-dcache-load-misses\n  30 cache-misses\n").unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();

        let misses = cache_misses(dir.path()).unwrap();
        assert_eq!(
            misses,
            vec![
                CacheMisses {
                    name: "a".to_string(),
                    l1: 2000.0,
                    llc: 20.0
                },
                CacheMisses {
                    name: "b".to_string(),
                    l1: 0.0,
                    llc: 0.0
                },
            ]
        );
    }
}
