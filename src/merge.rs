//! Merging of several output trees.
//!
//! Batch sessions submitted in several waves end up in different timestamp directories. Merging
//! them creates a single session holding, for every run directory found in any source, one `.out`
//! file concatenating all the captured outputs. The aggregator reads that layout as any other
//! session.

use crate::{
    aggregate::output_files,
    error::{IoResultExt, Result},
};

use log::{info, warn};

use std::{
    collections::BTreeSet,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

/// Name of the report listing what could not be merged.
pub const MISSING_FILES: &str = "missing_files.err";

/// Outcome of a merge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    /// Merged output files written.
    pub written: Vec<PathBuf>,
    /// Lines written to [`MISSING_FILES`].
    pub missing: Vec<String>,
}

/// Merges the run directories of `sources` into `combined`.
///
/// Every run directory present in at least one source is created in `combined`. Its `.out` files
/// from all sources are concatenated, in source order, into one file named after the joined
/// source file stems. Sources lacking the run directory, or holding no `.out` file for it, are
/// listed in `combined/missing_files.err`.
pub fn merge(sources: &[PathBuf], combined: &Path) -> Result<MergeReport> {
    fs::create_dir_all(combined).at(combined)?;

    let mut runs = BTreeSet::new();
    for source in sources {
        for entry in fs::read_dir(source).at(source)? {
            let path = entry.at(source)?.path();
            if path.is_dir() {
                if let Some(name) = path.file_name() {
                    runs.insert(name.to_os_string());
                }
            }
        }
    }

    let mut report = MergeReport::default();
    for run in &runs {
        let target = combined.join(run);
        fs::create_dir_all(&target).at(&target)?;

        let mut contents = Vec::new();
        let mut stems = Vec::new();
        for source in sources {
            let dir = source.join(run);
            if !dir.is_dir() {
                report
                    .missing
                    .push(format!("Missing subdirectory: {}", dir.display()));
                continue;
            }
            let files = output_files(&dir)?;
            if files.is_empty() {
                report
                    .missing
                    .push(format!("Missing .out files in: {}", dir.display()));
                continue;
            }
            for file in files {
                contents.push(fs::read_to_string(&file).at(&file)?);
                stems.push(
                    file.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
            }
        }

        if !contents.is_empty() {
            let path = target.join(format!("{}.out", stems.join("_")));
            fs::write(&path, contents.join("\n")).at(&path)?;
            report.written.push(path);
        }
    }

    let mut log = String::new();
    for line in &report.missing {
        warn!("{line}");
        let _ = writeln!(log, "{line}");
    }
    let log_path = combined.join(MISSING_FILES);
    fs::write(&log_path, log).at(&log_path)?;

    info!(
        "merged {} run directories from {} sources into {}",
        runs.len(),
        sources.len(),
        combined.display()
    );
    Ok(report)
}
