//! Error types for the harness.
//!
//! Build, run, submission and validation failures are fatal: they bubble up to `main`, which logs
//! them and exits with status 1. Parsing problems are not errors at all, they are logged and
//! skipped by the modules that encounter them.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the harness' [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating or post-processing benchmarks.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem or process-spawning failure, tagged with the path involved.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown kernel '{0}'")]
    UnknownKernel(String),

    #[error("unknown interface '{0}' (expected one of: std, omp, mpi, blas, mpi+omp, mpi+omp_gather)")]
    UnknownInterface(String),

    #[error("invalid dataset '{0}': expected a named size or KEY=VALUE pairs")]
    InvalidDataset(String),

    /// `make` exited with a non-zero status.
    #[error("error running make for kernel {kernel}\n{stderr}")]
    Build { kernel: String, stderr: String },

    /// A benchmarked binary exited with a non-zero status.
    #[error("error running driver for kernel {binary} ({status})\n{stderr}")]
    Run {
        binary: String,
        status: String,
        stderr: String,
    },

    /// The scheduler refused a batch script.
    #[error("error submitting batch script {script:?}\n{stderr}")]
    Submit { script: PathBuf, stderr: String },

    /// Submission without generation found no batch script to submit.
    #[error("no batch script found in {0:?}")]
    NoBatchScripts(PathBuf),

    /// The captured stderr of a run holds no array dump region.
    #[error("no DUMP_ARRAYS region in the output of {binary}")]
    MissingDump { binary: String },

    /// The dump of a parallel interface differs from the sequential reference.
    #[error("validation failed for kernel {binary} (interface {interface})")]
    ValidationMismatch { binary: String, interface: String },

    #[error("no timing value in the output of {0}")]
    NoTimings(String),

    #[error("no baseline runtime: no single-process 'std' row and no fallback configured")]
    NoBaseline,

    #[error("no benchmark data found in {0:?}")]
    NoData(PathBuf),

    #[error("plotting failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wraps an [`std::io::Error`] with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extension trait attaching a path to I/O results, e.g. `fs::read(&p).at(&p)?`.
pub trait IoResultExt<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
