//! Harness configuration.
//!
//! Everything the scripts used to keep in process-wide tables (kernel registry, datasets, the
//! `-lm` allow-list, scheduler settings) lives in a single [`HarnessConfig`]. It is built once at
//! start-up, from built-in defaults optionally overridden by a JSON file, and then only ever
//! handed out by shared reference.

use crate::{
    consts,
    error::{Error, IoResultExt, Result},
};

use serde::{Deserialize, Serialize};

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// PolyBench's predefined problem sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedSize {
    Mini,
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl NamedSize {
    pub const ALL: [NamedSize; 5] = [
        Self::Mini,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::ExtraLarge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Mini => "mini",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::ExtraLarge => "extralarge",
        }
    }

    /// Preprocessor flag selecting the size in `polybench.h`.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Mini => "-DMINI_DATASET",
            Self::Small => "-DSMALL_DATASET",
            Self::Medium => "-DMEDIUM_DATASET",
            Self::Large => "-DLARGE_DATASET",
            Self::ExtraLarge => "-DEXTRALARGE_DATASET",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// Input size of a kernel: either a named PolyBench size or explicit problem dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dataset {
    Named(NamedSize),
    /// Ordered `(parameter, value)` pairs, e.g. `[("TSTEPS", 100), ("N", 1000)]`.
    Explicit(Vec<(String, u64)>),
}

impl Dataset {
    /// Shorthand for the single-parameter `N=<n>` dataset.
    pub fn with_n(n: u64) -> Self {
        Self::Explicit(vec![("N".to_string(), n)])
    }

    /// Label used in binary, target and directory names: `medium`, `TSTEPS_100_N_1000`.
    pub fn label(&self) -> String {
        match self {
            Self::Named(size) => size.name().to_string(),
            Self::Explicit(params) => params
                .iter()
                .map(|(k, v)| format!("{k}_{v}"))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    /// Preprocessor flags passed to the compiler.
    pub fn cflags(&self) -> String {
        match self {
            Self::Named(size) => size.flag().to_string(),
            Self::Explicit(params) => params
                .iter()
                .map(|(k, v)| format!("-D{k}={v}"))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Human-readable size used in reports: `medium`, `TSTEPS=100; N=1000`.
    pub fn size(&self) -> String {
        match self {
            Self::Named(size) => size.name().to_string(),
            Self::Explicit(params) => params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(size) => write!(f, "{}", size.name()),
            Self::Explicit(params) => {
                let pairs: Vec<_> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{}", pairs.join(","))
            }
        }
    }
}

/// Parameter names end up in `_`-separated labels, so they must not contain `_` themselves.
fn is_param_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

impl FromStr for Dataset {
    type Err = Error;

    /// Accepts a named size (`medium`), a bare `N` (`40000`) or `KEY=VALUE` pairs separated by
    /// `,`, `;` or spaces.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(size) = NamedSize::from_name(s) {
            return Ok(Self::Named(size));
        }
        if let Ok(n) = s.parse::<u64>() {
            return Ok(Self::with_n(n));
        }

        let invalid = || Error::InvalidDataset(s.to_string());
        let params = s
            .split([',', ';', ' '])
            .filter(|p| !p.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').ok_or_else(invalid)?;
                let key = key.trim();
                if !is_param_name(key) {
                    return Err(invalid());
                }
                let value = value.trim().parse::<u64>().map_err(|_| invalid())?;
                Ok((key.to_string(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        if params.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Explicit(params))
    }
}

impl TryFrom<String> for Dataset {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Dataset> for String {
    fn from(d: Dataset) -> Self {
        d.to_string()
    }
}

/// Immutable configuration shared by every stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// PolyBench root directory; every other relative path is resolved against it.
    pub root: PathBuf,
    /// Kernel name → source directory, relative to `root`.
    pub kernels: BTreeMap<String, PathBuf>,
    /// Explicit input sizes used when none are requested on the command line.
    pub input_sizes: BTreeMap<String, Vec<Dataset>>,
    /// Kernels linked with `-lm`.
    pub lm_kernels: BTreeSet<String>,
    /// Link flags for BLAS-linked variants.
    pub blas_flags: String,
    /// MPI process launcher.
    pub mpi_launcher: String,
    /// Batch job submission command.
    pub submit_command: String,
    /// Performance-counter wrapper used inside batch jobs.
    pub perf_wrapper: String,
    /// Number of nodes requested per batch job.
    pub nodes: usize,
    /// Memory budget in MiB for a batch job, split evenly across its CPUs.
    pub total_memory_mb: usize,
    /// Wall-time limit of a batch job.
    pub time_limit: String,
    /// Where run outputs are captured.
    pub outputs_dir: PathBuf,
    /// Where per-kernel measurement summaries are written.
    pub measurements_dir: PathBuf,
    /// Where aggregated tables are written.
    pub analysis_dir: PathBuf,
    /// Baseline runtime in seconds used for speedups when no sequential run is available.
    pub baseline_runtime: Option<f64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            kernels: consts::KERNELS
                .iter()
                .map(|(name, dir)| (name.to_string(), PathBuf::from(dir)))
                .collect(),
            input_sizes: consts::EXPLICIT_INPUT_SIZES
                .iter()
                .map(|(kernel, sizes)| {
                    let datasets = sizes
                        .iter()
                        .filter_map(|s| s.parse().ok())
                        .collect::<Vec<Dataset>>();
                    (kernel.to_string(), datasets)
                })
                .collect(),
            lm_kernels: consts::LM_KERNELS.iter().map(|k| k.to_string()).collect(),
            blas_flags: consts::BLAS_FLAGS.to_string(),
            mpi_launcher: "mpiexec".to_string(),
            submit_command: "sbatch".to_string(),
            perf_wrapper: consts::PERF_WRAPPER.to_string(),
            nodes: 1,
            total_memory_mb: consts::TOTAL_MEMORY_MB,
            time_limit: consts::TIME_LIMIT.to_string(),
            outputs_dir: PathBuf::from("outputs"),
            measurements_dir: PathBuf::from("measurements"),
            analysis_dir: PathBuf::from("runtime_analysis"),
            baseline_runtime: None,
        }
    }
}

impl HarnessConfig {
    /// Loads the configuration: defaults, then the JSON file if any, then the root override.
    pub fn load(file: Option<&Path>, root: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => {
                let text = fs::read_to_string(path).at(path)?;
                serde_json::from_str(&text)?
            }
            None => Self::default(),
        };
        if let Some(root) = root {
            config.root = root.to_path_buf();
        }
        Ok(config)
    }

    /// Source directory of `kernel`, relative to the root.
    pub fn kernel_rel_dir(&self, kernel: &str) -> Result<&Path> {
        self.kernels
            .get(kernel)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::UnknownKernel(kernel.to_string()))
    }

    /// Source directory of `kernel`, resolved against the root.
    pub fn kernel_dir(&self, kernel: &str) -> Result<PathBuf> {
        Ok(self.root.join(self.kernel_rel_dir(kernel)?))
    }

    pub fn needs_libm(&self, kernel: &str) -> bool {
        self.lm_kernels.contains(kernel)
    }

    /// Datasets to use for `kernel`: the requested ones, else the configured explicit sizes, else
    /// PolyBench's `medium`.
    pub fn datasets_for(&self, kernel: &str, requested: &[Dataset]) -> Vec<Dataset> {
        if !requested.is_empty() {
            return requested.to_vec();
        }
        match self.input_sizes.get(kernel) {
            Some(sizes) if !sizes.is_empty() => sizes.clone(),
            _ => vec![Dataset::Named(NamedSize::Medium)],
        }
    }

    pub fn outputs_root(&self) -> PathBuf {
        self.root.join(&self.outputs_dir)
    }

    pub fn measurements_root(&self) -> PathBuf {
        self.root.join(&self.measurements_dir)
    }

    pub fn analysis_root(&self) -> PathBuf {
        self.root.join(&self.analysis_dir)
    }
}
