//! On-disk layout shared by the pipeline stages.
//!
//! Stages never talk to each other directly: the runners write captured output into run
//! directories, the aggregator reads them back. The naming grammar is therefore a contract and
//! lives here, in one place, for both directions.
//!
//! ```text
//! outputs/<local|euler>/<timestamp>/<kernel>_<dataset>[_np_<n>][_nt_<t>]_<interface>/
//!     out/<run>.out
//!     err/<run>.err
//! measurements/<kernel>/<timestamp>.json
//! runtime_analysis/<timestamp>/runtime_analysis.csv
//! ```

use crate::{
    config::{Dataset, NamedSize},
    interface::Interface,
};

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Identity of a run directory, encoded in its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunDir {
    pub kernel: String,
    pub dataset: Dataset,
    /// Process count, absent in directories written by older hybrid drivers.
    pub processes: Option<usize>,
    /// OpenMP threads per rank, only written for hybrid interfaces.
    pub threads: Option<usize>,
    pub interface: Interface,
}

impl RunDir {
    /// Directory name for this run.
    pub fn name(&self) -> String {
        let mut name = format!("{}_{}", self.kernel, self.dataset.label());
        if let Some(np) = self.processes {
            name.push_str(&format!("_np_{np}"));
        }
        if let Some(nt) = self.threads {
            name.push_str(&format!("_nt_{nt}"));
        }
        name.push('_');
        name.push_str(self.interface.name());
        name
    }

    /// Parses a directory name; returns `None` when it does not follow the grammar.
    pub fn parse(name: &str) -> Option<Self> {
        // Longest names first so that `mpi+omp_gather` wins over a shorter suffix.
        let mut interfaces = Interface::ALL;
        interfaces.sort_by_key(|i| std::cmp::Reverse(i.name().len()));
        let (rest, interface) = interfaces.into_iter().find_map(|i| {
            name.strip_suffix(i.name())
                .and_then(|r| r.strip_suffix('_'))
                .map(|r| (r, i))
        })?;

        let mut tokens = rest.split('_');
        let kernel = tokens.next().filter(|k| {
            !k.is_empty() && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })?;

        let mut named = None;
        let mut params = Vec::new();
        let mut processes = None;
        let mut threads = None;
        while let Some(token) = tokens.next() {
            if let Some(size) = NamedSize::from_name(token) {
                if named.is_some() || !params.is_empty() {
                    return None;
                }
                named = Some(size);
                continue;
            }
            if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            let value = tokens.next()?.parse::<u64>().ok()?;
            match token {
                "np" => processes = Some(usize::try_from(value).ok()?),
                "nt" => threads = Some(usize::try_from(value).ok()?),
                key if named.is_none() => params.push((key.to_string(), value)),
                _ => return None,
            }
        }

        let dataset = match named {
            Some(size) => Dataset::Named(size),
            None if !params.is_empty() => Dataset::Explicit(params),
            None => return None,
        };

        Some(Self {
            kernel: kernel.to_string(),
            dataset,
            processes,
            threads,
            interface,
        })
    }
}

impl fmt::Display for RunDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Paths of one run directory inside a timestamped output tree.
#[derive(Clone, Debug)]
pub struct RunPaths {
    pub dir: PathBuf,
}

impl RunPaths {
    pub fn new(session: &Path, run: &RunDir) -> Self {
        Self {
            dir: session.join(run.name()),
        }
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.join("out")
    }

    pub fn err_dir(&self) -> PathBuf {
        self.dir.join("err")
    }

    pub fn out_file(&self, run: usize) -> PathBuf {
        self.out_dir().join(format!("{run}.out"))
    }

    pub fn err_file(&self, run: usize) -> PathBuf {
        self.err_dir().join(format!("{run}.err"))
    }
}

/// `outputs/<env>/<timestamp>`.
pub fn session_dir(outputs: &Path, env: &str, timestamp: &str) -> PathBuf {
    outputs.join(env).join(timestamp)
}

/// `measurements/<kernel>/<timestamp>.json`.
pub fn measurement_file(measurements: &Path, kernel: &str, timestamp: &str) -> PathBuf {
    measurements.join(kernel).join(format!("{timestamp}.json"))
}

/// `runtime_analysis/<timestamp>`.
pub fn analysis_dir(analysis: &Path, timestamp: &str) -> PathBuf {
    analysis.join(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mpi_directory() {
        let run = RunDir::parse("gemver_N_10000_np_4_mpi").unwrap();
        assert_eq!(run.kernel, "gemver");
        assert_eq!(run.dataset, Dataset::with_n(10000));
        assert_eq!(run.processes, Some(4));
        assert_eq!(run.threads, None);
        assert_eq!(run.interface, Interface::Mpi);
    }

    #[test]
    fn parses_hybrid_and_named_directories() {
        let run = RunDir::parse("jacobi-2d_TSTEPS_100_N_1000_np_2_nt_8_mpi+omp_gather").unwrap();
        assert_eq!(run.kernel, "jacobi-2d");
        assert_eq!(run.dataset.label(), "TSTEPS_100_N_1000");
        assert_eq!(run.processes, Some(2));
        assert_eq!(run.threads, Some(8));
        assert_eq!(run.interface, Interface::MpiOmpGather);

        let run = RunDir::parse("atax_medium_std").unwrap();
        assert_eq!(run.dataset, Dataset::Named(NamedSize::Medium));
        assert_eq!(run.processes, None);

        let run = RunDir::parse("gemver_N_4000_mpi+omp").unwrap();
        assert_eq!(run.interface, Interface::MpiOmp);
        assert_eq!(run.processes, None);
    }

    #[test]
    fn names_round_trip() {
        let run = RunDir {
            kernel: "floyd-warshall".to_string(),
            dataset: "N=500,TSTEPS=20".parse().unwrap(),
            processes: Some(16),
            threads: None,
            interface: Interface::Omp,
        };
        assert_eq!(run.name(), "floyd-warshall_N_500_TSTEPS_20_np_16_omp");
        assert_eq!(RunDir::parse(&run.name()), Some(run));
    }

    #[test]
    fn rejects_names_outside_the_grammar() {
        for name in [
            "data",
            "gemver",
            "gemver_mpi",
            "gemver_N_abc_mpi",
            "gemver_N_10000_np_mpi",
            "gemver_N_10000_cuda",
            "_N_10_std",
            "gemver_N_10_medium_std",
        ] {
            assert_eq!(RunDir::parse(name), None, "{name} should not parse");
        }
    }

    #[test]
    fn run_paths() {
        let run = RunDir::parse("gemver_N_10_np_1_std").unwrap();
        let paths = RunPaths::new(Path::new("outputs/local/ts"), &run);
        assert_eq!(
            paths.out_file(3),
            Path::new("outputs/local/ts/gemver_N_10_np_1_std/out/3.out")
        );
        assert_eq!(
            paths.err_file(0),
            Path::new("outputs/local/ts/gemver_N_10_np_1_std/err/0.err")
        );
    }
}
