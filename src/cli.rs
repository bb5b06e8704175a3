//! Command-Line Interface related code.
//!
//! This module handles the parsing of CLI arguments using the [`clap`][1] crate.
//! It defines the availables runtime options and subcommands, one per pipeline stage.
//!
//! [1]: https://crates.io/crates/clap

use crate::{config::Dataset, consts, interface::Interface};

use clap::{builder::TypedValueParser, Args, Parser, Subcommand};

use std::path::PathBuf;

/// Benchmarking harness for the PolyBench suite.
///
/// Generates Makefiles, builds and runs PolyBench kernel variants (sequential, OpenMP, MPI, BLAS
/// and hybrid MPI+OpenMP) locally or through a batch scheduler, then aggregates the captured
/// output into runtime tables and charts.
#[derive(Clone, Debug, Parser)]
#[command(name = "pbharness", version)]
pub struct CliArgs {
    /// Verbose output: debug logging and echo of the kernels' output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file overriding the built-in defaults.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// PolyBench root directory, defaults to the current directory.
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Stage to run.
    #[command(subcommand)]
    pub command: Command,
}

/// What to build and run.
#[derive(Clone, Debug, PartialEq, Args)]
pub struct BenchArgs {
    /// Kernels to run (default = all).
    #[arg(long, num_args = 1..)]
    pub kernels: Vec<String>,

    /// Interfaces to run.
    #[arg(
        long,
        num_args = 1..,
        default_values_t = [Interface::Std, Interface::Omp, Interface::Mpi],
    )]
    pub interfaces: Vec<Interface>,

    /// Input sizes: named sizes (mini, small, medium, large, extralarge), a bare `N` such as
    /// `40000`, or KEY=VALUE lists such as `N=1000,TSTEPS=100` (default = the configured sizes of
    /// each kernel, else medium).
    #[arg(long, visible_alias = "size", num_args = 1..)]
    pub input_size: Vec<Dataset>,

    /// Number of runs.
    #[arg(
        long,
        value_name = "RUNS",
        default_value_t = consts::NUM_RUNS,
        value_parser = clap::value_parser!(u16).range(1..),
    )]
    pub num_runs: u16,

    /// Do not regenerate makefiles.
    #[arg(long)]
    pub no_gen: bool,

    /// Do not run make.
    #[arg(long)]
    pub no_make: bool,

    /// Neither regenerate makefiles nor run make.
    #[arg(long)]
    pub no_compile: bool,

    /// Validate results against the sequential reference.
    ///
    /// Only local runs compare the dumps. With `submit`, kernels are built to dump their arrays
    /// into the captured `.err` files, but nothing checks them.
    #[arg(long)]
    pub validate: bool,

    /// Number of MPI processes to run MPI with.
    #[arg(
        long,
        value_name = "RANKS",
        default_value_t = consts::MPI_PROCESSES,
        value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize),
    )]
    pub mpi_processes: usize,

    /// Number of OpenMP threads.
    #[arg(
        long,
        value_name = "THREADS",
        default_value_t = consts::OMP_THREADS,
        value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize),
    )]
    pub threads: usize,
}

/// List of available pipeline stages.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Build and run the kernels on this machine.
    Run(BenchArgs),
    /// Build the kernels and submit one batch job per binary.
    Submit {
        #[command(flatten)]
        bench: BenchArgs,

        /// Do not generate batch scripts.
        #[arg(long)]
        no_gen_batch: bool,

        /// Do not schedule jobs in batch.
        #[arg(long)]
        no_batch: bool,
    },
    /// Aggregate captured outputs into runtime tables.
    Aggregate {
        /// Environment directory under the outputs root.
        #[arg(long, default_value = consts::CLUSTER_ENV)]
        env: String,

        /// Output tree to aggregate, overriding `<outputs>/<env>`.
        #[arg(long, value_name = "DIR")]
        outputs: Option<PathBuf>,

        /// Aggregate every timestamp directory, not only the latest one.
        #[arg(long)]
        all: bool,

        /// Keep only the k-means fastest cluster of each group.
        #[arg(
            long,
            value_name = "K",
            num_args = 0..=1,
            default_missing_value = consts::KMEANS_CLUSTERS_ARG,
            value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize),
        )]
        fastest_cluster: Option<usize>,

        /// Seed for the random number generator (RNG).
        #[arg(short, long, value_name = "SEED", default_value_t = consts::DEFAULT_SEED)]
        seed: u64,
    },
    /// Draw charts.
    Plot {
        #[command(subcommand)]
        plot: PlotCmd,
    },
    /// Split execution times into k-means clusters and report the fastest one.
    Cluster {
        /// Sample file (one time per line), run directory, or timestamped output tree.
        path: PathBuf,

        /// Number of clusters.
        #[arg(
            short,
            value_name = "K",
            default_value_t = consts::KMEANS_CLUSTERS,
            value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize),
        )]
        k: usize,

        /// Seed for the random number generator (RNG).
        #[arg(short, long, value_name = "SEED", default_value_t = consts::DEFAULT_SEED)]
        seed: u64,

        /// Directory receiving one cluster histogram per sample set.
        #[arg(long, value_name = "DIR")]
        plot_dir: Option<PathBuf>,
    },
    /// Extract `perf stat` counters from captured stderr files into a CSV table.
    PerfStats {
        /// Directory scanned recursively for `.err` files.
        dir: PathBuf,

        /// Output CSV file.
        #[arg(short, long, default_value = "perf_stats.csv")]
        output: PathBuf,
    },
    /// Merge several output trees into one.
    Merge {
        /// Timestamped output directories to merge.
        #[arg(required = true, num_args = 1..)]
        sources: Vec<PathBuf>,

        /// Combined output directory.
        #[arg(long, value_name = "DIR")]
        into: PathBuf,
    },
}

/// List of available charts.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum PlotCmd {
    /// Runtime, speedup and efficiency against the number of processes.
    Scaling {
        /// Runtime analysis table (default = the latest one).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Directory receiving the charts (default = the table's directory).
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Image format, `png` or `svg`.
        #[arg(long, default_value = "png")]
        format: String,

        /// Baseline runtime in seconds, when the table has no sequential single-process row.
        #[arg(long, value_name = "SECONDS")]
        baseline: Option<f64>,
    },
    /// Median execution time per dataset and interface, with a 95% confidence band.
    Compare {
        kernel: String,

        /// Measurement file (default = the kernel's latest one).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output image.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for the random number generator (RNG).
        #[arg(short, long, value_name = "SEED", default_value_t = consts::DEFAULT_SEED)]
        seed: u64,
    },
    /// Distribution of completion times read from a file.
    Histogram {
        file: PathBuf,

        /// Number of bins.
        #[arg(long, default_value_t = consts::HISTOGRAM_BINS)]
        bins: usize,

        /// Output image.
        #[arg(short, long, default_value = "completion_time_distribution.png")]
        output: PathBuf,
    },
    /// Average L1 and last-level cache misses per run directory.
    CacheMisses {
        /// Directory whose sub-directories hold `.err` files.
        dir: PathBuf,

        /// Output image.
        #[arg(short, long, default_value = "cache_misses.png")]
        output: PathBuf,
    },
    /// Mean ± std of the runtime against the data size, one series per table.
    Variance {
        /// `kernel size processes interface time variance` tables.
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Output image.
        #[arg(short, long, default_value = "runtime_variability.png")]
        output: PathBuf,
    },
}

impl BenchArgs {
    /// Whether makefiles should be regenerated.
    pub fn generate(&self) -> bool {
        !(self.no_gen || self.no_compile)
    }

    /// Whether `make` should run.
    pub fn make(&self) -> bool {
        !(self.no_make || self.no_compile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let args = CliArgs::parse_from(["pbharness", "run", "--kernels", "gemver"]);
        let Command::Run(bench) = args.command else {
            panic!("expected run");
        };
        assert_eq!(bench.kernels, vec!["gemver"]);
        assert_eq!(
            bench.interfaces,
            vec![Interface::Std, Interface::Omp, Interface::Mpi]
        );
        assert_eq!(bench.num_runs, 1);
        assert_eq!(bench.mpi_processes, 4);
        assert!(bench.generate() && bench.make());
        assert!(bench.input_size.is_empty());
    }

    #[test]
    fn sizes_interfaces_and_compile_switches() {
        let args = CliArgs::parse_from([
            "pbharness",
            "-v",
            "run",
            "--interfaces",
            "mpi+omp",
            "blas",
            "--size",
            "N=1000,TSTEPS=10",
            "large",
            "--no-compile",
        ]);
        assert!(args.verbose);
        let Command::Run(bench) = args.command else {
            panic!("expected run");
        };
        assert_eq!(bench.interfaces, vec![Interface::MpiOmp, Interface::Blas]);
        assert_eq!(bench.input_size[0].label(), "N_1000_TSTEPS_10");
        assert_eq!(bench.input_size[1].label(), "large");
        assert!(!bench.generate() && !bench.make());
    }

    #[test]
    fn integer_size_sets_n() {
        let args =
            CliArgs::parse_from(["pbharness", "run", "--kernels", "gemver", "--size", "40000"]);
        let Command::Run(bench) = args.command else {
            panic!("expected run");
        };
        assert_eq!(bench.input_size, vec![Dataset::with_n(40000)]);
        assert_eq!(bench.input_size[0].label(), "N_40000");
    }

    #[test]
    fn rejects_unknown_interfaces_and_zero_runs() {
        assert!(CliArgs::try_parse_from(["pbharness", "run", "--interfaces", "cuda"]).is_err());
        assert!(CliArgs::try_parse_from(["pbharness", "run", "--num-runs", "0"]).is_err());
    }

    #[test]
    fn fastest_cluster_defaults_to_the_cluster_count() {
        let args = CliArgs::parse_from(["pbharness", "aggregate", "--fastest-cluster"]);
        let Command::Aggregate {
            fastest_cluster,
            env,
            ..
        } = args.command
        else {
            panic!("expected aggregate");
        };
        assert_eq!(fastest_cluster, Some(consts::KMEANS_CLUSTERS));
        assert_eq!(env, "euler");
    }

    #[test]
    fn cluster_arg_matches_the_default_count() {
        assert_eq!(
            consts::KMEANS_CLUSTERS_ARG.parse::<usize>(),
            Ok(consts::KMEANS_CLUSTERS)
        );
    }

    #[test]
    fn validate_help_tells_submissions_are_unchecked() {
        use clap::CommandFactory;
        let mut cmd = CliArgs::command();
        let submit = cmd.find_subcommand_mut("submit").unwrap();
        let validate = submit
            .get_arguments()
            .find(|a| a.get_id() == "validate")
            .unwrap();
        let help = validate.get_long_help().unwrap().to_string();
        assert!(help.contains("Only local runs compare the dumps"), "{help}");
    }
}
