//! pbharness - PolyBench benchmarking harness
//!
//! # About
//! pbharness builds, runs and analyses parallel variants of the [PolyBench/C][1] kernels. Every
//! kernel can be compiled for several interfaces:
//! - `std`: sequential reference
//! - `omp`: OpenMP
//! - `mpi`: MPI
//! - `blas`: linked against a BLAS library
//! - `mpi+omp`, `mpi+omp_gather`: hybrid MPI+OpenMP
//!
//! Runs happen either on the local machine or through a cluster's batch scheduler. Their output
//! is captured in timestamped directories, then aggregated into runtime tables and charts.
//!
//! # Quickstart
//! ## Pre-requisites
//! A C compiler, `make`, an MPI implementation (`mpicc`/`mpiexec`) and a BLAS library must be
//! available to build every interface. Cluster submissions expect a Slurm-like `sbatch`.
//!
//! ## Build
//! As any Rust-based project, pbharness is built and run with `cargo`:
//! ```sh
//! cargo build --release
//! ```
//!
//! ## Help
//! To see the help usage:
//! ```sh
//! cargo run -- help
//!
//! Usage: pbharness [OPTIONS] <COMMAND>
//!
//! Commands:
//!   run         Build and run the kernels on this machine
//!   submit      Build the kernels and submit one batch job per binary
//!   aggregate   Aggregate captured outputs into runtime tables
//!   plot        Draw charts
//!   cluster     Split execution times into k-means clusters and report the fastest one
//!   perf-stats  Extract `perf stat` counters from captured stderr files into a CSV table
//!   merge       Merge several output trees into one
//!   help        Print this message or the help of the given subcommand(s)
//! ```
//!
//! ## Example run
//! To validate and time the OpenMP and MPI variants of GEMVER against the sequential one, from the
//! PolyBench root:
//! ```sh
//! cargo run --release -- run --kernels gemver --interfaces std omp mpi --validate
//! ```
//! Then, on a cluster, once the jobs are done:
//! ```sh
//! cargo run --release -- submit --kernels gemver --interfaces mpi --mpi-processes 16
//! cargo run --release -- aggregate
//! cargo run --release -- plot scaling
//! ```
//!
//! ## Documentation
//! The crate's documentation is available using `cargo`:
//! ```sh
//! cargo doc --open
//! ```
//!
//! [1]: https://github.com/MatthiasJReisinger/PolyBenchC-4.2.1

use pbharness::{
    aggregate::{self, AggregateOptions},
    cli::{BenchArgs, CliArgs, Command, PlotCmd},
    config::HarnessConfig,
    consts,
    drivers::{self, BatchOptions, BenchOptions, Measurements},
    kmeans::kmeans,
    layout::RunDir,
    merge, perf_stats, plot, report,
    timing::parse_output,
    utils::{latest_timestamped_file, timestamp_dirs, timestamp_now},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};

use std::{
    fs,
    path::{Path, PathBuf},
};

fn main() {
    let args = CliArgs::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = HarnessConfig::load(args.config.as_deref(), args.root.as_deref())
        .context("failed to load the configuration")?;

    match args.command {
        Command::Run(bench) => {
            let opts = bench_options(&config, &bench, args.verbose);
            let session = drivers::run_local(&config, &opts)?;
            info!("outputs written to {}", session.session_dir.display());
        }
        Command::Submit {
            bench,
            no_gen_batch,
            no_batch,
        } => {
            let opts = bench_options(&config, &bench, args.verbose);
            let batch = BatchOptions {
                generate: !no_gen_batch,
                submit: !no_batch,
            };
            let session = drivers::submit_jobs(&config, &opts, batch)?;
            info!("jobs will write into {}", session.display());
        }
        Command::Aggregate {
            env,
            outputs,
            all,
            fastest_cluster,
            seed,
        } => {
            let outputs = outputs.unwrap_or_else(|| config.outputs_root().join(env));
            let sessions = aggregate::select_sessions(&outputs, all)?;
            let opts = AggregateOptions {
                all,
                fastest_cluster,
                seed,
            };
            let aggregation = aggregate::aggregate(&sessions, &opts)?;
            for row in &aggregation.rows {
                println!("{row}");
            }
            let dir =
                aggregate::write_analysis(&config.analysis_root(), &timestamp_now(), &aggregation)?;
            info!("runtime analysis written to {}", dir.display());
        }
        Command::Plot { plot } => draw(&config, plot)?,
        Command::Cluster {
            path,
            k,
            seed,
            plot_dir,
        } => cluster(&path, k, seed, plot_dir.as_deref())?,
        Command::PerfStats { dir, output } => {
            let records = perf_stats::collect(&dir)?;
            perf_stats::write_csv(&output, &records)?;
            info!("{} record(s) written to {}", records.len(), output.display());
        }
        Command::Merge { sources, into } => {
            let report = merge::merge(&sources, &into)?;
            info!(
                "{} merged output file(s) written to {}, {} missing",
                report.written.len(),
                into.display(),
                report.missing.len()
            );
        }
    }
    Ok(())
}

/// Resolves the kernels to run, all of them if none is requested.
///
/// Unknown names are kept: they fail when their Makefile or binaries are looked up.
fn bench_options(config: &HarnessConfig, bench: &BenchArgs, verbose: bool) -> BenchOptions {
    let kernels: Vec<String> = if bench.kernels.is_empty() {
        config.kernels.keys().cloned().collect()
    } else {
        bench.kernels.clone()
    };

    BenchOptions {
        kernels,
        interfaces: bench.interfaces.clone(),
        datasets: bench.input_size.clone(),
        num_runs: usize::from(bench.num_runs),
        ranks: bench.mpi_processes,
        threads: bench.threads,
        validate: bench.validate,
        generate: bench.generate(),
        make: bench.make(),
        verbose,
    }
}

fn draw(config: &HarnessConfig, cmd: PlotCmd) -> Result<()> {
    match cmd {
        PlotCmd::Scaling {
            file,
            output,
            format,
            baseline,
        } => {
            let file = match file {
                Some(file) => file,
                None => timestamp_dirs(&config.analysis_root())?
                    .pop()
                    .map(|dir| dir.join("runtime_analysis.csv"))
                    .ok_or_else(|| {
                        anyhow!("no runtime analysis in {}", config.analysis_root().display())
                    })?,
            };
            let rows = report::load_rows(&file)?;
            let points = report::scaling(&rows, baseline.or(config.baseline_runtime))?;
            let out_dir = output
                .or_else(|| file.parent().map(Path::to_path_buf))
                .unwrap_or_default();
            plot::scaling::plot_scaling(&points, &out_dir, &format, None)?;
        }
        PlotCmd::Compare {
            kernel,
            file,
            output,
            seed,
        } => {
            let dir = config.measurements_root().join(&kernel);
            let file = match file {
                Some(file) => file,
                None => latest_timestamped_file(&dir, "json")?
                    .ok_or_else(|| anyhow!("no measurement for {kernel} in {}", dir.display()))?,
            };
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let measurements: Measurements = serde_json::from_str(&text)
                .with_context(|| format!("malformed measurement file {}", file.display()))?;
            let bands = report::median_bands(
                &measurements,
                consts::CONFIDENCE_LEVEL,
                consts::BOOTSTRAP_SAMPLES,
                seed,
            );
            let output = output.unwrap_or_else(|| dir.join(format!("{kernel}_comparison.png")));
            plot::comparison::plot_comparison(&kernel, &bands, &output, None)?;
        }
        PlotCmd::Histogram { file, bins, output } => {
            let samples = read_samples(&file)?;
            if samples.is_empty() {
                bail!("no completion time in {}", file.display());
            }
            plot::distribution::plot_histogram(&samples, &output, bins, None)?;
        }
        PlotCmd::CacheMisses { dir, output } => {
            let misses = perf_stats::cache_misses(&dir)?;
            plot::cache::plot_cache_misses(&misses, &output, None)?;
        }
        PlotCmd::Variance { files, output } => {
            let mut series = Vec::with_capacity(files.len());
            for file in &files {
                let records = report::load_variance_table(file)?;
                series.push(plot::variance::VarianceSeries {
                    label: file
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    points: report::variance_by_size(&records),
                });
            }
            plot::variance::plot_variance(&series, &output, None)?;
        }
    }
    Ok(())
}

fn read_samples(file: &Path) -> Result<Vec<f64>> {
    let text =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    Ok(parse_output(&text, file).values())
}

/// Sample sets found under `path`, labelled: a sample file, a run directory, a session, or a tree
/// of sessions (the latest one is used).
fn sample_sets(path: &Path) -> Result<Vec<(String, Vec<f64>)>> {
    if path.is_file() {
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![(label, read_samples(path)?)]);
    }

    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut dirs = match RunDir::parse(&name) {
        Some(run) => vec![(run, path.to_path_buf())],
        None => aggregate::run_dirs(path)?,
    };
    if dirs.is_empty() {
        for session in aggregate::select_sessions(path, false)? {
            dirs.extend(aggregate::run_dirs(&session)?);
        }
    }

    let mut sets = Vec::with_capacity(dirs.len());
    for (run, dir) in &dirs {
        let parsed = aggregate::parse_run_dir(run, dir)?;
        let samples = parsed.samples.iter().map(|(_, _, t)| *t).collect();
        sets.push((run.name(), samples));
    }
    Ok(sets)
}

fn cluster(path: &Path, k: usize, seed: u64, plot_dir: Option<&Path>) -> Result<()> {
    for (label, samples) in sample_sets(path)? {
        let clusters = kmeans(&samples, k, seed);
        let Some(fastest) = clusters.first() else {
            warn!("{label}: no sample");
            continue;
        };
        println!("{label}");
        for (i, c) in clusters.iter().enumerate() {
            println!(
                "  Cluster {} (Mean = {:.6}s): {} run(s)",
                i + 1,
                c.mean,
                c.samples.len()
            );
        }
        println!("  fastest cluster mean: {:.6}s", fastest.mean);

        if let Some(dir) = plot_dir {
            let file: PathBuf = dir.join(format!("{label}_clusters.png"));
            plot::distribution::plot_clusters(&clusters, &file, consts::CLUSTER_BINS, None)?;
        }
    }
    Ok(())
}
