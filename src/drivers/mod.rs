//! Benchmark drivers.
//!
//! This module provides the API for building the kernels, executing them and capturing their
//! output. It acts as a layer abstracting over where the kernels run: either directly on the
//! local machine or through a cluster's batch scheduler.
//!
//! # High-level approach for kernel benchmarking
//! ## 1. Makefile generation
//! Every selected kernel gets a freshly generated Makefile with one target per (dataset,
//! interface) pair (see [`makefile`]). Stale binaries are cleaned first.
//!
//! ## 2. Build
//! `make` is invoked once per kernel for all its targets (see [`build`]). Any failure aborts the
//! whole session: there is no point in measuring an incomplete set of variants.
//!
//! ## 3. Execution
//! Locally, each binary is launched `num_runs` times and waited for (see [`local`]); on a
//! cluster, one batch script per binary loops over the runs and is submitted without waiting
//! (see [`cluster`]). Both capture stdout and stderr of every run into the run directory
//! described in [`crate::layout`].
//!
//! ## 4. Validation
//! With validation enabled, kernels dump their arrays and every interface is compared against
//! the sequential one, which is therefore always executed first (see [`crate::validation`]).

pub mod build;
pub mod cluster;
pub mod local;
pub mod makefile;

use crate::{
    config::{Dataset, HarnessConfig},
    consts,
    error::{Error, IoResultExt, Result},
    interface::{order_for_validation, Interface, Parallelism},
    layout::{self, RunDir, RunPaths},
    utils::{timestamp_dirs, timestamp_now},
    validation::Validator,
};

use log::{debug, info, warn};

use std::{collections::BTreeMap, fs, path::PathBuf};

/// Times of one kernel, by dataset label then interface name, as stored in measurement files.
pub type Measurements = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// What to benchmark and how.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchOptions {
    pub kernels: Vec<String>,
    pub interfaces: Vec<Interface>,
    /// Requested datasets; empty means the configured ones for each kernel.
    pub datasets: Vec<Dataset>,
    pub num_runs: usize,
    pub ranks: usize,
    pub threads: usize,
    pub validate: bool,
    /// Regenerate the Makefiles.
    pub generate: bool,
    /// Run `make`.
    pub make: bool,
    /// Echo the output of child processes.
    pub verbose: bool,
}

impl BenchOptions {
    /// Interfaces in execution order: with validation, `std` comes first.
    pub fn ordered_interfaces(&self) -> Vec<Interface> {
        if self.validate {
            order_for_validation(&self.interfaces)
        } else {
            self.interfaces.clone()
        }
    }
}

/// One binary to execute: a kernel built for a dataset and an interface, with its shape.
#[derive(Clone, Copy, Debug)]
pub struct RunPlan<'a> {
    pub kernel: &'a str,
    pub dataset: &'a Dataset,
    pub interface: Interface,
    pub parallelism: Parallelism,
}

impl RunPlan<'_> {
    pub fn binary(&self) -> String {
        makefile::binary_name(self.kernel, self.dataset, self.interface)
    }

    /// Run directory capturing this plan's output.
    pub fn run_dir(&self) -> RunDir {
        RunDir {
            kernel: self.kernel.to_string(),
            dataset: self.dataset.clone(),
            processes: Some(self.parallelism.processes(self.interface)),
            threads: self
                .interface
                .is_hybrid()
                .then_some(self.parallelism.threads),
            interface: self.interface,
        }
    }
}

fn banner(title: &str) {
    let stars = "*".repeat(50);
    info!("{stars}");
    info!("{title}");
    info!("{stars}");
}

/// Generates the Makefiles and builds the binaries, as requested by `opts`.
pub fn prepare(config: &HarnessConfig, opts: &BenchOptions) -> Result<()> {
    let interfaces = opts.ordered_interfaces();

    if opts.generate {
        banner("Generating makefiles");
        for kernel in &opts.kernels {
            debug!("{kernel}");
            let datasets = config.datasets_for(kernel, &opts.datasets);
            makefile::generate(config, kernel, &interfaces, &datasets, opts.validate)?;
        }
    }

    if opts.make {
        banner("Running make");
        for kernel in &opts.kernels {
            debug!("{kernel}");
            let datasets = config.datasets_for(kernel, &opts.datasets);
            let stdout = build::build(config, kernel, &interfaces, &datasets)?;
            if opts.verbose {
                print!("{stdout}");
            }
        }
    }
    Ok(())
}

/// Result of a local benchmarking session.
#[derive(Clone, Debug)]
pub struct LocalSession {
    /// `outputs/local/<timestamp>`.
    pub session_dir: PathBuf,
    /// One measurement file per kernel.
    pub measurement_files: Vec<PathBuf>,
    pub measurements: BTreeMap<String, Measurements>,
}

/// Builds (if requested) and runs every kernel locally, validating if requested.
///
/// The first failing build, run or validation aborts the session.
pub fn run_local(config: &HarnessConfig, opts: &BenchOptions) -> Result<LocalSession> {
    prepare(config, opts)?;

    banner("Running kernels");
    let timestamp = timestamp_now();
    let session_dir = layout::session_dir(&config.outputs_root(), consts::LOCAL_ENV, &timestamp);
    let interfaces = opts.ordered_interfaces();

    let mut all = BTreeMap::new();
    for kernel in &opts.kernels {
        debug!("{kernel}");
        let mut validator = Validator::new();
        let mut measurements = Measurements::new();

        for dataset in config.datasets_for(kernel, &opts.datasets) {
            let per_dataset = measurements.entry(dataset.label()).or_default();
            for &interface in &interfaces {
                let plan = RunPlan {
                    kernel,
                    dataset: &dataset,
                    interface,
                    parallelism: Parallelism::for_interface(interface, opts.ranks, opts.threads),
                };
                let paths = RunPaths::new(&session_dir, &plan.run_dir());
                let times = per_dataset.entry(interface.to_string()).or_default();

                for i in 0..opts.num_runs {
                    let record = local::run_once(config, &plan, &paths, i)?;
                    if opts.verbose {
                        print!(
                            "{}",
                            fs::read_to_string(&record.stdout_path).at(&record.stdout_path)?
                        );
                    }
                    if opts.validate {
                        let stderr =
                            fs::read_to_string(&record.stderr_path).at(&record.stderr_path)?;
                        validator.check(&dataset, interface, &plan.binary(), &stderr)?;
                    }
                    times.push(record.wall_time);
                }
            }
        }
        all.insert(kernel.clone(), measurements);
    }

    let mut measurement_files = Vec::new();
    for (kernel, measurements) in &all {
        let path = layout::measurement_file(&config.measurements_root(), kernel, &timestamp);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(measurements)?).at(&path)?;
        info!("{kernel}: measurements written to {}", path.display());
        measurement_files.push(path);
    }

    Ok(LocalSession {
        session_dir,
        measurement_files,
        measurements: all,
    })
}

/// What to do with batch scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// Write the scripts.
    pub generate: bool,
    /// Submit them.
    pub submit: bool,
}

/// Builds (if requested), then writes and submits one batch script per binary.
///
/// Without script generation, the scripts written by the latest cluster session are submitted
/// again; finding none is a [`Error::NoBatchScripts`]. Returns the session directory the jobs
/// write into.
pub fn submit_jobs(
    config: &HarnessConfig,
    opts: &BenchOptions,
    batch: BatchOptions,
) -> Result<PathBuf> {
    prepare(config, opts)?;
    if opts.validate {
        warn!("batch jobs dump their arrays into the captured .err files, nothing compares them");
    }

    let session_dir = if batch.generate {
        layout::session_dir(&config.outputs_root(), consts::CLUSTER_ENV, &timestamp_now())
    } else {
        latest_cluster_session(config)?
    };
    let interfaces = opts.ordered_interfaces();

    if batch.generate {
        banner("Generating batch scripts");
    }
    let mut scripts = Vec::new();
    for kernel in &opts.kernels {
        for dataset in config.datasets_for(kernel, &opts.datasets) {
            for &interface in &interfaces {
                let plan = RunPlan {
                    kernel,
                    dataset: &dataset,
                    interface,
                    parallelism: Parallelism::for_interface(interface, opts.ranks, opts.threads),
                };
                let paths = RunPaths::new(&session_dir, &plan.run_dir());
                if batch.generate {
                    scripts.push(cluster::write_batch_script(
                        config,
                        &plan,
                        &paths,
                        opts.num_runs,
                    )?);
                    continue;
                }
                let script = cluster::script_path(&paths);
                if script.is_file() {
                    scripts.push(script);
                } else {
                    warn!("{}: no batch script", script.display());
                }
            }
        }
    }
    if scripts.is_empty() {
        return Err(Error::NoBatchScripts(session_dir));
    }

    if batch.submit {
        banner("Scheduling jobs in batch");
        for script in &scripts {
            let answer = cluster::submit(config, script)?;
            info!("{}: {answer}", script.display());
        }
    }
    Ok(session_dir)
}

/// Latest `outputs/euler/<timestamp>` directory.
fn latest_cluster_session(config: &HarnessConfig) -> Result<PathBuf> {
    let env_dir = config.outputs_root().join(consts::CLUSTER_ENV);
    if !env_dir.is_dir() {
        return Err(Error::NoBatchScripts(env_dir));
    }
    timestamp_dirs(&env_dir)?
        .pop()
        .ok_or(Error::NoBatchScripts(env_dir))
}
