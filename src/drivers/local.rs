//! Local kernel drivers.
//!
//! This module implements the driver functions responsible for launching the compiled kernels on
//! the current machine, capturing their output and extracting their wall time.

use crate::{
    config::HarnessConfig,
    error::{Error, IoResultExt, Result},
    layout::RunPaths,
    timing,
};

use super::RunPlan;

use log::debug;

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// One captured execution.
#[derive(Clone, Debug, PartialEq)]
pub struct RunRecord {
    /// Index of the run within its (kernel, dataset, interface) combination.
    pub index: usize,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    /// Timing values printed by the kernel, one per rank for MPI interfaces.
    pub timings: Vec<f64>,
    /// Wall time of the run: the slowest rank for MPI interfaces.
    pub wall_time: f64,
    pub exit_status: i32,
}

/// Builds the command launching `plan` from `kernel_dir`.
///
/// MPI interfaces go through the configured launcher with a fixed rank count; OpenMP interfaces
/// get their thread count through the environment.
pub fn command_for(config: &HarnessConfig, plan: &RunPlan<'_>, kernel_dir: &Path) -> Result<Command> {
    let binary = kernel_dir.join("bin").join(plan.binary());
    let binary = fs::canonicalize(&binary).at(&binary)?;

    let mut cmd = if plan.interface.uses_mpi() {
        let mut cmd = Command::new(&config.mpi_launcher);
        cmd.arg("-np")
            .arg(plan.parallelism.ranks.to_string())
            .arg(&binary);
        cmd
    } else {
        Command::new(&binary)
    };
    if plan.interface.uses_openmp() {
        cmd.env(
            crate::consts::OMP_THREADS_ENV,
            plan.parallelism.threads.to_string(),
        );
    }
    cmd.current_dir(kernel_dir);
    Ok(cmd)
}

/// Runs `plan` once and captures its output into `paths`.
///
/// A non-zero exit is a [`Error::Run`]; a successful run that printed no timing is a
/// [`Error::NoTimings`].
pub fn run_once(
    config: &HarnessConfig,
    plan: &RunPlan<'_>,
    paths: &RunPaths,
    index: usize,
) -> Result<RunRecord> {
    let kernel_dir = config.kernel_dir(plan.kernel)?;
    let mut cmd = command_for(config, plan, &kernel_dir)?;
    debug!("{}: run {index}: {cmd:?}", plan.binary());

    let output = cmd.output().map_err(|e| Error::io(&kernel_dir, e))?;

    let out_dir = paths.out_dir();
    let err_dir = paths.err_dir();
    fs::create_dir_all(&out_dir).at(&out_dir)?;
    fs::create_dir_all(&err_dir).at(&err_dir)?;
    let stdout_path = paths.out_file(index);
    let stderr_path = paths.err_file(index);
    fs::write(&stdout_path, &output.stdout).at(&stdout_path)?;
    fs::write(&stderr_path, &output.stderr).at(&stderr_path)?;

    if !output.status.success() {
        return Err(Error::Run {
            binary: plan.binary(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let timings = timing::parse_output(&stdout, &stdout_path).values();
    let wall_time = timing::run_times(
        &timings,
        plan.interface,
        plan.parallelism.ranks,
        &stdout_path,
    )
    .into_iter()
    .reduce(f64::max)
    .ok_or_else(|| Error::NoTimings(plan.binary()))?;
    debug!("{}: run {index}: {wall_time}s", plan.binary());

    Ok(RunRecord {
        index,
        stdout_path,
        stderr_path,
        timings,
        wall_time,
        exit_status: output.status.code().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Dataset,
        interface::{Interface, Parallelism},
    };

    use std::ffi::OsStr;

    fn plan_for(dataset: &Dataset, interface: Interface) -> RunPlan<'_> {
        RunPlan {
            kernel: "gemver",
            dataset,
            interface,
            parallelism: Parallelism::for_interface(interface, 4, 2),
        }
    }

    fn envs(cmd: &Command) -> Vec<(String, String)> {
        cmd.get_envs()
            .filter_map(|(k, v)| Some((k.to_str()?.to_string(), v?.to_str()?.to_string())))
            .collect()
    }

    #[test]
    fn launches_by_interface() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let dataset = Dataset::with_n(1000);
        for interface in [Interface::Std, Interface::Omp, Interface::Mpi, Interface::MpiOmp] {
            let plan = plan_for(&dataset, interface);
            fs::write(bin.join(plan.binary()), "").unwrap();
        }
        let config = HarnessConfig::default();

        let std = command_for(&config, &plan_for(&dataset, Interface::Std), tmp.path()).unwrap();
        assert!(std.get_program().to_string_lossy().ends_with("gemver_N_1000"));
        assert!(envs(&std).is_empty());

        let omp = command_for(&config, &plan_for(&dataset, Interface::Omp), tmp.path()).unwrap();
        assert_eq!(envs(&omp), vec![("OMP_NUM_THREADS".to_string(), "2".to_string())]);

        let mpi = command_for(&config, &plan_for(&dataset, Interface::Mpi), tmp.path()).unwrap();
        assert_eq!(mpi.get_program(), OsStr::new("mpiexec"));
        let args: Vec<_> = mpi.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..2], ["-np", "4"]);
        assert!(args[2].ends_with("gemver_N_1000_mpi"));

        let hybrid =
            command_for(&config, &plan_for(&dataset, Interface::MpiOmp), tmp.path()).unwrap();
        assert_eq!(hybrid.get_program(), OsStr::new("mpiexec"));
        assert_eq!(envs(&hybrid)[0].1, "2");
    }

    #[test]
    fn missing_binary_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dataset = Dataset::with_n(1000);
        let err = command_for(
            &HarnessConfig::default(),
            &plan_for(&dataset, Interface::Std),
            tmp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
