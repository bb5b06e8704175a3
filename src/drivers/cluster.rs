//! Cluster kernel drivers.
//!
//! Instead of launching the kernels directly, these drivers write one batch script per
//! (kernel, dataset, interface) combination and hand it to the scheduler. Submission is
//! fire-and-forget: the scripts capture their output in the same run directories as local runs,
//! and completion is observed later by aggregating those directories.
//!
//! # Resource reservation
//! A job reserves `ranks` tasks of `threads` CPUs each. The configured memory budget is split
//! evenly across all of these CPUs.

use crate::{
    config::HarnessConfig,
    consts,
    error::{Error, IoResultExt, Result},
    layout::RunPaths,
};

use super::RunPlan;

use log::debug;

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// File name of the batch script inside its run directory.
pub const JOB_SCRIPT: &str = "job.sh";

/// Batch script of the run directory `paths`.
pub fn script_path(paths: &RunPaths) -> PathBuf {
    paths.dir.join(JOB_SCRIPT)
}

/// Memory per CPU, in MiB, for a job using `cpus` CPUs.
pub fn memory_per_cpu(total_memory_mb: usize, cpus: usize) -> usize {
    (total_memory_mb / cpus.max(1)).max(1)
}

/// Renders the batch script of `plan`.
///
/// `kernel_dir` and `paths` should be absolute: the job starts in the scheduler's working
/// directory, not ours.
pub fn render_batch_script(
    config: &HarnessConfig,
    plan: &RunPlan<'_>,
    kernel_dir: &Path,
    paths: &RunPaths,
    num_runs: usize,
) -> String {
    let p = plan.parallelism;
    let out_dir = paths.out_dir();
    let err_dir = paths.err_dir();

    let mut script = String::from("#!/bin/bash\n");
    // Writing to a `String` cannot fail.
    let _ = writeln!(script, "#SBATCH --job-name={}", plan.binary());
    let _ = writeln!(script, "#SBATCH --nodes={}", config.nodes);
    let _ = writeln!(script, "#SBATCH --ntasks={}", p.ranks);
    let _ = writeln!(script, "#SBATCH --cpus-per-task={}", p.threads);
    let _ = writeln!(
        script,
        "#SBATCH --mem-per-cpu={}M",
        memory_per_cpu(config.total_memory_mb, p.cpus())
    );
    let _ = writeln!(script, "#SBATCH --time={}", config.time_limit);
    let _ = writeln!(script, "#SBATCH --output={}/job-%j.log", paths.dir.display());
    let _ = writeln!(script, "#SBATCH --error={}/job-%j.log", paths.dir.display());
    script.push('\n');

    let _ = writeln!(script, "export {}={}", consts::OMP_THREADS_ENV, p.threads);
    script.push('\n');
    let _ = writeln!(
        script,
        "mkdir -p {} {}",
        out_dir.display(),
        err_dir.display()
    );
    let _ = writeln!(script, "cd {}", kernel_dir.display());
    script.push('\n');

    let launcher = if plan.interface.uses_mpi() { "srun " } else { "" };
    let _ = writeln!(script, "for i in $(seq 0 {}); do", num_runs.max(1) - 1);
    let _ = writeln!(
        script,
        "    {launcher}{} ./bin/{} > {}/$i.out 2> {}/$i.err",
        config.perf_wrapper,
        plan.binary(),
        out_dir.display(),
        err_dir.display()
    );
    script.push_str("done\n");
    script
}

/// Writes the batch script of `plan` into its run directory and returns its path.
pub fn write_batch_script(
    config: &HarnessConfig,
    plan: &RunPlan<'_>,
    paths: &RunPaths,
    num_runs: usize,
) -> Result<PathBuf> {
    fs::create_dir_all(&paths.dir).at(&paths.dir)?;
    let kernel_dir = config.kernel_dir(plan.kernel)?;
    let kernel_dir = fs::canonicalize(&kernel_dir).at(&kernel_dir)?;
    let run_dir = fs::canonicalize(&paths.dir).at(&paths.dir)?;
    let paths = RunPaths { dir: run_dir };

    let script = render_batch_script(config, plan, &kernel_dir, &paths, num_runs);
    let path = script_path(&paths);
    fs::write(&path, script).at(&path)?;
    debug!("{}: wrote {}", plan.binary(), path.display());
    Ok(path)
}

/// Submits `script` to the scheduler without waiting for the job.
///
/// Returns what the submission command printed (usually the job id).
pub fn submit(config: &HarnessConfig, script: &Path) -> Result<String> {
    let output = Command::new(&config.submit_command)
        .arg(script)
        .output()
        .map_err(|e| Error::io(script, e))?;
    if !output.status.success() {
        return Err(Error::Submit {
            script: script.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Dataset, interface::Interface, interface::Parallelism, layout::RunDir};

    fn render(interface: Interface, ranks: usize, threads: usize) -> String {
        let config = HarnessConfig::default();
        let dataset = Dataset::with_n(4000);
        let plan = RunPlan {
            kernel: "gemver",
            dataset: &dataset,
            interface,
            parallelism: Parallelism::for_interface(interface, ranks, threads),
        };
        let paths = RunPaths::new(Path::new("/scratch/outputs/euler/ts"), &plan.run_dir());
        render_batch_script(&config, &plan, Path::new("/pb/linear-algebra/blas/gemver"), &paths, 5)
    }

    #[test]
    fn memory_is_split_across_cpus() {
        assert_eq!(memory_per_cpu(4096, 4), 1024);
        assert_eq!(memory_per_cpu(4096, 3), 1365);
        assert_eq!(memory_per_cpu(4, 8), 1);
        assert_eq!(memory_per_cpu(4096, 0), 4096);
    }

    #[test]
    fn mpi_script_reserves_tasks_and_uses_srun() {
        let script = render(Interface::Mpi, 8, 4);
        assert!(script.starts_with("#!/bin/bash\n#SBATCH --job-name=gemver_N_4000_mpi\n"));
        assert!(script.contains("#SBATCH --ntasks=8\n#SBATCH --cpus-per-task=1\n"));
        assert!(script.contains("#SBATCH --mem-per-cpu=512M\n"));
        assert!(script.contains("#SBATCH --time=04:00:00\n"));
        assert!(script.contains("export OMP_NUM_THREADS=1\n"));
        assert!(script.contains("for i in $(seq 0 4); do\n"));
        assert!(script.contains(
            "    srun perf stat ./bin/gemver_N_4000_mpi > /scratch/outputs/euler/ts/gemver_N_4000_np_8_mpi/out/$i.out 2> /scratch/outputs/euler/ts/gemver_N_4000_np_8_mpi/err/$i.err\n"
        ));
    }

    #[test]
    fn openmp_script_exports_threads() {
        let script = render(Interface::Omp, 8, 16);
        assert!(script.contains("#SBATCH --ntasks=1\n#SBATCH --cpus-per-task=16\n"));
        assert!(script.contains("#SBATCH --mem-per-cpu=256M\n"));
        assert!(script.contains("export OMP_NUM_THREADS=16\n"));
        assert!(script.contains("    perf stat ./bin/gemver_N_4000_omp > "));
        assert!(script.contains("cd /pb/linear-algebra/blas/gemver\n"));
    }

    #[test]
    fn hybrid_script_reserves_both_dimensions() {
        let script = render(Interface::MpiOmp, 2, 4);
        assert!(script.contains("#SBATCH --ntasks=2\n#SBATCH --cpus-per-task=4\n"));
        assert!(script.contains("#SBATCH --mem-per-cpu=512M\n"));
        let run = RunDir::parse("gemver_N_4000_np_2_nt_4_mpi+omp").unwrap();
        assert!(script.contains(&run.name()));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render(Interface::Blas, 1, 1), render(Interface::Blas, 1, 1));
    }
}
