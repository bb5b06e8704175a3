//! Makefile generation.
//!
//! Each kernel directory gets a Makefile with one target per (dataset, interface) pair. The
//! compiler and `CFLAGS` come from the `config.mk` fragment at the PolyBench root.

use crate::{
    config::{Dataset, HarnessConfig},
    consts,
    error::{IoResultExt, Result},
    interface::Interface,
    utils::relative_root,
};

use log::debug;

use std::{fmt::Write as _, fs, path::PathBuf, process::Command};

/// Name of the binary built for `kernel` on `dataset` with `interface`.
pub fn binary_name(kernel: &str, dataset: &Dataset, interface: Interface) -> String {
    format!("{kernel}_{}{}", dataset.label(), interface.suffix())
}

/// Name of the make target building [`binary_name`].
pub fn target_name(kernel: &str, dataset: &Dataset, interface: Interface) -> String {
    format!("{kernel}_{}_{}", dataset.label(), interface.name())
}

/// Renders the Makefile of `kernel`. Identical inputs always render identical text.
pub fn render_makefile(
    config: &HarnessConfig,
    kernel: &str,
    interfaces: &[Interface],
    datasets: &[Dataset],
    validate: bool,
) -> Result<String> {
    let rel_root = relative_root(config.kernel_rel_dir(kernel)?);
    let rel_root = rel_root.display();
    let utilities = format!("{rel_root}/utilities");

    let mut extra_flags = String::new();
    if validate {
        extra_flags.push(' ');
        extra_flags.push_str(consts::DUMP_ARRAYS_FLAG);
    }
    if config.needs_libm(kernel) {
        extra_flags.push_str(" -lm");
    }

    let mut content = format!("include {rel_root}/config.mk\n\nEXTRA_FLAGS={extra_flags}\n\n");

    // Writing to a `String` cannot fail.
    for dataset in datasets {
        for &interface in interfaces {
            let source = format!("{kernel}{}.c", interface.suffix());
            let _ = writeln!(
                content,
                "{}: {source} {kernel}.h",
                target_name(kernel, dataset, interface)
            );
            content.push_str("\t@mkdir -p bin\n");
            let _ = write!(
                content,
                "\t${{VERBOSE}} {} -o bin/{} {source} ${{CFLAGS}} -I. -I{utilities} {utilities}/polybench.c {} ${{EXTRA_FLAGS}}",
                interface.compiler(),
                binary_name(kernel, dataset, interface),
                dataset.cflags(),
            );
            if interface.uses_openmp() {
                content.push_str(" -fopenmp");
            }
            if interface.links_blas() {
                content.push(' ');
                content.push_str(&config.blas_flags);
            }
            content.push_str("\n\n");
        }
    }

    content.push_str("clean:\n\t@ rm -f bin/*\n\n");
    Ok(content)
}

/// Cleans the kernel directory and overwrites its Makefile.
pub fn generate(
    config: &HarnessConfig,
    kernel: &str,
    interfaces: &[Interface],
    datasets: &[Dataset],
    validate: bool,
) -> Result<PathBuf> {
    let dir = config.kernel_dir(kernel)?;
    let content = render_makefile(config, kernel, interfaces, datasets, validate)?;

    // Stale binaries must not survive a regeneration. A missing Makefile makes this fail, which
    // is fine on a fresh checkout.
    match Command::new("make").arg("clean").current_dir(&dir).output() {
        Ok(out) if !out.status.success() => {
            debug!("{kernel}: make clean failed, continuing");
        }
        Err(e) => debug!("{kernel}: could not run make clean: {e}"),
        Ok(_) => {}
    }

    let path = dir.join("Makefile");
    fs::write(&path, content).at(&path)?;
    debug!("{kernel}: wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HarnessConfig {
        HarnessConfig::default()
    }

    #[test]
    fn renders_targets_per_dataset_and_interface() {
        let datasets = vec![Dataset::with_n(1000), Dataset::with_n(2000)];
        let text = render_makefile(
            &config(),
            "gemver",
            &[Interface::Std, Interface::Omp, Interface::Mpi, Interface::Blas],
            &datasets,
            false,
        )
        .unwrap();

        assert!(text.starts_with("include ../../../config.mk\n\nEXTRA_FLAGS=\n\n"));
        assert!(text.contains(
            "gemver_N_1000_std: gemver.c gemver.h\n\t@mkdir -p bin\n\t${VERBOSE} ${CC} -o bin/gemver_N_1000 gemver.c ${CFLAGS} -I. -I../../../utilities ../../../utilities/polybench.c -DN=1000 ${EXTRA_FLAGS}\n\n"
        ));
        assert!(text.contains(
            "\t${VERBOSE} ${CC} -o bin/gemver_N_2000_omp gemver_omp.c ${CFLAGS} -I. -I../../../utilities ../../../utilities/polybench.c -DN=2000 ${EXTRA_FLAGS} -fopenmp\n"
        ));
        assert!(text.contains("\t${VERBOSE} ${MPI_CC} -o bin/gemver_N_1000_mpi gemver_mpi.c"));
        assert!(text.contains("-DN=1000 ${EXTRA_FLAGS} -lopenblas\n"));
        assert!(text.ends_with("clean:\n\t@ rm -f bin/*\n\n"));
        assert_eq!(text.matches("@mkdir -p bin").count(), 8);
    }

    #[test]
    fn hybrid_targets_use_mpi_compiler_and_openmp() {
        let text = render_makefile(
            &config(),
            "jacobi-2d",
            &[Interface::MpiOmp],
            &["TSTEPS=10,N=100".parse().unwrap()],
            true,
        )
        .unwrap();
        assert!(text.contains("EXTRA_FLAGS= -DPOLYBENCH_DUMP_ARRAYS -lm\n"));
        assert!(text.contains(
            "jacobi-2d_TSTEPS_10_N_100_mpi+omp: jacobi-2d_omp+mpi.c jacobi-2d.h\n"
        ));
        assert!(text.contains(
            "${MPI_CC} -o bin/jacobi-2d_TSTEPS_10_N_100_omp+mpi jacobi-2d_omp+mpi.c ${CFLAGS} -I. -I../../utilities ../../utilities/polybench.c -DTSTEPS=10 -DN=100 ${EXTRA_FLAGS} -fopenmp\n"
        ));
    }

    #[test]
    fn rendering_is_deterministic() {
        let datasets: Vec<Dataset> = vec!["small".parse().unwrap(), "N=64".parse().unwrap()];
        let interfaces = Interface::ALL;
        let a = render_makefile(&config(), "atax", &interfaces, &datasets, true).unwrap();
        let b = render_makefile(&config(), "atax", &interfaces, &datasets, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_kernel_has_no_makefile() {
        assert!(render_makefile(&config(), "nope", &[Interface::Std], &[], false).is_err());
    }

    #[test]
    fn generate_overwrites_the_makefile() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config();
        config.root = root.path().to_path_buf();
        let dir = config.kernel_dir("atax").unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Makefile"), "stale").unwrap();

        let path = generate(&config, "atax", &[Interface::Std], &["mini".parse().unwrap()], false)
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("atax_mini_std: atax.c atax.h"));
    }
}
