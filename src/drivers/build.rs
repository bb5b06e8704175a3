//! Build runner.

use crate::{
    config::{Dataset, HarnessConfig},
    drivers::makefile::target_name,
    error::{Error, Result},
    interface::Interface,
};

use log::debug;

use std::process::Command;

/// Builds every (dataset, interface) target of `kernel` with a single `make` invocation.
///
/// Returns make's stdout. A non-zero exit is a [`Error::Build`] carrying make's stderr.
pub fn build(
    config: &HarnessConfig,
    kernel: &str,
    interfaces: &[Interface],
    datasets: &[Dataset],
) -> Result<String> {
    let dir = config.kernel_dir(kernel)?;
    let targets: Vec<String> = datasets
        .iter()
        .flat_map(|d| interfaces.iter().map(move |&i| target_name(kernel, d, i)))
        .collect();

    debug!("{kernel}: make {}", targets.join(" "));
    let output = Command::new("make")
        .args(&targets)
        .current_dir(&dir)
        .output()
        .map_err(|e| Error::io(&dir, e))?;

    if !output.status.success() {
        return Err(Error::Build {
            kernel: kernel.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
