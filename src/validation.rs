//! Cross-interface result validation.
//!
//! When built with `-DPOLYBENCH_DUMP_ARRAYS`, kernels dump their output arrays on stderr between
//! a `==BEGIN DUMP_ARRAYS==` / `==END DUMP_ARRAYS==` pair. The sequential run of each dataset
//! provides the reference; every other interface must reproduce it byte for byte.

use crate::{
    config::Dataset,
    error::{Error, Result},
    interface::Interface,
};

use log::debug;
use regex::Regex;

use std::{collections::HashMap, sync::OnceLock};

fn dump_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)==BEGIN +DUMP_ARRAYS==\n(?P<dump>.*)==END +DUMP_ARRAYS==")
            .expect("dump region pattern is valid")
    })
}

/// Text of the dump region in `stderr`, without the markers.
pub fn extract_dump(stderr: &str) -> Option<&str> {
    dump_regex()
        .captures(stderr)
        .and_then(|c| c.name("dump"))
        .map(|m| m.as_str())
}

/// Reference dumps of the sequential runs, one per dataset.
#[derive(Debug, Default)]
pub struct Validator {
    references: HashMap<Dataset, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the reference (for `std`) or compares against it (any other interface).
    ///
    /// `binary` names the run in error messages.
    pub fn check(
        &mut self,
        dataset: &Dataset,
        interface: Interface,
        binary: &str,
        stderr: &str,
    ) -> Result<()> {
        let dump = extract_dump(stderr).ok_or_else(|| Error::MissingDump {
            binary: binary.to_string(),
        })?;

        if interface == Interface::Std {
            debug!("{binary}: storing reference dump ({} bytes)", dump.len());
            self.references.insert(dataset.clone(), dump.to_string());
            return Ok(());
        }

        let reference = self
            .references
            .get(dataset)
            .ok_or_else(|| Error::MissingDump {
                binary: format!("{binary} (no sequential reference for {dataset})"),
            })?;
        if reference != dump {
            return Err(Error::ValidationMismatch {
                binary: binary.to_string(),
                interface: interface.to_string(),
            });
        }
        debug!("{binary}: dump matches the sequential reference");
        Ok(())
    }
}
