//! Parallelization and linking variants of a kernel.

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};

use std::{fmt, str::FromStr};

/// List of supported kernel interfaces.
///
/// The interface decides the compiler, the extra compile/link flags, the suffix of both the
/// source file and the produced binary, and how the binary is launched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interface {
    Std,
    Omp,
    Mpi,
    Blas,
    MpiOmp,
    MpiOmpGather,
}

impl Interface {
    /// Every interface, in their canonical order.
    pub const ALL: [Interface; 6] = [
        Self::Std,
        Self::Omp,
        Self::Mpi,
        Self::Blas,
        Self::MpiOmp,
        Self::MpiOmpGather,
    ];

    /// Name used on the command line and in output directory names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Std => "std",
            Self::Omp => "omp",
            Self::Mpi => "mpi",
            Self::Blas => "blas",
            Self::MpiOmp => "mpi+omp",
            Self::MpiOmpGather => "mpi+omp_gather",
        }
    }

    /// Suffix appended to the kernel name for both the source file and the binary.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Std => "",
            Self::Omp => "_omp",
            Self::Mpi => "_mpi",
            Self::Blas => "_blas",
            Self::MpiOmp => "_omp+mpi",
            Self::MpiOmpGather => "_omp+mpi_gather",
        }
    }

    pub fn uses_mpi(self) -> bool {
        matches!(self, Self::Mpi | Self::MpiOmp | Self::MpiOmpGather)
    }

    pub fn uses_openmp(self) -> bool {
        matches!(self, Self::Omp | Self::MpiOmp | Self::MpiOmpGather)
    }

    pub fn links_blas(self) -> bool {
        matches!(self, Self::Blas)
    }

    pub fn is_hybrid(self) -> bool {
        self.uses_mpi() && self.uses_openmp()
    }

    /// Make variable holding the compiler for this interface.
    pub fn compiler(self) -> &'static str {
        if self.uses_mpi() {
            "${MPI_CC}"
        } else {
            "${CC}"
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Interface {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.name() == s)
            .ok_or_else(|| Error::UnknownInterface(s.to_string()))
    }
}

impl TryFrom<String> for Interface {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Interface> for String {
    fn from(i: Interface) -> Self {
        i.name().to_string()
    }
}

/// Process/thread shape of one execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parallelism {
    /// Number of MPI ranks.
    pub ranks: usize,
    /// Number of OpenMP threads per rank.
    pub threads: usize,
}

impl Parallelism {
    /// Shape effectively used by `interface`: unused dimensions collapse to 1.
    pub fn for_interface(interface: Interface, ranks: usize, threads: usize) -> Self {
        Self {
            ranks: if interface.uses_mpi() { ranks.max(1) } else { 1 },
            threads: if interface.uses_openmp() {
                threads.max(1)
            } else {
                1
            },
        }
    }

    /// Process count reported for `interface`: threads for pure OpenMP, ranks otherwise.
    pub fn processes(&self, interface: Interface) -> usize {
        if interface.uses_openmp() && !interface.uses_mpi() {
            self.threads
        } else {
            self.ranks
        }
    }

    /// Total number of CPUs reserved.
    pub fn cpus(&self) -> usize {
        self.ranks * self.threads
    }
}

/// Puts `std` first when validating, inserting it if it was not requested: its output is the
/// reference every other interface is compared against.
pub fn order_for_validation(interfaces: &[Interface]) -> Vec<Interface> {
    let mut ordered = vec![Interface::Std];
    ordered.extend(interfaces.iter().copied().filter(|i| *i != Interface::Std));
    ordered
}
