//! Crate-level constants.

/// Default number of runs performed for every (kernel, dataset, interface) combination.
pub const NUM_RUNS: u16 = 1;

/// Default number of MPI ranks.
pub const MPI_PROCESSES: usize = 4;

/// Default number of OpenMP threads.
pub const OMP_THREADS: usize = 4;

/// Default number of k-means clusters when isolating the fastest runs.
pub const KMEANS_CLUSTERS: usize = 4;

/// [`KMEANS_CLUSTERS`] spelled as a command-line value.
pub const KMEANS_CLUSTERS_ARG: &str = "4";

/// Upper bound on Lloyd iterations for the k-means helper.
pub const KMEANS_MAX_ITERATIONS: usize = 300;

/// Number of bootstrap resamples for confidence bands.
pub const BOOTSTRAP_SAMPLES: usize = 1000;

/// Confidence level of the bootstrap bands.
pub const CONFIDENCE_LEVEL: f64 = 0.95;

/// Default number of bins of completion time histograms.
pub const HISTOGRAM_BINS: usize = 10;

/// Default number of bins of cluster histograms.
pub const CLUSTER_BINS: usize = 15;

/// Seed shared by every randomized post-processing step, so reports are reproducible.
pub const DEFAULT_SEED: u64 = 0;

/// Format of the timestamp directories and measurement files.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d__%H-%M-%S";

/// Name of the preprocessor switch making PolyBench dump its arrays on stderr.
pub const DUMP_ARRAYS_FLAG: &str = "-DPOLYBENCH_DUMP_ARRAYS";

/// Environment variable read by OpenMP runtimes.
pub const OMP_THREADS_ENV: &str = "OMP_NUM_THREADS";

/// Line separating repetitions inside a captured output file.
pub const RUN_DELIMITER: &str = "===============";

/// Kernels that must be linked against the math library.
pub const LM_KERNELS: &[&str] = &["cholesky", "gramschmidt", "correlation", "jacobi-2d"];

/// Default link flags for BLAS-linked variants.
pub const BLAS_FLAGS: &str = "-lopenblas";

/// Default total memory, in MiB, reserved for a batch job and split across its CPUs.
pub const TOTAL_MEMORY_MB: usize = 4096;

/// Default wall-time limit of a batch job.
pub const TIME_LIMIT: &str = "04:00:00";

/// Default performance-counter wrapper used in batch scripts.
pub const PERF_WRAPPER: &str = "perf stat";

/// Name of the environment directory for local runs under `outputs/`.
pub const LOCAL_ENV: &str = "local";

/// Name of the environment directory for cluster runs under `outputs/`.
pub const CLUSTER_ENV: &str = "euler";

/// PolyBench kernels and their source directory, relative to the PolyBench root.
pub const KERNELS: &[(&str, &str)] = &[
    ("2mm", "linear-algebra/kernels/2mm"),
    ("3mm", "linear-algebra/kernels/3mm"),
    ("atax", "linear-algebra/kernels/atax"),
    ("bicg", "linear-algebra/kernels/bicg"),
    ("doitgen", "linear-algebra/kernels/doitgen"),
    ("mvt", "linear-algebra/kernels/mvt"),
    ("gemm", "linear-algebra/blas/gemm"),
    ("gemver", "linear-algebra/blas/gemver"),
    ("gesummv", "linear-algebra/blas/gesummv"),
    ("symm", "linear-algebra/blas/symm"),
    ("syr2k", "linear-algebra/blas/syr2k"),
    ("syrk", "linear-algebra/blas/syrk"),
    ("trmm", "linear-algebra/blas/trmm"),
    ("cholesky", "linear-algebra/solvers/cholesky"),
    ("durbin", "linear-algebra/solvers/durbin"),
    ("gramschmidt", "linear-algebra/solvers/gramschmidt"),
    ("lu", "linear-algebra/solvers/lu"),
    ("ludcmp", "linear-algebra/solvers/ludcmp"),
    ("trisolv", "linear-algebra/solvers/trisolv"),
    ("correlation", "datamining/correlation"),
    ("covariance", "datamining/covariance"),
    ("deriche", "medley/deriche"),
    ("floyd-warshall", "medley/floyd-warshall"),
    ("nussinov", "medley/nussinov"),
    ("adi", "stencils/adi"),
    ("fdtd-2d", "stencils/fdtd-2d"),
    ("heat-3d", "stencils/heat-3d"),
    ("jacobi-1d", "stencils/jacobi-1d"),
    ("jacobi-2d", "stencils/jacobi-2d"),
    ("seidel-2d", "stencils/seidel-2d"),
];

/// Explicit input sizes used by default for the kernels that have parallel variants.
pub const EXPLICIT_INPUT_SIZES: &[(&str, &[&str])] = &[
    (
        "jacobi-2d",
        &["TSTEPS=100,N=1000", "TSTEPS=500,N=2000", "TSTEPS=1000,N=3000"],
    ),
    ("gemver", &["N=1000", "N=2000", "N=3000"]),
];
