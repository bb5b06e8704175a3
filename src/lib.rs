//! Building, running and post-processing PolyBench kernel variants.
//!
//! The binary (`src/main.rs`) only parses the command line and dispatches to the stages exposed
//! here:
//! - [`drivers`]: Makefile generation, builds, local runs and batch submissions
//! - [`aggregate`]: runtime tables from captured output trees
//! - [`report`]: speedup, efficiency, confidence bands and variability
//! - [`plot`]: charts of the above
//! - [`perf_stats`], [`merge`], [`kmeans`]: auxiliary post-processing

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod consts;
pub mod drivers;
pub mod error;
pub mod interface;
pub mod kmeans;
pub mod layout;
pub mod merge;
pub mod perf_report;
pub mod perf_stats;
pub mod plot;
pub mod report;
pub mod timing;
pub mod utils;
pub mod validation;
