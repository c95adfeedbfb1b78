//! qsbench: cross-backend quicksort checksum harness.
//!
//! Runs one deterministic workload (LCG array fill, Hoare quicksort, midpoint
//! checksum) on the native oracle, on WebAssembly engines and on a contract
//! VM, and checks every backend against the oracle before recording its cost.
//!
//! Pipeline: [`artifact::load_artifacts`] → [`registry::Registry::build`] →
//! [`driver::Driver::run_all`] → [`report`].

pub mod abi;
pub mod artifact;
pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod interface;
pub mod registry;
pub mod report;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use artifact::{load_artifacts, Artifact, ArtifactSet};
pub use backend::{Adapter, Backend, Engine, Runtime};
pub use driver::{CaseOutcome, CaseReport, Driver, DriverOptions, RunSummary};
pub use error::AdapterError;
pub use qsbench_oracle::{compute_checksum, OracleConfig, RunParams, FIXED_CHECKSUM};
pub use registry::{BenchmarkCase, Language, Registry, Selection};
