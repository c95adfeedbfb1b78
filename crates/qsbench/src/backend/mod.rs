//! Execution backends.
//!
//! A [`Runtime`] names an engine and its execution strategy; [`Adapter::prepare`]
//! turns a runtime plus an artifact into a ready-to-call [`Backend`]. The
//! set of runtimes is closed, so dispatch is a plain enum match.

pub mod host;
pub mod native;
pub mod vm;
pub mod wasmi_adapter;
pub mod wasmtime_adapter;

use crate::artifact::Artifact;
use crate::error::AdapterError;
use qsbench_oracle::{OracleConfig, RunParams};
use serde::Serialize;
use std::fmt;

pub use native::NativeBackend;
pub use vm::{ContractVm, VmBackend, WasmContractVm};
pub use wasmi_adapter::WasmiBackend;
pub use wasmtime_adapter::WasmtimeBackend;

/// Compiler or interpreter inside wasmtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmtimeStrategy {
    /// Optimizing compiler.
    Cranelift,
    /// Single-pass baseline compiler (x86_64 only).
    Winch,
    /// Portable bytecode interpreter.
    Pulley,
}

/// Translation mode of wasmi's register-machine interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmiMode {
    /// Translate every function at module compile time.
    Eager,
    /// Translate functions on first call.
    Lazy,
}

/// Which entry a contract deployment is called through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractEntry {
    /// `run(uint256,uint256,uint256)`.
    Abi,
    /// `run()` with the baked parameters.
    Fixed,
}

/// An engine plus its execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "engine", content = "strategy", rename_all = "snake_case")]
pub enum Runtime {
    Native,
    Wasmtime(WasmtimeStrategy),
    Wasmi(WasmiMode),
    ContractVm(ContractEntry),
}

/// Engine families, as enabled or disabled by the run selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Native,
    Wasmtime,
    Pulley,
    Wasmi,
    Vm,
}

impl Runtime {
    pub fn engine(&self) -> Engine {
        match self {
            Self::Native => Engine::Native,
            Self::Wasmtime(WasmtimeStrategy::Pulley) => Engine::Pulley,
            Self::Wasmtime(_) => Engine::Wasmtime,
            Self::Wasmi(_) => Engine::Wasmi,
            Self::ContractVm(_) => Engine::Vm,
        }
    }

    /// Engine name as it appears in case names.
    pub fn engine_label(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Wasmtime(_) => "wasmtime",
            Self::Wasmi(_) => "wasmi",
            Self::ContractVm(_) => "vm",
        }
    }

    pub fn strategy_label(&self) -> Option<&'static str> {
        match self {
            Self::Native => None,
            Self::Wasmtime(WasmtimeStrategy::Cranelift) => Some("cranelift"),
            Self::Wasmtime(WasmtimeStrategy::Winch) => Some("winch"),
            Self::Wasmtime(WasmtimeStrategy::Pulley) => Some("pulley"),
            Self::Wasmi(WasmiMode::Eager) => Some("eager"),
            Self::Wasmi(WasmiMode::Lazy) => Some("lazy"),
            Self::ContractVm(ContractEntry::Abi) => Some("abi"),
            Self::ContractVm(ContractEntry::Fixed) => Some("fixed"),
        }
    }

    /// Whether this runtime executes an artifact.
    pub fn needs_artifact(&self) -> bool {
        !matches!(self, Self::Native)
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy_label() {
            Some(strategy) => write!(f, "{}/{strategy}", self.engine_label()),
            None => f.write_str(self.engine_label()),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Wasmtime => "wasmtime",
            Self::Pulley => "pulley",
            Self::Wasmi => "wasmi",
            Self::Vm => "vm",
        })
    }
}

/// A prepared backend, ready to run the workload.
pub trait Backend {
    /// Run `Run(seed, arrayLength, iterations)` once and return the checksum.
    fn invoke(&mut self, params: &RunParams) -> Result<u64, AdapterError>;

    /// Gas consumed by the most recent invoke, for metered backends.
    fn last_gas(&self) -> Option<u64> {
        None
    }
}

/// Settings shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Gas budget of one contract call.
    pub gas_limit: u64,
    /// Arithmetic of the native backend.
    pub oracle: OracleConfig,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            gas_limit: vm::DEFAULT_GAS_LIMIT,
            oracle: OracleConfig::CANONICAL,
        }
    }
}

/// Owned per-case backend state. Dropped when the case completes.
pub enum Adapter {
    Native(NativeBackend),
    Wasmtime(WasmtimeBackend),
    Wasmi(WasmiBackend),
    ContractVm(VmBackend<WasmContractVm>),
}

impl Adapter {
    /// Build the backend for `runtime`, loading `artifact` where one is needed.
    pub fn prepare(
        runtime: Runtime,
        artifact: Option<&Artifact>,
        options: &PrepareOptions,
    ) -> Result<Self, AdapterError> {
        let artifact = match (runtime.needs_artifact(), artifact) {
            (false, _) => return Ok(Self::Native(NativeBackend::with_config(options.oracle))),
            (true, Some(artifact)) => artifact,
            (true, None) => {
                return Err(AdapterError::Load(format!("{runtime} requires an artifact")))
            }
        };

        tracing::debug!(%runtime, artifact = artifact.name(), "preparing backend");
        Ok(match runtime {
            Runtime::Native => Self::Native(NativeBackend::with_config(options.oracle)),
            Runtime::Wasmtime(strategy) => {
                Self::Wasmtime(WasmtimeBackend::prepare(artifact, strategy)?)
            }
            Runtime::Wasmi(mode) => Self::Wasmi(WasmiBackend::prepare(artifact, mode)?),
            Runtime::ContractVm(entry) => Self::ContractVm(VmBackend::deploy(
                WasmContractVm::new().map_err(AdapterError::load)?,
                artifact,
                entry,
                options.gas_limit,
            )?),
        })
    }
}

impl Backend for Adapter {
    fn invoke(&mut self, params: &RunParams) -> Result<u64, AdapterError> {
        match self {
            Self::Native(b) => b.invoke(params),
            Self::Wasmtime(b) => b.invoke(params),
            Self::Wasmi(b) => b.invoke(params),
            Self::ContractVm(b) => b.invoke(params),
        }
    }

    fn last_gas(&self) -> Option<u64> {
        match self {
            Self::Native(b) => b.last_gas(),
            Self::Wasmtime(b) => b.last_gas(),
            Self::Wasmi(b) => b.last_gas(),
            Self::ContractVm(b) => b.last_gas(),
        }
    }
}
