//! Shared fixtures for the end-to-end tests and benches.

use qsbench::artifact::{self, Artifact, ArtifactSet};
use qsbench::backend::{
    Adapter, ContractEntry, PrepareOptions, Runtime, WasmiMode, WasmtimeStrategy,
};
use qsbench::AdapterError;

/// Every WebAssembly runtime usable on this host.
pub fn wasm_runtimes() -> Vec<Runtime> {
    let mut runtimes = vec![Runtime::Wasmtime(WasmtimeStrategy::Cranelift)];
    if cfg!(target_arch = "x86_64") {
        runtimes.push(Runtime::Wasmtime(WasmtimeStrategy::Winch));
    }
    runtimes.extend([
        Runtime::Wasmtime(WasmtimeStrategy::Pulley),
        Runtime::Wasmi(WasmiMode::Eager),
        Runtime::Wasmi(WasmiMode::Lazy),
    ]);
    runtimes
}

/// Artifacts whose entry takes `(seed, arr_len, iter)`.
pub const PARAMETERIZED: [&str; 6] = [
    artifact::RUST_WIDE,
    artifact::RUST_NARROW,
    artifact::ASSEMBLYSCRIPT,
    artifact::ASSEMBLYSCRIPT_SMALL,
    artifact::TINYGO,
    artifact::TINYGO_SMALL,
];

pub fn embedded() -> ArtifactSet {
    ArtifactSet::embedded().expect("embedded artifacts assemble")
}

pub fn embedded_artifact(name: &str) -> Artifact {
    embedded()
        .get(name)
        .unwrap_or_else(|| panic!("no embedded artifact {name}"))
        .as_ref()
        .clone()
}

/// Assemble an ad-hoc module.
pub fn wat_artifact(name: &str, source: &str) -> Artifact {
    Artifact::from_wat(name, source).expect("test module assembles")
}

pub fn prepare(runtime: Runtime, artifact: &Artifact) -> Result<Adapter, AdapterError> {
    Adapter::prepare(runtime, Some(artifact), &PrepareOptions::default())
}

pub fn prepare_contract(entry: ContractEntry, gas_limit: u64) -> Result<Adapter, AdapterError> {
    Adapter::prepare(
        Runtime::ContractVm(entry),
        Some(&embedded_artifact(artifact::CONTRACT)),
        &PrepareOptions {
            gas_limit,
            ..PrepareOptions::default()
        },
    )
}

/// `prepare` for callers that only care about the error.
pub fn prepare_err(runtime: Runtime, artifact: &Artifact) -> AdapterError {
    match prepare(runtime, artifact) {
        Ok(_) => panic!("{} should fail to load on {runtime}", artifact.name()),
        Err(err) => err,
    }
}
