//! wasmtime: Cranelift, Winch and the Pulley interpreter.

use super::host::{self, HostState};
use super::{Backend, WasmtimeStrategy};
use crate::abi::{EntryAbi, WasmValue};
use crate::artifact::Artifact;
use crate::error::AdapterError;
use crate::interface::ENTRY_POINT;
use qsbench_oracle::RunParams;
use wasmtime::{Config, Engine, Func, Linker, Module, Store, Strategy, Val};

/// Pulley target matching the host pointer width.
const PULLEY_TARGET: &str = if cfg!(target_pointer_width = "64") {
    "pulley64"
} else {
    "pulley32"
};

pub struct WasmtimeBackend {
    store: Store<HostState>,
    entry: Func,
    abi: EntryAbi,
}

fn engine_config(strategy: WasmtimeStrategy) -> anyhow::Result<Config> {
    let mut config = Config::new();
    match strategy {
        WasmtimeStrategy::Cranelift => {
            config.strategy(Strategy::Cranelift);
        }
        WasmtimeStrategy::Winch => {
            config.strategy(Strategy::Winch);
        }
        WasmtimeStrategy::Pulley => {
            config.target(PULLEY_TARGET)?;
        }
    }
    Ok(config)
}

impl WasmtimeBackend {
    /// Validate, compile, link and instantiate `artifact`.
    ///
    /// A start function runs here, so a trap inside it is a load failure.
    pub fn prepare(artifact: &Artifact, strategy: WasmtimeStrategy) -> Result<Self, AdapterError> {
        let iface = artifact.interface().map_err(AdapterError::load)?;
        let ty = iface
            .export_signature(ENTRY_POINT)
            .ok_or_else(|| AdapterError::Load(format!("{} has no `run` export", artifact.name())))?;
        let abi = EntryAbi::classify(ty)?;
        host::resolve(&iface)?;

        let engine = Engine::new(&engine_config(strategy).map_err(AdapterError::load)?)
            .map_err(AdapterError::load)?;
        let module = Module::new(&engine, artifact.bytes()).map_err(AdapterError::load)?;
        let mut linker = Linker::new(&engine);
        host::link_wasmtime(&mut linker).map_err(AdapterError::load)?;

        let mut store = Store::new(&engine, HostState::default());
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| store.data().instantiation_failure(e))?;
        let entry = instance
            .get_func(&mut store, ENTRY_POINT)
            .ok_or_else(|| AdapterError::Load("`run` export is not a function".into()))?;

        Ok(Self { store, entry, abi })
    }

    pub fn abi(&self) -> EntryAbi {
        self.abi
    }

    pub fn host(&self) -> &HostState {
        self.store.data()
    }
}

impl Backend for WasmtimeBackend {
    fn invoke(&mut self, params: &RunParams) -> Result<u64, AdapterError> {
        let args: Vec<Val> = self
            .abi
            .marshal(params)?
            .into_iter()
            .map(|arg| match arg {
                WasmValue::I32(v) => Val::I32(v),
                WasmValue::I64(v) => Val::I64(v),
            })
            .collect();
        let mut results = [Val::I64(0)];

        self.store.data_mut().begin_call();
        if let Err(err) = self.entry.call(&mut self.store, &args, &mut results) {
            return Err(self.store.data().trap(err));
        }

        let value = match results[0] {
            Val::I32(v) => WasmValue::I32(v),
            Val::I64(v) => WasmValue::I64(v),
            _ => {
                return Err(AdapterError::Marshal(
                    "entry returned a non-integer value".into(),
                ))
            }
        };
        self.abi.unmarshal(value)
    }
}
