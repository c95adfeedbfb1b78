//! wasmi: eager and lazy translation.

use super::host::{self, HostState};
use super::{Backend, WasmiMode};
use crate::abi::{EntryAbi, WasmValue};
use crate::artifact::Artifact;
use crate::error::AdapterError;
use crate::interface::ENTRY_POINT;
use qsbench_oracle::RunParams;
use wasmi::{CompilationMode, Config, Engine, Func, Linker, Module, Store, Val};

pub struct WasmiBackend {
    store: Store<HostState>,
    entry: Func,
    abi: EntryAbi,
}

impl WasmiBackend {
    pub fn prepare(artifact: &Artifact, mode: WasmiMode) -> Result<Self, AdapterError> {
        let iface = artifact.interface().map_err(AdapterError::load)?;
        let ty = iface
            .export_signature(ENTRY_POINT)
            .ok_or_else(|| AdapterError::Load(format!("{} has no `run` export", artifact.name())))?;
        let abi = EntryAbi::classify(ty)?;
        host::resolve(&iface)?;

        let mut config = Config::default();
        config.compilation_mode(match mode {
            WasmiMode::Eager => CompilationMode::Eager,
            WasmiMode::Lazy => CompilationMode::Lazy,
        });
        let engine = Engine::new(&config);
        let module = Module::new(&engine, artifact.bytes()).map_err(AdapterError::load)?;
        let mut linker = Linker::<HostState>::new(&engine);
        host::link_wasmi(&mut linker).map_err(AdapterError::load)?;

        let mut store = Store::new(&engine, HostState::default());
        let instance = linker
            .instantiate(&mut store, &module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| store.data().instantiation_failure(e))?;
        let entry = instance
            .get_func(&store, ENTRY_POINT)
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

impl Backend for WasmiBackend {
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
