//! Contract virtual machine.
//!
//! [`ContractVm`] is the opaque account-based interface the harness needs:
//! deploy code, then call it with calldata and a gas budget. The one
//! implementation, [`WasmContractVm`], keeps accounts in memory and executes
//! contract code as WebAssembly under wasmtime fuel metering, one fuel unit
//! per unit of gas.
//!
//! Contract calling convention: calldata is copied to linear memory at
//! offset 0 (at most [`MAX_CALLDATA`] bytes), the export `call(input_len)`
//! returns the length of the return data it wrote at [`RETURN_OFFSET`].
//! A trap is a revert.

use super::{Backend, ContractEntry};
use crate::abi::{decode_word, encode_call, encode_run, RUN_FIXED_SELECTOR};
use crate::artifact::Artifact;
use crate::error::AdapterError;
use crate::interface::{self, ExportKind, CONTRACT_ENTRY};
use qsbench_oracle::RunParams;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use wasmparser::ValType;
use wasmtime::{Config, Engine, Instance, Module, Store, Trap};

/// Gas budget of one call unless configured otherwise.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000_000;

pub const MAX_CALLDATA: usize = 256;
pub const RETURN_OFFSET: usize = 256;

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Address of the `nonce`-th deployment.
    fn derive(nonce: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[..3].copy_from_slice(&[0xc0, 0xff, 0xee]);
        bytes[12..].copy_from_slice(&nonce.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub output: Vec<u8>,
    pub gas_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("invalid contract code: {0}")]
    InvalidCode(String),
    #[error("no contract deployed at {0}")]
    UnknownAccount(Address),
    #[error("calldata of {0} bytes exceeds {MAX_CALLDATA}")]
    CalldataTooLarge(usize),
    #[error("reverted after {gas_used} gas: {reason}")]
    Revert { gas_used: u64, reason: String },
    #[error("out of gas (limit {gas_limit})")]
    OutOfGas { gas_limit: u64 },
    #[error("invalid return data: {0}")]
    BadReturn(String),
    #[error("vm failure: {0}")]
    Internal(String),
}

impl From<VmError> for AdapterError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::InvalidCode(_) | VmError::UnknownAccount(_) | VmError::Internal(_) => {
                AdapterError::load(err)
            }
            VmError::Revert { .. } | VmError::OutOfGas { .. } => AdapterError::trap(err),
            VmError::CalldataTooLarge(_) | VmError::BadReturn(_) => AdapterError::marshal(err),
        }
    }
}

/// Account-based contract execution.
pub trait ContractVm {
    /// Store `code` under a fresh address.
    fn deploy(&mut self, code: &[u8]) -> Result<Address, VmError>;

    /// Execute the contract at `to` with `input` as calldata.
    fn call(&mut self, to: Address, input: &[u8], gas_limit: u64) -> Result<CallOutcome, VmError>;
}

/// In-memory accounts holding metered WebAssembly contracts.
pub struct WasmContractVm {
    engine: Engine,
    accounts: BTreeMap<Address, Module>,
    nonce: u64,
}

impl WasmContractVm {
    pub fn new() -> anyhow::Result<Self> {
        let mut config = Config::new();
        config.consume_fuel(true);
        Ok(Self {
            engine: Engine::new(&config)?,
            accounts: BTreeMap::new(),
            nonce: 0,
        })
    }

    fn check_code(code: &[u8]) -> Result<(), VmError> {
        let iface =
            interface::inspect(code).map_err(|e| VmError::InvalidCode(format!("{e:#}")))?;
        if let Some(import) = iface.imports.first() {
            return Err(VmError::InvalidCode(format!(
                "contracts cannot import ({}.{})",
                import.module_name, import.name
            )));
        }
        if !iface.exports_item("memory", ExportKind::Memory) {
            return Err(VmError::InvalidCode("no exported memory".into()));
        }
        match iface.export_signature(CONTRACT_ENTRY) {
            Some(ty) if ty.params() == [ValType::I32] && ty.results() == [ValType::I32] => Ok(()),
            Some(ty) => Err(VmError::InvalidCode(format!(
                "`{CONTRACT_ENTRY}` must be (i32) -> i32, found {}",
                interface::describe_signature(ty)
            ))),
            None => Err(VmError::InvalidCode(format!("no `{CONTRACT_ENTRY}` export"))),
        }
    }

    fn failure(err: anyhow::Error, gas_limit: u64, gas_used: u64) -> VmError {
        if matches!(err.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
            VmError::OutOfGas { gas_limit }
        } else {
            VmError::Revert {
                gas_used,
                reason: format!("{err:#}"),
            }
        }
    }
}

impl ContractVm for WasmContractVm {
    fn deploy(&mut self, code: &[u8]) -> Result<Address, VmError> {
        Self::check_code(code)?;
        let module =
            Module::new(&self.engine, code).map_err(|e| VmError::InvalidCode(format!("{e:#}")))?;
        self.nonce += 1;
        let address = Address::derive(self.nonce);
        self.accounts.insert(address, module);
        tracing::debug!(%address, bytes = code.len(), "contract deployed");
        Ok(address)
    }

    fn call(&mut self, to: Address, input: &[u8], gas_limit: u64) -> Result<CallOutcome, VmError> {
        let module = self.accounts.get(&to).ok_or(VmError::UnknownAccount(to))?;
        if input.len() > MAX_CALLDATA {
            return Err(VmError::CalldataTooLarge(input.len()));
        }

        let internal = |e: anyhow::Error| VmError::Internal(format!("{e:#}"));
        let mut store = Store::new(&self.engine, ());
        store.set_fuel(gas_limit).map_err(internal)?;
        let gas_used = |store: &Store<()>| gas_limit.saturating_sub(store.get_fuel().unwrap_or(0));

        let instance = Instance::new(&mut store, module, &[])
            .map_err(|e| Self::failure(e, gas_limit, gas_used(&store)))?;
        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| VmError::InvalidCode("no exported memory".into()))?;
        memory.write(&mut store, 0, input).map_err(|e| internal(e.into()))?;
        let entry = instance
            .get_typed_func::<i32, i32>(&mut store, CONTRACT_ENTRY)
            .map_err(|e| VmError::InvalidCode(format!("{e:#}")))?;

        let len = entry
            .call(&mut store, input.len() as i32)
            .map_err(|e| Self::failure(e, gas_limit, gas_used(&store)))?;
        let gas_used = gas_used(&store);

        let len = usize::try_from(len)
            .map_err(|_| VmError::BadReturn(format!("negative return length {len}")))?;
        let mut output = vec![0u8; len];
        memory
            .read(&store, RETURN_OFFSET, &mut output)
            .map_err(|_| VmError::BadReturn(format!("{len} bytes at {RETURN_OFFSET} out of bounds")))?;

        Ok(CallOutcome { output, gas_used })
    }
}

/// Benchmark adapter over any [`ContractVm`].
pub struct VmBackend<V> {
    vm: V,
    address: Address,
    entry: ContractEntry,
    gas_limit: u64,
    last_gas: Option<u64>,
}

impl<V: ContractVm> VmBackend<V> {
    /// Deploy `artifact` once; every invoke calls the same account.
    pub fn deploy(
        mut vm: V,
        artifact: &Artifact,
        entry: ContractEntry,
        gas_limit: u64,
    ) -> Result<Self, AdapterError> {
        let address = vm.deploy(artifact.bytes())?;
        Ok(Self {
            vm,
            address,
            entry,
            gas_limit,
            last_gas: None,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn calldata(&self, params: &RunParams) -> Result<Vec<u8>, AdapterError> {
        match self.entry {
            ContractEntry::Abi => Ok(encode_run(params)),
            ContractEntry::Fixed if *params == RunParams::FIXED => {
                Ok(encode_call(RUN_FIXED_SELECTOR, &[]))
            }
            ContractEntry::Fixed => Err(AdapterError::Marshal(format!(
                "fixed entry only serves {}, not {params}",
                RunParams::FIXED
            ))),
        }
    }
}

impl<V: ContractVm> Backend for VmBackend<V> {
    fn invoke(&mut self, params: &RunParams) -> Result<u64, AdapterError> {
        let input = self.calldata(params)?;
        self.last_gas = None;
        let outcome = self.vm.call(self.address, &input, self.gas_limit)?;
        self.last_gas = Some(outcome.gas_used);
        decode_word(&outcome.output)
    }

    fn last_gas(&self) -> Option<u64> {
        self.last_gas
    }
}
