//! Host imports offered to benchmark modules.
//!
//! Two families are supported: the AssemblyScript `env.abort` hook and a
//! small, side-effect free subset of WASI preview 1. Guest output is
//! captured in [`HostState`] rather than written to the process streams.
//! Everything else a module imports is rejected before instantiation.
//!
//! The WASI bodies operate on a plain `&mut [u8]` view of linear memory so
//! both engines share them; [`link_wasmtime`] and [`link_wasmi`] only adapt
//! calling conventions.

use crate::error::AdapterError;
use crate::interface::{ImportKind, ModuleInterface};
use std::fmt;
use wasmparser::ValType;

pub const ENV: &str = "env";
pub const WASI: &str = "wasi_snapshot_preview1";

/// WASI errno values used by the shim.
pub mod errno {
    pub const SUCCESS: i32 = 0;
    pub const BADF: i32 = 8;
    pub const FAULT: i32 = 21;
    pub const INVAL: i32 = 28;
}

const STDOUT: i32 = 1;
const STDERR: i32 = 2;

/// Every import the host can satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostImport {
    Abort,
    FdWrite,
    ProcExit,
    EnvironSizesGet,
    EnvironGet,
    ArgsSizesGet,
    ArgsGet,
    RandomGet,
    ClockTimeGet,
}

impl HostImport {
    pub const ALL: [HostImport; 9] = [
        Self::Abort,
        Self::FdWrite,
        Self::ProcExit,
        Self::EnvironSizesGet,
        Self::EnvironGet,
        Self::ArgsSizesGet,
        Self::ArgsGet,
        Self::RandomGet,
        Self::ClockTimeGet,
    ];

    pub fn module(self) -> &'static str {
        match self {
            Self::Abort => ENV,
            _ => WASI,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::FdWrite => "fd_write",
            Self::ProcExit => "proc_exit",
            Self::EnvironSizesGet => "environ_sizes_get",
            Self::EnvironGet => "environ_get",
            Self::ArgsSizesGet => "args_sizes_get",
            Self::ArgsGet => "args_get",
            Self::RandomGet => "random_get",
            Self::ClockTimeGet => "clock_time_get",
        }
    }

    /// `(params, results)` the guest must declare.
    pub fn signature(self) -> (&'static [ValType], &'static [ValType]) {
        use ValType::{I32, I64};
        match self {
            Self::Abort => (&[I32, I32, I32, I32], &[]),
            Self::FdWrite => (&[I32, I32, I32, I32], &[I32]),
            Self::ProcExit => (&[I32], &[]),
            Self::EnvironSizesGet
            | Self::EnvironGet
            | Self::ArgsSizesGet
            | Self::ArgsGet
            | Self::RandomGet => (&[I32, I32], &[I32]),
            Self::ClockTimeGet => (&[I32, I64, I32], &[I32]),
        }
    }

    pub fn lookup(module: &str, name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|import| import.module() == module && import.name() == name)
    }
}

/// Check that the host can satisfy every import of `iface`.
pub fn resolve(iface: &ModuleInterface) -> Result<Vec<HostImport>, AdapterError> {
    iface
        .imports
        .iter()
        .map(|import| {
            let qualified = format!("{}.{}", import.module_name, import.name);
            let host = HostImport::lookup(&import.module_name, &import.name)
                .ok_or_else(|| AdapterError::Load(format!("unresolved import {qualified}")))?;
            let (params, results) = host.signature();
            match &import.kind {
                ImportKind::Function {
                    params: p,
                    results: r,
                } if p.as_slice() == params && r.as_slice() == results => Ok(host),
                ImportKind::Function { .. } => Err(AdapterError::Load(format!(
                    "import {qualified} has an unexpected signature"
                ))),
                other => Err(AdapterError::Load(format!(
                    "import {qualified} must be a function, found {other:?}"
                ))),
            }
        })
        .collect()
}

/// How a guest ended a call early through the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestExit {
    /// `env.abort(message, file, line, column)`.
    Abort { line: u32, column: u32 },
    /// `proc_exit(code)`.
    Exit(i32),
}

impl fmt::Display for GuestExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort { line, column } => write!(f, "abort called at {line}:{column}"),
            Self::Exit(code) => write!(f, "proc_exit({code})"),
        }
    }
}

impl std::error::Error for GuestExit {}

/// Per-store host state.
#[derive(Debug, Default)]
pub struct HostState {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit: Option<GuestExit>,
    random_counter: u64,
}

impl HostState {
    /// Forget the previous call's exit and captured output.
    pub fn begin_call(&mut self) {
        self.exit = None;
        self.stdout.clear();
        self.stderr.clear();
    }

    /// Turn an engine error into a trap, naming the host exit if one caused it.
    pub fn trap(&self, err: impl fmt::Display) -> AdapterError {
        match &self.exit {
            Some(exit) => {
                let stderr = String::from_utf8_lossy(&self.stderr);
                let stderr = stderr.trim_end();
                if stderr.is_empty() {
                    AdapterError::Trap(exit.to_string())
                } else {
                    AdapterError::Trap(format!("{exit}: {stderr}"))
                }
            }
            None => AdapterError::trap(err),
        }
    }

    /// Instantiation failures are load failures, even when a start function
    /// trapped through the host.
    pub fn instantiation_failure(&self, err: impl fmt::Display) -> AdapterError {
        match self.trap(err) {
            AdapterError::Trap(msg) => AdapterError::Load(format!("instantiation failed: {msg}")),
            other => other,
        }
    }

    fn record_abort(&mut self, line: i32, column: i32) -> GuestExit {
        let exit = GuestExit::Abort {
            line: line as u32,
            column: column as u32,
        };
        tracing::debug!(%exit, "guest abort");
        self.exit = Some(exit.clone());
        exit
    }

    fn record_exit(&mut self, code: i32) -> GuestExit {
        let exit = GuestExit::Exit(code);
        tracing::debug!(%exit, "guest exit");
        self.exit = Some(exit.clone());
        exit
    }
}

// ── Memory helpers ───────────────────────────────────────────────────────────

fn slice(mem: &[u8], ptr: i32, len: u32) -> Option<&[u8]> {
    let start = ptr as u32 as usize;
    let end = start.checked_add(len as usize)?;
    mem.get(start..end)
}

fn slice_mut(mem: &mut [u8], ptr: i32, len: u32) -> Option<&mut [u8]> {
    let start = ptr as u32 as usize;
    let end = start.checked_add(len as usize)?;
    mem.get_mut(start..end)
}

fn read_u32(mem: &[u8], ptr: i32) -> Option<u32> {
    let bytes = slice(mem, ptr, 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn write_u32(mem: &mut [u8], ptr: i32, value: u32) -> Option<()> {
    slice_mut(mem, ptr, 4)?.copy_from_slice(&value.to_le_bytes());
    Some(())
}

fn write_u64(mem: &mut [u8], ptr: i32, value: u64) -> Option<()> {
    slice_mut(mem, ptr, 8)?.copy_from_slice(&value.to_le_bytes());
    Some(())
}

fn status(result: Option<()>) -> i32 {
    match result {
        Some(()) => errno::SUCCESS,
        None => errno::FAULT,
    }
}

// ── WASI preview 1 bodies ────────────────────────────────────────────────────

/// Gather `iovs_len` iovecs at `iovs` and append them to the captured stream.
pub fn fd_write(
    mem: &mut [u8],
    state: &mut HostState,
    fd: i32,
    iovs: i32,
    iovs_len: i32,
    nwritten: i32,
) -> i32 {
    let sink = match fd {
        STDOUT => &mut state.stdout,
        STDERR => &mut state.stderr,
        _ => return errno::BADF,
    };

    let mut written: u32 = 0;
    for k in 0..iovs_len as u32 {
        let Some(entry) = (iovs as u32).checked_add(k * 8) else {
            return errno::FAULT;
        };
        let entry = entry as i32;
        let (Some(buf), Some(len)) = (read_u32(mem, entry), read_u32(mem, entry.wrapping_add(4)))
        else {
            return errno::FAULT;
        };
        let Some(bytes) = slice(mem, buf as i32, len) else {
            return errno::FAULT;
        };
        sink.extend_from_slice(bytes);
        written = written.wrapping_add(len);
    }
    tracing::debug!(fd, bytes = written, "guest fd_write");
    status(write_u32(mem, nwritten, written))
}

/// Report an empty environment or argument list.
pub fn sizes_get(mem: &mut [u8], count: i32, buf_size: i32) -> i32 {
    status(write_u32(mem, count, 0).and_then(|()| write_u32(mem, buf_size, 0)))
}

/// Fill `len` bytes at `buf` from a deterministic counter-based stream.
pub fn random_get(mem: &mut [u8], state: &mut HostState, buf: i32, len: i32) -> i32 {
    let Some(out) = slice_mut(mem, buf, len as u32) else {
        return errno::FAULT;
    };
    for byte in out {
        state.random_counter = state
            .random_counter
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        *byte = (state.random_counter >> 56) as u8;
    }
    errno::SUCCESS
}

/// Every clock reads zero.
pub fn clock_time_get(mem: &mut [u8], clock_id: i32, out: i32) -> i32 {
    if !(0..=3).contains(&clock_id) {
        return errno::INVAL;
    }
    status(write_u64(mem, out, 0))
}

// ── Engine glue ──────────────────────────────────────────────────────────────

/// Define every [`HostImport`] in a wasmtime linker.
pub fn link_wasmtime(linker: &mut wasmtime::Linker<HostState>) -> anyhow::Result<()> {
    use wasmtime::{Caller, Extern};

    fn memory(caller: &mut Caller<'_, HostState>) -> anyhow::Result<wasmtime::Memory> {
        caller
            .get_export("memory")
            .and_then(Extern::into_memory)
            .ok_or_else(|| anyhow::anyhow!("guest does not export memory"))
    }

    linker.func_wrap(
        ENV,
        "abort",
        |mut caller: Caller<'_, HostState>, _msg: i32, _file: i32, line: i32, column: i32| {
            let exit = caller.data_mut().record_abort(line, column);
            Err::<(), _>(anyhow::Error::new(exit))
        },
    )?;
    linker.func_wrap(
        WASI,
        "proc_exit",
        |mut caller: Caller<'_, HostState>, code: i32| {
            let exit = caller.data_mut().record_exit(code);
            Err::<(), _>(anyhow::Error::new(exit))
        },
    )?;
    linker.func_wrap(
        WASI,
        "fd_write",
        |mut caller: Caller<'_, HostState>, fd: i32, iovs: i32, iovs_len: i32, nwritten: i32| -> anyhow::Result<i32> {
            let mem = memory(&mut caller)?;
            let (data, state) = mem.data_and_store_mut(&mut caller);
            Ok(fd_write(data, state, fd, iovs, iovs_len, nwritten))
        },
    )?;
    for name in ["environ_sizes_get", "args_sizes_get"] {
        linker.func_wrap(
            WASI,
            name,
            |mut caller: Caller<'_, HostState>, count: i32, size: i32| -> anyhow::Result<i32> {
                let mem = memory(&mut caller)?;
                Ok(sizes_get(mem.data_mut(&mut caller), count, size))
            },
        )?;
    }
    for name in ["environ_get", "args_get"] {
        linker.func_wrap(WASI, name, |_: i32, _: i32| errno::SUCCESS)?;
    }
    linker.func_wrap(
        WASI,
        "random_get",
        |mut caller: Caller<'_, HostState>, buf: i32, len: i32| -> anyhow::Result<i32> {
            let mem = memory(&mut caller)?;
            let (data, state) = mem.data_and_store_mut(&mut caller);
            Ok(random_get(data, state, buf, len))
        },
    )?;
    linker.func_wrap(
        WASI,
        "clock_time_get",
        |mut caller: Caller<'_, HostState>, id: i32, _precision: i64, out: i32| -> anyhow::Result<i32> {
            let mem = memory(&mut caller)?;
            Ok(clock_time_get(mem.data_mut(&mut caller), id, out))
        },
    )?;
    Ok(())
}

/// Define every [`HostImport`] in a wasmi linker.
pub fn link_wasmi(linker: &mut wasmi::Linker<HostState>) -> Result<(), wasmi::Error> {
    use wasmi::{Caller, Error, Extern};

    fn memory(caller: &mut Caller<'_, HostState>) -> Result<wasmi::Memory, Error> {
        caller
            .get_export("memory")
            .and_then(Extern::into_memory)
            .ok_or_else(|| Error::new("guest does not export memory"))
    }

    linker.func_wrap(
        ENV,
        "abort",
        |mut caller: Caller<'_, HostState>, _msg: i32, _file: i32, line: i32, column: i32| {
            let exit = caller.data_mut().record_abort(line, column);
            Err::<(), _>(Error::new(exit.to_string()))
        },
    )?;
    linker.func_wrap(
        WASI,
        "proc_exit",
        |mut caller: Caller<'_, HostState>, code: i32| {
            caller.data_mut().record_exit(code);
            Err::<(), _>(Error::i32_exit(code))
        },
    )?;
    linker.func_wrap(
        WASI,
        "fd_write",
        |mut caller: Caller<'_, HostState>, fd: i32, iovs: i32, iovs_len: i32, nwritten: i32| -> Result<i32, Error> {
            let mem = memory(&mut caller)?;
            let (data, state) = mem.data_and_store_mut(&mut caller);
            Ok(fd_write(data, state, fd, iovs, iovs_len, nwritten))
        },
    )?;
    for name in ["environ_sizes_get", "args_sizes_get"] {
        linker.func_wrap(
            WASI,
            name,
            |mut caller: Caller<'_, HostState>, count: i32, size: i32| -> Result<i32, Error> {
                let mem = memory(&mut caller)?;
                Ok(sizes_get(mem.data_mut(&mut caller), count, size))
            },
        )?;
    }
    for name in ["environ_get", "args_get"] {
        linker.func_wrap(WASI, name, |_: i32, _: i32| errno::SUCCESS)?;
    }
    linker.func_wrap(
        WASI,
        "random_get",
        |mut caller: Caller<'_, HostState>, buf: i32, len: i32| -> Result<i32, Error> {
            let mem = memory(&mut caller)?;
            let (data, state) = mem.data_and_store_mut(&mut caller);
            Ok(random_get(data, state, buf, len))
        },
    )?;
    linker.func_wrap(
        WASI,
        "clock_time_get",
        |mut caller: Caller<'_, HostState>, id: i32, _precision: i64, out: i32| -> Result<i32, Error> {
            let mem = memory(&mut caller)?;
            Ok(clock_time_get(mem.data_mut(&mut caller), id, out))
        },
    )?;
    Ok(())
}
