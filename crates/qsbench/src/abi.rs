//! Argument/return marshaling across backend integer boundaries.
//!
//! Two calling conventions exist:
//! - WebAssembly entry points: `run(seed, arr_len, iter)` with all three
//!   parameters either i32 or i64 and a single i32/i64 result, or a
//!   zero-argument `run()` for fixed-parameter builds.
//! - Contract calls: a 4-byte selector followed by 32-byte big-endian words,
//!   answered by one 32-byte big-endian word.

use crate::error::AdapterError;
use crate::interface::describe_signature;
use qsbench_oracle::RunParams;
use serde::Serialize;
use wasmparser::{FuncType, ValType};

/// Integer width of a Wasm parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntWidth {
    I32,
    I64,
}

impl IntWidth {
    fn from_val_type(ty: ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            _ => None,
        }
    }
}

/// Shape of a module's exported entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EntryAbi {
    /// `run(seed, arr_len, iter) -> checksum`.
    Parameterized { params: IntWidth, result: IntWidth },
    /// `run() -> checksum` for [`RunParams::FIXED`].
    Fixed { result: IntWidth },
}

/// A marshaled Wasm argument or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmValue {
    I32(i32),
    I64(i64),
}

impl EntryAbi {
    /// Classify an exported signature. Anything that is not three integers
    /// of one width (or none) mapping to a single integer is rejected.
    pub fn classify(ty: &FuncType) -> Result<Self, AdapterError> {
        let unsupported = || {
            AdapterError::Load(format!(
                "unsupported entry signature {}",
                describe_signature(ty)
            ))
        };

        let result = match ty.results() {
            [r] => IntWidth::from_val_type(*r).ok_or_else(unsupported)?,
            _ => return Err(unsupported()),
        };
        match ty.params() {
            [] => Ok(Self::Fixed { result }),
            [a, b, c] if a == b && b == c => {
                let params = IntWidth::from_val_type(*a).ok_or_else(unsupported)?;
                Ok(Self::Parameterized { params, result })
            }
            _ => Err(unsupported()),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed { .. })
    }

    pub fn result_width(&self) -> IntWidth {
        match *self {
            Self::Parameterized { result, .. } | Self::Fixed { result } => result,
        }
    }

    /// Marshal `params` in ascending-significance order: seed, length, iterations.
    pub fn marshal(&self, params: &RunParams) -> Result<Vec<WasmValue>, AdapterError> {
        match *self {
            Self::Fixed { .. } => {
                if *params != RunParams::FIXED {
                    return Err(AdapterError::Marshal(format!(
                        "fixed-parameter build only serves {}, not {params}",
                        RunParams::FIXED
                    )));
                }
                Ok(Vec::new())
            }
            Self::Parameterized { params: width, .. } => {
                let raw = [
                    ("seed", params.seed),
                    ("arr_len", params.array_length as u64),
                    ("iter", params.iterations),
                ];
                raw.iter()
                    .map(|&(name, value)| narrow(width, name, value))
                    .collect()
            }
        }
    }

    /// Coerce the single returned value to the checksum width.
    ///
    /// 32-bit results are zero-extended.
    pub fn unmarshal(&self, value: WasmValue) -> Result<u64, AdapterError> {
        match (self.result_width(), value) {
            (IntWidth::I32, WasmValue::I32(v)) => Ok(u64::from(v as u32)),
            (IntWidth::I64, WasmValue::I64(v)) => Ok(v as u64),
            (expected, got) => Err(AdapterError::Marshal(format!(
                "entry declared a {expected:?} result but returned {got:?}"
            ))),
        }
    }
}

fn narrow(width: IntWidth, name: &str, value: u64) -> Result<WasmValue, AdapterError> {
    match width {
        IntWidth::I64 => Ok(WasmValue::I64(value as i64)),
        IntWidth::I32 => u32::try_from(value)
            .map(|v| WasmValue::I32(v as i32))
            .map_err(|_| AdapterError::Marshal(format!("{name}={value} does not fit a 32-bit argument"))),
    }
}

// ── Contract call ABI ────────────────────────────────────────────────────────

/// `bytes4(keccak256("run(uint256,uint256,uint256)"))`
pub const RUN_SELECTOR: [u8; 4] = [0x24, 0xb9, 0x12, 0xe5];

/// `bytes4(keccak256("run()"))`
pub const RUN_FIXED_SELECTOR: [u8; 4] = [0xc0, 0x40, 0x62, 0x26];

/// Size of one ABI word.
pub const WORD_SIZE: usize = 32;

/// Big-endian uint256 encoding of `value`.
pub fn encode_word(value: u64) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// `selector ++ word(arg0) ++ word(arg1) ++ ...`
pub fn encode_call(selector: [u8; 4], args: &[u64]) -> Vec<u8> {
    let mut input = Vec::with_capacity(4 + WORD_SIZE * args.len());
    input.extend_from_slice(&selector);
    for &arg in args {
        input.extend_from_slice(&encode_word(arg));
    }
    input
}

/// Calldata for `run(seed, arr_len, iter)`.
pub fn encode_run(params: &RunParams) -> Vec<u8> {
    encode_call(
        RUN_SELECTOR,
        &[params.seed, params.array_length as u64, params.iterations],
    )
}

/// Parse return data as a single big-endian uint256 that must fit in u64.
pub fn decode_word(output: &[u8]) -> Result<u64, AdapterError> {
    let word: &[u8; WORD_SIZE] = output.try_into().map_err(|_| {
        AdapterError::Marshal(format!(
            "expected {WORD_SIZE} bytes of return data, got {}",
            output.len()
        ))
    })?;
    let (high, low) = word.split_at(WORD_SIZE - 8);
    if high.iter().any(|&b| b != 0) {
        return Err(AdapterError::Marshal(
            "returned word does not fit in 64 bits".to_string(),
        ));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(low);
    Ok(u64::from_be_bytes(bytes))
}
