//! `qsbench-oracle`: the reference workload every qsbench backend must match.
//!
//! This crate is `#![no_std]`. It provides:
//! - `RandomStream`, the seeded linear-congruential generator
//! - `quicksort`, the in-place Hoare partition-exchange sort
//! - `checksum_in` / `compute_checksum`, the midpoint-sum reduction
//! - `OracleConfig`, the single versioned description of the arithmetic
//!
//! The canonical configuration reduces the LCG modulo 2^31. Because 2^31
//! divides every machine word modulus, a backend may run the recurrence in
//! wrapping 32-bit or 64-bit arithmetic and mask afterwards: both produce the
//! same stream. Only `seed mod 2^31` influences the output.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

mod random;
pub use random::RandomStream;

mod sort;
pub use sort::quicksort;

/// LCG multiplier (`A`).
pub const LCG_MULTIPLIER: u64 = 1_103_515_245;

/// LCG increment (`C`).
pub const LCG_INCREMENT: u64 = 12_345;

/// Checksum for [`RunParams::FIXED`] under [`OracleConfig::CANONICAL`].
///
/// Every backend, including fixed-parameter builds, must reproduce it.
pub const FIXED_CHECKSUM: u64 = 107_829_970_005;

/// Inputs of one `Run(seed, arrayLength, iterations)` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunParams {
    pub seed: u64,
    pub array_length: usize,
    pub iterations: u64,
}

impl RunParams {
    /// Parameters baked into fixed-parameter (zero-argument) builds.
    pub const FIXED: RunParams = RunParams {
        seed: 7,
        array_length: 1000,
        iterations: 100,
    };

    pub const fn new(seed: u64, array_length: usize, iterations: u64) -> Self {
        Self {
            seed,
            array_length,
            iterations,
        }
    }
}

impl core::fmt::Display for RunParams {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "seed={} arr_len={} iter={}",
            self.seed, self.array_length, self.iterations
        )
    }
}

/// Arithmetic of the workload: stream modulus, checksum width and the
/// optional per-slot reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OracleConfig {
    /// The stream is reduced modulo `2^modulus_bits` (31 or 32).
    pub modulus_bits: u32,
    /// The checksum wraps at `2^checksum_bits` (32 or 64).
    pub checksum_bits: u32,
    /// When set, every slot holds `stream value % reduction_modulus`.
    pub reduction_modulus: Option<u32>,
}

impl OracleConfig {
    /// The configuration shared by every backend in the harness.
    pub const CANONICAL: OracleConfig = OracleConfig {
        modulus_bits: 31,
        checksum_bits: 64,
        reduction_modulus: None,
    };

    /// Reject widths the array and accumulator cannot represent.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !matches!(self.modulus_bits, 31 | 32) {
            return Err(ConfigurationError::UnsupportedModulusWidth(
                self.modulus_bits,
            ));
        }
        if !matches!(self.checksum_bits, 32 | 64) {
            return Err(ConfigurationError::UnsupportedChecksumWidth(
                self.checksum_bits,
            ));
        }
        if self.reduction_modulus == Some(0) {
            return Err(ConfigurationError::ZeroReductionModulus);
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn modulus_mask(&self) -> u64 {
        (1u64 << self.modulus_bits) - 1
    }

    #[inline(always)]
    pub(crate) fn checksum_mask(&self) -> u64 {
        if self.checksum_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.checksum_bits) - 1
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::CANONICAL
    }
}

/// Invalid workload parameters or arithmetic configuration.
///
/// These abort a whole benchmark run before any backend is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `arrayLength == 0`: the midpoint read has no element.
    EmptyArray,
    /// Stream modulus other than 2^31 or 2^32.
    UnsupportedModulusWidth(u32),
    /// Checksum accumulator other than 32 or 64 bits.
    UnsupportedChecksumWidth(u32),
    /// `reduction_modulus` of zero.
    ZeroReductionModulus,
}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptyArray => write!(f, "array length must be at least 1"),
            Self::UnsupportedModulusWidth(bits) => {
                write!(f, "unsupported stream modulus width 2^{bits}")
            }
            Self::UnsupportedChecksumWidth(bits) => {
                write!(f, "unsupported checksum width {bits} bits")
            }
            Self::ZeroReductionModulus => write!(f, "reduction modulus must be non-zero"),
        }
    }
}

impl core::error::Error for ConfigurationError {}

/// Run the workload over a caller-provided buffer.
///
/// The whole buffer is the array: each iteration refills it from the
/// stream, sorts it and adds the element at `buf.len() / 2`.
pub fn checksum_in(
    config: &OracleConfig,
    buf: &mut [u32],
    seed: u64,
    iterations: u64,
) -> Result<u64, ConfigurationError> {
    config.validate()?;
    if buf.is_empty() {
        return Err(ConfigurationError::EmptyArray);
    }

    let mask = config.checksum_mask();
    let mid = buf.len() / 2;
    let mut stream = RandomStream::new(seed, config);
    let mut checksum: u64 = 0;
    for _ in 0..iterations {
        stream.fill(buf);
        quicksort(buf);
        checksum = checksum.wrapping_add(u64::from(buf[mid])) & mask;
    }
    Ok(checksum)
}

/// `computeChecksum(seed, arrayLength, iterations)` under the canonical
/// configuration.
#[cfg(feature = "alloc")]
pub fn compute_checksum(
    seed: u64,
    array_length: usize,
    iterations: u64,
) -> Result<u64, ConfigurationError> {
    compute_checksum_with(&OracleConfig::CANONICAL, seed, array_length, iterations)
}

/// `computeChecksum` for an explicit configuration.
#[cfg(feature = "alloc")]
pub fn compute_checksum_with(
    config: &OracleConfig,
    seed: u64,
    array_length: usize,
    iterations: u64,
) -> Result<u64, ConfigurationError> {
    if array_length == 0 {
        return Err(ConfigurationError::EmptyArray);
    }
    let mut buf = alloc::vec![0u32; array_length];
    checksum_in(config, &mut buf, seed, iterations)
}
