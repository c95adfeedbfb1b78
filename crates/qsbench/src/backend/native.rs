//! Host implementation: the oracle itself, run as a backend.

use super::Backend;
use crate::error::AdapterError;
use qsbench_oracle::{checksum_in, OracleConfig, RunParams};

/// Runs the workload in-process with a reusable buffer.
#[derive(Debug, Default)]
pub struct NativeBackend {
    config: OracleConfig,
    buf: Vec<u32>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OracleConfig) -> Self {
        Self {
            config,
            buf: Vec::new(),
        }
    }
}

impl Backend for NativeBackend {
    fn invoke(&mut self, params: &RunParams) -> Result<u64, AdapterError> {
        self.buf.resize(params.array_length, 0);
        checksum_in(&self.config, &mut self.buf, params.seed, params.iterations)
            .map_err(AdapterError::load)
    }
}
