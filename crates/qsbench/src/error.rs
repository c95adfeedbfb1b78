//! Per-case adapter failures.
//!
//! Every variant is fatal to one benchmark case only; the driver records it
//! and moves on. Whole-run errors are `qsbench_oracle::ConfigurationError`.

use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum AdapterError {
    /// Malformed binary, unsupported entry signature, unresolved import,
    /// failed instantiation or deployment.
    #[error("load error: {0}")]
    Load(String),
    /// The backend aborted mid-call (trap, `abort`, `proc_exit`, revert,
    /// out of gas).
    #[error("execution trap: {0}")]
    Trap(String),
    /// An argument or the return value does not fit the backend's ABI.
    #[error("marshal error: {0}")]
    Marshal(String),
}

impl AdapterError {
    pub fn load(err: impl Display) -> Self {
        Self::Load(format!("{err:#}"))
    }

    pub fn trap(err: impl Display) -> Self {
        Self::Trap(format!("{err:#}"))
    }

    pub fn marshal(err: impl Display) -> Self {
        Self::Marshal(format!("{err:#}"))
    }

    /// Short lowercase name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::Trap(_) => "trap",
            Self::Marshal(_) => "marshal",
        }
    }
}
