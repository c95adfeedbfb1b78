//! Benchmark binaries and where they come from.
//!
//! Every workload ships as WebAssembly text under `artifacts/`, embedded at
//! compile time and assembled once by [`load_artifacts`]. A directory of
//! `<name>.wasm` / `<name>.wat` files may replace any of them at runtime,
//! e.g. with the output of a real toolchain.

use crate::interface::{self, ModuleInterface};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const RUST_WIDE: &str = "rust_wide";
pub const RUST_NARROW: &str = "rust_narrow";
pub const ASSEMBLYSCRIPT: &str = "assemblyscript";
pub const ASSEMBLYSCRIPT_SMALL: &str = "assemblyscript_small";
pub const TINYGO: &str = "tinygo";
pub const TINYGO_SMALL: &str = "tinygo_small";
pub const FIXED: &str = "fixed";
pub const CONTRACT: &str = "contract";

const EMBEDDED: &[(&str, &str)] = &[
    (RUST_WIDE, include_str!("../artifacts/rust_wide.wat")),
    (RUST_NARROW, include_str!("../artifacts/rust_narrow.wat")),
    (ASSEMBLYSCRIPT, include_str!("../artifacts/assemblyscript.wat")),
    (
        ASSEMBLYSCRIPT_SMALL,
        include_str!("../artifacts/assemblyscript_small.wat"),
    ),
    (TINYGO, include_str!("../artifacts/tinygo.wat")),
    (TINYGO_SMALL, include_str!("../artifacts/tinygo_small.wat")),
    (FIXED, include_str!("../artifacts/fixed.wat")),
    (CONTRACT, include_str!("../artifacts/contract.wat")),
];

/// Where an artifact's bytes were loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Embedded,
    File(std::path::PathBuf),
    Inline,
}

/// An immutable binary plus its provenance.
///
/// Bytes are not validated here: a malformed binary must surface as a load
/// failure of the cases that use it, not abort the whole run.
#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    bytes: Vec<u8>,
    origin: Origin,
}

impl Artifact {
    /// Assemble WebAssembly text.
    pub fn from_wat(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let bytes = wat::parse_str(source).with_context(|| format!("assembling {name}"))?;
        Ok(Self {
            name,
            bytes,
            origin: Origin::Inline,
        })
    }

    /// Wrap an existing binary as-is.
    pub fn from_wasm(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            origin: Origin::Inline,
        }
    }

    /// Read `path`, accepting either the binary or the text format.
    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let bytes = wat::parse_bytes(&raw)
            .with_context(|| format!("failed to assemble {}", path.display()))?
            .into_owned();
        Ok(Self {
            name: name.into(),
            bytes,
            origin: Origin::File(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Binary size in bytes, reported as the case's code size.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Validate the binary and extract its imports and exports.
    pub fn interface(&self) -> Result<ModuleInterface> {
        interface::inspect(&self.bytes).with_context(|| format!("inspecting {}", self.name))
    }
}

/// Named artifacts shared by the cases built from them.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: BTreeMap<String, Arc<Artifact>>,
}

impl ArtifactSet {
    /// Assemble every embedded workload.
    pub fn embedded() -> Result<Self> {
        let mut set = Self::default();
        for &(name, source) in EMBEDDED {
            let mut artifact = Artifact::from_wat(name, source)?;
            artifact.origin = Origin::Embedded;
            set.insert(artifact);
        }
        Ok(set)
    }

    /// Add or replace an artifact under its own name.
    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.name.clone(), Arc::new(artifact));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Artifact>> {
        self.artifacts.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Load the embedded workloads, then apply overrides from `dir`.
///
/// For each known name, `<dir>/<name>.wasm` wins over `<dir>/<name>.wat`;
/// names with neither file keep the embedded build.
pub fn load_artifacts(dir: Option<&Path>) -> Result<ArtifactSet> {
    let mut set = ArtifactSet::embedded()?;
    let Some(dir) = dir else {
        return Ok(set);
    };
    if !dir.is_dir() {
        anyhow::bail!("artifact directory {} does not exist", dir.display());
    }

    for &(name, _) in EMBEDDED {
        let candidate = ["wasm", "wat"]
            .iter()
            .map(|ext| dir.join(format!("{name}.{ext}")))
            .find(|path| path.is_file());
        if let Some(path) = candidate {
            tracing::debug!(artifact = name, path = %path.display(), "using artifact override");
            set.insert(Artifact::from_file(name, &path)?);
        }
    }
    Ok(set)
}
