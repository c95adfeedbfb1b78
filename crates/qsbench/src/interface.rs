//! WebAssembly module interface inspection.
//!
//! Wraps the `wasmparser` crate to extract what an adapter needs before
//! handing a binary to an engine: the imports it expects from the host and
//! the signatures of its exported functions.

use anyhow::{Context, Result};
use wasmparser::{ExternalKind, FuncType, Parser, Payload, TypeRef, ValType};

/// Export every benchmark module provides.
pub const ENTRY_POINT: &str = "run";

/// Export every contract provides.
pub const CONTRACT_ENTRY: &str = "call";

/// An import from the Wasm module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    /// The import module name (e.g., "env").
    pub module_name: String,
    /// The import field name (e.g., "abort").
    pub name: String,
    /// What kind of item is imported.
    pub kind: ImportKind,
}

/// Kind of import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// Imported function with its resolved signature.
    Function {
        params: Vec<ValType>,
        results: Vec<ValType>,
    },
    Global,
    Memory,
    Table,
}

/// Kind of export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

/// An export from the Wasm module.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
    /// Index into the corresponding index space.
    pub index: u32,
}

/// Host-facing surface of a parsed module.
#[derive(Debug, Clone)]
pub struct ModuleInterface {
    /// Type section: function signatures.
    pub types: Vec<FuncType>,
    /// Type index of every function, imported functions first.
    pub function_types: Vec<u32>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    /// Whether the module declares a start function.
    pub has_start: bool,
}

impl ModuleInterface {
    /// Signature of the exported function `name`, if there is one.
    pub fn export_signature(&self, name: &str) -> Option<&FuncType> {
        let export = self
            .exports
            .iter()
            .find(|e| e.kind == ExportKind::Func && e.name == name)?;
        let type_idx = *self.function_types.get(export.index as usize)?;
        self.types.get(type_idx as usize)
    }

    /// Whether the module exports an item `name` of the given kind.
    pub fn exports_item(&self, name: &str, kind: ExportKind) -> bool {
        self.exports.iter().any(|e| e.kind == kind && e.name == name)
    }
}

/// Render a signature as `(i32, i32) -> i64`.
pub fn describe_signature(ty: &FuncType) -> String {
    let list = |types: &[ValType]| {
        types
            .iter()
            .map(|t| format!("{t:?}").to_lowercase())
            .collect::<Vec<_>>()
            .join(", ")
    };
    match ty.results() {
        [] => format!("({})", list(ty.params())),
        [single] => format!("({}) -> {}", list(ty.params()), list(&[*single])),
        results => format!("({}) -> ({})", list(ty.params()), list(results)),
    }
}

/// Validate a WebAssembly binary and extract its interface.
pub fn inspect(wasm_bytes: &[u8]) -> Result<ModuleInterface> {
    wasmparser::validate(wasm_bytes).context("module failed validation")?;

    let mut types = Vec::new();
    let mut function_types: Vec<u32> = Vec::new();
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut has_start = false;

    for payload in Parser::new(0).parse_all(wasm_bytes) {
        let payload = payload.context("parsing wasm payload")?;

        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    for sub_type in rec_group.types() {
                        if let wasmparser::CompositeInnerType::Func(func_ty) =
                            &sub_type.composite_type.inner
                        {
                            types.push(func_ty.clone());
                        }
                    }
                }
            }

            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    let kind = match import.ty {
                        TypeRef::Func(type_idx) => {
                            function_types.push(type_idx);
                            let ty = types
                                .get(type_idx as usize)
                                .with_context(|| format!("import type {type_idx} out of range"))?;
                            ImportKind::Function {
                                params: ty.params().to_vec(),
                                results: ty.results().to_vec(),
                            }
                        }
                        TypeRef::Global(_) => ImportKind::Global,
                        TypeRef::Memory(_) => ImportKind::Memory,
                        TypeRef::Table(_) => ImportKind::Table,
                        _ => continue,
                    };
                    imports.push(ImportInfo {
                        module_name: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }

            Payload::FunctionSection(reader) => {
                for type_idx in reader {
                    function_types.push(type_idx.context("reading function type index")?);
                }
            }

            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    let kind = match export.kind {
                        ExternalKind::Func => ExportKind::Func,
                        ExternalKind::Table => ExportKind::Table,
                        ExternalKind::Memory => ExportKind::Memory,
                        ExternalKind::Global => ExportKind::Global,
                        _ => continue,
                    };
                    exports.push(ExportInfo {
                        name: export.name.to_string(),
                        kind,
                        index: export.index,
                    });
                }
            }

            Payload::StartSection { .. } => has_start = true,

            _ => {}
        }
    }

    Ok(ModuleInterface {
        types,
        function_types,
        imports,
        exports,
        has_start,
    })
}
