//! Runtime configuration registry.
//!
//! The catalogue is plain data: which binaries each language ships and which
//! runtimes run them. [`Registry::build`] expands it into immutable
//! [`BenchmarkCase`]s, each either enabled or carrying the reason it is
//! skipped.

use crate::artifact::{self, Artifact, ArtifactSet};
use crate::backend::{ContractEntry, Engine, Runtime, WasmiMode, WasmtimeStrategy};
use heck::ToSnakeCase;
use qsbench_oracle::RunParams;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Source language (or toolchain family) of a benchmark binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Language {
    Native,
    Rust,
    AssemblyScript,
    TinyGo,
    Wat,
    Contract,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "Native",
            Self::Rust => "Rust",
            Self::AssemblyScript => "AssemblyScript",
            Self::TinyGo => "TinyGo",
            Self::Wat => "Wat",
            Self::Contract => "Contract",
        })
    }
}

impl Language {
    /// Lowercase name, as in the `RUST` / `TINYGO` / `ASSEMBLYSCRIPT` flags.
    pub fn label(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// One build of a language's workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binary {
    pub label: &'static str,
    /// Artifact name, `None` for the host build.
    pub artifact: Option<&'static str>,
    /// Only `RunParams::FIXED` can be served.
    pub fixed_params: bool,
}

const fn binary(label: &'static str, artifact: &'static str) -> Binary {
    Binary {
        label,
        artifact: Some(artifact),
        fixed_params: false,
    }
}

struct Entry {
    language: Language,
    binaries: &'static [Binary],
    runtimes: &'static [Runtime],
}

#[cfg(target_arch = "x86_64")]
const WASM_RUNTIMES: &[Runtime] = &[
    Runtime::Wasmtime(WasmtimeStrategy::Cranelift),
    Runtime::Wasmtime(WasmtimeStrategy::Winch),
    Runtime::Wasmtime(WasmtimeStrategy::Pulley),
    Runtime::Wasmi(WasmiMode::Eager),
    Runtime::Wasmi(WasmiMode::Lazy),
];

#[cfg(not(target_arch = "x86_64"))]
const WASM_RUNTIMES: &[Runtime] = &[
    Runtime::Wasmtime(WasmtimeStrategy::Cranelift),
    Runtime::Wasmtime(WasmtimeStrategy::Pulley),
    Runtime::Wasmi(WasmiMode::Eager),
    Runtime::Wasmi(WasmiMode::Lazy),
];

const CATALOGUE: &[Entry] = &[
    Entry {
        language: Language::Native,
        binaries: &[Binary {
            label: "host",
            artifact: None,
            fixed_params: false,
        }],
        runtimes: &[Runtime::Native],
    },
    Entry {
        language: Language::Rust,
        binaries: &[
            binary("wide", artifact::RUST_WIDE),
            binary("narrow", artifact::RUST_NARROW),
        ],
        runtimes: WASM_RUNTIMES,
    },
    Entry {
        language: Language::AssemblyScript,
        binaries: &[
            binary("optimized", artifact::ASSEMBLYSCRIPT),
            binary("small", artifact::ASSEMBLYSCRIPT_SMALL),
        ],
        runtimes: WASM_RUNTIMES,
    },
    Entry {
        language: Language::TinyGo,
        binaries: &[
            binary("wasi", artifact::TINYGO),
            binary("wasi_small", artifact::TINYGO_SMALL),
        ],
        runtimes: WASM_RUNTIMES,
    },
    Entry {
        language: Language::Wat,
        binaries: &[Binary {
            label: "fixed",
            artifact: Some(artifact::FIXED),
            fixed_params: true,
        }],
        runtimes: &[
            Runtime::Wasmtime(WasmtimeStrategy::Cranelift),
            Runtime::Wasmi(WasmiMode::Eager),
        ],
    },
    Entry {
        language: Language::Contract,
        binaries: &[binary("contract", artifact::CONTRACT)],
        runtimes: &[
            Runtime::ContractVm(ContractEntry::Abi),
            Runtime::ContractVm(ContractEntry::Fixed),
        ],
    },
];

/// Which languages and engines a run includes.
///
/// Mirrors the enable flags of the command line: every flag defaults to on,
/// and `filter` keeps only cases whose name contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub native: bool,
    pub vm: bool,
    pub rust: bool,
    pub assemblyscript: bool,
    pub tinygo: bool,
    pub wat: bool,
    pub wasmtime: bool,
    pub pulley: bool,
    pub wasmi: bool,
    pub filter: Option<String>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            native: true,
            vm: true,
            rust: true,
            assemblyscript: true,
            tinygo: true,
            wat: true,
            wasmtime: true,
            pulley: true,
            wasmi: true,
            filter: None,
        }
    }
}

impl Selection {
    pub fn language_enabled(&self, language: Language) -> bool {
        match language {
            Language::Native => self.native,
            Language::Contract => self.vm,
            Language::Rust => self.rust,
            Language::AssemblyScript => self.assemblyscript,
            Language::TinyGo => self.tinygo,
            Language::Wat => self.wat,
        }
    }

    pub fn engine_enabled(&self, engine: Engine) -> bool {
        match engine {
            Engine::Native => self.native,
            Engine::Vm => self.vm,
            Engine::Wasmtime => self.wasmtime,
            Engine::Pulley => self.pulley,
            Engine::Wasmi => self.wasmi,
        }
    }

    fn skip_reason(&self, name: &str, language: Language, engine: Engine) -> Option<String> {
        if !self.language_enabled(language) {
            return Some(format!("{language} disabled"));
        }
        if !self.engine_enabled(engine) {
            return Some(format!("{engine} disabled"));
        }
        match &self.filter {
            Some(filter) if !name.contains(filter.as_str()) => {
                Some(format!("does not match filter `{filter}`"))
            }
            _ => None,
        }
    }
}

/// One language/binary/runtime combination.
#[derive(Debug, Clone)]
pub struct BenchmarkCase {
    pub name: String,
    pub language: Language,
    pub binary: &'static str,
    pub runtime: Runtime,
    pub artifact: Option<Arc<Artifact>>,
    /// Why the case will not run, if it won't.
    pub skip: Option<String>,
}

impl BenchmarkCase {
    pub fn is_enabled(&self) -> bool {
        self.skip.is_none()
    }

    /// Size of the binary under test; the host build has none.
    pub fn binary_size(&self) -> Option<usize> {
        self.artifact.as_ref().map(|a| a.size())
    }
}

/// `language_engine_strategy_binary`, snake-cased. The host build is `native`.
///
/// The language part is spelled like its enable flag (`tinygo`, not `tiny_go`).
pub fn case_name(language: Language, runtime: &Runtime, binary: &str) -> String {
    if *runtime == Runtime::Native {
        return language.label();
    }
    let mut parts = vec![language.label(), runtime.engine_label().to_string()];
    parts.extend(runtime.strategy_label().map(str::to_string));
    parts.push(binary.to_string());
    parts.join("_").to_snake_case()
}

/// Every catalogued case for one run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    cases: Vec<BenchmarkCase>,
}

impl Registry {
    /// Expand the catalogue against loaded artifacts, a selection and the
    /// run parameters.
    pub fn build(artifacts: &ArtifactSet, selection: &Selection, params: &RunParams) -> Self {
        let mut cases = Vec::new();
        for entry in CATALOGUE {
            for runtime in entry.runtimes {
                for bin in entry.binaries {
                    let name = case_name(entry.language, runtime, bin.label);
                    let fixed = bin.fixed_params
                        || *runtime == Runtime::ContractVm(ContractEntry::Fixed);
                    let skip = selection
                        .skip_reason(&name, entry.language, runtime.engine())
                        .or_else(|| {
                            (fixed && *params != RunParams::FIXED).then(|| {
                                format!("fixed-parameter build only serves {}", RunParams::FIXED)
                            })
                        });
                    cases.push(BenchmarkCase {
                        artifact: bin.artifact.and_then(|a| artifacts.get(a)),
                        name,
                        language: entry.language,
                        binary: bin.label,
                        runtime: *runtime,
                        skip,
                    });
                }
            }
        }
        Self { cases }
    }

    pub fn cases(&self) -> &[BenchmarkCase] {
        &self.cases
    }

    pub fn enabled(&self) -> impl Iterator<Item = &BenchmarkCase> {
        self.cases.iter().filter(|c| c.is_enabled())
    }

    pub fn get(&self, name: &str) -> Option<&BenchmarkCase> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn registry(selection: &Selection, params: &RunParams) -> Registry {
        Registry::build(&ArtifactSet::embedded().unwrap(), selection, params)
    }

    #[test]
    fn names_follow_language_engine_strategy_binary() {
        let reg = registry(&Selection::default(), &RunParams::FIXED);
        for name in [
            "native",
            "rust_wasmtime_cranelift_wide",
            "rust_wasmtime_pulley_narrow",
            "rust_wasmi_lazy_wide",
            "assemblyscript_wasmi_eager_optimized",
            "assemblyscript_wasmtime_pulley_small",
            "tinygo_wasmtime_cranelift_wasi",
            "tinygo_wasmi_lazy_wasi_small",
            "wat_wasmtime_cranelift_fixed",
            "wat_wasmi_eager_fixed",
            "contract_vm_abi_contract",
            "contract_vm_fixed_contract",
        ] {
            assert!(reg.get(name).is_some(), "missing {name}");
        }
        let unique: HashSet<_> = reg.cases().iter().map(|c| &c.name).collect();
        assert_eq!(unique.len(), reg.len());
    }

    #[test]
    fn language_part_matches_enable_flags() {
        let lazy = Runtime::Wasmi(WasmiMode::Lazy);
        assert_eq!(
            case_name(Language::TinyGo, &lazy, "wasi_small"),
            "tinygo_wasmi_lazy_wasi_small"
        );
        assert_eq!(
            case_name(Language::AssemblyScript, &lazy, "optimized"),
            "assemblyscript_wasmi_lazy_optimized"
        );
        assert_eq!(case_name(Language::Native, &Runtime::Native, "host"), "native");

        let selection = Selection {
            filter: Some("tinygo".into()),
            ..Selection::default()
        };
        let reg = registry(&selection, &RunParams::FIXED);
        assert!(reg.enabled().count() > 0);
        assert!(reg.enabled().all(|c| c.language == Language::TinyGo));
    }

    #[test]
    fn catalogue_size_depends_on_winch() {
        let reg = registry(&Selection::default(), &RunParams::FIXED);
        let wasm_runtimes = WASM_RUNTIMES.len();
        assert_eq!(reg.len(), 1 + 6 * wasm_runtimes + 2 + 2);
        assert_eq!(
            reg.get("rust_wasmtime_winch_wide").is_some(),
            cfg!(target_arch = "x86_64")
        );
    }

    #[test]
    fn default_selection_enables_everything_for_fixed_params() {
        let reg = registry(&Selection::default(), &RunParams::FIXED);
        assert_eq!(reg.enabled().count(), reg.len());
        assert!(reg
            .cases()
            .iter()
            .all(|c| c.artifact.is_some() == c.runtime.needs_artifact()));
    }

    #[test]
    fn fixed_builds_skip_other_params() {
        let reg = registry(&Selection::default(), &RunParams::new(42, 500, 20));
        let skipped: Vec<_> = reg
            .cases()
            .iter()
            .filter(|c| !c.is_enabled())
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            skipped,
            vec![
                "wat_wasmtime_cranelift_fixed",
                "wat_wasmi_eager_fixed",
                "contract_vm_fixed_contract"
            ]
        );
    }

    #[test]
    fn selection_flags_disable_languages_and_engines() {
        let selection = Selection {
            tinygo: false,
            pulley: false,
            vm: false,
            ..Selection::default()
        };
        let reg = registry(&selection, &RunParams::FIXED);
        for case in reg.cases() {
            let expect_skip = case.language == Language::TinyGo
                || case.runtime.engine() == Engine::Pulley
                || case.language == Language::Contract;
            assert_eq!(!case.is_enabled(), expect_skip, "{}", case.name);
        }
        assert_eq!(
            reg.get("tinygo_wasmi_lazy_wasi").unwrap().skip.as_deref(),
            Some("TinyGo disabled")
        );
        assert_eq!(
            reg.get("rust_wasmtime_pulley_wide").unwrap().skip.as_deref(),
            Some("pulley disabled")
        );
    }

    #[test]
    fn filter_keeps_matching_names() {
        let selection = Selection {
            filter: Some("wasmi".into()),
            ..Selection::default()
        };
        let reg = registry(&selection, &RunParams::FIXED);
        assert!(reg.enabled().count() > 0);
        assert!(reg.enabled().all(|c| c.name.contains("wasmi")));
        assert!(!reg.get("native").unwrap().is_enabled());
    }

    #[test]
    fn missing_artifact_leaves_case_without_binary() {
        let reg = Registry::build(
            &ArtifactSet::default(),
            &Selection::default(),
            &RunParams::FIXED,
        );
        let case = reg.get("rust_wasmi_eager_wide").unwrap();
        assert!(case.artifact.is_none());
        assert_eq!(case.binary_size(), None);
    }
}
