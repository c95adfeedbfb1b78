//! Command-line and environment configuration.
//!
//! Every option can also be set through the environment variable named in
//! its help text. Enable flags accept `true/false`, `1/0`, `yes/no` and
//! `on/off`; language flags default to `ALL_LANGS` and engine flags default
//! to `ALL_RUNTIMES`.

use crate::backend::vm::DEFAULT_GAS_LIMIT;
use crate::driver::DriverOptions;
use crate::registry::Selection;
use clap::builder::BoolishValueParser;
use clap::Parser;
use qsbench_oracle::{OracleConfig, RunParams};
use std::path::PathBuf;

/// qsbench: run one quicksort checksum workload on every backend and compare.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// LCG seed
    #[arg(long, env = "SEED", default_value_t = RunParams::FIXED.seed)]
    pub seed: u64,

    /// Array length (must be at least 1)
    #[arg(long, env = "ARR_LEN", default_value_t = RunParams::FIXED.array_length)]
    pub arr_len: usize,

    /// Fill/sort/sample rounds per call
    #[arg(long, env = "ITER", default_value_t = RunParams::FIXED.iterations)]
    pub iter: u64,

    /// Timed invocations per case
    #[arg(long, env = "REPETITIONS", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub repetitions: u32,

    /// Gas budget of one contract call
    #[arg(long, env = "GAS_LIMIT", default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,

    /// Run the native oracle backend
    #[arg(long, env = "NATIVE", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub native: Option<bool>,

    /// Run the contract VM
    #[arg(long, env = "VM", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub vm: Option<bool>,

    /// Default for every language flag
    #[arg(long, env = "ALL_LANGS", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub all_langs: Option<bool>,

    #[arg(long, env = "RUST", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub rust: Option<bool>,

    #[arg(long, env = "ASSEMBLYSCRIPT", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub assemblyscript: Option<bool>,

    #[arg(long, env = "TINYGO", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub tinygo: Option<bool>,

    /// Run the fixed-parameter text-format build
    #[arg(long, env = "WAT", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub wat: Option<bool>,

    /// Default for every engine flag
    #[arg(long, env = "ALL_RUNTIMES", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub all_runtimes: Option<bool>,

    /// wasmtime compilers (Cranelift, Winch)
    #[arg(long, env = "WASMTIME", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub wasmtime: Option<bool>,

    /// wasmtime's Pulley interpreter
    #[arg(long, env = "PULLEY", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub pulley: Option<bool>,

    #[arg(long, env = "WASMI", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub wasmi: Option<bool>,

    /// Only run cases whose name contains this substring
    #[arg(long)]
    pub filter: Option<String>,

    /// Directory of `<name>.wasm` / `<name>.wat` files replacing embedded builds
    #[arg(long, env = "ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Print case names and exit
    #[arg(long)]
    pub list: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    pub fn params(&self) -> RunParams {
        RunParams::new(self.seed, self.arr_len, self.iter)
    }

    pub fn selection(&self) -> Selection {
        let all_langs = self.all_langs.unwrap_or(true);
        let all_runtimes = self.all_runtimes.unwrap_or(true);
        Selection {
            native: self.native.unwrap_or(true),
            vm: self.vm.unwrap_or(true),
            rust: self.rust.unwrap_or(all_langs),
            assemblyscript: self.assemblyscript.unwrap_or(all_langs),
            tinygo: self.tinygo.unwrap_or(all_langs),
            wat: self.wat.unwrap_or(all_langs),
            wasmtime: self.wasmtime.unwrap_or(all_runtimes),
            pulley: self.pulley.unwrap_or(all_runtimes),
            wasmi: self.wasmi.unwrap_or(all_runtimes),
            filter: self.filter.clone(),
        }
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            params: self.params(),
            repetitions: self.repetitions,
            gas_limit: self.gas_limit,
            oracle: OracleConfig::CANONICAL,
        }
    }
}
