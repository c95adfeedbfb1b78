//! Benchmark driver.
//!
//! Each case moves `Configured -> Prepared -> Running` and ends `Verified`,
//! `Mismatched` or `Failed`; disabled cases end `Skipped` without touching a
//! backend. Failures are contained to their case.

use crate::backend::{Adapter, Backend, PrepareOptions, Runtime};
use crate::error::AdapterError;
use crate::registry::{BenchmarkCase, Language, Registry};
use qsbench_oracle::{compute_checksum_with, ConfigurationError, OracleConfig, RunParams};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, Instant};

/// Run-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub params: RunParams,
    /// Timed invocations per case (at least one is always made).
    pub repetitions: u32,
    pub gas_limit: u64,
    pub oracle: OracleConfig,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            params: RunParams::FIXED,
            repetitions: 5,
            gas_limit: crate::backend::vm::DEFAULT_GAS_LIMIT,
            oracle: OracleConfig::CANONICAL,
        }
    }
}

/// Lifecycle of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Configured,
    Prepared,
    Running,
    Verified,
    Mismatched,
    Failed,
    Skipped,
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    Invoke,
}

fn as_micros<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_nanos() as f64 / 1e3)
}

/// Cost of a verified case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseMetrics {
    pub binary_size: Option<usize>,
    #[serde(rename = "prepare_us", serialize_with = "as_micros")]
    pub prepare: Duration,
    #[serde(rename = "min_us", serialize_with = "as_micros")]
    pub min: Duration,
    #[serde(rename = "mean_us", serialize_with = "as_micros")]
    pub mean: Duration,
    #[serde(rename = "max_us", serialize_with = "as_micros")]
    pub max: Duration,
    pub repetitions: u32,
    /// Gas of the last call, for metered backends.
    pub gas: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseOutcome {
    Skipped {
        reason: String,
    },
    Verified(CaseMetrics),
    Mismatched {
        expected: u64,
        actual: u64,
        repetition: u32,
    },
    Failed {
        stage: Stage,
        error: AdapterError,
    },
}

impl CaseOutcome {
    pub fn state(&self) -> CaseState {
        match self {
            Self::Skipped { .. } => CaseState::Skipped,
            Self::Verified(_) => CaseState::Verified,
            Self::Mismatched { .. } => CaseState::Mismatched,
            Self::Failed { .. } => CaseState::Failed,
        }
    }
}

/// Receives metrics of every verified case.
pub trait MetricsSink {
    fn record(&mut self, case: &BenchmarkCase, metrics: &CaseMetrics);
}

/// Emits metrics as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&mut self, case: &BenchmarkCase, metrics: &CaseMetrics) {
        tracing::info!(
            case = %case.name,
            bytes = ?metrics.binary_size,
            prepare_us = metrics.prepare.as_micros() as u64,
            mean_us = metrics.mean.as_micros() as u64,
            gas = ?metrics.gas,
            "metrics"
        );
    }
}

impl MetricsSink for Vec<(String, CaseMetrics)> {
    fn record(&mut self, case: &BenchmarkCase, metrics: &CaseMetrics) {
        self.push((case.name.clone(), metrics.clone()));
    }
}

/// Result of one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub language: Language,
    pub runtime: Runtime,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
}

/// Every case of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub array_length: usize,
    pub iterations: u64,
    pub expected: u64,
    pub cases: Vec<CaseReport>,
}

impl RunSummary {
    fn count(&self, state: CaseState) -> usize {
        self.cases
            .iter()
            .filter(|c| c.outcome.state() == state)
            .count()
    }

    pub fn verified(&self) -> usize {
        self.count(CaseState::Verified)
    }

    pub fn mismatched(&self) -> usize {
        self.count(CaseState::Mismatched)
    }

    pub fn failed(&self) -> usize {
        self.count(CaseState::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(CaseState::Skipped)
    }

    /// No case mismatched or failed.
    pub fn is_success(&self) -> bool {
        self.mismatched() == 0 && self.failed() == 0
    }
}

pub struct Driver {
    options: DriverOptions,
    expected: u64,
}

impl Driver {
    /// Compute the expected checksum once. An invalid configuration aborts
    /// the run before any backend is prepared.
    pub fn new(options: DriverOptions) -> Result<Self, ConfigurationError> {
        let p = options.params;
        let expected =
            compute_checksum_with(&options.oracle, p.seed, p.array_length, p.iterations)?;
        tracing::debug!(params = %p, expected, "oracle checksum");
        Ok(Self { options, expected })
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Run one case through the real adapters.
    pub fn run_case(&self, case: &BenchmarkCase, sink: &mut dyn MetricsSink) -> CaseOutcome {
        let prepare_options = PrepareOptions {
            gas_limit: self.options.gas_limit,
            oracle: self.options.oracle,
        };
        self.run_case_with(case, sink, |case| {
            Adapter::prepare(case.runtime, case.artifact.as_deref(), &prepare_options)
        })
    }

    /// Run one case with a caller-supplied backend constructor.
    pub fn run_case_with<B, F>(
        &self,
        case: &BenchmarkCase,
        sink: &mut dyn MetricsSink,
        prepare: F,
    ) -> CaseOutcome
    where
        B: Backend,
        F: FnOnce(&BenchmarkCase) -> Result<B, AdapterError>,
    {
        if let Some(reason) = &case.skip {
            tracing::debug!(case = %case.name, %reason, "skipped");
            return CaseOutcome::Skipped {
                reason: reason.clone(),
            };
        }

        let transition = |state: CaseState| tracing::debug!(case = %case.name, %state, "state");
        transition(CaseState::Configured);

        let start = Instant::now();
        let mut backend = match prepare(case) {
            Ok(backend) => backend,
            Err(error) => {
                tracing::warn!(case = %case.name, %error, "prepare failed");
                return CaseOutcome::Failed {
                    stage: Stage::Prepare,
                    error,
                };
            }
        };
        let prepare_time = start.elapsed();
        transition(CaseState::Prepared);

        let repetitions = self.options.repetitions.max(1);
        let mut min = Duration::MAX;
        let mut max = Duration::ZERO;
        let mut total = Duration::ZERO;
        transition(CaseState::Running);
        for repetition in 0..repetitions {
            let start = Instant::now();
            let result = backend.invoke(&self.options.params);
            let elapsed = start.elapsed();

            match result {
                Ok(actual) if actual == self.expected => {}
                Ok(actual) => {
                    tracing::warn!(
                        case = %case.name,
                        expected = self.expected,
                        actual,
                        repetition,
                        "checksum mismatch"
                    );
                    return CaseOutcome::Mismatched {
                        expected: self.expected,
                        actual,
                        repetition,
                    };
                }
                Err(error) => {
                    tracing::warn!(case = %case.name, %error, repetition, "invoke failed");
                    return CaseOutcome::Failed {
                        stage: Stage::Invoke,
                        error,
                    };
                }
            }
            min = min.min(elapsed);
            max = max.max(elapsed);
            total += elapsed;
        }

        let metrics = CaseMetrics {
            binary_size: case.binary_size(),
            prepare: prepare_time,
            min,
            mean: total / repetitions,
            max,
            repetitions,
            gas: backend.last_gas(),
        };
        transition(CaseState::Verified);
        tracing::info!(
            case = %case.name,
            mean_us = metrics.mean.as_micros() as u64,
            "verified"
        );
        sink.record(case, &metrics);
        CaseOutcome::Verified(metrics)
    }

    /// Run every case in registry order, one backend alive at a time.
    pub fn run_all(&self, registry: &Registry, sink: &mut dyn MetricsSink) -> RunSummary {
        let cases = registry
            .cases()
            .iter()
            .map(|case| CaseReport {
                name: case.name.clone(),
                language: case.language,
                runtime: case.runtime,
                outcome: self.run_case(case, sink),
            })
            .collect();

        let p = self.options.params;
        RunSummary {
            seed: p.seed,
            array_length: p.array_length,
            iterations: p.iterations,
            expected: self.expected,
            cases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeBackend;
    use qsbench_oracle::FIXED_CHECKSUM;

    /// Replays a script of results, one per invoke.
    struct Scripted {
        results: Vec<Result<u64, AdapterError>>,
        calls: usize,
    }

    impl Backend for Scripted {
        fn invoke(&mut self, _: &RunParams) -> Result<u64, AdapterError> {
            let result = self.results[self.calls.min(self.results.len() - 1)].clone();
            self.calls += 1;
            result
        }

        fn last_gas(&self) -> Option<u64> {
            Some(self.calls as u64)
        }
    }

    fn scripted(results: Vec<Result<u64, AdapterError>>) -> Scripted {
        Scripted { results, calls: 0 }
    }

    fn case(name: &str) -> BenchmarkCase {
        BenchmarkCase {
            name: name.into(),
            language: Language::Native,
            binary: "host",
            runtime: Runtime::Native,
            artifact: None,
            skip: None,
        }
    }

    fn driver(repetitions: u32) -> Driver {
        Driver::new(DriverOptions {
            repetitions,
            ..DriverOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn expected_checksum_comes_from_oracle() {
        assert_eq!(driver(1).expected(), FIXED_CHECKSUM);
    }

    #[test]
    fn empty_array_aborts_the_run() {
        let options = DriverOptions {
            params: RunParams::new(7, 0, 100),
            ..DriverOptions::default()
        };
        assert_eq!(Driver::new(options).err(), Some(ConfigurationError::EmptyArray));
    }

    #[test]
    fn native_case_follows_configured_arithmetic() {
        let driver = Driver::new(DriverOptions {
            params: RunParams::new(7, 100, 3),
            repetitions: 1,
            oracle: OracleConfig {
                modulus_bits: 32,
                ..OracleConfig::CANONICAL
            },
            ..DriverOptions::default()
        })
        .unwrap();
        let outcome = driver.run_case(&case("native"), &mut TracingSink);
        assert_eq!(outcome.state(), CaseState::Verified, "{outcome:?}");
    }

    #[test]
    fn verified_case_reports_metrics_to_sink() {
        let mut sink: Vec<(String, CaseMetrics)> = Vec::new();
        let outcome = driver(3).run_case_with(&case("ok"), &mut sink, |_| {
            Ok(scripted(vec![Ok(FIXED_CHECKSUM)]))
        });
        let CaseOutcome::Verified(metrics) = outcome else {
            panic!("expected verified, got {outcome:?}");
        };
        assert_eq!(metrics.repetitions, 3);
        assert_eq!(metrics.gas, Some(3));
        assert!(metrics.min <= metrics.mean && metrics.mean <= metrics.max);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].0, "ok");
    }

    #[test]
    fn mismatch_stops_at_first_bad_repetition() {
        let mut sink: Vec<(String, CaseMetrics)> = Vec::new();
        let outcome = driver(5).run_case_with(&case("bad"), &mut sink, |_| {
            Ok(scripted(vec![Ok(FIXED_CHECKSUM), Ok(FIXED_CHECKSUM + 1)]))
        });
        assert_eq!(
            outcome,
            CaseOutcome::Mismatched {
                expected: FIXED_CHECKSUM,
                actual: FIXED_CHECKSUM + 1,
                repetition: 1
            }
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn adapter_errors_fail_the_case_with_stage() {
        let mut sink = TracingSink;
        let d = driver(2);
        let outcome = d.run_case_with(&case("load"), &mut sink, |_| {
            Err::<Scripted, _>(AdapterError::Load("bad magic".into()))
        });
        assert_eq!(
            outcome,
            CaseOutcome::Failed {
                stage: Stage::Prepare,
                error: AdapterError::Load("bad magic".into())
            }
        );

        let outcome = d.run_case_with(&case("trap"), &mut sink, |_| {
            Ok(scripted(vec![Err(AdapterError::Trap("unreachable".into()))]))
        });
        assert_eq!(outcome.state(), CaseState::Failed);
        assert!(matches!(
            outcome,
            CaseOutcome::Failed {
                stage: Stage::Invoke,
                ..
            }
        ));
    }

    #[test]
    fn skipped_case_never_prepares() {
        let mut skipped = case("off");
        skipped.skip = Some("Native disabled".into());
        let never = |_: &BenchmarkCase| -> Result<NativeBackend, AdapterError> {
            panic!("prepare must not run")
        };
        let outcome = driver(1).run_case_with(&skipped, &mut TracingSink, never);
        assert_eq!(
            outcome,
            CaseOutcome::Skipped {
                reason: "Native disabled".into()
            }
        );
    }

    #[test]
    fn zero_repetitions_still_invokes_once() {
        let outcome = driver(0).run_case_with(&case("once"), &mut TracingSink, |_| {
            Ok(scripted(vec![Ok(FIXED_CHECKSUM)]))
        });
        assert!(matches!(outcome, CaseOutcome::Verified(CaseMetrics { repetitions: 1, .. })));
    }

    #[test]
    fn summary_counts_and_serializes() {
        let d = driver(1);
        let outcome = d.run_case(&case("native"), &mut TracingSink);
        let summary = RunSummary {
            seed: 7,
            array_length: 1000,
            iterations: 100,
            expected: FIXED_CHECKSUM,
            cases: vec![
                CaseReport {
                    name: "native".into(),
                    language: Language::Native,
                    runtime: Runtime::Native,
                    outcome,
                },
                CaseReport {
                    name: "broken".into(),
                    language: Language::Rust,
                    runtime: Runtime::Native,
                    outcome: CaseOutcome::Failed {
                        stage: Stage::Invoke,
                        error: AdapterError::Marshal("seed too wide".into()),
                    },
                },
            ],
        };
        assert_eq!(summary.verified(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_success());

        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["cases"][0]["outcome"], "verified");
        assert_eq!(json["cases"][0]["repetitions"], 1);
        assert_eq!(json["cases"][1]["stage"], "invoke");
        assert_eq!(json["cases"][1]["error"]["kind"], "marshal");
        assert_eq!(json["cases"][1]["runtime"]["engine"], "native");
    }
}
