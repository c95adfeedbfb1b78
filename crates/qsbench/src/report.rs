//! Human and machine readable run summaries.

use crate::driver::{CaseOutcome, RunSummary};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

fn millis(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64() * 1e3)
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Fixed-width table, one row per case, followed by totals.
pub fn render_table(summary: &RunSummary) -> String {
    let width = summary
        .cases
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "seed={} arr_len={} iter={} expected={}",
        summary.seed, summary.array_length, summary.iterations, summary.expected
    );
    let _ = writeln!(
        out,
        "{:<width$}  {:<10}  {:>9}  {:>11}  {:>11}  {:>12}  detail",
        "case", "status", "bytes", "prepare_ms", "mean_ms", "gas"
    );

    for case in &summary.cases {
        let status = case.outcome.state().to_string().to_lowercase();
        let _ = match &case.outcome {
            CaseOutcome::Verified(m) => writeln!(
                out,
                "{:<width$}  {:<10}  {:>9}  {:>11}  {:>11}  {:>12}",
                case.name,
                status,
                or_dash(m.binary_size),
                millis(m.prepare),
                millis(m.mean),
                or_dash(m.gas),
            ),
            CaseOutcome::Skipped { reason } => {
                writeln!(out, "{:<width$}  {:<10}  {:>62}  {reason}", case.name, status, "")
            }
            CaseOutcome::Mismatched {
                expected,
                actual,
                repetition,
            } => writeln!(
                out,
                "{:<width$}  {:<10}  {:>62}  got {actual}, expected {expected} (repetition {repetition})",
                case.name, status, ""
            ),
            CaseOutcome::Failed { stage, error } => writeln!(
                out,
                "{:<width$}  {:<10}  {:>62}  {stage:?}: {error}",
                case.name, status, ""
            ),
        };
    }

    let _ = writeln!(
        out,
        "{} verified, {} mismatched, {} failed, {} skipped",
        summary.verified(),
        summary.mismatched(),
        summary.failed(),
        summary.skipped()
    );
    out
}

pub fn to_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("serializing run summary")
}

pub fn write_json(summary: &RunSummary, path: &Path) -> Result<()> {
    fs::write(path, to_json(summary)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Runtime;
    use crate::driver::{CaseMetrics, CaseReport, Stage};
    use crate::error::AdapterError;
    use crate::registry::Language;

    fn summary() -> RunSummary {
        let report = |name: &str, outcome| CaseReport {
            name: name.into(),
            language: Language::Native,
            runtime: Runtime::Native,
            outcome,
        };
        RunSummary {
            seed: 7,
            array_length: 1000,
            iterations: 100,
            expected: 107_829_970_005,
            cases: vec![
                report(
                    "native",
                    CaseOutcome::Verified(CaseMetrics {
                        binary_size: None,
                        prepare: Duration::from_micros(5),
                        min: Duration::from_millis(1),
                        mean: Duration::from_millis(2),
                        max: Duration::from_millis(3),
                        repetitions: 5,
                        gas: None,
                    }),
                ),
                report(
                    "off",
                    CaseOutcome::Skipped {
                        reason: "Rust disabled".into(),
                    },
                ),
                report(
                    "bad",
                    CaseOutcome::Mismatched {
                        expected: 1,
                        actual: 2,
                        repetition: 0,
                    },
                ),
                report(
                    "boom",
                    CaseOutcome::Failed {
                        stage: Stage::Prepare,
                        error: AdapterError::Load("unresolved import env.f".into()),
                    },
                ),
            ],
        }
    }

    #[test]
    fn table_lists_every_case_and_totals() {
        let table = render_table(&summary());
        assert!(table.starts_with("seed=7 arr_len=1000 iter=100 expected=107829970005\n"));
        assert!(table.contains("2.000"));
        assert!(table.contains("Rust disabled"));
        assert!(table.contains("got 2, expected 1 (repetition 0)"));
        assert!(table.contains("Prepare: load error: unresolved import env.f"));
        assert!(table.ends_with("1 verified, 1 mismatched, 1 failed, 1 skipped\n"));
    }

    #[test]
    fn json_flattens_outcomes() {
        let json: serde_json::Value = serde_json::from_str(&to_json(&summary()).unwrap()).unwrap();
        assert_eq!(json["expected"], 107_829_970_005u64);
        assert_eq!(json["cases"][0]["mean_us"], 2000.0);
        assert_eq!(json["cases"][1]["reason"], "Rust disabled");
        assert_eq!(json["cases"][2]["actual"], 2);
        assert_eq!(json["cases"][3]["error"]["message"], "unresolved import env.f");
    }
}
