//! Cross-backend agreement: every runtime, every parameterized build, same
//! checksum as the oracle.

use qsbench::artifact::FIXED;
use qsbench::backend::{Backend, NativeBackend, Runtime};
use qsbench::{compute_checksum, RunParams, FIXED_CHECKSUM};
use qsbench_tests::{embedded_artifact, prepare, wasm_runtimes, PARAMETERIZED};

const PARAMS: [RunParams; 5] = [
    RunParams::new(42, 500, 20),
    RunParams::new(7, 1, 5),
    RunParams::new(123, 257, 9),
    RunParams::new(5, 2, 3),
    RunParams::new(0, 64, 0),
];

fn expected(params: &RunParams) -> u64 {
    compute_checksum(params.seed, params.array_length, params.iterations).unwrap()
}

#[test]
fn every_backend_reproduces_the_acceptance_checksum() {
    let mut native = NativeBackend::new();
    assert_eq!(native.invoke(&RunParams::FIXED).unwrap(), FIXED_CHECKSUM);

    for runtime in wasm_runtimes() {
        for name in PARAMETERIZED {
            let mut backend = prepare(runtime, &embedded_artifact(name))
                .unwrap_or_else(|e| panic!("{name} on {runtime}: {e}"));
            assert_eq!(
                backend.invoke(&RunParams::FIXED),
                Ok(FIXED_CHECKSUM),
                "{name} on {runtime}"
            );
        }
    }
}

#[test]
fn parameterized_builds_agree_with_oracle() {
    for runtime in wasm_runtimes() {
        for name in PARAMETERIZED {
            let mut backend = prepare(runtime, &embedded_artifact(name)).unwrap();
            for params in &PARAMS {
                assert_eq!(
                    backend.invoke(params),
                    Ok(expected(params)),
                    "{name} on {runtime} with {params}"
                );
            }
        }
    }
}

#[test]
fn repeated_invocations_are_independent() {
    let runtime = wasm_runtimes()[0];
    let mut backend = prepare(runtime, &embedded_artifact(PARAMETERIZED[0])).unwrap();
    let small = RunParams::new(11, 100, 3);
    let first = backend.invoke(&small).unwrap();
    backend.invoke(&RunParams::new(99, 300, 2)).unwrap();
    assert_eq!(backend.invoke(&small).unwrap(), first);
    assert_eq!(first, expected(&small));
}

#[test]
fn seeds_above_31_bits_fold_the_same_way_on_wide_builds() {
    let params = RunParams::new(7 + (1 << 31), 100, 4);
    let folded = RunParams::new(7, 100, 4);
    for runtime in wasm_runtimes() {
        let mut wide = prepare(runtime, &embedded_artifact(PARAMETERIZED[0])).unwrap();
        assert_eq!(wide.invoke(&params), Ok(expected(&folded)), "{runtime}");
    }
}

#[test]
fn fixed_build_runs_on_its_catalogued_runtimes() {
    let artifact = embedded_artifact(FIXED);
    for runtime in [wasm_runtimes()[0], Runtime::Wasmi(qsbench::backend::WasmiMode::Eager)] {
        let mut backend = prepare(runtime, &artifact).unwrap();
        assert_eq!(backend.invoke(&RunParams::FIXED), Ok(FIXED_CHECKSUM));
    }
}
