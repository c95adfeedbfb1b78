//! Argument and result marshaling across the engine boundary.

use qsbench::artifact::{FIXED, RUST_NARROW, RUST_WIDE};
use qsbench::backend::Backend;
use qsbench::{compute_checksum, AdapterError, RunParams, FIXED_CHECKSUM};
use qsbench_tests::{embedded_artifact, prepare, prepare_err, wasm_runtimes, wat_artifact};

#[test]
fn narrow_abi_rejects_wide_seed() {
    let artifact = embedded_artifact(RUST_NARROW);
    let wide = RunParams::new(1 << 32, 10, 1);
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        let err = backend.invoke(&wide).unwrap_err();
        assert_eq!(err.kind(), "marshal", "{runtime}");
        assert!(err.to_string().contains("seed=4294967296"), "{runtime}: {err}");
    }
}

#[test]
fn narrow_abi_accepts_full_u32_range() {
    let artifact = embedded_artifact(RUST_NARROW);
    let params = RunParams::new(u64::from(u32::MAX), 40, 2);
    let expected = compute_checksum(params.seed, params.array_length, params.iterations).unwrap();
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        assert_eq!(backend.invoke(&params), Ok(expected), "{runtime}");
    }
}

#[test]
fn wide_abi_takes_large_seeds() {
    let artifact = embedded_artifact(RUST_WIDE);
    let params = RunParams::new(u64::MAX, 40, 2);
    let expected = compute_checksum(params.seed, params.array_length, params.iterations).unwrap();
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        assert_eq!(backend.invoke(&params), Ok(expected), "{runtime}");
    }
}

#[test]
fn fixed_build_only_serves_its_parameters() {
    let artifact = embedded_artifact(FIXED);
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        let err = backend.invoke(&RunParams::new(42, 500, 20)).unwrap_err();
        assert_eq!(err.kind(), "marshal", "{runtime}");
        assert_eq!(backend.invoke(&RunParams::FIXED), Ok(FIXED_CHECKSUM), "{runtime}");
    }
}

#[test]
fn unsupported_entry_signatures_fail_to_load() {
    let shapes = [
        "(param i32 i32) (result i64)",
        "(param i32 i64 i32) (result i64)",
        "(param f64 f64 f64) (result i64)",
        "(param i32 i32 i32)",
        "(param i32 i32 i32) (result i64 i64)",
    ];
    for shape in shapes {
        let source = format!(
            r#"(module (func (export "run") {shape} unreachable))"#
        );
        let artifact = wat_artifact("odd", &source);
        for runtime in wasm_runtimes() {
            let err = prepare_err(runtime, &artifact);
            assert!(
                matches!(&err, AdapterError::Load(msg) if msg.starts_with("unsupported entry signature")),
                "{shape} on {runtime}: {err}"
            );
        }
    }
}

#[test]
fn narrow_results_are_zero_extended() {
    let artifact = wat_artifact(
        "all_ones",
        r#"(module (func (export "run") (param i32 i32 i32) (result i32) i32.const -1))"#,
    );
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        assert_eq!(
            backend.invoke(&RunParams::new(1, 1, 1)),
            Ok(u64::from(u32::MAX)),
            "{runtime}"
        );
    }
}

#[test]
fn wide_results_keep_every_bit() {
    let artifact = wat_artifact(
        "top_bit",
        r#"(module (func (export "run") (param i64 i64 i64) (result i64)
             i64.const 0x8000000000000001))"#,
    );
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        assert_eq!(
            backend.invoke(&RunParams::new(1, 1, 1)),
            Ok(0x8000_0000_0000_0001),
            "{runtime}"
        );
    }
}

#[test]
fn arguments_arrive_in_declared_order() {
    // seed * 1_000_000 + arr_len * 1_000 + iter
    let artifact = wat_artifact(
        "echo",
        r#"(module (func (export "run") (param $s i64) (param $n i64) (param $i i64) (result i64)
             (i64.add
               (i64.add
                 (i64.mul (local.get $s) (i64.const 1000000))
                 (i64.mul (local.get $n) (i64.const 1000)))
               (local.get $i))))"#,
    );
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        assert_eq!(backend.invoke(&RunParams::new(7, 8, 9)), Ok(7_008_009), "{runtime}");
    }
}

#[test]
fn guest_traps_are_execution_traps() {
    let artifact = embedded_artifact(RUST_WIDE);
    for runtime in wasm_runtimes() {
        let mut backend = prepare(runtime, &artifact).unwrap();
        let err = backend.invoke(&RunParams::new(7, 0, 1)).unwrap_err();
        assert_eq!(err.kind(), "trap", "{runtime}");
    }
}
