use criterion::{Criterion, criterion_group, criterion_main};
use sandjs::Interpreter;
use std::hint::black_box;

// Initialize logger for benchmark so `RUST_LOG` is honored.
#[ctor::ctor]
fn __init_bench_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).try_init();
}

const FIB: &str = "function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15);";

const LOOP: &str = "var n = 0; for (var i = 0; i < 10000; i++) { n += i; } n;";

const STRINGS: &str = "
    var parts = [];
    for (var i = 0; i < 200; i++) { parts.push('item-' + i); }
    parts.join(',').split(',').length;";

fn bench_construction(c: &mut Criterion) {
    c.bench_function("construct_empty", |b| {
        b.iter(|| black_box(Interpreter::new("").unwrap()));
    });
}

fn bench_run(c: &mut Criterion) {
    c.bench_function("run_fib_15", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new(FIB).unwrap();
            interp.run().unwrap();
            black_box(interp.value().clone())
        });
    });
    c.bench_function("run_loop_10k", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new(LOOP).unwrap();
            interp.run().unwrap();
            black_box(interp.value().clone())
        });
    });
    c.bench_function("run_string_churn", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new(STRINGS).unwrap();
            interp.run().unwrap();
            black_box(interp.value().clone())
        });
    });
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("step_through_loop", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new("var n = 0; while (n < 100) { n++; } n;").unwrap();
            while interp.step().unwrap() {}
            black_box(interp.value().clone())
        });
    });
}

criterion_group!(benches, bench_construction, bench_run, bench_step);
criterion_main!(benches);
