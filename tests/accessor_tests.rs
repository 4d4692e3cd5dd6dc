use sandjs::{Interpreter, Value};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

fn run_value(script: &str) -> Value {
    let mut interp = Interpreter::new(script).unwrap();
    interp.run().unwrap();
    interp.value().clone()
}

fn run_number(script: &str) -> f64 {
    match run_value(script) {
        Value::Number(n) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn literal_getter() {
    assert_eq!(run_number("var o = {get p() { return 42; }}; o.p;"), 42.0);
}

#[test]
fn literal_setter() {
    assert_eq!(
        run_number("var o = {set p(v) { this.stored = v * 2; }}; o.p = 21; o.stored;"),
        42.0
    );
}

#[test]
fn getter_and_setter_pair_merge() {
    assert_eq!(
        run_number(
            "var o = {
               get p() { return this.v; },
               set p(x) { this.v = x + 1; }
             };
             o.p = 10;
             o.p;"
        ),
        11.0
    );
}

#[test]
fn getter_runs_exactly_once_per_access() {
    assert_eq!(
        run_number(
            "var calls = 0;
             var o = {get p() { calls++; return 1; }};
             o.p;
             o.p;
             calls;"
        ),
        2.0
    );
}

#[test]
fn accessors_via_define_property() {
    assert_eq!(
        run_number(
            "var o = {};
             Object.defineProperty(o, 'p', {
               get: function () { return 5; },
               set: function (v) { this.back = v; }
             });
             o.p = 3;
             o.p + o.back;"
        ),
        8.0
    );
}

#[test]
fn getter_on_prototype_uses_receiver_this() {
    assert_eq!(
        run_number(
            "function T(v) { this.v = v; }
             Object.defineProperty(T.prototype, 'doubled', {
               get: function () { return this.v * 2; }
             });
             new T(21).doubled;"
        ),
        42.0
    );
}

#[test]
fn setter_receives_assigned_value_and_assignment_yields_it() {
    assert_eq!(
        run_number("var o = {set p(v) {}}; var r = (o.p = 9); r;"),
        9.0
    );
}

#[test]
fn compound_assignment_through_accessors() {
    assert_eq!(
        run_number(
            "var o = {
               v: 10,
               get p() { return this.v; },
               set p(x) { this.v = x; }
             };
             o.p += 5;
             o.v;"
        ),
        15.0
    );
}

#[test]
fn update_expression_through_accessors() {
    assert_eq!(
        run_number(
            "var o = {
               v: 1,
               get p() { return this.v; },
               set p(x) { this.v = x; }
             };
             o.p++;
             o.p;"
        ),
        2.0
    );
}

#[test]
fn getter_may_throw_through_member_read() {
    assert_eq!(
        run_value(
            "var o = {get p() { throw new RangeError('boom'); }};
             try { o.p; } catch (e) { e.name; }"
        ),
        Value::str("RangeError")
    );
}

#[test]
fn write_to_getter_only_property_is_silent_in_loose_mode() {
    assert_eq!(
        run_number("var o = {get p() { return 3; }}; o.p = 99; o.p;"),
        3.0
    );
}

#[test]
fn write_to_getter_only_property_throws_in_strict_mode() {
    let err = Interpreter::new("'use strict'; var o = {get p() { return 3; }}; o.p = 99;")
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, sandjs::JSError::TypeError { .. }), "got {err:?}");
}

#[test]
fn accessor_on_global_object_traps_identifier_access() {
    assert_eq!(
        run_number(
            "Object.defineProperty(this, 'answer', {get: function () { return 42; }});
             answer;"
        ),
        42.0
    );
}

#[test]
fn getter_reads_through_descriptor_report() {
    assert_eq!(
        run_value(
            "var o = {get p() { return 1; }};
             var d = Object.getOwnPropertyDescriptor(o, 'p');
             typeof d.get === 'function' && d.set === undefined;"
        ),
        Value::Boolean(true)
    );
}
