use sandjs::{Interpreter, Value};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

fn run_number(script: &str) -> f64 {
    let mut interp = Interpreter::new(script).unwrap();
    interp.run().unwrap();
    match interp.value() {
        Value::Number(n) => *n,
        other => panic!("expected a number, got {other:?}"),
    }
}

fn run_string(script: &str) -> String {
    let mut interp = Interpreter::new(script).unwrap();
    interp.run().unwrap();
    match interp.value() {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn if_else() {
    assert_eq!(run_number("var x = 5; if (x > 3) { x = x + 1; } x;"), 6.0);
    assert_eq!(run_number("var x = 2; if (x > 3) { x = 10; } else { x = 20; } x;"), 20.0);
    assert_eq!(run_number("var x = 0; if (1) x = 42; x;"), 42.0);
}

#[test]
fn while_loop() {
    assert_eq!(
        run_number("var n = 0, i = 0; while (i < 5) { n += i; i++; } n;"),
        10.0
    );
    assert_eq!(run_number("var i = 9; while (false) { i = 0; } i;"), 9.0);
}

#[test]
fn do_while_runs_body_first() {
    assert_eq!(run_number("var i = 0; do { i++; } while (false); i;"), 1.0);
    assert_eq!(run_number("var i = 0; do { i++; } while (i < 3); i;"), 3.0);
}

#[test]
fn for_loop() {
    assert_eq!(
        run_number("var n = 0; for (var i = 0; i < 10; i++) { n += i; } n;"),
        45.0
    );
    // all three header clauses are optional
    assert_eq!(
        run_number("var i = 0; for (;;) { i++; if (i >= 4) break; } i;"),
        4.0
    );
}

#[test]
fn break_and_continue() {
    assert_eq!(
        run_number("var n = 0; for (var i = 0; i < 10; i++) { if (i % 2) continue; n += i; } n;"),
        20.0
    );
    assert_eq!(
        run_number("var i = 0; while (true) { i++; if (i == 7) break; } i;"),
        7.0
    );
}

#[test]
fn labeled_break_and_continue() {
    assert_eq!(
        run_number(
            "var n = 0;
             outer: for (var i = 0; i < 3; i++) {
               for (var j = 0; j < 3; j++) {
                 if (j == 1) continue outer;
                 n++;
               }
             }
             n;"
        ),
        3.0
    );
    assert_eq!(
        run_number(
            "var n = 0;
             outer: for (var i = 0; i < 3; i++) {
               for (var j = 0; j < 3; j++) {
                 if (i == 1 && j == 1) break outer;
                 n++;
               }
             }
             n;"
        ),
        4.0
    );
}

#[test]
fn labeled_block_break() {
    assert_eq!(
        run_number("var n = 0; lab: { n = 1; break lab; n = 2; } n;"),
        1.0
    );
}

#[test]
fn switch_matching_and_fallthrough() {
    let script = "
        function pick(v) {
          var out = '';
          switch (v) {
            case 1: out += 'one ';
            case 2: out += 'two '; break;
            case 3: out += 'three '; break;
            default: out += 'other ';
          }
          return out;
        }
        pick(1) + '|' + pick(2) + '|' + pick(3) + '|' + pick(9);";
    assert_eq!(run_string(script), "one two |two |three |other |");
}

#[test]
fn switch_uses_strict_equality() {
    assert_eq!(
        run_string("switch ('1') { case 1: 'number'; break; case '1': 'string'; break; }"),
        "string"
    );
}

#[test]
fn switch_default_in_middle() {
    assert_eq!(
        run_string(
            "function f(v) {
               var out = '';
               switch (v) {
                 case 1: out += 'a'; break;
                 default: out += 'd';
                 case 2: out += 'b'; break;
               }
               return out;
             }
             f(1) + '|' + f(2) + '|' + f(3);"
        ),
        "a|b|db|"
    );
}

#[test]
fn for_in_iterates_array_indices_in_order() {
    assert_eq!(
        run_string("var a = [10, 20, 30], out = ''; for (var k in a) { out += k + ';'; } out;"),
        "0;1;2;"
    );
}

#[test]
fn for_in_observes_deletion() {
    assert_eq!(
        run_string(
            "var o = {a: 1, b: 2, c: 3}, out = '';
             for (var k in o) { if (k == 'a') delete o.c; out += k; }
             out;"
        ),
        "ab"
    );
}

#[test]
fn for_in_skips_shadowed_prototype_names() {
    assert_eq!(
        run_string(
            "function T() { this.x = 1; }
             T.prototype.x = 99;
             T.prototype.y = 2;
             var out = '';
             for (var k in new T()) { out += k; }
             out;"
        ),
        "xy"
    );
}

#[test]
fn for_in_over_null_is_empty() {
    assert_eq!(run_number("var n = 0; for (var k in null) { n++; } n;"), 0.0);
}

#[test]
fn for_in_assigns_through_member_target() {
    assert_eq!(
        run_string("var o = {a: 1, b: 2}, t = {}; for (t.k in o) {} t.k;"),
        "b"
    );
}

#[test]
fn with_statement() {
    assert_eq!(
        run_number("var o = {x: 40}; var x = 1; with (o) { x = x + 2; } o.x;"),
        42.0
    );
    assert_eq!(
        run_number("var o = {}; var x = 1; with (o) { x = 5; } x;"),
        5.0
    );
}

#[test]
fn empty_and_debugger_statements() {
    assert_eq!(run_number(";;; debugger; 3;"), 3.0);
}
