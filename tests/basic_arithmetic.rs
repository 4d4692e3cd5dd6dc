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
    let paused = interp.run().unwrap();
    assert!(!paused, "program unexpectedly paused");
    interp.value().clone()
}

fn run_number(script: &str) -> f64 {
    match run_value(script) {
        Value::Number(n) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

fn run_string(script: &str) -> String {
    match run_value(script) {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn var_and_expression_value() {
    // the canonical smoke test: value is the last expression statement
    assert_eq!(run_value("var x = 1; x;"), Value::Number(1.0));
}

#[test]
fn arithmetic_operators() {
    assert_eq!(run_number("1 + 2 * 3"), 7.0);
    assert_eq!(run_number("(1 + 2) * 3"), 9.0);
    assert_eq!(run_number("7 % 4"), 3.0);
    assert_eq!(run_number("2 - 5"), -3.0);
    assert_eq!(run_number("1 / 4"), 0.25);
}

#[test]
fn division_by_zero_is_infinity() {
    assert_eq!(run_number("1 / 0"), f64::INFINITY);
    assert_eq!(run_number("-1 / 0"), f64::NEG_INFINITY);
    assert!(run_number("0 / 0").is_nan());
}

#[test]
fn string_concatenation() {
    assert_eq!(run_string("'a' + 'b'"), "ab");
    assert_eq!(run_string("'n=' + 1"), "n=1");
    assert_eq!(run_string("1 + '2'"), "12");
    assert_eq!(run_number("'3' * '4'"), 12.0);
}

#[test]
fn number_formatting() {
    assert_eq!(run_string("String(1.5)"), "1.5");
    assert_eq!(run_string("String(100)"), "100");
    assert_eq!(run_string("String(1e21)"), "1e+21");
    assert_eq!(run_string("String(NaN)"), "NaN");
}

#[test]
fn comparison_operators() {
    assert_eq!(run_value("1 < 2"), Value::Boolean(true));
    assert_eq!(run_value("'a' < 'b'"), Value::Boolean(true));
    assert_eq!(run_value("NaN < NaN"), Value::Boolean(false));
    assert_eq!(run_value("NaN >= NaN"), Value::Boolean(false));
    assert_eq!(run_value("2 >= 2"), Value::Boolean(true));
}

#[test]
fn equality_coercions() {
    assert_eq!(run_value("1 == '1'"), Value::Boolean(true));
    assert_eq!(run_value("1 === '1'"), Value::Boolean(false));
    assert_eq!(run_value("null == undefined"), Value::Boolean(true));
    assert_eq!(run_value("null === undefined"), Value::Boolean(false));
    assert_eq!(run_value("true == 1"), Value::Boolean(true));
    assert_eq!(run_value("NaN == NaN"), Value::Boolean(false));
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(run_number("5 & 3"), 1.0);
    assert_eq!(run_number("5 | 3"), 7.0);
    assert_eq!(run_number("5 ^ 3"), 6.0);
    assert_eq!(run_number("~5"), -6.0);
    assert_eq!(run_number("1 << 4"), 16.0);
    assert_eq!(run_number("-8 >> 1"), -4.0);
    assert_eq!(run_number("-1 >>> 0"), 4294967295.0);
}

#[test]
fn logical_short_circuit() {
    assert_eq!(run_number("0 || 5"), 5.0);
    assert_eq!(run_number("3 || 5"), 3.0);
    assert_eq!(run_number("0 && 5"), 0.0);
    assert_eq!(run_number("3 && 5"), 5.0);
    // the right side must not evaluate at all
    assert_eq!(
        run_number("var hit = 0; function f() { hit = 1; return 2; } false && f(); hit;"),
        0.0
    );
}

#[test]
fn unary_operators() {
    assert_eq!(run_number("-'5'"), -5.0);
    assert_eq!(run_number("+true"), 1.0);
    assert_eq!(run_value("!''"), Value::Boolean(true));
    assert_eq!(run_value("void 42"), Value::Undefined);
    assert_eq!(run_string("typeof 1"), "number");
    assert_eq!(run_string("typeof 'a'"), "string");
    assert_eq!(run_string("typeof undefined"), "undefined");
    assert_eq!(run_string("typeof null"), "object");
    assert_eq!(run_string("typeof {}"), "object");
    assert_eq!(run_string("typeof function() {}"), "function");
}

#[test]
fn typeof_unbound_identifier_is_lenient() {
    assert_eq!(run_string("typeof nothingHere"), "undefined");
}

#[test]
fn update_expressions() {
    assert_eq!(run_number("var i = 1; i++; i;"), 2.0);
    assert_eq!(run_number("var i = 1; i++;"), 1.0);
    assert_eq!(run_number("var i = 1; ++i;"), 2.0);
    assert_eq!(run_number("var i = 1; --i; i;"), 0.0);
    assert_eq!(run_number("var o = {n: '4'}; o.n++; o.n;"), 5.0);
}

#[test]
fn compound_assignment() {
    assert_eq!(run_number("var x = 2; x += 3; x;"), 5.0);
    assert_eq!(run_number("var x = 2; x *= 3; x;"), 6.0);
    assert_eq!(run_string("var s = 'a'; s += 'b'; s;"), "ab");
    assert_eq!(run_number("var x = 7; x >>>= 1; x;"), 3.0);
}

#[test]
fn conditional_expression() {
    assert_eq!(run_number("1 ? 2 : 3"), 2.0);
    assert_eq!(run_number("'' ? 2 : 3"), 3.0);
}

#[test]
fn comma_expression() {
    assert_eq!(run_number("(1, 2, 3)"), 3.0);
}
