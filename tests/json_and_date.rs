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

fn run_string(script: &str) -> String {
    match run_value(script) {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string, got {other:?}"),
    }
}

fn run_number(script: &str) -> f64 {
    match run_value(script) {
        Value::Number(n) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn json_parse() {
    assert_eq!(run_number("JSON.parse('{\"a\": [1, 2]}').a[1]"), 2.0);
    assert_eq!(run_value("JSON.parse('null')"), Value::Null);
    assert_eq!(run_string("JSON.parse('\"str\"')"), "str");
    assert_eq!(
        run_string("try { JSON.parse('{oops'); } catch (e) { e.name; }"),
        "SyntaxError"
    );
}

#[test]
fn json_stringify() {
    assert_eq!(run_string("JSON.stringify({a: 1, b: [true, null]})"), "{\"a\":1,\"b\":[true,null]}");
    assert_eq!(run_string("JSON.stringify('x')"), "\"x\"");
    assert_eq!(run_value("JSON.stringify(undefined)"), Value::Undefined);
    // functions and undefined members are omitted; in arrays they are null
    assert_eq!(
        run_string("JSON.stringify({f: function () {}, u: undefined, n: 1})"),
        "{\"n\":1}"
    );
    assert_eq!(run_string("JSON.stringify([undefined, function () {}])"), "[null,null]");
    // non-enumerable properties are skipped
    assert_eq!(
        run_string(
            "var o = {a: 1};
             Object.defineProperty(o, 'h', {value: 2, enumerable: false});
             JSON.stringify(o);"
        ),
        "{\"a\":1}"
    );
}

#[test]
fn json_stringify_with_space() {
    assert_eq!(
        run_string("JSON.stringify({a: [1]}, null, 2)"),
        "{\n  \"a\": [\n    1\n  ]\n}"
    );
    assert_eq!(
        run_string("JSON.stringify({a: 1}, null, '\\t')"),
        "{\n\t\"a\": 1\n}"
    );
}

#[test]
fn json_stringify_circular_throws() {
    assert_eq!(
        run_string("var o = {}; o.me = o; try { JSON.stringify(o); } catch (e) { e.name; }"),
        "TypeError"
    );
}

#[test]
fn json_round_trip_inside_the_interpreter() {
    assert_eq!(
        run_string("JSON.stringify(JSON.parse('{\"a\":[1,\"b\",false]}'))"),
        "{\"a\":[1,\"b\",false]}"
    );
}

#[test]
fn date_construction_and_fields() {
    // 2026-08-01T12:30:15.250Z, built from components in UTC
    let script = "var d = new Date(2026, 7, 1, 12, 30, 15, 250);";
    assert_eq!(run_number(&format!("{script} d.getFullYear();")), 2026.0);
    assert_eq!(run_number(&format!("{script} d.getMonth();")), 7.0);
    assert_eq!(run_number(&format!("{script} d.getDate();")), 1.0);
    assert_eq!(run_number(&format!("{script} d.getHours();")), 12.0);
    assert_eq!(run_number(&format!("{script} d.getMinutes();")), 30.0);
    assert_eq!(run_number(&format!("{script} d.getSeconds();")), 15.0);
    assert_eq!(run_number(&format!("{script} d.getMilliseconds();")), 250.0);
    assert_eq!(run_number(&format!("{script} d.getTimezoneOffset();")), 0.0);
}

#[test]
fn date_from_millis_and_get_time() {
    assert_eq!(run_number("new Date(86400000).getTime()"), 86400000.0);
    assert_eq!(run_number("new Date(86400000).getDate()"), 2.0);
    assert_eq!(run_number("new Date(0).getFullYear()"), 1970.0);
}

#[test]
fn date_component_overflow_carries() {
    assert_eq!(run_number("new Date(2000, 12, 1).getFullYear()"), 2001.0);
    assert_eq!(run_number("new Date(2000, 12, 1).getMonth()"), 0.0);
    assert_eq!(run_number("new Date(2000, 0, 32).getMonth()"), 1.0);
}

#[test]
fn two_digit_years_are_1900_based() {
    assert_eq!(run_number("new Date(99, 0, 1).getFullYear()"), 1999.0);
}

#[test]
fn date_now_is_reasonable() {
    // after 2020-01-01 and finite
    assert_eq!(run_value("Date.now() > 1577836800000"), Value::Boolean(true));
    assert_eq!(run_value("isFinite(Date.now())"), Value::Boolean(true));
}

#[test]
fn date_setters() {
    assert_eq!(
        run_number("var d = new Date(0); d.setFullYear(2000); d.getFullYear();"),
        2000.0
    );
    assert_eq!(
        run_number("var d = new Date(0); d.setTime(86400000); d.getTime();"),
        86400000.0
    );
    assert_eq!(
        run_number("var d = new Date(2000, 0, 1); d.setMonth(13); d.getFullYear();"),
        2001.0
    );
}

#[test]
fn date_iso_string_and_json() {
    assert_eq!(
        run_string("new Date(Date.UTC(2026, 7, 1, 12, 30, 15, 250)).toISOString()"),
        "2026-08-01T12:30:15.250Z"
    );
    assert_eq!(
        run_string("JSON.stringify(new Date(0))"),
        "\"1970-01-01T00:00:00.000Z\""
    );
}

#[test]
fn date_parse_iso() {
    assert_eq!(run_number("Date.parse('1970-01-02T00:00:00Z')"), 86400000.0);
    assert_eq!(run_value("isNaN(Date.parse('garbage'))"), Value::Boolean(true));
}

#[test]
fn invalid_dates() {
    assert_eq!(run_value("isNaN(new Date('nope').getTime())"), Value::Boolean(true));
    assert_eq!(run_string("String(new Date('nope'))"), "Invalid Date");
    assert_eq!(run_value("new Date('nope').toJSON()"), Value::Null);
    assert_eq!(
        run_string("try { new Date('nope').toISOString(); } catch (e) { e.name; }"),
        "RangeError"
    );
}

#[test]
fn date_arithmetic_via_coercion() {
    assert_eq!(run_number("new Date(2000) - new Date(500)"), 1500.0);
}
