use std::time::Duration;

use sandjs::{Config, Interpreter, JSError, RegExpMode, Value};

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

fn run_with_mode(script: &str, mode: RegExpMode) -> Result<Value, JSError> {
    let config = Config {
        regexp_mode: mode,
        ..Config::default()
    };
    let mut interp = Interpreter::with_config(script, config)?;
    interp.run()?;
    Ok(interp.value().clone())
}

#[test]
fn literal_properties() {
    assert_eq!(run_string("/ab+c/gi.source"), "ab+c");
    assert_eq!(run_value("/x/g.global"), Value::Boolean(true));
    assert_eq!(run_value("/x/.global"), Value::Boolean(false));
    assert_eq!(run_value("/x/i.ignoreCase"), Value::Boolean(true));
    assert_eq!(run_string("String(/a\\/b/g)"), "/a\\/b/g");
}

#[test]
fn test_and_exec() {
    assert_eq!(run_value("/b+/.test('abbc')"), Value::Boolean(true));
    assert_eq!(run_value("/z/.test('abbc')"), Value::Boolean(false));
    assert_eq!(run_string("/b+/.exec('abbc')[0]"), "bb");
    assert_eq!(run_value("/b+/.exec('abbc').index"), Value::Number(1.0));
    assert_eq!(run_value("/z/.exec('abbc')"), Value::Null);
}

#[test]
fn exec_captures() {
    assert_eq!(
        run_string("var m = /(\\d+)-(\\d+)/.exec('a 12-34 b'); m[1] + '/' + m[2];"),
        "12/34"
    );
    assert_eq!(
        run_value("/(a)(b)?/.exec('a')[2]"),
        Value::Undefined
    );
}

#[test]
fn global_exec_round_trips_last_index() {
    assert_eq!(
        run_string(
            "var re = /\\d/g, out = '';
             var m;
             while ((m = re.exec('a1b2c3'))) { out += m[0] + ':' + re.lastIndex + ';'; }
             out;"
        ),
        "1:2;2:4;3:6;"
    );
    // lastIndex resets to 0 after a miss
    assert_eq!(
        run_value("var re = /x/g; re.lastIndex = 5; re.exec('x'); re.lastIndex;"),
        Value::Number(0.0)
    );
}

#[test]
fn regexp_constructor() {
    assert_eq!(run_value("new RegExp('a+').test('caaat')"), Value::Boolean(true));
    assert_eq!(run_string("new RegExp('a', 'gi').source"), "a");
    assert_eq!(run_value("RegExp(/y/g) === RegExp(/y/g)"), Value::Boolean(false));
    let err = Interpreter::new("new RegExp('(unclosed');").unwrap().run().unwrap_err();
    assert!(matches!(err, JSError::SyntaxError { .. }), "got {err:?}");
    let err = Interpreter::new("new RegExp('a', 'q');").unwrap().run().unwrap_err();
    assert!(matches!(err, JSError::SyntaxError { .. }), "got {err:?}");
}

#[test]
fn string_match() {
    assert_eq!(run_string("'a1b2'.match(/\\d/)[0]"), "1");
    assert_eq!(run_string("'a1b2'.match(/\\d/g).join(',')"), "1,2");
    assert_eq!(run_value("'abc'.match(/\\d/)"), Value::Null);
    assert_eq!(run_value("'abc'.match(/\\d/g)"), Value::Null);
}

#[test]
fn string_search() {
    assert_eq!(run_value("'hello world'.search(/world/)"), Value::Number(6.0));
    assert_eq!(run_value("'hello'.search(/z/)"), Value::Number(-1.0));
    // search ignores lastIndex entirely
    assert_eq!(
        run_value("var re = /l/g; re.lastIndex = 4; 'hello'.search(re);"),
        Value::Number(2.0)
    );
}

#[test]
fn string_replace_with_string() {
    assert_eq!(run_string("'aaa'.replace(/a/, 'b')"), "baa");
    assert_eq!(run_string("'aaa'.replace(/a/g, 'b')"), "bbb");
    assert_eq!(run_string("'a-b'.replace('-', '+')"), "a+b");
    assert_eq!(run_string("'john smith'.replace(/(\\w+) (\\w+)/, '$2, $1')"), "smith, john");
    assert_eq!(run_string("'abc'.replace(/b/, '[$&]')"), "a[b]c");
    assert_eq!(run_string("'x'.replace(/x/, '$$')"), "$");
}

#[test]
fn string_replace_with_function() {
    assert_eq!(
        run_string("'a1b2'.replace(/\\d/g, function (m) { return '<' + m + '>'; })"),
        "a<1>b<2>"
    );
    assert_eq!(
        run_string(
            "'key=value'.replace(/(\\w+)=(\\w+)/, function (m, k, v) { return v + '=' + k; })"
        ),
        "value=key"
    );
    assert_eq!(
        run_string("'a-b'.replace('-', function (m, i, s) { return '[' + m + i + s + ']'; })"),
        "a[-1a-b]b"
    );
}

#[test]
fn string_split_with_regexp() {
    assert_eq!(run_string("'a1b22c'.split(/\\d+/).join('|')"), "a|b|c");
    assert_eq!(run_string("'a1b'.split(/(\\d)/).join('|')"), "a|1|b");
    assert_eq!(run_string("'abc'.split('').join('|')"), "a|b|c");
    assert_eq!(run_string("'a,b,c'.split(',', 2).join('|')"), "a|b");
    assert_eq!(run_string("'nosep'.split(/x/).join('|')"), "nosep");
}

#[test]
fn disabled_mode_throws_on_use_but_allows_literals() {
    // literal construction is fine; only the consuming operations throw
    let value = run_with_mode("var re = /a/; re.source;", RegExpMode::Disabled).unwrap();
    assert_eq!(value, Value::str("a"));

    let result = run_with_mode("/a/.test('a');", RegExpMode::Disabled);
    match result {
        Err(JSError::Error { message }) => {
            assert_eq!(message, "Regular expressions not supported");
        }
        other => panic!("expected the disabled-mode error, got {other:?}"),
    }
}

#[test]
fn native_mode_works_inline() {
    let value = run_with_mode("'a1b2'.match(/\\d/g).length;", RegExpMode::Native).unwrap();
    assert_eq!(value, Value::Number(2.0));
}

#[test]
fn sandboxed_timeout_throws_regexp_timeout() {
    let config = Config {
        regexp_mode: RegExpMode::Sandboxed,
        regexp_thread_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    // classic catastrophic backtracking against a non-matching tail
    let script = "try { /(a+)+$/.test('aaaaaaaaaaaaaaaaaaaaaaaaab'); 'matched'; } \
                  catch (e) { e.message; }";
    let mut interp = Interpreter::with_config(script, config).unwrap();
    interp.run().unwrap();
    assert_eq!(*interp.value(), Value::str("RegExp Timeout"));
}

#[test]
fn sandboxed_backend_recovers_after_timeout() {
    let config = Config {
        regexp_mode: RegExpMode::Sandboxed,
        regexp_thread_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let script = "var first;
                  try { /(a+)+$/.test('aaaaaaaaaaaaaaaaaaaaaaaaab'); first = 'no'; }
                  catch (e) { first = 'timeout'; }
                  first + ':' + /b/.test('abc');";
    let mut interp = Interpreter::with_config(script, config).unwrap();
    interp.run().unwrap();
    assert_eq!(*interp.value(), Value::str("timeout:true"));
}
