use sandjs::{Interpreter, JSError, Value};

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

#[test]
fn catch_binds_thrown_value() {
    assert_eq!(run_value("try { throw 1; } catch (e) { e; }"), Value::Number(1.0));
}

#[test]
fn catch_binding_is_scoped_to_the_clause() {
    assert_eq!(
        run_string("try { throw 1; } catch (e) {} typeof e;"),
        "undefined"
    );
}

#[test]
fn type_error_name_and_message() {
    let out = run_string("try { null.x; } catch (e) { e.name + ':' + e.message; }");
    assert!(out.starts_with("TypeError:"), "got {out}");
}

#[test]
fn finally_always_runs() {
    assert_eq!(
        run_string(
            "var log = '';
             try { log += 't'; } finally { log += 'f'; }
             try { throw 0; } catch (e) { log += 'c'; } finally { log += 'F'; }
             log;"
        ),
        "tfcF"
    );
}

#[test]
fn finally_runs_on_return_path() {
    assert_eq!(
        run_string(
            "var log = '';
             function f() {
               try { return 'r'; } finally { log += 'f'; }
             }
             f() + log;"
        ),
        "rf"
    );
}

#[test]
fn uncaught_throw_in_finally_replaces_completion() {
    assert_eq!(
        run_string(
            "try {
               try { throw new Error('first'); } finally { throw new Error('second'); }
             } catch (e) { e.message; }"
        ),
        "second"
    );
}

#[test]
fn rethrow_from_catch_propagates() {
    assert_eq!(
        run_string(
            "try {
               try { throw new Error('x'); } catch (e) { throw new Error('y'); }
             } catch (e) { e.message; }"
        ),
        "y"
    );
}

#[test]
fn error_constructors_and_inheritance() {
    assert_eq!(run_string("new TypeError('m').name"), "TypeError");
    assert_eq!(run_string("new RangeError('m').message"), "m");
    assert_eq!(
        run_value("new SyntaxError('m') instanceof SyntaxError"),
        Value::Boolean(true)
    );
    assert_eq!(
        run_value("new SyntaxError('m') instanceof Error"),
        Value::Boolean(true)
    );
    assert_eq!(run_value("new Error('m') instanceof TypeError"), Value::Boolean(false));
    // callable without new, per ES5
    assert_eq!(run_string("Error('msg').message"), "msg");
}

#[test]
fn error_to_string_polyfill() {
    assert_eq!(run_string("String(new TypeError('bad'))"), "TypeError: bad");
    assert_eq!(run_string("String(new Error())"), "Error");
}

#[test]
fn uncaught_interpreted_errors_map_to_host_errors() {
    let err = Interpreter::new("undefinedVariable;").unwrap().run().unwrap_err();
    assert!(matches!(err, JSError::ReferenceError { .. }), "got {err:?}");

    let err = Interpreter::new("throw new RangeError('out of range');")
        .unwrap()
        .run()
        .unwrap_err();
    match err {
        JSError::RangeError { message } => assert_eq!(message, "out of range"),
        other => panic!("expected RangeError, got {other:?}"),
    }

    let err = Interpreter::new("throw 'plain string';").unwrap().run().unwrap_err();
    match err {
        JSError::Error { message } => assert_eq!(message, "plain string"),
        other => panic!("expected generic Error, got {other:?}"),
    }
}

#[test]
fn parse_errors_surface_before_any_step() {
    let err = Interpreter::new("var = ;").unwrap_err();
    assert!(matches!(err, JSError::SyntaxError { .. }), "got {err:?}");
}

#[test]
fn throw_from_native_helper_is_catchable() {
    assert_eq!(
        run_string("try { [].length = -1; } catch (e) { e.name; }"),
        "RangeError"
    );
    assert_eq!(
        run_string("try { undefined.p = 1; } catch (e) { e.name; }"),
        "TypeError"
    );
}

#[test]
fn nested_unwinding_through_call_frames() {
    assert_eq!(
        run_string(
            "function deep(n) {
               if (n == 0) throw new Error('bottom');
               return deep(n - 1);
             }
             try { deep(10); } catch (e) { e.message; }"
        ),
        "bottom"
    );
}

#[test]
fn custom_thrown_objects_pass_through() {
    assert_eq!(
        run_value("try { throw {code: 42}; } catch (e) { e.code; }"),
        Value::Number(42.0)
    );
}
