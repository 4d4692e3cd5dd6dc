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

fn run_string(script: &str) -> String {
    match run_value(script) {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string, got {other:?}"),
    }
}

#[test]
fn declaration_and_call() {
    assert_eq!(run_number("function f(n) { return n + 1; } f(1);"), 2.0);
}

#[test]
fn declarations_are_hoisted() {
    assert_eq!(run_number("var r = f(2); function f(n) { return n * 3; } r;"), 6.0);
}

#[test]
fn missing_arguments_are_undefined() {
    assert_eq!(
        run_string("function f(a, b) { return typeof b; } f(1);"),
        "undefined"
    );
}

#[test]
fn arguments_object() {
    assert_eq!(
        run_number("(function () { return arguments.length; })(1, 2, 3);"),
        3.0
    );
    assert_eq!(
        run_number("(function () { return arguments[1]; })(5, 6, 7);"),
        6.0
    );
}

#[test]
fn closures_capture_environment() {
    assert_eq!(
        run_number(
            "function counter() {
               var n = 0;
               return function () { n++; return n; };
             }
             var c = counter();
             c(); c(); c();"
        ),
        3.0
    );
}

#[test]
fn named_function_expression_binds_own_name() {
    assert_eq!(
        run_number("var f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5);"),
        120.0
    );
}

#[test]
fn function_expression_gets_display_name() {
    assert_eq!(run_string("var myFunc = function () {}; myFunc.name;"), "myFunc");
    assert_eq!(run_number("function g(x) { return x; } g.length;"), 1.0);
}

#[test]
fn recursion() {
    assert_eq!(
        run_number("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(10);"),
        55.0
    );
}

#[test]
fn this_in_method_calls() {
    assert_eq!(
        run_number("var o = {v: 42, get_: function () { return this.v; }}; o.get_();"),
        42.0
    );
}

#[test]
fn this_defaults_to_global_in_loose_mode() {
    assert_eq!(
        run_value("var v = 7; function f() { return this.v; } f();"),
        Value::Number(7.0)
    );
}

#[test]
fn constructor_and_prototype() {
    assert_eq!(
        run_number(
            "function Point(x, y) { this.x = x; this.y = y; }
             Point.prototype.norm1 = function () { return this.x + this.y; };
             new Point(3, 4).norm1();"
        ),
        7.0
    );
}

#[test]
fn constructor_primitive_return_is_replaced() {
    assert_eq!(
        run_number("function T() { this.v = 1; return 42; } new T().v;"),
        1.0
    );
}

#[test]
fn constructor_object_return_wins() {
    assert_eq!(
        run_number("function T() { this.v = 1; return {v: 2}; } new T().v;"),
        2.0
    );
}

#[test]
fn instanceof_follows_prototypes() {
    assert_eq!(
        run_value("function A() {} var a = new A(); a instanceof A;"),
        Value::Boolean(true)
    );
    assert_eq!(
        run_value("function A() {} function B() {} new A() instanceof B;"),
        Value::Boolean(false)
    );
    assert_eq!(
        run_value("function A() {} new A() instanceof Object;"),
        Value::Boolean(true)
    );
}

#[test]
fn apply_and_call() {
    assert_eq!(
        run_number("function add(a, b) { return a + b + this.c; } add.call({c: 1}, 2, 3);"),
        6.0
    );
    assert_eq!(
        run_number("function add(a, b) { return a + b + this.c; } add.apply({c: 10}, [1, 2]);"),
        13.0
    );
    assert_eq!(
        run_number("function n() { return arguments.length; } n.apply(null);"),
        0.0
    );
}

#[test]
fn bind_polyfill() {
    assert_eq!(
        run_number(
            "function add(a, b) { return a + b; }
             var add5 = add.bind(null, 5);
             add5(10);"
        ),
        15.0
    );
    assert_eq!(
        run_value(
            "function T(v) { this.v = v; }
             var B = T.bind(null, 3);
             var inst = new B();
             inst.v === 3 && inst instanceof T;"
        ),
        Value::Boolean(true)
    );
}

#[test]
fn calling_a_non_function_throws_type_error() {
    let err = Interpreter::new("var x = 5; x();").unwrap().run().unwrap_err();
    assert!(matches!(err, sandjs::JSError::TypeError { .. }), "got {err:?}");
}

#[test]
fn new_on_a_builtin_method_throws() {
    let err = Interpreter::new("new Math.floor(1);")
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, sandjs::JSError::TypeError { .. }), "got {err:?}");
}

#[test]
fn function_constructor_parses_source() {
    assert_eq!(
        run_number("var f = new Function('a', 'b', 'return a * b;'); f(6, 7);"),
        42.0
    );
    let err = Interpreter::new("new Function('syntax error here(');")
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, sandjs::JSError::SyntaxError { .. }), "got {err:?}");
}

#[test]
fn eval_direct_sees_caller_scope() {
    assert_eq!(
        run_number("function f() { var hidden = 9; return eval('hidden + 1'); } f();"),
        10.0
    );
}

#[test]
fn eval_result_is_last_expression() {
    assert_eq!(run_number("eval('1 + 1; 40 + 2')"), 42.0);
    assert_eq!(run_number("eval('7')"), 7.0);
}

#[test]
fn eval_of_non_string_is_identity() {
    assert_eq!(run_number("eval(42)"), 42.0);
}

#[test]
fn eval_syntax_error_is_interpreted() {
    assert_eq!(
        run_string("try { eval('}{'); } catch (e) { e.name; }"),
        "SyntaxError"
    );
}
