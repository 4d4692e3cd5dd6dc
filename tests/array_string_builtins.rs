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
fn sort_then_join() {
    // the canonical polyfilled-bubble-sort scenario
    assert_eq!(run_string("var a = [3, 1, 2]; a.sort(); a.join(',');"), "1,2,3");
}

#[test]
fn sort_with_comparator() {
    assert_eq!(
        run_string("[10, 9, 100].sort(function (a, b) { return a - b; }).join(',')"),
        "9,10,100"
    );
    // default sort is lexicographic
    assert_eq!(run_string("[10, 9, 100].sort().join(',')"), "10,100,9");
}

#[test]
fn push_pop_shift_unshift() {
    assert_eq!(run_number("var a = [1]; a.push(2, 3);"), 3.0);
    assert_eq!(run_number("var a = [1, 2]; a.pop();"), 2.0);
    assert_eq!(run_number("var a = [1, 2]; a.pop(); a.length;"), 1.0);
    assert_eq!(run_number("var a = [1, 2]; a.shift();"), 1.0);
    assert_eq!(run_string("var a = [2, 3]; a.unshift(0, 1); a.join(',');"), "0,1,2,3");
    assert_eq!(run_value("[].pop()"), Value::Undefined);
}

#[test]
fn slice_splice_concat_reverse() {
    assert_eq!(run_string("[1, 2, 3, 4].slice(1, 3).join(',')"), "2,3");
    assert_eq!(run_string("[1, 2, 3, 4].slice(-2).join(',')"), "3,4");
    assert_eq!(
        run_string("var a = [1, 2, 3, 4]; a.splice(1, 2, 'x'); a.join(',');"),
        "1,x,4"
    );
    assert_eq!(
        run_string("var a = [1, 4]; a.splice(1, 0, 2, 3); a.join(',');"),
        "1,2,3,4"
    );
    assert_eq!(run_string("var a = [1, 2, 3]; a.splice(1).join(',');"), "2,3");
    assert_eq!(run_string("[1].concat([2, 3], 4).join(',')"), "1,2,3,4");
    assert_eq!(run_string("[1, 2, 3].reverse().join(',')"), "3,2,1");
}

#[test]
fn iteration_polyfills() {
    assert_eq!(
        run_string("[1, 2, 3].map(function (x) { return x * 2; }).join(',')"),
        "2,4,6"
    );
    assert_eq!(
        run_string("[1, 2, 3, 4].filter(function (x) { return x % 2 == 0; }).join(',')"),
        "2,4"
    );
    assert_eq!(
        run_number("[1, 2, 3].reduce(function (acc, x) { return acc + x; }, 10)"),
        16.0
    );
    assert_eq!(
        run_number("[1, 2, 3].reduce(function (acc, x) { return acc + x; })"),
        6.0
    );
    assert_eq!(
        run_string("[1, 2].reduceRight(function (acc, x) { return acc + ':' + x; }, 's')"),
        "s:2:1"
    );
    assert_eq!(
        run_value("[1, 2, 3].every(function (x) { return x > 0; })"),
        Value::Boolean(true)
    );
    assert_eq!(
        run_value("[1, 2, 3].some(function (x) { return x > 2; })"),
        Value::Boolean(true)
    );
    assert_eq!(run_number("[5, 6, 7].indexOf(6)"), 1.0);
    assert_eq!(run_number("[5, 6, 7].indexOf(8)"), -1.0);
    assert_eq!(run_number("[1, 2, 1].lastIndexOf(1)"), 2.0);
}

#[test]
fn reduce_of_empty_array_throws() {
    assert_eq!(
        run_string("try { [].reduce(function () {}); } catch (e) { e.name; }"),
        "TypeError"
    );
}

#[test]
fn for_each_receives_index_and_array() {
    assert_eq!(
        run_string(
            "var out = '';
             ['a', 'b'].forEach(function (v, i, arr) { out += v + i + arr.length; });
             out;"
        ),
        "a02b12"
    );
}

#[test]
fn array_constructor_forms() {
    assert_eq!(run_number("new Array(5).length"), 5.0);
    assert_eq!(run_string("new Array(1, 2, 3).join(',')"), "1,2,3");
    assert_eq!(run_number("Array(2, 4).length"), 2.0);
    assert_eq!(run_value("Array.isArray([])"), Value::Boolean(true));
    assert_eq!(run_value("Array.isArray({length: 0})"), Value::Boolean(false));
}

#[test]
fn sparse_arrays() {
    assert_eq!(run_number("[1, , 3].length"), 3.0);
    assert_eq!(run_string("[1, , 3].join(',')"), "1,,3");
    assert_eq!(
        run_number("var n = 0; [1, , 3].forEach(function () { n++; }); n;"),
        2.0
    );
}

#[test]
fn string_methods() {
    assert_eq!(run_string("'Hello'.charAt(1)"), "e");
    assert_eq!(run_number("'Hello'.charCodeAt(0)"), 72.0);
    assert_eq!(run_string("'a'.concat('b', 'c')"), "abc");
    assert_eq!(run_number("'banana'.indexOf('an')"), 1.0);
    assert_eq!(run_number("'banana'.indexOf('an', 2)"), 3.0);
    assert_eq!(run_number("'banana'.lastIndexOf('an')"), 3.0);
    assert_eq!(run_string("'abcdef'.slice(1, 3)"), "bc");
    assert_eq!(run_string("'abcdef'.slice(-2)"), "ef");
    assert_eq!(run_string("'abcdef'.substring(3, 1)"), "bc");
    assert_eq!(run_string("'abcdef'.substr(2, 2)"), "cd");
    assert_eq!(run_string("'MiXeD'.toLowerCase()"), "mixed");
    assert_eq!(run_string("'MiXeD'.toUpperCase()"), "MIXED");
    assert_eq!(run_string("'  pad  '.trim()"), "pad");
    assert_eq!(run_string("String.fromCharCode(72, 105)"), "Hi");
}

#[test]
fn string_split_with_string_separator() {
    assert_eq!(run_string("'a,b,c'.split(',').join('|')"), "a|b|c");
    assert_eq!(run_number("'a'.split(undefined).length"), 1.0);
}

#[test]
fn methods_work_on_primitives_via_boxing() {
    assert_eq!(run_string("'abc'.toUpperCase()"), "ABC");
    assert_eq!(run_string("(255).toString(16)"), "ff");
    assert_eq!(run_string("(3.14159).toFixed(2)"), "3.14");
    assert_eq!(run_string("true.toString()"), "true");
}

#[test]
fn number_methods() {
    assert_eq!(run_string("(1e21).toString()"), "1e+21");
    assert_eq!(run_number("new Number(8).valueOf()"), 8.0);
    assert_eq!(run_string("(8).toString(2)"), "1000");
    let err = Interpreter::new("(1).toString(99);").unwrap().run().unwrap_err();
    assert!(matches!(err, sandjs::JSError::RangeError { .. }), "got {err:?}");
}

#[test]
fn math_builtins() {
    assert_eq!(run_number("Math.max(1, 9, 4)"), 9.0);
    assert_eq!(run_number("Math.min(1, 9, 4)"), 1.0);
    assert_eq!(run_number("Math.floor(1.9)"), 1.0);
    assert_eq!(run_number("Math.ceil(1.1)"), 2.0);
    assert_eq!(run_number("Math.round(2.5)"), 3.0);
    assert_eq!(run_number("Math.round(-2.5)"), -2.0);
    assert_eq!(run_number("Math.pow(2, 10)"), 1024.0);
    assert_eq!(run_number("Math.abs(-7)"), 7.0);
    assert_eq!(run_number("Math.sqrt(81)"), 9.0);
    assert!(run_number("Math.max(1, NaN)").is_nan());
    assert_eq!(run_value("var r = Math.random(); r >= 0 && r < 1;"), Value::Boolean(true));
}

#[test]
fn parse_int_and_float_globals() {
    assert_eq!(run_number("parseInt('42px')"), 42.0);
    assert_eq!(run_number("parseInt('ff', 16)"), 255.0);
    assert_eq!(run_number("parseFloat('3.5rem')"), 3.5);
    assert_eq!(run_value("isNaN(parseInt('z'))"), Value::Boolean(true));
    assert_eq!(run_value("isFinite(1 / 0)"), Value::Boolean(false));
}

#[test]
fn uri_globals() {
    assert_eq!(run_string("encodeURIComponent('a b&c')"), "a%20b%26c");
    assert_eq!(run_string("decodeURIComponent('a%20b%26c')"), "a b&c");
    assert_eq!(run_string("encodeURI('a b/c?d=1')"), "a%20b/c?d=1");
    assert_eq!(
        run_string("try { decodeURIComponent('%zz'); } catch (e) { e.name; }"),
        "URIError"
    );
}
