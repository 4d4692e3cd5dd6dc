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

fn run_bool(script: &str) -> bool {
    match run_value(script) {
        Value::Boolean(b) => b,
        other => panic!("expected a boolean, got {other:?}"),
    }
}

#[test]
fn object_literal_and_member_access() {
    assert_eq!(run_string("var o = {}; o.p = 'hi'; o.p;"), "hi");
    assert_eq!(run_value("var o = {a: 1, 'b c': 2}; o['b c'];"), Value::Number(2.0));
    assert_eq!(run_value("({x: {y: 5}}).x.y"), Value::Number(5.0));
}

#[test]
fn missing_property_is_undefined() {
    assert_eq!(run_value("({}).nothing"), Value::Undefined);
}

#[test]
fn reading_from_null_throws() {
    let err = Interpreter::new("null.x;").unwrap().run().unwrap_err();
    match err {
        sandjs::JSError::TypeError { message } => {
            assert!(message.contains("Cannot read property 'x'"), "{message}");
        }
        other => panic!("expected TypeError, got {other:?}"),
    }
}

#[test]
fn prototype_chain_reads() {
    assert_eq!(
        run_value(
            "function T() {}
             T.prototype.shared = 11;
             var a = new T(), b = new T();
             a.shared + b.shared;"
        ),
        Value::Number(22.0)
    );
}

#[test]
fn writes_shadow_the_prototype() {
    assert_eq!(
        run_value(
            "function T() {}
             T.prototype.v = 1;
             var a = new T(), b = new T();
             a.v = 5;
             a.v * 10 + b.v;"
        ),
        Value::Number(51.0)
    );
}

#[test]
fn in_operator() {
    assert_eq!(run_bool("'a' in {a: 1}"), true);
    assert_eq!(run_bool("'b' in {a: 1}"), false);
    assert_eq!(run_bool("'toString' in {}"), true); // prototype chain counts
    assert_eq!(run_bool("0 in [7]"), true);
}

#[test]
fn delete_behavior() {
    assert_eq!(run_bool("var o = {a: 1}; delete o.a;"), true);
    assert_eq!(run_bool("var o = {a: 1}; delete o.a; 'a' in o;"), false);
    // delete on a non-reference yields true
    assert_eq!(run_bool("delete 42;"), true);
    // var bindings are non-configurable
    assert_eq!(run_bool("var x = 1; delete x;"), false);
    // implicitly created globals are configurable
    assert_eq!(run_bool("y = 1; delete y;"), true);
}

#[test]
fn delete_non_configurable_returns_false() {
    assert_eq!(
        run_bool(
            "var o = {};
             Object.defineProperty(o, 'p', {value: 1, configurable: false});
             delete o.p;"
        ),
        false
    );
}

#[test]
fn object_keys_and_own_property_names() {
    assert_eq!(run_string("Object.keys({a: 1, b: 2}).join(',')"), "a,b");
    assert_eq!(
        run_string(
            "var o = {a: 1};
             Object.defineProperty(o, 'hidden', {value: 2, enumerable: false});
             Object.keys(o).join(',') + '|' + Object.getOwnPropertyNames(o).join(',');"
        ),
        "a|a,hidden"
    );
}

#[test]
fn define_property_attributes() {
    assert_eq!(
        run_value(
            "var o = {};
             Object.defineProperty(o, 'p', {value: 3, writable: false});
             o.p = 99;
             o.p;"
        ),
        Value::Number(3.0)
    );
    // redefining a non-configurable property is a TypeError
    let err = Interpreter::new(
        "var o = {};
         Object.defineProperty(o, 'p', {value: 1, configurable: false});
         Object.defineProperty(o, 'p', {value: 1, enumerable: true});",
    )
    .unwrap()
    .run()
    .unwrap_err();
    assert!(matches!(err, sandjs::JSError::TypeError { .. }), "got {err:?}");
}

#[test]
fn mixing_data_and_accessor_descriptor_throws() {
    assert_eq!(
        run_string(
            "try {
               Object.defineProperty({}, 'p', {value: 1, get: function () {}});
             } catch (e) { e.name; }"
        ),
        "TypeError"
    );
}

#[test]
fn get_own_property_descriptor() {
    assert_eq!(
        run_string(
            "var d = Object.getOwnPropertyDescriptor({a: 1}, 'a');
             d.value + ',' + d.writable + ',' + d.enumerable + ',' + d.configurable;"
        ),
        "1,true,true,true"
    );
}

#[test]
fn object_create() {
    assert_eq!(
        run_value("var base = {v: 3}; var o = Object.create(base); o.v;"),
        Value::Number(3.0)
    );
    assert_eq!(run_bool("Object.getPrototypeOf(Object.create(null)) === null"), true);
    assert_eq!(
        run_value(
            "var o = Object.create({}, {p: {value: 9, enumerable: true}}); o.p;"
        ),
        Value::Number(9.0)
    );
}

#[test]
fn prevent_extensions() {
    assert_eq!(
        run_value("var o = {a: 1}; Object.preventExtensions(o); o.b = 2; o.b;"),
        Value::Undefined
    );
    // existing properties stay writable
    assert_eq!(
        run_value("var o = {a: 1}; Object.preventExtensions(o); o.a = 5; o.a;"),
        Value::Number(5.0)
    );
    assert_eq!(run_bool("Object.isExtensible({})"), true);
    assert_eq!(
        run_bool("var o = {}; Object.preventExtensions(o); Object.isExtensible(o);"),
        false
    );
}

#[test]
fn has_own_property_and_enumerability() {
    assert_eq!(run_bool("({a: 1}).hasOwnProperty('a')"), true);
    assert_eq!(run_bool("({a: 1}).hasOwnProperty('toString')"), false);
    assert_eq!(run_bool("({a: 1}).propertyIsEnumerable('a')"), true);
    assert_eq!(run_bool("[1].hasOwnProperty(0)"), true);
}

#[test]
fn is_prototype_of() {
    assert_eq!(
        run_bool("function T() {} T.prototype.isPrototypeOf(new T());"),
        true
    );
    assert_eq!(run_bool("Object.prototype.isPrototypeOf({})"), true);
}

#[test]
fn class_tags_via_to_string() {
    assert_eq!(run_string("Object.prototype.toString.call([])"), "[object Array]");
    assert_eq!(run_string("Object.prototype.toString.call({})"), "[object Object]");
    assert_eq!(
        run_string("Object.prototype.toString.call(function () {})"),
        "[object Function]"
    );
    assert_eq!(run_string("Object.prototype.toString.call(null)"), "[object Null]");
}

#[test]
fn global_object_identities() {
    assert_eq!(run_bool("window === self && self === this"), true);
    assert_eq!(run_bool("this.Math === Math"), true);
}

#[test]
fn array_length_invariants() {
    assert_eq!(run_value("var a = []; a[4] = 1; a.length;"), Value::Number(5.0));
    assert_eq!(
        run_string("var a = [1, 2, 3, 4]; a.length = 2; a.join(',');"),
        "1,2"
    );
    assert_eq!(run_value("var a = [1, 2]; a.length = 4; a.length;"), Value::Number(4.0));
    let err = Interpreter::new("var a = []; a.length = 1.5;")
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, sandjs::JSError::RangeError { .. }), "got {err:?}");
}

#[test]
fn non_writable_array_length_rejects_resize() {
    // the length write fails silently in loose mode
    assert_eq!(
        run_value(
            "var a = [1, 2, 3];
             Object.defineProperty(a, 'length', {writable: false});
             a.length = 10;
             a.length;"
        ),
        Value::Number(3.0)
    );
    assert_eq!(
        run_string(
            "var a = [1, 2, 3];
             Object.defineProperty(a, 'length', {writable: false});
             a.length = 1;
             a.join(',');"
        ),
        "1,2,3"
    );
    // and element writes past the frozen length are rejected too
    assert_eq!(
        run_value(
            "var a = [1];
             Object.defineProperty(a, 'length', {writable: false});
             a[3] = 9;
             a.length * 10 + ('3' in a ? 1 : 0);"
        ),
        Value::Number(10.0)
    );
    // writes below the frozen length still land
    assert_eq!(
        run_value(
            "var a = [1, 2];
             Object.defineProperty(a, 'length', {writable: false});
             a[0] = 5;
             a[0];"
        ),
        Value::Number(5.0)
    );
}

#[test]
fn string_boxed_indices_are_read_only() {
    assert_eq!(
        run_string("var s = new String('abc'); s[1] = 'X'; s[1] + s.length;"),
        "b3"
    );
}

#[test]
fn string_primitive_member_reads() {
    assert_eq!(run_value("'abc'.length"), Value::Number(3.0));
    assert_eq!(run_string("'abc'[1]"), "b");
    assert_eq!(run_value("'abc'[9]"), Value::Undefined);
}
