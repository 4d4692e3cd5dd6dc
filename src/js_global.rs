use crate::core::descriptor::{
    NONCONFIGURABLE_READONLY_NONENUMERABLE, NONENUMERABLE, READONLY,
};
use crate::core::eval::NativeInfo;
use crate::core::scope::Scope;
use crate::core::value::{
    CLASS_ARRAY, CLASS_BOOLEAN, CLASS_FUNCTION, CLASS_NUMBER, CLASS_STRING, FuncKind, NativeData,
    Throw, Value,
};
use crate::interp::{Interpreter, Roots};
use crate::js_number;
use crate::raise_uri_error;

/// Allocates every root object and wires the global scope. Must run before
/// any other initializer; everything else resolves prototypes through
/// `roots`.
pub(crate) fn bootstrap(interp: &mut Interpreter) {
    let object_proto = interp.alloc_object(None);
    let function_proto = interp.alloc_object(Some(object_proto));
    {
        let obj = interp.heap.get_mut(function_proto);
        obj.class = CLASS_FUNCTION;
        obj.func = Some(FuncKind::Builtin("Function.prototype"));
        obj.illegal_constructor = true;
    }
    let array_proto = interp.alloc_object(Some(object_proto));
    interp.heap.get_mut(array_proto).class = CLASS_ARRAY;
    let string_proto = interp.alloc_object(Some(object_proto));
    {
        let obj = interp.heap.get_mut(string_proto);
        obj.class = CLASS_STRING;
        obj.data = Some(NativeData::BoxedString("".into()));
    }
    let number_proto = interp.alloc_object(Some(object_proto));
    {
        let obj = interp.heap.get_mut(number_proto);
        obj.class = CLASS_NUMBER;
        obj.data = Some(NativeData::BoxedNumber(0.0));
    }
    let boolean_proto = interp.alloc_object(Some(object_proto));
    {
        let obj = interp.heap.get_mut(boolean_proto);
        obj.class = CLASS_BOOLEAN;
        obj.data = Some(NativeData::BoxedBoolean(false));
    }
    let date_proto = interp.alloc_object(Some(object_proto));
    let regexp_proto = interp.alloc_object(Some(object_proto));
    let mut error_protos = [object_proto; 7];
    for slot in error_protos.iter_mut() {
        *slot = interp.alloc_object(Some(object_proto));
    }
    let global = interp.alloc_object(Some(object_proto));

    interp.roots = Roots {
        global,
        object_proto,
        function_proto,
        array_proto,
        string_proto,
        number_proto,
        boolean_proto,
        date_proto,
        regexp_proto,
        error_protos,
    };
    interp.global_scope = interp.scopes.alloc(Scope {
        parent: None,
        strict: false,
        object: global,
        this: Value::Object(global),
        with_scope: false,
    });
    interp.define_raw(
        array_proto,
        "length",
        Value::Number(0.0),
        crate::core::descriptor::Attributes {
            writable: true,
            enumerable: false,
            configurable: false,
        },
    );
}

/// Builds the standard library: constructors, prototypes, native methods,
/// and the global functions. The polyfills run afterwards, from the facade.
pub(crate) fn initialize_global_constructors(interp: &mut Interpreter) {
    crate::js_object::initialize_object(interp);
    crate::js_function::initialize_function(interp);
    crate::js_array::initialize_array(interp);
    crate::js_string::initialize_string(interp);
    crate::js_number::initialize_number(interp);
    crate::js_boolean::initialize_boolean(interp);
    crate::js_error::initialize_error(interp);
    crate::js_math::initialize_math(interp);
    crate::js_json::initialize_json(interp);
    crate::js_date::initialize_date(interp);
    crate::js_regexp::initialize_regexp(interp);

    let global = interp.roots.global;
    interp.define_raw(
        global,
        "NaN",
        Value::Number(f64::NAN),
        NONCONFIGURABLE_READONLY_NONENUMERABLE,
    );
    interp.define_raw(
        global,
        "Infinity",
        Value::Number(f64::INFINITY),
        NONCONFIGURABLE_READONLY_NONENUMERABLE,
    );
    interp.define_raw(
        global,
        "undefined",
        Value::Undefined,
        NONCONFIGURABLE_READONLY_NONENUMERABLE,
    );
    interp.define_raw(global, "window", Value::Object(global), READONLY);
    interp.define_raw(
        global,
        "self",
        Value::Object(global),
        crate::core::descriptor::DEFAULT,
    );
    interp.define_raw(
        global,
        "this",
        Value::Object(global),
        NONCONFIGURABLE_READONLY_NONENUMERABLE,
    );

    for (name, builtin, len) in [
        ("parseInt", "parseInt", 2),
        ("parseFloat", "parseFloat", 1),
        ("isNaN", "isNaN", 1),
        ("isFinite", "isFinite", 1),
        ("decodeURI", "decodeURI", 1),
        ("decodeURIComponent", "decodeURIComponent", 1),
        ("encodeURI", "encodeURI", 1),
        ("encodeURIComponent", "encodeURIComponent", 1),
    ] {
        interp.install_method(global, name, builtin, len);
    }

    // the eval marker: recognized structurally by the call machinery
    let eval_fn = interp.create_builtin_function("eval", 1);
    interp.heap.get_mut(eval_fn).is_eval = true;
    interp.define_raw(global, "eval", Value::Object(eval_fn), NONENUMERABLE);
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    _this: &Value,
    args: &[Value],
    _info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        "parseInt" => (|| {
            let text = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let radix = match args.get(1) {
                None | Some(Value::Undefined) => 0,
                Some(v) => js_number::to_int32(interp.to_number_value(v)?),
            };
            Ok(Value::Number(parse_int(&text, radix)))
        })(),
        "parseFloat" => (|| {
            let text = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            Ok(Value::Number(parse_float(&text)))
        })(),
        "isNaN" => (|| {
            let n = match args.first() {
                Some(v) => interp.to_number_value(v)?,
                None => f64::NAN,
            };
            Ok(Value::Boolean(n.is_nan()))
        })(),
        "isFinite" => (|| {
            let n = match args.first() {
                Some(v) => interp.to_number_value(v)?,
                None => f64::NAN,
            };
            Ok(Value::Boolean(n.is_finite()))
        })(),
        "encodeURI" | "encodeURIComponent" => (|| {
            let text = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            Ok(Value::str(&encode_uri(&text, name == "encodeURI")))
        })(),
        "decodeURI" | "decodeURIComponent" => (|| {
            let text = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            match decode_uri(&text, name == "decodeURI") {
                Some(decoded) => Ok(Value::str(&decoded)),
                None => Err(raise_uri_error!(interp, "URI malformed")),
            }
        })(),
        _ => return None,
    })
}

/// ES5 parseInt: prefix parse with optional radix and 0x detection.
fn parse_int(text: &str, radix: i32) -> f64 {
    let t = text.trim_matches(|c: char| c.is_whitespace());
    let (sign, t) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, t.strip_prefix('+').unwrap_or(t)),
    };
    let mut radix = radix;
    let mut t = t;
    if radix == 16 || radix == 0 {
        if let Some(rest) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
            t = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in t.chars() {
        let Some(digit) = c.to_digit(36) else { break };
        if digit >= radix as u32 {
            break;
        }
        value = value * radix as f64 + digit as f64;
        any = true;
    }
    if any { sign * value } else { f64::NAN }
}

/// ES5 parseFloat: longest valid decimal prefix.
fn parse_float(text: &str) -> f64 {
    let t = text.trim_start_matches(|c: char| c.is_whitespace());
    let bytes: Vec<char> = t.chars().collect();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == '+' || bytes[i] == '-') {
        i += 1;
    }
    if t.starts_with("Infinity") || t.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if t.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() {
            seen_digit = true;
            end = i + 1;
        } else if c == '.' && !seen_dot && !seen_exp {
            seen_dot = true;
        } else if (c == 'e' || c == 'E') && seen_digit && !seen_exp {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == '+' || bytes[j] == '-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                seen_exp = true;
                i = j;
                end = i + 1;
                continue;
            }
            break;
        } else {
            break;
        }
        i += 1;
    }
    if !seen_digit {
        return f64::NAN;
    }
    let prefix: String = bytes[..end].iter().collect();
    js_number::parse_number(&prefix)
}

fn is_uri_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c)
}

const URI_RESERVED: &str = ";/?:@&=+$,#";

fn encode_uri(text: &str, keep_reserved: bool) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if is_uri_unreserved(c) || (keep_reserved && URI_RESERVED.contains(c)) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn decode_uri(text: &str, keep_reserved: bool) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut bytes = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '%' {
            let hi = chars.get(i + 1)?.to_digit(16)?;
            let lo = chars.get(i + 2)?.to_digit(16)?;
            let byte = (hi * 16 + lo) as u8;
            if keep_reserved && byte < 0x80 && URI_RESERVED.contains(byte as char) {
                // decodeURI leaves escaped reserved characters escaped
                bytes.push(b'%');
                bytes.push(chars[i + 1] as u8);
                bytes.push(chars[i + 2] as u8);
            } else {
                bytes.push(byte);
            }
            i += 3;
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(chars[i].encode_utf8(&mut buf).as_bytes());
            i += 1;
        }
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("  -10", 0), -10.0);
        assert_eq!(parse_int("0x1f", 0), 31.0);
        assert_eq!(parse_int("ff", 16), 255.0);
        assert!(parse_int("z", 0).is_nan());
    }

    #[test]
    fn parse_float_prefixes() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert!(parse_float("e3").is_nan());
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn uri_round_trip() {
        let text = "a b/ü?x=1";
        let component = encode_uri(text, false);
        assert_eq!(component, "a%20b%2F%C3%BC%3Fx%3D1");
        assert_eq!(decode_uri(&component, false).as_deref(), Some(text));
        let full = encode_uri(text, true);
        assert_eq!(full, "a%20b/%C3%BC?x=1");
    }

    #[test]
    fn decode_rejects_malformed() {
        assert!(decode_uri("%zz", false).is_none());
        assert!(decode_uri("%e0%a4", false).is_none());
    }
}
