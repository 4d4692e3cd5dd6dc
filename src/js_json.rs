use crate::core::eval::NativeInfo;
use crate::core::value::{
    CLASS_ARRAY, CLASS_JSON, NativeData, ObjectId, Throw, Value,
};
use crate::interp::Interpreter;
use crate::js_number::to_integer;
use crate::{raise_syntax_error, raise_type_error};

pub(crate) fn initialize_json(interp: &mut Interpreter) {
    let proto = interp.roots.object_proto;
    let json = interp.alloc_object(Some(proto));
    interp.heap.get_mut(json).class = CLASS_JSON;
    interp.install_method(json, "parse", "JSON.parse", 2);
    interp.install_method(json, "stringify", "JSON.stringify", 3);
    let global = interp.roots.global;
    interp.define_raw(
        global,
        "JSON",
        Value::Object(json),
        crate::core::descriptor::NONENUMERABLE,
    );
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    _this: &Value,
    args: &[Value],
    _info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        "JSON.parse" => (|| {
            let text = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let parsed: serde_json::Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    return Err(raise_syntax_error!(interp, "Unexpected token in JSON: {}", e));
                }
            };
            Ok(interp.native_to_pseudo(&parsed))
        })(),
        "JSON.stringify" => (|| {
            let value = args.first().cloned().unwrap_or_default();
            let indent = match args.get(2) {
                Some(Value::Number(n)) => {
                    let n = to_integer(*n).clamp(0.0, 10.0) as usize;
                    if n == 0 { None } else { Some(" ".repeat(n)) }
                }
                Some(Value::Str(s)) => {
                    let cut: String = s.chars().take(10).collect();
                    if cut.is_empty() { None } else { Some(cut) }
                }
                _ => None,
            };
            let mut seen = Vec::new();
            match jsonify(interp, &value, &mut seen)? {
                Some(tree) => {
                    let mut out = String::new();
                    write_json(&tree, indent.as_deref(), 0, &mut out);
                    Ok(Value::str(&out))
                }
                None => Ok(Value::Undefined),
            }
        })(),
        _ => return None,
    })
}

/// The value-to-tree half of stringify: enumerable data properties only,
/// functions and undefined omitted, dates via their ISO form, cycles are a
/// TypeError.
fn jsonify(
    interp: &mut Interpreter,
    value: &Value,
    seen: &mut Vec<ObjectId>,
) -> Result<Option<serde_json::Value>, Throw> {
    Ok(match value {
        Value::Undefined => None,
        Value::Null => Some(serde_json::Value::Null),
        Value::Boolean(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => Some(
            serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        ),
        Value::Str(s) => Some(serde_json::Value::String(s.to_string())),
        Value::Object(id) => {
            let id = *id;
            if interp.heap.get(id).is_callable() {
                return Ok(None);
            }
            match &interp.heap.get(id).data {
                Some(NativeData::Date(ms)) => {
                    return Ok(Some(serde_json::Value::String(
                        crate::js_date::date_to_iso_string(*ms),
                    )));
                }
                Some(NativeData::BoxedBoolean(b)) => {
                    return Ok(Some(serde_json::Value::Bool(*b)));
                }
                Some(NativeData::BoxedNumber(n)) => {
                    return Ok(Some(
                        serde_json::Number::from_f64(*n)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null),
                    ));
                }
                Some(NativeData::BoxedString(s)) => {
                    return Ok(Some(serde_json::Value::String(s.to_string())));
                }
                Some(NativeData::RegExp { .. }) => {
                    // a RegExp has no enumerable own properties: {}
                    return Ok(Some(serde_json::Value::Object(serde_json::Map::new())));
                }
                None => {}
            }
            if seen.contains(&id) {
                return Err(raise_type_error!(
                    interp,
                    "Converting circular structure to JSON"
                ));
            }
            seen.push(id);
            let result = if interp.heap.get(id).class == CLASS_ARRAY {
                let len = interp.array_length(id);
                let mut items = Vec::with_capacity(len as usize);
                for i in 0..len {
                    let element = interp
                        .get_property_value(&Value::Object(id), &i.to_string())
                        .unwrap_or_default();
                    // inside arrays, unserializable entries become null
                    items.push(
                        jsonify(interp, &element, seen)?.unwrap_or(serde_json::Value::Null),
                    );
                }
                serde_json::Value::Array(items)
            } else {
                let keys: Vec<String> = interp
                    .heap
                    .get(id)
                    .properties
                    .iter()
                    .filter(|(_, p)| p.enumerable)
                    .map(|(k, _)| k.clone())
                    .collect();
                let mut map = serde_json::Map::new();
                for key in keys {
                    let v = interp.get_property_value(&Value::Object(id), &key)?;
                    if let Some(converted) = jsonify(interp, &v, seen)? {
                        map.insert(key, converted);
                    }
                }
                serde_json::Value::Object(map)
            };
            seen.pop();
            Some(result)
        }
    })
}

/// Serializer over the finished tree. serde_json's own writer is bypassed so
/// the indent string can be arbitrary, as JSON.stringify allows.
fn write_json(value: &serde_json::Value, indent: Option<&str>, depth: usize, out: &mut String) {
    match value {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => {
            out.push_str(&crate::js_number::format_number(n.as_f64().unwrap_or(0.0)));
        }
        serde_json::Value::String(s) => {
            out.push_str(&serde_json::Value::String(s.clone()).to_string());
        }
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                newline_indent(indent, depth + 1, out);
                write_json(item, indent, depth + 1, out);
            }
            newline_indent(indent, depth, out);
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                newline_indent(indent, depth + 1, out);
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                if indent.is_some() {
                    out.push(' ');
                }
                write_json(item, indent, depth + 1, out);
            }
            newline_indent(indent, depth, out);
            out.push('}');
        }
    }
}

fn newline_indent(indent: Option<&str>, depth: usize, out: &mut String) {
    if let Some(indent) = indent {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(indent);
        }
    }
}
