use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_ARRAY, ObjectId, Throw, Value};
use crate::interp::Interpreter;
use crate::js_number::{to_integer, to_uint32};
use crate::{raise_range_error, raise_type_error};

pub(crate) fn initialize_array(interp: &mut Interpreter) {
    let proto = interp.roots.array_proto;
    let ctor = interp.install_constructor("Array", proto, 1);
    interp.install_method(ctor, "isArray", "Array.isArray", 1);
    for (name, builtin, len) in [
        ("pop", "Array.prototype.pop", 0),
        ("push", "Array.prototype.push", 1),
        ("shift", "Array.prototype.shift", 0),
        ("unshift", "Array.prototype.unshift", 1),
        ("reverse", "Array.prototype.reverse", 0),
        ("splice", "Array.prototype.splice", 2),
        ("slice", "Array.prototype.slice", 2),
        ("concat", "Array.prototype.concat", 1),
        ("join", "Array.prototype.join", 1),
        ("toString", "Array.prototype.toString", 0),
    ] {
        interp.install_method(proto, name, builtin, len);
    }
}

fn this_object(interp: &mut Interpreter, this: &Value, who: &str) -> Result<ObjectId, Throw> {
    match this {
        Value::Object(id) => Ok(*id),
        other => {
            let shown = interp.type_name(other);
            Err(raise_type_error!(interp, "{} called on {}", who, shown))
        }
    }
}

fn length_of(interp: &Interpreter, id: ObjectId) -> u32 {
    interp.array_length(id)
}

fn get_element(interp: &mut Interpreter, id: ObjectId, index: u32) -> Value {
    interp
        .get_property_value(&Value::Object(id), &index.to_string())
        .unwrap_or_default()
}

fn has_element(interp: &Interpreter, id: ObjectId, index: u32) -> bool {
    interp.has_own_property(id, &index.to_string())
}

fn set_element(interp: &mut Interpreter, id: ObjectId, index: u32, value: Value) {
    interp.define_raw(id, &index.to_string(), value, crate::core::descriptor::DEFAULT);
}

fn delete_element(interp: &mut Interpreter, id: ObjectId, index: u32) {
    interp
        .heap
        .get_mut(id)
        .properties
        .shift_remove(&index.to_string());
}

/// Writes `length` directly; shrinking deletes the stale indices.
fn set_length(interp: &mut Interpreter, id: ObjectId, len: u32) -> Result<(), Throw> {
    interp
        .set_property(&Value::Object(id), "length", Value::Number(len as f64), false)
        .map(|_| ())
}

/// join, shared with toString. The cycle list keeps a self-referential
/// array from recursing while its elements stringify.
fn join_impl(interp: &mut Interpreter, id: ObjectId, separator: &str) -> Result<Value, Throw> {
    if interp.string_cycles.contains(&id) {
        return Ok(Value::str(""));
    }
    interp.string_cycles.push(id);
    let len = length_of(interp, id);
    let mut parts = Vec::with_capacity(len as usize);
    let mut failure = None;
    for i in 0..len {
        let element = get_element(interp, id, i);
        match element {
            Value::Undefined | Value::Null => parts.push(String::new()),
            other => match interp.to_string_value(&other) {
                Ok(text) => parts.push(text),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            },
        }
    }
    interp.string_cycles.pop();
    match failure {
        Some(e) => Err(e),
        None => Ok(Value::str(&parts.join(separator))),
    }
}

/// Normalizes a relative start/end argument against a length.
fn clamp_index(raw: f64, len: u32) -> u32 {
    if raw < 0.0 {
        let adjusted = len as f64 + raw;
        if adjusted < 0.0 { 0 } else { adjusted as u32 }
    } else if raw > len as f64 {
        len
    } else {
        raw as u32
    }
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    this: &Value,
    args: &[Value],
    _info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        "Array" => (|| {
            let id = interp.create_array();
            if args.len() == 1 {
                if let Value::Number(n) = &args[0] {
                    let len = to_uint32(*n);
                    if (len as f64) != *n {
                        return Err(raise_range_error!(interp, "Invalid array length"));
                    }
                    set_length(interp, id, len)?;
                    return Ok(Value::Object(id));
                }
            }
            for (i, arg) in args.iter().enumerate() {
                set_element(interp, id, i as u32, arg.clone());
            }
            Ok(Value::Object(id))
        })(),
        "Array.isArray" => Ok(Value::Boolean(matches!(
            args.first(),
            Some(Value::Object(id)) if interp.heap.get(*id).class == CLASS_ARRAY
        ))),
        "Array.prototype.push" => (|| {
            let id = this_object(interp, this, "Array.prototype.push")?;
            let mut len = length_of(interp, id);
            for arg in args {
                set_element(interp, id, len, arg.clone());
                len += 1;
            }
            set_length(interp, id, len)?;
            Ok(Value::Number(len as f64))
        })(),
        "Array.prototype.pop" => (|| {
            let id = this_object(interp, this, "Array.prototype.pop")?;
            let len = length_of(interp, id);
            if len == 0 {
                set_length(interp, id, 0)?;
                return Ok(Value::Undefined);
            }
            let value = get_element(interp, id, len - 1);
            delete_element(interp, id, len - 1);
            set_length(interp, id, len - 1)?;
            Ok(value)
        })(),
        "Array.prototype.shift" => (|| {
            let id = this_object(interp, this, "Array.prototype.shift")?;
            let len = length_of(interp, id);
            if len == 0 {
                set_length(interp, id, 0)?;
                return Ok(Value::Undefined);
            }
            let first = get_element(interp, id, 0);
            for i in 1..len {
                if has_element(interp, id, i) {
                    let v = get_element(interp, id, i);
                    set_element(interp, id, i - 1, v);
                } else {
                    delete_element(interp, id, i - 1);
                }
            }
            delete_element(interp, id, len - 1);
            set_length(interp, id, len - 1)?;
            Ok(first)
        })(),
        "Array.prototype.unshift" => (|| {
            let id = this_object(interp, this, "Array.prototype.unshift")?;
            let len = length_of(interp, id);
            let count = args.len() as u32;
            for i in (0..len).rev() {
                if has_element(interp, id, i) {
                    let v = get_element(interp, id, i);
                    set_element(interp, id, i + count, v);
                } else {
                    delete_element(interp, id, i + count);
                }
            }
            for (i, arg) in args.iter().enumerate() {
                set_element(interp, id, i as u32, arg.clone());
            }
            set_length(interp, id, len + count)?;
            Ok(Value::Number((len + count) as f64))
        })(),
        "Array.prototype.reverse" => (|| {
            let id = this_object(interp, this, "Array.prototype.reverse")?;
            let len = length_of(interp, id);
            let mut lo = 0u32;
            while 2 * lo + 1 < len {
                let hi = len - 1 - lo;
                let lo_has = has_element(interp, id, lo);
                let hi_has = has_element(interp, id, hi);
                let lo_val = get_element(interp, id, lo);
                let hi_val = get_element(interp, id, hi);
                if hi_has {
                    set_element(interp, id, lo, hi_val);
                } else {
                    delete_element(interp, id, lo);
                }
                if lo_has {
                    set_element(interp, id, hi, lo_val);
                } else {
                    delete_element(interp, id, hi);
                }
                lo += 1;
            }
            Ok(Value::Object(id))
        })(),
        "Array.prototype.splice" => (|| {
            let id = this_object(interp, this, "Array.prototype.splice")?;
            let len = length_of(interp, id);
            let start = match args.first() {
                Some(v) => clamp_index(to_integer(interp.to_number_value(v)?), len),
                None => 0,
            };
            let delete_count = match args.get(1) {
                Some(v) => {
                    let n = to_integer(interp.to_number_value(v)?);
                    (n.max(0.0) as u32).min(len - start)
                }
                None => len - start,
            };
            let items: Vec<Value> = args.iter().skip(2).cloned().collect();
            let removed = interp.create_array();
            for i in 0..delete_count {
                if has_element(interp, id, start + i) {
                    let v = get_element(interp, id, start + i);
                    set_element(interp, removed, i, v);
                }
            }
            set_length(interp, removed, delete_count)?;
            let insert = items.len() as u32;
            let tail = len - start - delete_count;
            if insert < delete_count {
                for i in 0..tail {
                    let from = start + delete_count + i;
                    if has_element(interp, id, from) {
                        let v = get_element(interp, id, from);
                        set_element(interp, id, start + insert + i, v);
                    } else {
                        delete_element(interp, id, start + insert + i);
                    }
                }
            } else if insert > delete_count {
                for i in (0..tail).rev() {
                    let from = start + delete_count + i;
                    if has_element(interp, id, from) {
                        let v = get_element(interp, id, from);
                        set_element(interp, id, start + insert + i, v);
                    } else {
                        delete_element(interp, id, start + insert + i);
                    }
                }
            }
            for (i, item) in items.into_iter().enumerate() {
                set_element(interp, id, start + i as u32, item);
            }
            set_length(interp, id, len - delete_count + insert)?;
            Ok(Value::Object(removed))
        })(),
        "Array.prototype.slice" => (|| {
            let id = this_object(interp, this, "Array.prototype.slice")?;
            let len = length_of(interp, id);
            let begin = match args.first() {
                None | Some(Value::Undefined) => 0,
                Some(v) => clamp_index(to_integer(interp.to_number_value(v)?), len),
            };
            let end = match args.get(1) {
                None | Some(Value::Undefined) => len,
                Some(v) => clamp_index(to_integer(interp.to_number_value(v)?), len),
            };
            let out = interp.create_array();
            let mut n = 0u32;
            let mut i = begin;
            while i < end {
                if has_element(interp, id, i) {
                    let v = get_element(interp, id, i);
                    set_element(interp, out, n, v);
                }
                n += 1;
                i += 1;
            }
            set_length(interp, out, n)?;
            Ok(Value::Object(out))
        })(),
        "Array.prototype.concat" => (|| {
            let id = this_object(interp, this, "Array.prototype.concat")?;
            let out = interp.create_array();
            let mut n = 0u32;
            let mut append = |interp: &mut Interpreter, n: &mut u32, value: &Value| {
                match value {
                    Value::Object(src) if interp.heap.get(*src).class == CLASS_ARRAY => {
                        let len = length_of(interp, *src);
                        for i in 0..len {
                            if has_element(interp, *src, i) {
                                let v = get_element(interp, *src, i);
                                set_element(interp, out, *n, v);
                            }
                            *n += 1;
                        }
                    }
                    other => {
                        set_element(interp, out, *n, other.clone());
                        *n += 1;
                    }
                }
            };
            append(interp, &mut n, &Value::Object(id));
            for arg in args {
                append(interp, &mut n, arg);
            }
            set_length(interp, out, n)?;
            Ok(Value::Object(out))
        })(),
        "Array.prototype.join" => (|| {
            let id = this_object(interp, this, "Array.prototype.join")?;
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(v) => interp.to_string_value(v)?,
            };
            join_impl(interp, id, &separator)
        })(),
        "Array.prototype.toString" => (|| {
            let id = this_object(interp, this, "Array.prototype.toString")?;
            join_impl(interp, id, ",")
        })(),
        _ => return None,
    })
}
