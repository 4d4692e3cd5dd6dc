use crate::core::descriptor::PropertyDescriptor;
use crate::core::eval::NativeInfo;
use crate::core::value::{NativeData, ObjectId, Throw, Value, array_index};
use crate::interp::Interpreter;
use crate::raise_type_error;

pub(crate) fn initialize_object(interp: &mut Interpreter) {
    let proto = interp.roots.object_proto;
    let ctor = interp.install_constructor("Object", proto, 1);
    for (name, builtin, len) in [
        ("getPrototypeOf", "Object.getPrototypeOf", 1),
        ("create", "Object.create", 2),
        ("defineProperty", "Object.defineProperty", 3),
        ("defineProperties", "Object.defineProperties", 2),
        (
            "getOwnPropertyDescriptor",
            "Object.getOwnPropertyDescriptor",
            2,
        ),
        ("getOwnPropertyNames", "Object.getOwnPropertyNames", 1),
        ("keys", "Object.keys", 1),
        ("preventExtensions", "Object.preventExtensions", 1),
        ("isExtensible", "Object.isExtensible", 1),
    ] {
        interp.install_method(ctor, name, builtin, len);
    }
    for (name, builtin, len) in [
        ("toString", "Object.prototype.toString", 0),
        ("toLocaleString", "Object.prototype.toLocaleString", 0),
        ("valueOf", "Object.prototype.valueOf", 0),
        ("hasOwnProperty", "Object.prototype.hasOwnProperty", 1),
        (
            "propertyIsEnumerable",
            "Object.prototype.propertyIsEnumerable",
            1,
        ),
        ("isPrototypeOf", "Object.prototype.isPrototypeOf", 1),
    ] {
        interp.install_method(proto, name, builtin, len);
    }
}

fn expect_object(interp: &mut Interpreter, value: Option<&Value>, who: &str) -> Result<ObjectId, Throw> {
    match value {
        Some(Value::Object(id)) => Ok(*id),
        other => {
            let shown = match other {
                Some(v) => interp.type_name(v),
                None => "undefined",
            };
            Err(raise_type_error!(interp, "{} called on non-object {}", who, shown))
        }
    }
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    this: &Value,
    args: &[Value],
    info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        "Object" => (|| {
            match args.first() {
                None | Some(Value::Undefined) | Some(Value::Null) => {
                    if let (true, Some(id)) = (info.construct, info.new_object) {
                        Ok(Value::Object(id))
                    } else {
                        let proto = interp.roots.object_proto;
                        Ok(Value::Object(interp.alloc_object(Some(proto))))
                    }
                }
                Some(value) => {
                    let id = interp.to_object(value)?;
                    Ok(Value::Object(id))
                }
            }
        })(),
        "Object.getPrototypeOf" => (|| {
            let id = expect_object(interp, args.first(), "Object.getPrototypeOf")?;
            Ok(match interp.heap.get(id).proto {
                Some(proto) => Value::Object(proto),
                None => Value::Null,
            })
        })(),
        "Object.create" => (|| {
            let proto = match args.first() {
                Some(Value::Object(id)) => Some(*id),
                Some(Value::Null) => None,
                _ => {
                    return Err(raise_type_error!(
                        interp,
                        "Object prototype may only be an Object or null"
                    ));
                }
            };
            let id = interp.alloc_object(proto);
            if let Some(props) = args.get(1) {
                if !matches!(props, Value::Undefined) {
                    define_properties_from(interp, id, props)?;
                }
            }
            Ok(Value::Object(id))
        })(),
        "Object.defineProperty" => (|| {
            let id = expect_object(interp, args.first(), "Object.defineProperty")?;
            let key = match args.get(1) {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let desc_value = args.get(2).cloned().unwrap_or_default();
            let desc = interp.descriptor_from_object(&desc_value)?;
            interp.define_property(id, &key, &desc)?;
            Ok(Value::Object(id))
        })(),
        "Object.defineProperties" => (|| {
            let id = expect_object(interp, args.first(), "Object.defineProperties")?;
            let props = args.get(1).cloned().unwrap_or_default();
            define_properties_from(interp, id, &props)?;
            Ok(Value::Object(id))
        })(),
        "Object.getOwnPropertyDescriptor" => (|| {
            let id = expect_object(interp, args.first(), "Object.getOwnPropertyDescriptor")?;
            let key = match args.get(1) {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            match interp.heap.get(id).properties.get(&key).cloned() {
                Some(prop) => Ok(Value::Object(interp.descriptor_to_object(&prop))),
                None => Ok(Value::Undefined),
            }
        })(),
        "Object.getOwnPropertyNames" => (|| {
            let id = expect_object(interp, args.first(), "Object.getOwnPropertyNames")?;
            let keys: Vec<Value> = interp.own_keys(id).iter().map(|k| Value::str(k)).collect();
            Ok(Value::Object(interp.create_array_from(keys)))
        })(),
        "Object.keys" => (|| {
            let id = expect_object(interp, args.first(), "Object.keys")?;
            let keys: Vec<Value> = interp
                .heap
                .get(id)
                .properties
                .iter()
                .filter(|(_, p)| p.enumerable)
                .map(|(k, _)| Value::str(k))
                .collect();
            Ok(Value::Object(interp.create_array_from(keys)))
        })(),
        "Object.preventExtensions" => (|| {
            if let Some(Value::Object(id)) = args.first() {
                interp.heap.get_mut(*id).prevent_extensions = true;
            }
            Ok(args.first().cloned().unwrap_or_default())
        })(),
        "Object.isExtensible" => (|| {
            Ok(Value::Boolean(match args.first() {
                Some(Value::Object(id)) => !interp.heap.get(*id).prevent_extensions,
                _ => false,
            }))
        })(),
        "Object.prototype.toString" => (|| {
            let class = match this {
                Value::Undefined => "Undefined",
                Value::Null => "Null",
                Value::Boolean(_) => "Boolean",
                Value::Number(_) => "Number",
                Value::Str(_) => "String",
                Value::Object(id) => interp.heap.get(*id).class,
            };
            Ok(Value::str(&format!("[object {class}]")))
        })(),
        "Object.prototype.toLocaleString" => {
            interp.to_string_value(this).map(|s| Value::str(&s))
        }
        "Object.prototype.valueOf" => (|| {
            // boxed primitives unwrap; everything else is identity
            if let Value::Object(id) = this {
                match &interp.heap.get(*id).data {
                    Some(NativeData::BoxedBoolean(b)) => return Ok(Value::Boolean(*b)),
                    Some(NativeData::BoxedNumber(n)) => return Ok(Value::Number(*n)),
                    Some(NativeData::BoxedString(s)) => return Ok(Value::Str(s.clone())),
                    _ => {}
                }
            }
            Ok(this.clone())
        })(),
        "Object.prototype.hasOwnProperty" => (|| {
            let key = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            Ok(Value::Boolean(match this {
                Value::Str(s) => {
                    key == "length"
                        || matches!(array_index(&key), Some(i) if (i as usize) < s.chars().count())
                }
                Value::Object(id) => {
                    interp.has_own_property(*id, &key)
                        || matches!(
                            (&interp.heap.get(*id).data, array_index(&key)),
                            (Some(NativeData::BoxedString(s)), Some(i))
                                if (i as usize) < s.chars().count()
                        )
                }
                _ => false,
            }))
        })(),
        "Object.prototype.propertyIsEnumerable" => (|| {
            let key = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            Ok(Value::Boolean(match this {
                Value::Object(id) => interp
                    .heap
                    .get(*id)
                    .properties
                    .get(&key)
                    .map(|p| p.enumerable)
                    .unwrap_or(false),
                _ => false,
            }))
        })(),
        "Object.prototype.isPrototypeOf" => (|| {
            let Value::Object(target) = this else {
                return Ok(Value::Boolean(false));
            };
            let Some(Value::Object(mut walk)) = args.first().cloned() else {
                return Ok(Value::Boolean(false));
            };
            while let Some(parent) = interp.heap.get(walk).proto {
                if parent == *target {
                    return Ok(Value::Boolean(true));
                }
                walk = parent;
            }
            Ok(Value::Boolean(false))
        })(),
        _ => return None,
    })
}

/// Shared by `Object.create` and `Object.defineProperties`.
fn define_properties_from(
    interp: &mut Interpreter,
    target: ObjectId,
    props: &Value,
) -> Result<(), Throw> {
    let Value::Object(source) = props else {
        return Err(raise_type_error!(
            interp,
            "Property descriptor list must be an object"
        ));
    };
    let keys: Vec<String> = interp
        .heap
        .get(*source)
        .properties
        .iter()
        .filter(|(_, p)| p.enumerable)
        .map(|(k, _)| k.clone())
        .collect();
    let mut parsed: Vec<(String, PropertyDescriptor)> = Vec::with_capacity(keys.len());
    for key in keys {
        let desc_value = interp.get_property_value(props, &key)?;
        parsed.push((key.clone(), interp.descriptor_from_object(&desc_value)?));
    }
    for (key, desc) in parsed {
        interp.define_property(target, &key, &desc)?;
    }
    Ok(())
}
