use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::core::frame::ResumeToken;
use crate::core::statement::FunctionNode;
use crate::interp::Interpreter;
use crate::raise_range_error;
use crate::raise_type_error;

pub type JsStr = Rc<str>;

/// Index into the interpreter's object arena. Objects are never moved or
/// collected during a run, so ids stay valid for the interpreter's lifetime
/// and arbitrary property cycles are representable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectId(pub(crate) u32);

/// Index into the scope arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(pub(crate) u32);

/// An interpreted value. `PartialEq` coincides with strict equality (`===`):
/// numbers compare IEEE-wise (so `NaN != NaN`), strings by content, objects
/// by identity.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    Str(JsStr),
    Object(ObjectId),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// An in-flight interpreted throw; unwound by the evaluator, surfaced to the
/// host only if nothing catches it.
#[derive(Clone, Debug)]
pub struct Throw(pub Value);

pub const CLASS_OBJECT: &str = "Object";
pub const CLASS_FUNCTION: &str = "Function";
pub const CLASS_ARRAY: &str = "Array";
pub const CLASS_ERROR: &str = "Error";
pub const CLASS_REGEXP: &str = "RegExp";
pub const CLASS_DATE: &str = "Date";
pub const CLASS_STRING: &str = "String";
pub const CLASS_NUMBER: &str = "Number";
pub const CLASS_BOOLEAN: &str = "Boolean";
pub const CLASS_MATH: &str = "Math";
pub const CLASS_JSON: &str = "JSON";

/// Host-side backing store for boxed primitives, dates and compiled regexes.
#[derive(Clone, Debug)]
pub enum NativeData {
    BoxedBoolean(bool),
    BoxedNumber(f64),
    BoxedString(JsStr),
    /// Milliseconds since the Unix epoch; NaN marks an invalid date.
    Date(f64),
    RegExp {
        source: JsStr,
        flags: JsStr,
    },
}

pub type HostFn = dyn Fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, Throw>;
pub type AsyncHostFn = dyn Fn(&mut Interpreter, &Value, &[Value], ResumeToken);

#[derive(Clone)]
pub enum FuncKind {
    /// A function defined by interpreted source, closed over its scope.
    Ast {
        node: Rc<FunctionNode>,
        scope: ScopeId,
    },
    /// An engine-provided native, dispatched by its dotted name.
    Builtin(&'static str),
    /// A host-registered synchronous native.
    Host { id: u32, func: Rc<HostFn> },
    /// A host-registered asynchronous native; invoking it pauses the machine.
    AsyncHost { id: u32, func: Rc<AsyncHostFn> },
}

impl fmt::Debug for FuncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncKind::Ast { node, scope } => f
                .debug_struct("Ast")
                .field("name", &node.name)
                .field("scope", scope)
                .finish(),
            FuncKind::Builtin(name) => f.debug_tuple("Builtin").field(name).finish(),
            FuncKind::Host { id, .. } => f.debug_tuple("Host").field(id).finish(),
            FuncKind::AsyncHost { id, .. } => f.debug_tuple("AsyncHost").field(id).finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Property {
    pub value: Value,
    pub getter: Option<ObjectId>,
    pub setter: Option<ObjectId>,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

#[derive(Debug)]
pub struct JsObject {
    pub properties: IndexMap<String, Property>,
    pub proto: Option<ObjectId>,
    pub class: &'static str,
    pub data: Option<NativeData>,
    pub prevent_extensions: bool,
    pub illegal_constructor: bool,
    pub is_eval: bool,
    pub func: Option<FuncKind>,
}

impl JsObject {
    pub fn new(proto: Option<ObjectId>) -> JsObject {
        JsObject {
            properties: IndexMap::new(),
            proto,
            class: CLASS_OBJECT,
            data: None,
            prevent_extensions: false,
            illegal_constructor: false,
            is_eval: false,
            func: None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.func.is_some()
    }
}

#[derive(Default, Debug)]
pub struct Heap {
    objects: Vec<JsObject>,
}

impl Heap {
    pub fn alloc(&mut self, obj: JsObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(obj);
        id
    }

    pub fn get(&self, id: ObjectId) -> &JsObject {
        &self.objects[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut JsObject {
        &mut self.objects[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Result of `get_property`: either a plain value or a pending getter that
/// the evaluator must invoke through a synthesized call frame.
#[derive(Clone, Debug)]
pub enum GetOutcome {
    Value(Value),
    Getter(ObjectId),
}

/// Result of `set_property`: the write happened (or was silently dropped per
/// loose-mode rules), or a setter is pending.
#[derive(Clone, Debug)]
pub enum SetOutcome {
    Done,
    Setter(ObjectId),
}

/// Canonical array index: the exact decimal form of a u32 below 2^32-1.
pub fn array_index(name: &str) -> Option<u32> {
    let n: u32 = name.parse().ok()?;
    if n == u32::MAX {
        return None;
    }
    // reject non-canonical spellings like "01" or "+1"
    if crate::js_number::format_number(n as f64) != name {
        return None;
    }
    Some(n)
}

impl Interpreter {
    pub(crate) fn alloc_object(&mut self, proto: Option<ObjectId>) -> ObjectId {
        self.heap.alloc(JsObject::new(proto))
    }

    /// The prototype a primitive delegates to during property reads.
    fn primitive_proto(&self, value: &Value) -> Option<ObjectId> {
        match value {
            Value::Str(_) => Some(self.roots.string_proto),
            Value::Number(_) => Some(self.roots.number_proto),
            Value::Boolean(_) => Some(self.roots.boolean_proto),
            _ => None,
        }
    }

    /// Character count of a string primitive or String-boxed object.
    fn string_backing(&self, value: &Value) -> Option<JsStr> {
        match value {
            Value::Str(s) => Some(s.clone()),
            Value::Object(id) => match &self.heap.get(*id).data {
                Some(NativeData::BoxedString(s)) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn get_property(&mut self, base: &Value, name: &str) -> Result<GetOutcome, Throw> {
        if matches!(base, Value::Undefined | Value::Null) {
            return Err(raise_type_error!(
                self,
                "Cannot read property '{}' of {}",
                name,
                self.type_name(base)
            ));
        }

        if let Some(backing) = self.string_backing(base) {
            if name == "length" {
                return Ok(GetOutcome::Value(Value::Number(
                    backing.chars().count() as f64
                )));
            }
            if let Some(index) = array_index(name) {
                if let Some(c) = backing.chars().nth(index as usize) {
                    return Ok(GetOutcome::Value(Value::str(&c.to_string())));
                }
                return Ok(GetOutcome::Value(Value::Undefined));
            }
        }

        let mut current = match base {
            Value::Object(id) => Some(*id),
            other => self.primitive_proto(other),
        };
        while let Some(id) = current {
            let obj = self.heap.get(id);
            if let Some(prop) = obj.properties.get(name) {
                if let Some(getter) = prop.getter {
                    return Ok(GetOutcome::Getter(getter));
                }
                if prop.is_accessor() {
                    // setter-only property reads as undefined
                    return Ok(GetOutcome::Value(Value::Undefined));
                }
                return Ok(GetOutcome::Value(prop.value.clone()));
            }
            current = obj.proto;
        }
        Ok(GetOutcome::Value(Value::Undefined))
    }

    /// Non-reentrant read for host callers and internal helpers: a pending
    /// getter reads as `undefined` rather than being invoked.
    pub(crate) fn get_property_value(&mut self, base: &Value, name: &str) -> Result<Value, Throw> {
        match self.get_property(base, name)? {
            GetOutcome::Value(v) => Ok(v),
            GetOutcome::Getter(_) => Ok(Value::Undefined),
        }
    }

    pub(crate) fn has_property(&self, id: ObjectId, name: &str) -> bool {
        if let Some(NativeData::BoxedString(s)) = &self.heap.get(id).data {
            if name == "length" {
                return true;
            }
            if let Some(index) = array_index(name) {
                return (index as usize) < s.chars().count();
            }
        }
        let mut current = Some(id);
        while let Some(id) = current {
            let obj = self.heap.get(id);
            if obj.properties.contains_key(name) {
                return true;
            }
            current = obj.proto;
        }
        false
    }

    pub(crate) fn has_own_property(&self, id: ObjectId, name: &str) -> bool {
        self.heap.get(id).properties.contains_key(name)
    }

    pub(crate) fn set_property(
        &mut self,
        base: &Value,
        name: &str,
        value: Value,
        strict: bool,
    ) -> Result<SetOutcome, Throw> {
        let id = match base {
            Value::Undefined | Value::Null => {
                return Err(raise_type_error!(
                    self,
                    "Cannot set property '{}' of {}",
                    name,
                    self.type_name(base)
                ));
            }
            Value::Object(id) => *id,
            _ => {
                // writes to primitives evaporate in loose mode
                if strict {
                    return Err(raise_type_error!(
                        self,
                        "Cannot create property '{}' on {}",
                        name,
                        self.type_name(base)
                    ));
                }
                return Ok(SetOutcome::Done);
            }
        };

        // String-boxed character slots and length are immutable.
        if matches!(
            self.heap.get(id).data,
            Some(NativeData::BoxedString(_)) if name == "length" || array_index(name).is_some()
        ) {
            if strict {
                return Err(raise_type_error!(
                    self,
                    "Cannot assign to read only property '{}' of String",
                    name
                ));
            }
            return Ok(SetOutcome::Done);
        }

        if self.heap.get(id).class == CLASS_ARRAY {
            let length_writable = self
                .heap
                .get(id)
                .properties
                .get("length")
                .map(|p| p.writable)
                .unwrap_or(true);
            if name == "length" {
                if !length_writable {
                    if strict {
                        return Err(raise_type_error!(
                            self,
                            "Cannot assign to read only property 'length' of Array"
                        ));
                    }
                    return Ok(SetOutcome::Done);
                }
                self.set_array_length(id, &value)?;
                return Ok(SetOutcome::Done);
            }
            if let Some(index) = array_index(name) {
                // a frozen length also blocks element writes past the end
                if !length_writable && index >= self.array_length(id) {
                    if strict {
                        return Err(raise_type_error!(
                            self,
                            "Cannot add property {}, 'length' is read only",
                            index
                        ));
                    }
                    return Ok(SetOutcome::Done);
                }
                self.lift_array_length(id, index);
            }
        }

        // Walk the chain for an existing definition.
        let mut current = Some(id);
        while let Some(link) = current {
            let obj = self.heap.get(link);
            if let Some(prop) = obj.properties.get(name) {
                if let Some(setter) = prop.setter {
                    return Ok(SetOutcome::Setter(setter));
                }
                if prop.is_accessor() {
                    // getter-only property
                    if strict {
                        return Err(raise_type_error!(
                            self,
                            "Cannot set property '{}' which has only a getter",
                            name
                        ));
                    }
                    return Ok(SetOutcome::Done);
                }
                if !prop.writable {
                    if strict {
                        return Err(raise_type_error!(
                            self,
                            "Cannot assign to read only property '{}'",
                            name
                        ));
                    }
                    return Ok(SetOutcome::Done);
                }
                if link == id {
                    self.heap.get_mut(id).properties[name].value = value;
                    return Ok(SetOutcome::Done);
                }
                // writable data property on the prototype: shadow it
                break;
            }
            current = obj.proto;
        }

        // Creating a new own property.
        if self.heap.get(id).prevent_extensions && !self.heap.get(id).properties.contains_key(name)
        {
            if strict {
                return Err(raise_type_error!(
                    self,
                    "Cannot add property '{}', object is not extensible",
                    name
                ));
            }
            return Ok(SetOutcome::Done);
        }
        self.heap.get_mut(id).properties.insert(
            name.to_string(),
            Property {
                value,
                getter: None,
                setter: None,
                writable: true,
                enumerable: true,
                configurable: true,
            },
        );
        Ok(SetOutcome::Done)
    }

    /// Maintains the Array length invariant when writing `length` directly.
    /// Writability is checked by the caller.
    fn set_array_length(&mut self, id: ObjectId, value: &Value) -> Result<(), Throw> {
        let n = self.to_number_value(value)?;
        let len = crate::js_number::to_uint32(n);
        if (len as f64) != n {
            return Err(raise_range_error!(self, "Invalid array length"));
        }
        let doomed: Vec<String> = self
            .heap
            .get(id)
            .properties
            .keys()
            .filter(|k| matches!(array_index(k), Some(i) if i >= len))
            .cloned()
            .collect();
        for key in doomed {
            self.heap.get_mut(id).properties.shift_remove(&key);
        }
        match self.heap.get_mut(id).properties.get_mut("length") {
            Some(prop) => prop.value = Value::Number(len as f64),
            None => {
                self.heap.get_mut(id).properties.insert(
                    "length".to_string(),
                    Property {
                        value: Value::Number(len as f64),
                        getter: None,
                        setter: None,
                        writable: true,
                        enumerable: false,
                        configurable: false,
                    },
                );
            }
        }
        Ok(())
    }

    /// Writing index `i` lifts `length` to at least `i + 1`.
    pub(crate) fn lift_array_length(&mut self, id: ObjectId, index: u32) {
        let new_len = (index as f64) + 1.0;
        match self.heap.get_mut(id).properties.get_mut("length") {
            Some(prop) => {
                if let Value::Number(len) = prop.value {
                    if len < new_len {
                        prop.value = Value::Number(new_len);
                    }
                } else {
                    prop.value = Value::Number(new_len);
                }
            }
            None => {
                self.heap.get_mut(id).properties.insert(
                    "length".to_string(),
                    Property {
                        value: Value::Number(new_len),
                        getter: None,
                        setter: None,
                        writable: true,
                        enumerable: false,
                        configurable: false,
                    },
                );
            }
        }
    }

    pub(crate) fn array_length(&self, id: ObjectId) -> u32 {
        match self.heap.get(id).properties.get("length") {
            Some(Property {
                value: Value::Number(n),
                ..
            }) => crate::js_number::to_uint32(*n),
            _ => 0,
        }
    }

    pub(crate) fn delete_property(
        &mut self,
        id: ObjectId,
        name: &str,
        strict: bool,
    ) -> Result<bool, Throw> {
        match self.heap.get(id).properties.get(name) {
            None => Ok(true),
            Some(prop) if prop.configurable => {
                self.heap.get_mut(id).properties.shift_remove(name);
                Ok(true)
            }
            Some(_) => {
                if strict {
                    return Err(raise_type_error!(
                        self,
                        "Cannot delete property '{}'",
                        name
                    ));
                }
                Ok(false)
            }
        }
    }

    /// Installs a plain data property without any of the write checks. Used
    /// by the global initializer and literal construction.
    pub(crate) fn define_raw(
        &mut self,
        id: ObjectId,
        name: &str,
        value: Value,
        attrs: crate::core::descriptor::Attributes,
    ) {
        if self.heap.get(id).class == CLASS_ARRAY {
            if let Some(index) = array_index(name) {
                self.lift_array_length(id, index);
            }
        }
        self.heap.get_mut(id).properties.insert(
            name.to_string(),
            Property {
                value,
                getter: None,
                setter: None,
                writable: attrs.writable,
                enumerable: attrs.enumerable,
                configurable: attrs.configurable,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equality_via_partial_eq() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::str("a"), Value::str("a"));
        assert_ne!(Value::Object(ObjectId(1)), Value::Object(ObjectId(2)));
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("4294967295"), None);
        assert_eq!(array_index("x"), None);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::str("0").truthy());
        assert!(Value::Object(ObjectId(0)).truthy());
    }
}
