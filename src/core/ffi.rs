use std::rc::Rc;

use crate::core::descriptor::DEFAULT;
use crate::core::frame::ResumeToken;
use crate::core::value::{CLASS_DATE, CLASS_FUNCTION, FuncKind, NativeData, ObjectId, Throw, Value};
use crate::interp::Interpreter;

/// The host side of the bridge speaks `serde_json::Value` for the data-shaped
/// subset; dates, regexes and functions cross through dedicated constructors.
impl Interpreter {
    /// Copies a host JSON value into the interpreted heap. JSON is acyclic by
    /// construction, so no cycle tracking is needed in this direction.
    pub fn native_to_pseudo(&mut self, value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => {
                let values: Vec<Value> = items.iter().map(|v| self.native_to_pseudo(v)).collect();
                Value::Object(self.create_array_from(values))
            }
            serde_json::Value::Object(map) => {
                let proto = self.roots.object_proto;
                let id = self.alloc_object(Some(proto));
                for (key, v) in map {
                    let converted = self.native_to_pseudo(v);
                    self.define_raw(id, key, converted, DEFAULT);
                }
                Value::Object(id)
            }
        }
    }

    /// Copies an interpreted value out to host JSON. Cycles are tracked by a
    /// pair of parallel lists; a revisited object reuses its completed
    /// translation, and an object revisited *while still being translated*
    /// (a true cycle) degrades to `null`, since a JSON tree cannot share
    /// structure.
    pub fn pseudo_to_native(&mut self, value: &Value) -> serde_json::Value {
        let mut pseudo: Vec<ObjectId> = Vec::new();
        let mut native: Vec<Option<serde_json::Value>> = Vec::new();
        self.pseudo_to_native_inner(value, &mut pseudo, &mut native)
    }

    fn pseudo_to_native_inner(
        &mut self,
        value: &Value,
        pseudo: &mut Vec<ObjectId>,
        native: &mut Vec<Option<serde_json::Value>>,
    ) -> serde_json::Value {
        let id = match value {
            Value::Undefined | Value::Null => return serde_json::Value::Null,
            Value::Boolean(b) => return serde_json::Value::Bool(*b),
            Value::Number(n) => {
                return serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null);
            }
            Value::Str(s) => return serde_json::Value::String(s.to_string()),
            Value::Object(id) => *id,
        };
        if let Some(i) = pseudo.iter().position(|p| *p == id) {
            return native[i].clone().unwrap_or(serde_json::Value::Null);
        }
        match &self.heap.get(id).data {
            Some(NativeData::Date(ms)) => {
                return serde_json::Value::String(crate::js_date::date_to_iso_string(*ms));
            }
            Some(NativeData::RegExp { source, flags }) => {
                return serde_json::Value::String(format!("/{source}/{flags}"));
            }
            Some(NativeData::BoxedBoolean(b)) => return serde_json::Value::Bool(*b),
            Some(NativeData::BoxedNumber(n)) => {
                return serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null);
            }
            Some(NativeData::BoxedString(s)) => {
                return serde_json::Value::String(s.to_string());
            }
            None => {}
        }
        let slot = pseudo.len();
        pseudo.push(id);
        native.push(None);
        let out = if self.heap.get(id).class == crate::core::value::CLASS_ARRAY {
            let len = self.array_length(id);
            let mut items = Vec::with_capacity(len as usize);
            for i in 0..len {
                let element = self
                    .heap
                    .get(id)
                    .properties
                    .get(&i.to_string())
                    .map(|p| p.value.clone());
                // sparse holes stay holes, which JSON renders as null
                let item = match element {
                    Some(v) => self.pseudo_to_native_inner(&v, pseudo, native),
                    None => serde_json::Value::Null,
                };
                items.push(item);
            }
            serde_json::Value::Array(items)
        } else {
            let keys: Vec<String> = self
                .heap
                .get(id)
                .properties
                .iter()
                .filter(|(_, p)| p.enumerable && !p.is_accessor())
                .map(|(k, _)| k.clone())
                .collect();
            let mut map = serde_json::Map::new();
            for key in keys {
                let v = self
                    .heap
                    .get(id)
                    .properties
                    .get(&key)
                    .map(|p| p.value.clone())
                    .unwrap_or_default();
                // write-safe definition: serde maps have no prototype chain
                // to trip over, insertion is always a plain store
                map.insert(key, self.pseudo_to_native_inner(&v, pseudo, native));
            }
            serde_json::Value::Object(map)
        };
        native[slot] = Some(out.clone());
        out
    }

    /// Wraps a host closure as an interpreted function with a stable id.
    pub fn create_native_function<F>(&mut self, f: F) -> Value
    where
        F: Fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, Throw> + 'static,
    {
        self.native_fn_counter += 1;
        let id = self.native_fn_counter;
        let func = FuncKind::Host {
            id,
            func: Rc::new(f),
        };
        Value::Object(self.alloc_host_function(func))
    }

    /// Wraps a host closure as an asynchronous interpreted function: invoking
    /// it pauses the machine until the host trades the `ResumeToken` back in
    /// through `resume`.
    pub fn create_async_function<F>(&mut self, f: F) -> Value
    where
        F: Fn(&mut Interpreter, &Value, &[Value], ResumeToken) + 'static,
    {
        self.native_fn_counter += 1;
        let id = self.native_fn_counter;
        let func = FuncKind::AsyncHost {
            id,
            func: Rc::new(f),
        };
        Value::Object(self.alloc_host_function(func))
    }

    fn alloc_host_function(&mut self, func: FuncKind) -> ObjectId {
        let proto = self.roots.function_proto;
        let id = self.alloc_object(Some(proto));
        {
            let obj = self.heap.get_mut(id);
            obj.class = CLASS_FUNCTION;
            obj.func = Some(func);
            obj.illegal_constructor = true;
        }
        self.define_raw(
            id,
            "length",
            Value::Number(0.0),
            crate::core::descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
        self.define_raw(
            id,
            "name",
            Value::str(""),
            crate::core::descriptor::READONLY_NONENUMERABLE,
        );
        id
    }

    /// Builds an interpreted Date from epoch milliseconds.
    pub fn create_date(&mut self, millis: f64) -> Value {
        let proto = self.roots.date_proto;
        let id = self.alloc_object(Some(proto));
        let obj = self.heap.get_mut(id);
        obj.class = CLASS_DATE;
        obj.data = Some(NativeData::Date(millis));
        Value::Object(id)
    }

    /// Epoch milliseconds of an interpreted Date, if the value is one.
    pub fn date_value(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Object(id) => match self.heap.get(*id).data {
                Some(NativeData::Date(ms)) => Some(ms),
                _ => None,
            },
            _ => None,
        }
    }

    /// Builds an interpreted RegExp; the pattern is validated eagerly.
    pub fn create_regexp(&mut self, source: &str, flags: &str) -> Result<Value, Throw> {
        let id = self.create_regexp_object(source, flags)?;
        Ok(Value::Object(id))
    }

    /// (source, flags, lastIndex) of an interpreted RegExp.
    pub fn regexp_value(&self, value: &Value) -> Option<(String, String, f64)> {
        let id = value.as_object()?;
        match &self.heap.get(id).data {
            Some(NativeData::RegExp { source, flags }) => {
                let last_index = match self.heap.get(id).properties.get("lastIndex") {
                    Some(prop) => match prop.value {
                        Value::Number(n) => n,
                        _ => 0.0,
                    },
                    None => 0.0,
                };
                Some((source.to_string(), flags.to_string(), last_index))
            }
            _ => None,
        }
    }
}
