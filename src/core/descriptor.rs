use crate::core::value::{CLASS_ARRAY, ObjectId, Property, Throw, Value, array_index};
use crate::interp::Interpreter;
use crate::raise_type_error;

/// Attribute triple for data properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attributes {
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

/// Declared variables: enumerable and writable, but not configurable.
pub const VARIABLE: Attributes = Attributes {
    writable: true,
    enumerable: true,
    configurable: false,
};

pub const READONLY: Attributes = Attributes {
    writable: false,
    enumerable: true,
    configurable: true,
};

pub const NONENUMERABLE: Attributes = Attributes {
    writable: true,
    enumerable: false,
    configurable: true,
};

pub const READONLY_NONENUMERABLE: Attributes = Attributes {
    writable: false,
    enumerable: false,
    configurable: true,
};

pub const NONCONFIGURABLE_READONLY_NONENUMERABLE: Attributes = Attributes {
    writable: false,
    enumerable: false,
    configurable: false,
};

/// Ordinary properties created by assignment.
pub const DEFAULT: Attributes = Attributes {
    writable: true,
    enumerable: true,
    configurable: true,
};

/// A partial descriptor, as accepted by `Object.defineProperty`. Absent
/// fields are left untouched on redefinition and default to `false` /
/// `undefined` on fresh definition.
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Value>,
    pub set: Option<Value>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: Value, attrs: Attributes) -> PropertyDescriptor {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(attrs.writable),
            get: None,
            set: None,
            enumerable: Some(attrs.enumerable),
            configurable: Some(attrs.configurable),
        }
    }

    fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

impl Interpreter {
    /// Reads a descriptor object (`{value: .., get: .., ..}`) into a partial
    /// descriptor. Pending getters on the descriptor object itself read as
    /// `undefined`; this mirrors the host-facing non-reentrant read.
    pub(crate) fn descriptor_from_object(
        &mut self,
        obj: &Value,
    ) -> Result<PropertyDescriptor, Throw> {
        let id = match obj {
            Value::Object(id) => *id,
            _ => {
                return Err(raise_type_error!(self, "Property description must be an object"));
            }
        };
        let mut desc = PropertyDescriptor::default();
        for (field, target) in [("value", 0), ("get", 1), ("set", 2)] {
            if self.has_property(id, field) {
                let v = self.get_property_value(obj, field)?;
                match target {
                    0 => desc.value = Some(v),
                    1 => desc.get = Some(v),
                    _ => desc.set = Some(v),
                }
            }
        }
        for (field, target) in [("writable", 0), ("enumerable", 1), ("configurable", 2)] {
            if self.has_property(id, field) {
                let v = self.get_property_value(obj, field)?.truthy();
                match target {
                    0 => desc.writable = Some(v),
                    1 => desc.enumerable = Some(v),
                    _ => desc.configurable = Some(v),
                }
            }
        }
        for accessor in [&desc.get, &desc.set] {
            if let Some(v) = accessor {
                let callable = match v {
                    Value::Undefined => true,
                    Value::Object(id) => self.heap.get(*id).is_callable(),
                    _ => false,
                };
                if !callable {
                    return Err(raise_type_error!(self, "Getter/setter must be callable"));
                }
            }
        }
        Ok(desc)
    }

    /// Builds a plain descriptor object for `Object.getOwnPropertyDescriptor`.
    pub(crate) fn descriptor_to_object(&mut self, prop: &Property) -> ObjectId {
        let proto = self.roots.object_proto;
        let id = self.alloc_object(Some(proto));
        if prop.is_accessor() {
            let get = prop.getter.map(Value::Object).unwrap_or(Value::Undefined);
            let set = prop.setter.map(Value::Object).unwrap_or(Value::Undefined);
            self.define_raw(id, "get", get, DEFAULT);
            self.define_raw(id, "set", set, DEFAULT);
        } else {
            self.define_raw(id, "value", prop.value.clone(), DEFAULT);
            self.define_raw(id, "writable", Value::Boolean(prop.writable), DEFAULT);
        }
        self.define_raw(id, "enumerable", Value::Boolean(prop.enumerable), DEFAULT);
        self.define_raw(id, "configurable", Value::Boolean(prop.configurable), DEFAULT);
        id
    }

    /// ES5 DefineOwnProperty, trimmed to the cases this engine can express.
    pub(crate) fn define_property(
        &mut self,
        id: ObjectId,
        name: &str,
        desc: &PropertyDescriptor,
    ) -> Result<(), Throw> {
        if desc.is_accessor() && desc.is_data() {
            return Err(raise_type_error!(
                self,
                "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute"
            ));
        }

        if self.heap.get(id).class == CLASS_ARRAY {
            if name == "length" {
                if let Some(value) = &desc.value {
                    let value = value.clone();
                    return self.set_array_length_checked(id, &value);
                }
            } else if let Some(index) = array_index(name) {
                self.lift_array_length(id, index);
            }
        }

        let existing = self.heap.get(id).properties.get(name).cloned();
        match existing {
            None => {
                if self.heap.get(id).prevent_extensions {
                    return Err(raise_type_error!(
                        self,
                        "Cannot define property '{}', object is not extensible",
                        name
                    ));
                }
                let prop = Property {
                    value: desc.value.clone().unwrap_or_default(),
                    getter: accessor_id(desc.get.as_ref()),
                    setter: accessor_id(desc.set.as_ref()),
                    writable: desc.writable.unwrap_or(false),
                    enumerable: desc.enumerable.unwrap_or(false),
                    configurable: desc.configurable.unwrap_or(false),
                };
                self.heap.get_mut(id).properties.insert(name.to_string(), prop);
            }
            Some(mut prop) => {
                if !prop.configurable {
                    let illegal = desc.configurable == Some(true)
                        || matches!(desc.enumerable, Some(e) if e != prop.enumerable)
                        || (desc.is_accessor() && !prop.is_accessor())
                        || (desc.is_data() && prop.is_accessor())
                        || (!prop.is_accessor()
                            && !prop.writable
                            && (desc.writable == Some(true)
                                || matches!(&desc.value, Some(v) if *v != prop.value)));
                    if illegal {
                        return Err(raise_type_error!(
                            self,
                            "Cannot redefine property: {}",
                            name
                        ));
                    }
                }
                if desc.is_accessor() {
                    if let Some(get) = &desc.get {
                        prop.getter = accessor_id(Some(get));
                    }
                    if let Some(set) = &desc.set {
                        prop.setter = accessor_id(Some(set));
                    }
                    prop.value = Value::Undefined;
                } else {
                    if let Some(value) = &desc.value {
                        prop.value = value.clone();
                        prop.getter = None;
                        prop.setter = None;
                    }
                    if let Some(writable) = desc.writable {
                        prop.writable = writable;
                    }
                }
                if let Some(enumerable) = desc.enumerable {
                    prop.enumerable = enumerable;
                }
                if let Some(configurable) = desc.configurable {
                    prop.configurable = configurable;
                }
                self.heap.get_mut(id).properties.insert(name.to_string(), prop);
            }
        }
        Ok(())
    }

    fn set_array_length_checked(&mut self, id: ObjectId, value: &Value) -> Result<(), Throw> {
        // delegate to the ordinary length-write path (RangeError on non-index)
        self.set_property(&Value::Object(id), "length", value.clone(), true)?;
        Ok(())
    }
}

fn accessor_id(value: Option<&Value>) -> Option<ObjectId> {
    match value {
        Some(Value::Object(id)) => Some(*id),
        _ => None,
    }
}
