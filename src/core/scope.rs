use crate::core::value::{GetOutcome, ObjectId, ScopeId, SetOutcome, Throw, Value};
use crate::interp::Interpreter;
use crate::raise_reference_error;

/// One link of the scope chain. The variables live as properties of
/// `object` (a prototype-less interpreted object), so host code can inspect
/// and seed them with the same machinery it uses for ordinary objects.
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub strict: bool,
    pub object: ObjectId,
    pub this: Value,
    /// A `with` scope delegates lookups to its object (prototype chain
    /// included) but is skipped by declarations.
    pub with_scope: bool,
}

#[derive(Default, Debug)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn alloc(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }
}

impl Interpreter {
    pub(crate) fn new_scope(
        &mut self,
        parent: Option<ScopeId>,
        this: Value,
        strict: bool,
    ) -> ScopeId {
        let object = self.alloc_object(None);
        self.scopes.alloc(Scope {
            parent,
            strict,
            object,
            this,
            with_scope: false,
        })
    }

    pub(crate) fn new_with_scope(&mut self, parent: ScopeId, object: ObjectId) -> ScopeId {
        let parent_scope = self.scopes.get(parent);
        let this = parent_scope.this.clone();
        let strict = parent_scope.strict;
        self.scopes.alloc(Scope {
            parent: Some(parent),
            strict,
            object,
            this,
            with_scope: true,
        })
    }

    pub(crate) fn scope_strict(&self, scope: ScopeId) -> bool {
        self.scopes.get(scope).strict
    }

    pub(crate) fn scope_this(&self, scope: ScopeId) -> Value {
        self.scopes.get(scope).this.clone()
    }

    /// Variable lookup. Inner scopes resolve by own-property presence; the
    /// global scope falls through to the prototype-aware property read, so
    /// accessors installed on the global object (or its prototype) fire.
    pub(crate) fn lookup_in_scope(
        &mut self,
        scope: ScopeId,
        name: &str,
    ) -> Result<GetOutcome, Throw> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let link = self.scopes.get(id);
            let object = link.object;
            let parent = link.parent;
            if link.with_scope {
                if self.has_property(object, name) {
                    return self.get_property(&Value::Object(object), name);
                }
            } else if parent.is_none() {
                // global scope
                if self.has_property(object, name) {
                    return self.get_property(&Value::Object(object), name);
                }
            } else if let Some(prop) = self.heap.get(object).properties.get(name) {
                return Ok(GetOutcome::Value(prop.value.clone()));
            }
            current = parent;
        }
        Err(raise_reference_error!(self, "{} is not defined", name))
    }

    /// Lenient lookup used by `typeof identifier`.
    pub(crate) fn lookup_in_scope_lenient(
        &mut self,
        scope: ScopeId,
        name: &str,
    ) -> Result<GetOutcome, Throw> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let link = self.scopes.get(id);
            let object = link.object;
            let parent = link.parent;
            if link.with_scope || parent.is_none() {
                if self.has_property(object, name) {
                    return self.get_property(&Value::Object(object), name);
                }
            } else if let Some(prop) = self.heap.get(object).properties.get(name) {
                return Ok(GetOutcome::Value(prop.value.clone()));
            }
            current = parent;
        }
        Ok(GetOutcome::Value(Value::Undefined))
    }

    /// Assignment walks the same chain; an unresolved name becomes a global
    /// binding in loose mode and a ReferenceError in strict mode.
    pub(crate) fn assign_in_scope(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
    ) -> Result<SetOutcome, Throw> {
        let strict = self.scope_strict(scope);
        let mut current = Some(scope);
        while let Some(id) = current {
            let link = self.scopes.get(id);
            let object = link.object;
            let parent = link.parent;
            if link.with_scope {
                if self.has_property(object, name) {
                    return self.set_property(&Value::Object(object), name, value, strict);
                }
            } else if parent.is_none() {
                if strict && !self.has_property(object, name) {
                    return Err(raise_reference_error!(self, "{} is not defined", name));
                }
                return self.set_property(&Value::Object(object), name, value, strict);
            } else if self.heap.get(object).properties.contains_key(name) {
                let prop = &mut self.heap.get_mut(object).properties[name];
                if prop.writable {
                    prop.value = value;
                }
                return Ok(SetOutcome::Done);
            }
            current = parent;
        }
        unreachable!("scope chain always ends at the global scope");
    }

    /// Declaration-time write: straight into the slot, never through setters.
    pub(crate) fn set_in_scope_direct(&mut self, scope: ScopeId, name: &str, value: Value) {
        let mut current = Some(scope);
        while let Some(id) = current {
            let link = self.scopes.get(id);
            let object = link.object;
            let parent = link.parent;
            if link.with_scope {
                if self.has_property(object, name) {
                    if let Some(prop) = self.heap.get_mut(object).properties.get_mut(name) {
                        prop.value = value;
                    }
                    return;
                }
            } else if parent.is_none() || self.heap.get(object).properties.contains_key(name) {
                match self.heap.get_mut(object).properties.get_mut(name) {
                    Some(prop) => {
                        if prop.writable {
                            prop.value = value;
                        }
                    }
                    None => {
                        self.define_raw(object, name, value, crate::core::descriptor::VARIABLE);
                    }
                }
                return;
            }
            current = parent;
        }
    }

    /// Hoisting-time install: `undefined` for `var`, the function object for
    /// declarations. Function declarations overwrite an existing binding;
    /// plain `var` re-declaration leaves the current value alone.
    pub(crate) fn declare_in_scope(&mut self, scope: ScopeId, name: &str, value: Option<Value>) {
        let mut target = scope;
        while self.scopes.get(target).with_scope {
            if let Some(parent) = self.scopes.get(target).parent {
                target = parent;
            } else {
                break;
            }
        }
        let object = self.scopes.get(target).object;
        let exists = self.heap.get(object).properties.contains_key(name);
        match value {
            Some(v) => self.define_raw(object, name, v, crate::core::descriptor::VARIABLE),
            None if !exists => self.define_raw(
                object,
                name,
                Value::Undefined,
                crate::core::descriptor::VARIABLE,
            ),
            None => {}
        }
    }
}
