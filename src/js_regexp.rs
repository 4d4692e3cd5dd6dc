use crate::core::descriptor::{Attributes, NONCONFIGURABLE_READONLY_NONENUMERABLE};
use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_REGEXP, NativeData, ObjectId, Throw, Value};
use crate::interp::Interpreter;
use crate::js_number::to_integer;
use crate::regexp_thread::{RegExpBackend, RegexFailure, RegexJob, RegexMatch};
use crate::{raise_plain_error, raise_syntax_error, raise_type_error};

const LAST_INDEX_ATTRS: Attributes = Attributes {
    writable: true,
    enumerable: false,
    configurable: false,
};

pub(crate) fn initialize_regexp(interp: &mut Interpreter) {
    let proto = interp.roots.regexp_proto;
    interp.install_constructor("RegExp", proto, 2);
    interp.install_method(proto, "exec", "RegExp.prototype.exec", 1);
    interp.install_method(proto, "test", "RegExp.prototype.test", 1);
    interp.install_method(proto, "toString", "RegExp.prototype.toString", 0);
}

/// The flags regress understands; `g` only affects lastIndex bookkeeping on
/// this side of the boundary.
fn engine_flags(flags: &str) -> String {
    flags.chars().filter(|c| "imsu".contains(*c)).collect()
}

impl Interpreter {
    /// Allocates and validates a RegExp instance.
    pub(crate) fn create_regexp_object(
        &mut self,
        source: &str,
        flags: &str,
    ) -> Result<ObjectId, Throw> {
        let proto = self.roots.regexp_proto;
        let id = self.alloc_object(Some(proto));
        self.configure_regexp(id, source, flags)?;
        Ok(id)
    }

    fn configure_regexp(&mut self, id: ObjectId, source: &str, flags: &str) -> Result<(), Throw> {
        if let Err(e) = RegExpBackend::validate(source, &engine_flags(flags)) {
            return Err(raise_syntax_error!(
                self,
                "Invalid regular expression: {}",
                e
            ));
        }
        {
            let obj = self.heap.get_mut(id);
            obj.class = CLASS_REGEXP;
            obj.data = Some(NativeData::RegExp {
                source: source.into(),
                flags: flags.into(),
            });
        }
        self.define_raw(
            id,
            "source",
            Value::str(source),
            NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
        for (name, flag) in [("global", 'g'), ("ignoreCase", 'i'), ("multiline", 'm')] {
            self.define_raw(
                id,
                name,
                Value::Boolean(flags.contains(flag)),
                NONCONFIGURABLE_READONLY_NONENUMERABLE,
            );
        }
        self.define_raw(id, "lastIndex", Value::Number(0.0), LAST_INDEX_ATTRS);
        Ok(())
    }
}

/// Coerces a `match`/`search` argument to a RegExp instance.
pub(crate) fn to_regexp(interp: &mut Interpreter, arg: Option<&Value>) -> Result<ObjectId, Throw> {
    match arg {
        Some(Value::Object(id))
            if matches!(interp.heap.get(*id).data, Some(NativeData::RegExp { .. })) =>
        {
            Ok(*id)
        }
        None | Some(Value::Undefined) => interp.create_regexp_object("", ""),
        Some(other) => {
            let source = interp.to_string_value(other)?;
            interp.create_regexp_object(&source, "")
        }
    }
}

pub(crate) fn regexp_data(
    interp: &mut Interpreter,
    id: ObjectId,
) -> Result<(String, String), Throw> {
    match &interp.heap.get(id).data {
        Some(NativeData::RegExp { source, flags }) => Ok((source.to_string(), flags.to_string())),
        _ => Err(raise_type_error!(
            interp,
            "Receiver is not a regular expression"
        )),
    }
}

pub(crate) fn regexp_is_global(interp: &Interpreter, id: ObjectId) -> bool {
    matches!(
        interp.heap.get(id).data,
        Some(NativeData::RegExp { ref flags, .. }) if flags.contains('g')
    )
}

/// Every user-regex execution funnels through here into the configured
/// backend; the interpreted-world failure modes are mapped in one place.
pub(crate) fn backend_exec(
    interp: &mut Interpreter,
    source: &str,
    flags: &str,
    subject: &str,
    last_index: usize,
) -> Result<Option<RegexMatch>, Throw> {
    let job = RegexJob {
        source: source.to_string(),
        flags: engine_flags(flags),
        subject: subject.to_string(),
        last_index,
    };
    match interp.regexp.exec(job) {
        Ok(result) => Ok(result),
        Err(RegexFailure::Disabled) => {
            Err(raise_plain_error!(interp, "Regular expressions not supported"))
        }
        Err(RegexFailure::Timeout) => Err(raise_plain_error!(interp, "RegExp Timeout")),
        Err(RegexFailure::Syntax(e)) => Err(raise_syntax_error!(
            interp,
            "Invalid regular expression: {}",
            e
        )),
    }
}

/// ES5 RegExp.prototype.exec, with explicit lastIndex round-tripping.
pub(crate) fn exec_on_subject(
    interp: &mut Interpreter,
    re: ObjectId,
    subject: &str,
) -> Result<Value, Throw> {
    let (source, flags) = regexp_data(interp, re)?;
    let global = regexp_is_global(interp, re);
    let len = subject.chars().count();
    let start = if global {
        let raw = interp.get_property_value(&Value::Object(re), "lastIndex")?;
        let n = to_integer(interp.to_number_value(&raw)?);
        if n < 0.0 || n > len as f64 {
            interp.set_property(&Value::Object(re), "lastIndex", Value::Number(0.0), false)?;
            return Ok(Value::Null);
        }
        n as usize
    } else {
        0
    };
    match backend_exec(interp, &source, &flags, subject, start)? {
        Some(m) => {
            if global {
                interp.set_property(
                    &Value::Object(re),
                    "lastIndex",
                    Value::Number(m.end as f64),
                    false,
                )?;
            }
            Ok(crate::js_string::match_to_array(interp, &m, subject))
        }
        None => {
            if global {
                interp.set_property(&Value::Object(re), "lastIndex", Value::Number(0.0), false)?;
            }
            Ok(Value::Null)
        }
    }
}

fn this_regexp(interp: &mut Interpreter, this: &Value) -> Result<ObjectId, Throw> {
    match this {
        Value::Object(id)
            if matches!(interp.heap.get(*id).data, Some(NativeData::RegExp { .. })) =>
        {
            Ok(*id)
        }
        _ => Err(raise_type_error!(
            interp,
            "RegExp.prototype method called on incompatible receiver"
        )),
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
        "RegExp" => (|| {
            let flags_arg = args.get(1).cloned().unwrap_or_default();
            if let Some(Value::Object(id)) = args.first() {
                if matches!(interp.heap.get(*id).data, Some(NativeData::RegExp { .. })) {
                    if !matches!(flags_arg, Value::Undefined) {
                        return Err(raise_type_error!(
                            interp,
                            "Cannot supply flags when constructing one RegExp from another"
                        ));
                    }
                    if !info.construct {
                        return Ok(Value::Object(*id));
                    }
                    let (source, flags) = regexp_data(interp, *id)?;
                    let target = info
                        .new_object
                        .ok_or_else(|| raise_type_error!(interp, "RegExp constructor lost its instance"))?;
                    interp.configure_regexp(target, &source, &flags)?;
                    return Ok(Value::Object(target));
                }
            }
            let source = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(v) => interp.to_string_value(v)?,
            };
            let flags = match &flags_arg {
                Value::Undefined => String::new(),
                v => interp.to_string_value(v)?,
            };
            for c in flags.chars() {
                if !"gim".contains(c) {
                    return Err(raise_syntax_error!(
                        interp,
                        "Invalid regular expression flag '{}'",
                        c
                    ));
                }
            }
            match (info.construct, info.new_object) {
                (true, Some(target)) => {
                    interp.configure_regexp(target, &source, &flags)?;
                    Ok(Value::Object(target))
                }
                _ => {
                    let id = interp.create_regexp_object(&source, &flags)?;
                    Ok(Value::Object(id))
                }
            }
        })(),
        "RegExp.prototype.exec" => (|| {
            let re = this_regexp(interp, this)?;
            let subject = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            exec_on_subject(interp, re, &subject)
        })(),
        "RegExp.prototype.test" => (|| {
            let re = this_regexp(interp, this)?;
            let subject = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let result = exec_on_subject(interp, re, &subject)?;
            Ok(Value::Boolean(!matches!(result, Value::Null)))
        })(),
        "RegExp.prototype.toString" => (|| {
            let re = this_regexp(interp, this)?;
            let (source, flags) = regexp_data(interp, re)?;
            Ok(Value::str(&format!("/{source}/{flags}")))
        })(),
        _ => return None,
    })
}
