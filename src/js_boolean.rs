use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_BOOLEAN, NativeData, Throw, Value};
use crate::interp::Interpreter;
use crate::raise_type_error;

pub(crate) fn initialize_boolean(interp: &mut Interpreter) {
    let proto = interp.roots.boolean_proto;
    interp.install_constructor("Boolean", proto, 1);
    interp.install_method(proto, "toString", "Boolean.prototype.toString", 0);
    interp.install_method(proto, "valueOf", "Boolean.prototype.valueOf", 0);
}

fn this_boolean(interp: &mut Interpreter, this: &Value) -> Result<bool, Throw> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(id) => match interp.heap.get(*id).data {
            Some(NativeData::BoxedBoolean(b)) => Ok(b),
            _ => Err(raise_type_error!(
                interp,
                "Boolean.prototype method called on incompatible receiver"
            )),
        },
        _ => Err(raise_type_error!(
            interp,
            "Boolean.prototype method called on incompatible receiver"
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
        "Boolean" => (|| {
            let b = args.first().map(|v| v.truthy()).unwrap_or(false);
            if info.construct {
                let id = info.new_object.ok_or_else(|| {
                    raise_type_error!(interp, "Boolean constructor lost its instance")
                })?;
                let obj = interp.heap.get_mut(id);
                obj.class = CLASS_BOOLEAN;
                obj.data = Some(NativeData::BoxedBoolean(b));
                Ok(Value::Object(id))
            } else {
                Ok(Value::Boolean(b))
            }
        })(),
        "Boolean.prototype.toString" => {
            this_boolean(interp, this).map(|b| Value::str(if b { "true" } else { "false" }))
        }
        "Boolean.prototype.valueOf" => this_boolean(interp, this).map(Value::Boolean),
        _ => return None,
    })
}
