use crate::core::descriptor::NONENUMERABLE;
use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_ERROR, ObjectId, Throw, Value};
use crate::interp::Interpreter;

/// The ES5 error taxonomy. `Generic` is plain `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    Eval,
    Range,
    Reference,
    Syntax,
    Type,
    Uri,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Generic,
        ErrorKind::Eval,
        ErrorKind::Range,
        ErrorKind::Reference,
        ErrorKind::Syntax,
        ErrorKind::Type,
        ErrorKind::Uri,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Generic => "Error",
            ErrorKind::Eval => "EvalError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Uri => "URIError",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ErrorKind::Generic => 0,
            ErrorKind::Eval => 1,
            ErrorKind::Range => 2,
            ErrorKind::Reference => 3,
            ErrorKind::Syntax => 4,
            ErrorKind::Type => 5,
            ErrorKind::Uri => 6,
        }
    }

    fn from_builtin(name: &str) -> Option<ErrorKind> {
        ErrorKind::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl Interpreter {
    /// Allocates an error instance and wraps it as an in-flight throw. The
    /// `raise_*` macros bottom out here, which is why native helpers can use
    /// `return Err(...)` as throw-like control flow from any depth.
    pub fn make_error(&mut self, kind: ErrorKind, message: String) -> Throw {
        let id = self.make_error_object(kind, &message);
        Throw(Value::Object(id))
    }

    pub(crate) fn make_error_object(&mut self, kind: ErrorKind, message: &str) -> ObjectId {
        let proto = self.roots.error_protos[kind.index()];
        let id = self.alloc_object(Some(proto));
        self.heap.get_mut(id).class = CLASS_ERROR;
        self.define_raw(id, "message", Value::str(message), NONENUMERABLE);
        id
    }
}

pub(crate) fn initialize_error(interp: &mut Interpreter) {
    let base_proto = interp.roots.error_protos[ErrorKind::Generic.index()];
    for kind in ErrorKind::ALL {
        let proto = interp.roots.error_protos[kind.index()];
        if kind != ErrorKind::Generic {
            interp.heap.get_mut(proto).proto = Some(base_proto);
        }
        interp.heap.get_mut(proto).class = CLASS_ERROR;
        interp.define_raw(proto, "name", Value::str(kind.name()), NONENUMERABLE);
        interp.define_raw(proto, "message", Value::str(""), NONENUMERABLE);
        let ctor = interp.install_constructor(kind.name(), proto, 1);
        // subclasses inherit statics the usual way; nothing extra to do
        let _ = ctor;
    }
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    _this: &Value,
    args: &[Value],
    info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    let kind = ErrorKind::from_builtin(name)?;
    Some(construct_error(interp, kind, args, info))
}

/// `Error(...)` and `new Error(...)` behave identically per ES5.
fn construct_error(
    interp: &mut Interpreter,
    kind: ErrorKind,
    args: &[Value],
    info: NativeInfo,
) -> Result<Value, Throw> {
    let id = match (info.construct, info.new_object) {
        (true, Some(id)) => id,
        _ => {
            let proto = interp.roots.error_protos[kind.index()];
            interp.alloc_object(Some(proto))
        }
    };
    interp.heap.get_mut(id).class = CLASS_ERROR;
    match args.first() {
        None | Some(Value::Undefined) => {}
        Some(message) => {
            let message = interp.to_string_value(message)?;
            interp.define_raw(id, "message", Value::str(&message), NONENUMERABLE);
        }
    }
    Ok(Value::Object(id))
}
