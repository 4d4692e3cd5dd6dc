use std::rc::Rc;

use crate::core::eval::NativeInfo;
use crate::core::parser;
use crate::core::statement::FunctionNode;
use crate::core::value::{Throw, Value};
use crate::interp::Interpreter;
use crate::{raise_syntax_error, raise_type_error};

pub(crate) fn initialize_function(interp: &mut Interpreter) {
    let proto = interp.roots.function_proto;
    interp.install_constructor("Function", proto, 1);
    // apply and call are intercepted by the call machinery; the objects
    // installed here give them their observable identity
    interp.install_method(proto, "apply", "Function.prototype.apply", 2);
    interp.install_method(proto, "call", "Function.prototype.call", 1);
    interp.install_method(proto, "toString", "Function.prototype.toString", 0);
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    this: &Value,
    args: &[Value],
    _info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        // `new Function(arg1, ..., body)` parses fresh source in the global
        // scope
        "Function" => (|| {
            let mut params_src = String::new();
            let mut body_src = String::new();
            if let Some((body, params)) = args.split_last() {
                body_src = interp.to_string_value(body)?;
                let mut parts = Vec::with_capacity(params.len());
                for p in params {
                    parts.push(interp.to_string_value(p)?);
                }
                params_src = parts.join(",");
            }
            let params = match parser::parse_parameter_list(&params_src) {
                Ok(params) => params,
                Err(_) => {
                    return Err(raise_syntax_error!(
                        interp,
                        "Malformed formal parameter list"
                    ));
                }
            };
            let program = match parser::parse_program_opts(&body_src, false) {
                Ok(program) => program,
                Err(err) => {
                    return Err(raise_syntax_error!(interp, "{}", err));
                }
            };
            let node = Rc::new(FunctionNode {
                name: None,
                params,
                strict: program.strict,
                body: program.body,
                line: 0,
                column: 0,
            });
            let scope = interp.global_scope;
            let id = interp.create_ast_function(&node, scope, Some(Rc::from("anonymous")));
            Ok(Value::Object(id))
        })(),
        // Function.prototype itself is callable and returns undefined
        "Function.prototype" => Ok(Value::Undefined),
        "Function.prototype.toString" => (|| {
            match this {
                Value::Object(id) if interp.heap.get(*id).is_callable() => {
                    Ok(Value::str(&interp.function_source_string(*id)))
                }
                _ => Err(raise_type_error!(
                    interp,
                    "Function.prototype.toString requires a function receiver"
                )),
            }
        })(),
        // Reached only through an indirect grab of the method objects; the
        // live path rewrites the call frame instead.
        "Function.prototype.apply" | "Function.prototype.call" => Ok(Value::Undefined),
        _ => return None,
    })
}
