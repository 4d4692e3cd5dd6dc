use crate::core::descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE;
use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_MATH, Throw, Value};
use crate::interp::Interpreter;

/// ToNumber coercion for a single Math argument (missing behaves like
/// `undefined`).
#[inline]
fn arg_to_number(
    interp: &mut Interpreter,
    args: &[Value],
    idx: usize,
) -> Result<f64, Throw> {
    match args.get(idx) {
        Some(v) => interp.to_number_value(v),
        None => Ok(f64::NAN),
    }
}

/// JS `Math.round` semantics: ties round towards positive infinity.
#[inline]
fn js_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return n;
    }
    let f = n.floor();
    if (n - f) >= 0.5 { f + 1.0 } else { f }
}

pub(crate) fn initialize_math(interp: &mut Interpreter) {
    let proto = interp.roots.object_proto;
    let math = interp.alloc_object(Some(proto));
    interp.heap.get_mut(math).class = CLASS_MATH;
    for (name, value) in [
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("PI", std::f64::consts::PI),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("SQRT2", std::f64::consts::SQRT_2),
    ] {
        interp.define_raw(
            math,
            name,
            Value::Number(value),
            NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
    }
    for (name, builtin, len) in [
        ("abs", "Math.abs", 1),
        ("acos", "Math.acos", 1),
        ("asin", "Math.asin", 1),
        ("atan", "Math.atan", 1),
        ("atan2", "Math.atan2", 2),
        ("ceil", "Math.ceil", 1),
        ("cos", "Math.cos", 1),
        ("exp", "Math.exp", 1),
        ("floor", "Math.floor", 1),
        ("log", "Math.log", 1),
        ("max", "Math.max", 2),
        ("min", "Math.min", 2),
        ("pow", "Math.pow", 2),
        ("random", "Math.random", 0),
        ("round", "Math.round", 1),
        ("sin", "Math.sin", 1),
        ("sqrt", "Math.sqrt", 1),
        ("tan", "Math.tan", 1),
    ] {
        interp.install_method(math, name, builtin, len);
    }
    let global = interp.roots.global;
    interp.define_raw(
        global,
        "Math",
        Value::Object(math),
        crate::core::descriptor::NONENUMERABLE,
    );
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    _this: &Value,
    args: &[Value],
    _info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    let Some(op) = name.strip_prefix("Math.") else {
        return None;
    };
    Some(match op {
        "random" => Ok(Value::Number(rand::random::<f64>())),
        "max" | "min" => (|| {
            let mut best = if op == "max" {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            for i in 0..args.len() {
                let n = arg_to_number(interp, args, i)?;
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                best = if op == "max" { best.max(n) } else { best.min(n) };
            }
            Ok(Value::Number(best))
        })(),
        "atan2" => (|| {
            let y = arg_to_number(interp, args, 0)?;
            let x = arg_to_number(interp, args, 1)?;
            Ok(Value::Number(y.atan2(x)))
        })(),
        "pow" => (|| {
            let base = arg_to_number(interp, args, 0)?;
            let exp = arg_to_number(interp, args, 1)?;
            Ok(Value::Number(js_pow(base, exp)))
        })(),
        _ => (|| {
            let n = arg_to_number(interp, args, 0)?;
            let result = match op {
                "abs" => n.abs(),
                "acos" => n.acos(),
                "asin" => n.asin(),
                "atan" => n.atan(),
                "ceil" => n.ceil(),
                "cos" => n.cos(),
                "exp" => n.exp(),
                "floor" => n.floor(),
                "log" => n.ln(),
                "round" => js_round(n),
                "sin" => n.sin(),
                "sqrt" => n.sqrt(),
                "tan" => n.tan(),
                _ => return Err(interp.internal_error("unknown Math function")),
            };
            Ok(Value::Number(result))
        })(),
    })
}

/// `pow` edge cases where IEEE `powf` differs from ES5.
fn js_pow(base: f64, exp: f64) -> f64 {
    if exp.is_nan() {
        return f64::NAN;
    }
    if exp == 0.0 {
        return 1.0;
    }
    if base.abs() == 1.0 && exp.is_infinite() {
        return f64::NAN;
    }
    base.powf(exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_ties_up() {
        assert_eq!(js_round(0.5), 1.0);
        assert_eq!(js_round(-0.5), 0.0);
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
    }

    #[test]
    fn pow_edge_cases() {
        assert!(js_pow(1.0, f64::INFINITY).is_nan());
        assert!(js_pow(-1.0, f64::NEG_INFINITY).is_nan());
        assert_eq!(js_pow(f64::NAN, 0.0), 1.0);
        assert_eq!(js_pow(2.0, 10.0), 1024.0);
    }

    #[test]
    fn uint32_reexports_behave() {
        assert_eq!(crate::js_number::to_uint32(-1.0), u32::MAX);
    }
}
