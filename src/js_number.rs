use crate::core::descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE;
use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_NUMBER, NativeData, Throw, Value};
use crate::interp::Interpreter;
use crate::{raise_range_error, raise_type_error};

// ───────────────────────── numeric conversions ─────────────────────────────

/// ToUint32 (ES5 9.6).
pub fn to_uint32(n: f64) -> u32 {
    if n.is_nan() || n == 0.0 || !n.is_finite() {
        return 0;
    }
    let two32 = 4_294_967_296.0_f64;
    let mut int = n.trunc() % two32;
    if int < 0.0 {
        int += two32;
    }
    int as u32
}

/// ToInt32 (ES5 9.5).
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToInteger (ES5 9.4): truncate toward zero, NaN becomes 0.
pub fn to_integer(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// The ToString(number) algorithm, ES5 9.8.1. Rust's shortest-roundtrip
/// formatting matches ES5 in the fixed-notation range; the exponential
/// thresholds are applied here.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        return exponential_form(format!("{n:e}"));
    }
    format!("{n}")
}

/// Rust writes `1.5e20`; JavaScript writes `1.5e+20`.
fn exponential_form(mut s: String) -> String {
    if let Some(pos) = s.find('e') {
        if s.as_bytes().get(pos + 1) != Some(&b'-') {
            s.insert(pos + 1, '+');
        }
    }
    s
}

/// The ToNumber(string) algorithm, ES5 9.3.1.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim_matches(|c: char| c.is_whitespace());
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // reject the spellings Rust accepts but JavaScript does not
    if !t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }
    let digits: String = {
        let mut out = t.to_string();
        if out.starts_with('.') {
            out.insert(0, '0');
        } else if out.starts_with("-.") || out.starts_with("+.") {
            out.insert(1, '0');
        }
        if out.ends_with('.') {
            out.push('0');
        }
        out
    };
    digits.parse::<f64>().unwrap_or(f64::NAN)
}

/// Integer-to-string in an arbitrary radix, with a bounded fractional part.
/// Used by `Number.prototype.toString(radix)`.
pub fn format_radix(mut n: f64, radix: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let negative = n < 0.0;
    if negative {
        n = -n;
    }
    let mut int = n.trunc();
    let mut frac = n - int;
    let mut int_digits = Vec::new();
    if int == 0.0 {
        int_digits.push(b'0');
    }
    while int >= 1.0 {
        let digit = (int % radix as f64) as usize;
        int_digits.push(DIGITS[digit]);
        int = (int / radix as f64).trunc();
    }
    int_digits.reverse();
    let mut out = String::from_utf8(int_digits).unwrap_or_default();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac *= radix as f64;
            let digit = frac.trunc() as usize;
            out.push(DIGITS[digit.min(35)] as char);
            frac -= frac.trunc();
            if frac <= 0.0 {
                break;
            }
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

// ───────────────────────────── the builtin ─────────────────────────────────

pub(crate) fn initialize_number(interp: &mut Interpreter) {
    let proto = interp.roots.number_proto;
    let ctor = interp.install_constructor("Number", proto, 1);
    for (name, value) in [
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", f64::MIN_POSITIVE),
        ("NaN", f64::NAN),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("POSITIVE_INFINITY", f64::INFINITY),
    ] {
        interp.define_raw(
            ctor,
            name,
            Value::Number(value),
            NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
    }
    interp.install_method(proto, "toString", "Number.prototype.toString", 1);
    interp.install_method(proto, "toLocaleString", "Number.prototype.toLocaleString", 0);
    interp.install_method(proto, "valueOf", "Number.prototype.valueOf", 0);
    interp.install_method(proto, "toFixed", "Number.prototype.toFixed", 1);
    interp.install_method(proto, "toExponential", "Number.prototype.toExponential", 1);
    interp.install_method(proto, "toPrecision", "Number.prototype.toPrecision", 1);
}

/// The numeric receiver of a Number method: the primitive itself or the
/// boxed backing value.
fn this_number(interp: &mut Interpreter, this: &Value) -> Result<f64, Throw> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(id) => match interp.heap.get(*id).data {
            Some(NativeData::BoxedNumber(n)) => Ok(n),
            _ => Err(raise_type_error!(
                interp,
                "Number.prototype method called on incompatible receiver"
            )),
        },
        _ => Err(raise_type_error!(
            interp,
            "Number.prototype method called on incompatible receiver"
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
        "Number" => (|| {
            let n = match args.first() {
                Some(v) => interp.to_number_value(v)?,
                None => 0.0,
            };
            if info.construct {
                let id = info
                    .new_object
                    .ok_or_else(|| raise_type_error!(interp, "Number constructor lost its instance"))?;
                let obj = interp.heap.get_mut(id);
                obj.class = CLASS_NUMBER;
                obj.data = Some(NativeData::BoxedNumber(n));
                Ok(Value::Object(id))
            } else {
                Ok(Value::Number(n))
            }
        })(),
        "Number.prototype.toString" => (|| {
            let n = this_number(interp, this)?;
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10,
                Some(v) => {
                    let r = to_integer(interp.to_number_value(v)?);
                    if !(2.0..=36.0).contains(&r) {
                        return Err(raise_range_error!(
                            interp,
                            "toString() radix must be between 2 and 36"
                        ));
                    }
                    r as u32
                }
            };
            if radix == 10 {
                Ok(Value::str(&format_number(n)))
            } else {
                Ok(Value::str(&format_radix(n, radix)))
            }
        })(),
        "Number.prototype.toLocaleString" => {
            this_number(interp, this).map(|n| Value::str(&format_number(n)))
        }
        "Number.prototype.valueOf" => this_number(interp, this).map(Value::Number),
        "Number.prototype.toFixed" => (|| {
            let n = this_number(interp, this)?;
            let digits = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            if !(0.0..=100.0).contains(&digits) {
                return Err(raise_range_error!(
                    interp,
                    "toFixed() digits argument must be between 0 and 100"
                ));
            }
            if n.abs() >= 1e21 {
                return Ok(Value::str(&format_number(n)));
            }
            Ok(Value::str(&format!("{:.prec$}", n, prec = digits as usize)))
        })(),
        "Number.prototype.toExponential" => (|| {
            let n = this_number(interp, this)?;
            let formatted = match args.first() {
                None | Some(Value::Undefined) => format!("{n:e}"),
                Some(v) => {
                    let digits = to_integer(interp.to_number_value(v)?);
                    if !(0.0..=100.0).contains(&digits) {
                        return Err(raise_range_error!(
                            interp,
                            "toExponential() argument must be between 0 and 100"
                        ));
                    }
                    format!("{:.prec$e}", n, prec = digits as usize)
                }
            };
            Ok(Value::str(&exponential_form(formatted)))
        })(),
        "Number.prototype.toPrecision" => (|| {
            let n = this_number(interp, this)?;
            let precision = match args.first() {
                None | Some(Value::Undefined) => {
                    return Ok(Value::str(&format_number(n)));
                }
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            if !(1.0..=100.0).contains(&precision) {
                return Err(raise_range_error!(
                    interp,
                    "toPrecision() argument must be between 1 and 100"
                ));
            }
            let p = precision as usize;
            if n == 0.0 {
                return Ok(Value::str(&format!(
                    "{:.prec$}",
                    0.0,
                    prec = p.saturating_sub(1)
                )));
            }
            let exp = n.abs().log10().floor() as i32;
            if exp < -6 || exp >= p as i32 {
                let formatted = format!("{:.prec$e}", n, prec = p.saturating_sub(1));
                Ok(Value::str(&exponential_form(formatted)))
            } else {
                let decimals = (p as i32 - 1 - exp).max(0) as usize;
                Ok(Value::str(&format!("{:.decimals$}", n)))
            }
        })(),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_javascript() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(100.0), "100");
    }

    #[test]
    fn parses_like_javascript() {
        assert_eq!(parse_number("  42 "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x10"), 16.0);
        assert_eq!(parse_number("1.5e2"), 150.0);
        assert_eq!(parse_number(".5"), 0.5);
        assert!(parse_number("12px").is_nan());
        assert!(parse_number("infinity").is_nan());
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn int32_wrapping() {
        assert_eq!(to_int32(4294967296.0), 0);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), 4294967295);
        assert_eq!(to_int32(2147483648.0), -2147483648);
    }

    #[test]
    fn radix_formatting() {
        assert_eq!(format_radix(255.0, 16), "ff");
        assert_eq!(format_radix(-8.0, 2), "-1000");
        assert_eq!(format_radix(0.5, 2), "0.1");
    }
}
