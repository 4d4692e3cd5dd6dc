use crate::core::descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE;
use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_STRING, NativeData, Throw, Value};
use crate::interp::Interpreter;
use crate::js_number::{to_integer, to_uint32};
use crate::js_regexp::{backend_exec, regexp_is_global, to_regexp};
use crate::raise_type_error;
use crate::regexp_thread::RegexMatch;

pub(crate) fn initialize_string(interp: &mut Interpreter) {
    let proto = interp.roots.string_proto;
    let ctor = interp.install_constructor("String", proto, 1);
    interp.install_method(ctor, "fromCharCode", "String.fromCharCode", 1);
    for (name, builtin, len) in [
        ("charAt", "String.prototype.charAt", 1),
        ("charCodeAt", "String.prototype.charCodeAt", 1),
        ("concat", "String.prototype.concat", 1),
        ("indexOf", "String.prototype.indexOf", 1),
        ("lastIndexOf", "String.prototype.lastIndexOf", 1),
        ("localeCompare", "String.prototype.localeCompare", 1),
        ("slice", "String.prototype.slice", 2),
        ("substr", "String.prototype.substr", 2),
        ("substring", "String.prototype.substring", 2),
        ("toLowerCase", "String.prototype.toLowerCase", 0),
        ("toLocaleLowerCase", "String.prototype.toLocaleLowerCase", 0),
        ("toUpperCase", "String.prototype.toUpperCase", 0),
        ("toLocaleUpperCase", "String.prototype.toLocaleUpperCase", 0),
        ("trim", "String.prototype.trim", 0),
        ("toString", "String.prototype.toString", 0),
        ("valueOf", "String.prototype.valueOf", 0),
        ("split", "String.prototype.split", 2),
        ("match", "String.prototype.match", 1),
        ("search", "String.prototype.search", 1),
        ("replace", "String.prototype.replace", 2),
    ] {
        interp.install_method(proto, name, builtin, len);
    }
}

/// CheckObjectCoercible + ToString on the receiver.
fn this_string(interp: &mut Interpreter, this: &Value, who: &str) -> Result<String, Throw> {
    if matches!(this, Value::Undefined | Value::Null) {
        return Err(raise_type_error!(
            interp,
            "{} called on null or undefined",
            who
        ));
    }
    interp.to_string_value(this)
}

fn chars_of(s: &str) -> Vec<char> {
    s.chars().collect()
}

fn substring_chars(chars: &[char], from: usize, to: usize) -> String {
    chars[from.min(chars.len())..to.min(chars.len())].iter().collect()
}

/// Builds the `exec`-shaped result array: match and captures, plus `index`
/// and `input`.
pub(crate) fn match_to_array(
    interp: &mut Interpreter,
    m: &RegexMatch,
    subject: &str,
) -> Value {
    let values: Vec<Value> = m
        .captures
        .iter()
        .map(|c| match c {
            Some(text) => Value::str(text),
            None => Value::Undefined,
        })
        .collect();
    let array = interp.create_array_from(values);
    interp.define_raw(
        array,
        "index",
        Value::Number(m.index as f64),
        crate::core::descriptor::DEFAULT,
    );
    interp.define_raw(
        array,
        "input",
        Value::str(subject),
        crate::core::descriptor::DEFAULT,
    );
    Value::Object(array)
}

/// `$$`, `$&`, `$\``, `$'`, `$1`–`$99` expansion for string replacements.
fn expand_replacement(replacement: &str, m: &RegexMatch, subject_chars: &[char]) -> String {
    let mut out = String::new();
    let rep: Vec<char> = replacement.chars().collect();
    let mut i = 0;
    while i < rep.len() {
        if rep[i] != '$' || i + 1 >= rep.len() {
            out.push(rep[i]);
            i += 1;
            continue;
        }
        match rep[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                if let Some(Some(whole)) = m.captures.first() {
                    out.push_str(whole);
                }
                i += 2;
            }
            '`' => {
                out.push_str(&substring_chars(subject_chars, 0, m.index));
                i += 2;
            }
            '\'' => {
                out.push_str(&substring_chars(subject_chars, m.end, subject_chars.len()));
                i += 2;
            }
            d1 @ '0'..='9' => {
                let mut group = d1 as usize - '0' as usize;
                let mut width = 2;
                if i + 2 < rep.len() {
                    if let Some(d2) = rep[i + 2].to_digit(10) {
                        let two = group * 10 + d2 as usize;
                        if two < m.captures.len() {
                            group = two;
                            width = 3;
                        }
                    }
                }
                if group > 0 && group < m.captures.len() {
                    if let Some(Some(text)) = m.captures.get(group) {
                        out.push_str(text);
                    }
                    i += width;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    this: &Value,
    args: &[Value],
    info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        "String" => (|| {
            let s = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => String::new(),
            };
            if info.construct {
                let id = info.new_object.ok_or_else(|| {
                    raise_type_error!(interp, "String constructor lost its instance")
                })?;
                let len = s.chars().count() as f64;
                {
                    let obj = interp.heap.get_mut(id);
                    obj.class = CLASS_STRING;
                    obj.data = Some(NativeData::BoxedString(s.as_str().into()));
                }
                interp.define_raw(
                    id,
                    "length",
                    Value::Number(len),
                    NONCONFIGURABLE_READONLY_NONENUMERABLE,
                );
                Ok(Value::Object(id))
            } else {
                Ok(Value::str(&s))
            }
        })(),
        "String.fromCharCode" => (|| {
            let mut out = String::new();
            for arg in args {
                let code = to_uint32(interp.to_number_value(arg)?) as u16;
                out.push(char::from_u32(code as u32).unwrap_or('\u{fffd}'));
            }
            Ok(Value::str(&out))
        })(),
        "String.prototype.toString" | "String.prototype.valueOf" => (|| {
            match this {
                Value::Str(s) => Ok(Value::Str(s.clone())),
                Value::Object(id) => match &interp.heap.get(*id).data {
                    Some(NativeData::BoxedString(s)) => Ok(Value::Str(s.clone())),
                    _ => Err(raise_type_error!(
                        interp,
                        "String.prototype.valueOf called on incompatible receiver"
                    )),
                },
                _ => Err(raise_type_error!(
                    interp,
                    "String.prototype.valueOf called on incompatible receiver"
                )),
            }
        })(),
        "String.prototype.charAt" => (|| {
            let s = this_string(interp, this, "String.prototype.charAt")?;
            let pos = match args.first() {
                Some(v) => to_integer(interp.to_number_value(v)?),
                None => 0.0,
            };
            let chars = chars_of(&s);
            if pos < 0.0 || pos >= chars.len() as f64 {
                return Ok(Value::str(""));
            }
            Ok(Value::str(&chars[pos as usize].to_string()))
        })(),
        "String.prototype.charCodeAt" => (|| {
            let s = this_string(interp, this, "String.prototype.charCodeAt")?;
            let pos = match args.first() {
                Some(v) => to_integer(interp.to_number_value(v)?),
                None => 0.0,
            };
            let chars = chars_of(&s);
            if pos < 0.0 || pos >= chars.len() as f64 {
                return Ok(Value::Number(f64::NAN));
            }
            Ok(Value::Number(chars[pos as usize] as u32 as f64))
        })(),
        "String.prototype.concat" => (|| {
            let mut s = this_string(interp, this, "String.prototype.concat")?;
            for arg in args {
                s.push_str(&interp.to_string_value(arg)?);
            }
            Ok(Value::str(&s))
        })(),
        "String.prototype.indexOf" => (|| {
            let s = this_string(interp, this, "String.prototype.indexOf")?;
            let needle = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let from = match args.get(1) {
                Some(v) => to_integer(interp.to_number_value(v)?).max(0.0) as usize,
                None => 0,
            };
            Ok(Value::Number(char_index_of(&s, &needle, from)))
        })(),
        "String.prototype.lastIndexOf" => (|| {
            let s = this_string(interp, this, "String.prototype.lastIndexOf")?;
            let needle = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let chars = chars_of(&s);
            let needle_chars = chars_of(&needle);
            let limit = match args.get(1) {
                Some(v) => {
                    let n = interp.to_number_value(v)?;
                    if n.is_nan() {
                        chars.len() as f64
                    } else {
                        to_integer(n)
                    }
                }
                None => chars.len() as f64,
            };
            let limit = limit.clamp(0.0, chars.len() as f64) as usize;
            let mut found = -1.0;
            let mut start = 0usize;
            while start + needle_chars.len() <= chars.len() {
                if start <= limit && chars[start..start + needle_chars.len()] == needle_chars[..] {
                    found = start as f64;
                }
                start += 1;
            }
            if needle_chars.is_empty() {
                found = limit.min(chars.len()) as f64;
            }
            Ok(Value::Number(found))
        })(),
        "String.prototype.localeCompare" => (|| {
            let s = this_string(interp, this, "String.prototype.localeCompare")?;
            let other = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            Ok(Value::Number(match s.cmp(&other) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            }))
        })(),
        "String.prototype.slice" => (|| {
            let s = this_string(interp, this, "String.prototype.slice")?;
            let chars = chars_of(&s);
            let len = chars.len() as f64;
            let begin = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            let end = match args.get(1) {
                None | Some(Value::Undefined) => len,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            let norm = |raw: f64| -> usize {
                if raw < 0.0 {
                    (len + raw).max(0.0) as usize
                } else {
                    raw.min(len) as usize
                }
            };
            let (from, to) = (norm(begin), norm(end));
            if from >= to {
                return Ok(Value::str(""));
            }
            Ok(Value::str(&substring_chars(&chars, from, to)))
        })(),
        "String.prototype.substring" => (|| {
            let s = this_string(interp, this, "String.prototype.substring")?;
            let chars = chars_of(&s);
            let len = chars.len() as f64;
            let raw_a = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            let raw_b = match args.get(1) {
                None | Some(Value::Undefined) => len,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            let a = raw_a.clamp(0.0, len) as usize;
            let b = raw_b.clamp(0.0, len) as usize;
            let (from, to) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::str(&substring_chars(&chars, from, to)))
        })(),
        "String.prototype.substr" => (|| {
            let s = this_string(interp, this, "String.prototype.substr")?;
            let chars = chars_of(&s);
            let len = chars.len() as f64;
            let start = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            let count = match args.get(1) {
                None | Some(Value::Undefined) => f64::INFINITY,
                Some(v) => to_integer(interp.to_number_value(v)?),
            };
            let from = if start < 0.0 {
                (len + start).max(0.0) as usize
            } else {
                start.min(len) as usize
            };
            let take = count.max(0.0).min(len - from as f64) as usize;
            Ok(Value::str(&substring_chars(&chars, from, from + take)))
        })(),
        "String.prototype.toLowerCase" | "String.prototype.toLocaleLowerCase" => {
            this_string(interp, this, name).map(|s| Value::str(&s.to_lowercase()))
        }
        "String.prototype.toUpperCase" | "String.prototype.toLocaleUpperCase" => {
            this_string(interp, this, name).map(|s| Value::str(&s.to_uppercase()))
        }
        "String.prototype.trim" => this_string(interp, this, name)
            .map(|s| Value::str(s.trim_matches(|c: char| c.is_whitespace()))),
        "String.prototype.search" => (|| {
            let s = this_string(interp, this, "String.prototype.search")?;
            let re = to_regexp(interp, args.first())?;
            let (source, flags) = crate::js_regexp::regexp_data(interp, re)?;
            match backend_exec(interp, &source, &flags, &s, 0)? {
                Some(m) => Ok(Value::Number(m.index as f64)),
                None => Ok(Value::Number(-1.0)),
            }
        })(),
        "String.prototype.match" => (|| {
            let s = this_string(interp, this, "String.prototype.match")?;
            let re = to_regexp(interp, args.first())?;
            let (source, flags) = crate::js_regexp::regexp_data(interp, re)?;
            if !regexp_is_global(interp, re) {
                return crate::js_regexp::exec_on_subject(interp, re, &s);
            }
            // global: collect every match, resetting lastIndex like exec
            let mut out = Vec::new();
            let mut pos = 0usize;
            let len = s.chars().count();
            while pos <= len {
                match backend_exec(interp, &source, &flags, &s, pos)? {
                    Some(m) => {
                        out.push(match m.captures.first() {
                            Some(Some(text)) => Value::str(text),
                            _ => Value::str(""),
                        });
                        pos = if m.end > m.index { m.end } else { m.index + 1 };
                    }
                    None => break,
                }
            }
            interp.set_property(
                &Value::Object(re),
                "lastIndex",
                Value::Number(0.0),
                false,
            )?;
            if out.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Object(interp.create_array_from(out)))
            }
        })(),
        "String.prototype.split" => (|| {
            let s = this_string(interp, this, "String.prototype.split")?;
            let limit = match args.get(1) {
                None | Some(Value::Undefined) => u32::MAX,
                Some(v) => to_uint32(interp.to_number_value(v)?),
            };
            if limit == 0 {
                return Ok(Value::Object(interp.create_array()));
            }
            match args.first() {
                None | Some(Value::Undefined) => {
                    let whole = vec![Value::str(&s)];
                    Ok(Value::Object(interp.create_array_from(whole)))
                }
                Some(Value::Object(id))
                    if matches!(
                        interp.heap.get(*id).data,
                        Some(NativeData::RegExp { .. })
                    ) =>
                {
                    split_with_regexp(interp, &s, *id, limit)
                }
                Some(separator) => {
                    let sep = interp.to_string_value(separator)?;
                    let mut out = Vec::new();
                    if sep.is_empty() {
                        for c in s.chars() {
                            if out.len() as u32 >= limit {
                                break;
                            }
                            out.push(Value::str(&c.to_string()));
                        }
                    } else {
                        for part in s.split(&sep) {
                            if out.len() as u32 >= limit {
                                break;
                            }
                            out.push(Value::str(part));
                        }
                    }
                    Ok(Value::Object(interp.create_array_from(out)))
                }
            }
        })(),
        "String.prototype.replace" => (|| {
            let s = this_string(interp, this, "String.prototype.replace")?;
            let replacement = match args.get(1) {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            let subject_chars = chars_of(&s);
            match args.first() {
                Some(Value::Object(id))
                    if matches!(
                        interp.heap.get(*id).data,
                        Some(NativeData::RegExp { .. })
                    ) =>
                {
                    let re = *id;
                    let (source, flags) = crate::js_regexp::regexp_data(interp, re)?;
                    let global = regexp_is_global(interp, re);
                    let mut out = String::new();
                    let mut pos = 0usize;
                    loop {
                        let m = backend_exec(interp, &source, &flags, &s, pos)?;
                        let Some(m) = m else { break };
                        out.push_str(&substring_chars(&subject_chars, pos, m.index));
                        out.push_str(&expand_replacement(&replacement, &m, &subject_chars));
                        if m.end > m.index {
                            pos = m.end;
                        } else {
                            // an empty match consumes nothing; carry the
                            // character over and move on
                            if m.index < subject_chars.len() {
                                out.push(subject_chars[m.index]);
                            }
                            pos = m.index + 1;
                        }
                        if !global || pos > subject_chars.len() {
                            break;
                        }
                    }
                    out.push_str(&substring_chars(
                        &subject_chars,
                        pos,
                        subject_chars.len(),
                    ));
                    Ok(Value::str(&out))
                }
                Some(pattern) => {
                    let needle = interp.to_string_value(pattern)?;
                    let index = char_index_of(&s, &needle, 0);
                    if index < 0.0 {
                        return Ok(Value::str(&s));
                    }
                    let index = index as usize;
                    let needle_len = needle.chars().count();
                    let m = RegexMatch {
                        index,
                        end: index + needle_len,
                        captures: vec![Some(needle)],
                    };
                    let mut out = substring_chars(&subject_chars, 0, index);
                    out.push_str(&expand_replacement(&replacement, &m, &subject_chars));
                    out.push_str(&substring_chars(
                        &subject_chars,
                        index + needle_len,
                        subject_chars.len(),
                    ));
                    Ok(Value::str(&out))
                }
                None => Ok(Value::str(&s)),
            }
        })(),
        _ => return None,
    })
}

/// First occurrence of `needle` in `s` at or after `from`, in characters.
fn char_index_of(s: &str, needle: &str, from: usize) -> f64 {
    let chars = chars_of(s);
    let needle_chars = chars_of(needle);
    if needle_chars.is_empty() {
        return from.min(chars.len()) as f64;
    }
    let mut i = from;
    while i + needle_chars.len() <= chars.len() {
        if chars[i..i + needle_chars.len()] == needle_chars[..] {
            return i as f64;
        }
        i += 1;
    }
    -1.0
}

/// The ES5 split algorithm over a regex separator, captures included.
fn split_with_regexp(
    interp: &mut Interpreter,
    s: &str,
    re: crate::core::value::ObjectId,
    limit: u32,
) -> Result<Value, Throw> {
    let (source, flags) = crate::js_regexp::regexp_data(interp, re)?;
    let len = s.chars().count();
    let chars = chars_of(s);
    let mut out: Vec<Value> = Vec::new();
    if len == 0 {
        match backend_exec(interp, &source, &flags, s, 0)? {
            Some(_) => return Ok(Value::Object(interp.create_array())),
            None => {
                let whole = vec![Value::str(s)];
                return Ok(Value::Object(interp.create_array_from(whole)));
            }
        }
    }
    let mut p = 0usize; // start of the unconsumed remainder
    let mut q = 0usize; // search position
    while q < len {
        let Some(m) = backend_exec(interp, &source, &flags, s, q)? else {
            break;
        };
        if m.index >= len {
            break;
        }
        if m.end == p {
            // empty separator match making no progress
            q = m.index + 1;
            continue;
        }
        out.push(Value::str(&substring_chars(&chars, p, m.index)));
        if out.len() as u32 >= limit {
            return Ok(Value::Object(interp.create_array_from(out)));
        }
        for capture in m.captures.iter().skip(1) {
            out.push(match capture {
                Some(text) => Value::str(text),
                None => Value::Undefined,
            });
            if out.len() as u32 >= limit {
                return Ok(Value::Object(interp.create_array_from(out)));
            }
        }
        p = m.end;
        q = if m.end > m.index { m.end } else { m.index + 1 };
    }
    out.push(Value::str(&substring_chars(&chars, p, len)));
    Ok(Value::Object(interp.create_array_from(out)))
}
