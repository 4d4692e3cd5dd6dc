use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::core::eval::NativeInfo;
use crate::core::value::{CLASS_DATE, NativeData, ObjectId, Throw, Value};
use crate::interp::Interpreter;
use crate::js_number::to_integer;
use crate::{raise_range_error, raise_type_error};

/// The sandbox runs in UTC: local time equals universal time and
/// `getTimezoneOffset` is 0, keeping interpreted programs deterministic.
const MAX_EPOCH_MS: f64 = 8.64e15;

fn in_range(ms: f64) -> bool {
    ms.is_finite() && ms.abs() <= MAX_EPOCH_MS
}

fn datetime(ms: f64) -> Option<chrono::DateTime<Utc>> {
    if !in_range(ms) {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64).single()
}

pub(crate) fn date_to_string(ms: f64) -> String {
    match datetime(ms) {
        Some(dt) => dt
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string(),
        None => "Invalid Date".to_string(),
    }
}

pub(crate) fn date_to_iso_string(ms: f64) -> String {
    match datetime(ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "Invalid Date".to_string(),
    }
}

fn date_to_utc_string(ms: f64) -> String {
    match datetime(ms) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// Epoch milliseconds from calendar components, with out-of-range fields
/// carrying over the way the Date constructor requires (month 12 is January
/// of the next year).
fn ms_from_components(
    year: f64,
    month: f64,
    day: f64,
    hours: f64,
    minutes: f64,
    seconds: f64,
    millis: f64,
) -> f64 {
    for v in [year, month, day, hours, minutes, seconds, millis] {
        if !v.is_finite() {
            return f64::NAN;
        }
    }
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0);
    if year.abs() > 300_000.0 {
        return f64::NAN;
    }
    let Some(base) = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1) else {
        return f64::NAN;
    };
    let days = base.num_days_from_ce() as f64 - EPOCH_DAYS_FROM_CE + (day - 1.0);
    days * 86_400_000.0 + hours * 3_600_000.0 + minutes * 60_000.0 + seconds * 1_000.0 + millis
}

/// `num_days_from_ce` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: f64 = 719_163.0;

/// ES5 TimeClip.
fn time_clip(ms: f64) -> f64 {
    if in_range(ms) { to_integer(ms) } else { f64::NAN }
}

fn parse_date(text: &str) -> f64 {
    let t = text.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return dt.timestamp_millis() as f64;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(t) {
        return dt.timestamp_millis() as f64;
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.3f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, format) {
            return dt.and_utc().timestamp_millis() as f64;
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%b %d %Y", "%B %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, format) {
            return d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis() as f64)
                .unwrap_or(f64::NAN);
        }
    }
    f64::NAN
}

pub(crate) fn initialize_date(interp: &mut Interpreter) {
    let proto = interp.roots.date_proto;
    interp.heap.get_mut(proto).class = CLASS_DATE;
    interp.heap.get_mut(proto).data = Some(NativeData::Date(f64::NAN));
    let ctor = interp.install_constructor("Date", proto, 7);
    interp.install_method(ctor, "now", "Date.now", 0);
    interp.install_method(ctor, "parse", "Date.parse", 1);
    interp.install_method(ctor, "UTC", "Date.UTC", 7);
    for (name, builtin, len) in [
        ("getTime", "Date.prototype.getTime", 0),
        ("valueOf", "Date.prototype.valueOf", 0),
        ("getFullYear", "Date.prototype.getFullYear", 0),
        ("getUTCFullYear", "Date.prototype.getFullYear", 0),
        ("getMonth", "Date.prototype.getMonth", 0),
        ("getUTCMonth", "Date.prototype.getMonth", 0),
        ("getDate", "Date.prototype.getDate", 0),
        ("getUTCDate", "Date.prototype.getDate", 0),
        ("getDay", "Date.prototype.getDay", 0),
        ("getUTCDay", "Date.prototype.getDay", 0),
        ("getHours", "Date.prototype.getHours", 0),
        ("getUTCHours", "Date.prototype.getHours", 0),
        ("getMinutes", "Date.prototype.getMinutes", 0),
        ("getUTCMinutes", "Date.prototype.getMinutes", 0),
        ("getSeconds", "Date.prototype.getSeconds", 0),
        ("getUTCSeconds", "Date.prototype.getSeconds", 0),
        ("getMilliseconds", "Date.prototype.getMilliseconds", 0),
        ("getUTCMilliseconds", "Date.prototype.getMilliseconds", 0),
        ("getTimezoneOffset", "Date.prototype.getTimezoneOffset", 0),
        ("setTime", "Date.prototype.setTime", 1),
        ("setFullYear", "Date.prototype.setFullYear", 3),
        ("setMonth", "Date.prototype.setMonth", 2),
        ("setDate", "Date.prototype.setDate", 1),
        ("setHours", "Date.prototype.setHours", 4),
        ("setMinutes", "Date.prototype.setMinutes", 3),
        ("setSeconds", "Date.prototype.setSeconds", 2),
        ("setMilliseconds", "Date.prototype.setMilliseconds", 1),
        ("toString", "Date.prototype.toString", 0),
        ("toDateString", "Date.prototype.toString", 0),
        ("toTimeString", "Date.prototype.toString", 0),
        ("toLocaleString", "Date.prototype.toString", 0),
        ("toUTCString", "Date.prototype.toUTCString", 0),
        ("toISOString", "Date.prototype.toISOString", 0),
        ("toJSON", "Date.prototype.toJSON", 1),
    ] {
        interp.install_method(proto, name, builtin, len);
    }
}

fn this_date(interp: &mut Interpreter, this: &Value) -> Result<(ObjectId, f64), Throw> {
    match this {
        Value::Object(id) => match interp.heap.get(*id).data {
            Some(NativeData::Date(ms)) => Ok((*id, ms)),
            _ => Err(raise_type_error!(
                interp,
                "Date.prototype method called on incompatible receiver"
            )),
        },
        _ => Err(raise_type_error!(
            interp,
            "Date.prototype method called on incompatible receiver"
        )),
    }
}

fn store(interp: &mut Interpreter, id: ObjectId, ms: f64) -> Value {
    let ms = time_clip(ms);
    interp.heap.get_mut(id).data = Some(NativeData::Date(ms));
    Value::Number(ms)
}

fn component_args(interp: &mut Interpreter, args: &[Value]) -> Result<Vec<f64>, Throw> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        out.push(to_integer(interp.to_number_value(arg)?));
    }
    Ok(out)
}

/// (year, month0, day, weekday, hours, minutes, seconds, millis)
fn decompose(ms: f64) -> Option<(f64, f64, f64, f64, f64, f64, f64, f64)> {
    let dt = datetime(ms)?;
    Some((
        dt.year() as f64,
        dt.month0() as f64,
        dt.day() as f64,
        dt.weekday().num_days_from_sunday() as f64,
        dt.hour() as f64,
        dt.minute() as f64,
        dt.second() as f64,
        dt.timestamp_subsec_millis() as f64,
    ))
}

pub(crate) fn dispatch(
    interp: &mut Interpreter,
    name: &'static str,
    this: &Value,
    args: &[Value],
    info: NativeInfo,
) -> Option<Result<Value, Throw>> {
    Some(match name {
        "Date" => (|| {
            if !info.construct {
                // Date() without new is the current time as a string
                return Ok(Value::str(&date_to_string(now_ms())));
            }
            let ms = match args.len() {
                0 => now_ms(),
                1 => match &args[0] {
                    Value::Str(s) => parse_date(s),
                    other => {
                        let data = interp.date_value(other);
                        match data {
                            Some(ms) => ms,
                            None => time_clip(interp.to_number_value(other)?),
                        }
                    }
                },
                _ => {
                    let parts = component_args(interp, args)?;
                    let year = match parts.first() {
                        Some(y) if (0.0..=99.0).contains(y) => y + 1900.0,
                        Some(y) => *y,
                        None => f64::NAN,
                    };
                    ms_from_components(
                        year,
                        parts.get(1).copied().unwrap_or(0.0),
                        parts.get(2).copied().unwrap_or(1.0),
                        parts.get(3).copied().unwrap_or(0.0),
                        parts.get(4).copied().unwrap_or(0.0),
                        parts.get(5).copied().unwrap_or(0.0),
                        parts.get(6).copied().unwrap_or(0.0),
                    )
                }
            };
            let id = info
                .new_object
                .ok_or_else(|| raise_type_error!(interp, "Date constructor lost its instance"))?;
            interp.heap.get_mut(id).class = CLASS_DATE;
            store(interp, id, ms);
            Ok(Value::Object(id))
        })(),
        "Date.now" => Ok(Value::Number(now_ms())),
        "Date.parse" => (|| {
            let text = match args.first() {
                Some(v) => interp.to_string_value(v)?,
                None => "undefined".to_string(),
            };
            Ok(Value::Number(parse_date(&text)))
        })(),
        "Date.UTC" => (|| {
            let parts = component_args(interp, args)?;
            let year = match parts.first() {
                Some(y) if (0.0..=99.0).contains(y) => y + 1900.0,
                Some(y) => *y,
                None => f64::NAN,
            };
            Ok(Value::Number(time_clip(ms_from_components(
                year,
                parts.get(1).copied().unwrap_or(0.0),
                parts.get(2).copied().unwrap_or(1.0),
                parts.get(3).copied().unwrap_or(0.0),
                parts.get(4).copied().unwrap_or(0.0),
                parts.get(5).copied().unwrap_or(0.0),
                parts.get(6).copied().unwrap_or(0.0),
            ))))
        })(),
        "Date.prototype.getTime" | "Date.prototype.valueOf" => {
            this_date(interp, this).map(|(_, ms)| Value::Number(ms))
        }
        "Date.prototype.getTimezoneOffset" => this_date(interp, this).map(|(_, ms)| {
            if ms.is_nan() {
                Value::Number(f64::NAN)
            } else {
                Value::Number(0.0)
            }
        }),
        "Date.prototype.getFullYear"
        | "Date.prototype.getMonth"
        | "Date.prototype.getDate"
        | "Date.prototype.getDay"
        | "Date.prototype.getHours"
        | "Date.prototype.getMinutes"
        | "Date.prototype.getSeconds"
        | "Date.prototype.getMilliseconds" => (|| {
            let (_, ms) = this_date(interp, this)?;
            let Some((year, month, day, weekday, hours, minutes, seconds, millis)) =
                decompose(ms)
            else {
                return Ok(Value::Number(f64::NAN));
            };
            Ok(Value::Number(match name {
                "Date.prototype.getFullYear" => year,
                "Date.prototype.getMonth" => month,
                "Date.prototype.getDate" => day,
                "Date.prototype.getDay" => weekday,
                "Date.prototype.getHours" => hours,
                "Date.prototype.getMinutes" => minutes,
                "Date.prototype.getSeconds" => seconds,
                _ => millis,
            }))
        })(),
        "Date.prototype.setTime" => (|| {
            let (id, _) = this_date(interp, this)?;
            let ms = match args.first() {
                Some(v) => interp.to_number_value(v)?,
                None => f64::NAN,
            };
            Ok(store(interp, id, ms))
        })(),
        "Date.prototype.setFullYear"
        | "Date.prototype.setMonth"
        | "Date.prototype.setDate"
        | "Date.prototype.setHours"
        | "Date.prototype.setMinutes"
        | "Date.prototype.setSeconds"
        | "Date.prototype.setMilliseconds" => (|| {
            let (id, ms) = this_date(interp, this)?;
            // an invalid date still accepts setFullYear, starting from zeroed
            // fields
            let (mut year, mut month, mut day, _, mut hours, mut minutes, mut seconds, mut millis) =
                decompose(ms).unwrap_or((1970.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0));
            if ms.is_nan() && name != "Date.prototype.setFullYear" {
                return Ok(store(interp, id, f64::NAN));
            }
            let parts = component_args(interp, args)?;
            let mut take = |slot: &mut f64, index: usize| {
                if let Some(v) = parts.get(index) {
                    *slot = *v;
                }
            };
            match name {
                "Date.prototype.setFullYear" => {
                    take(&mut year, 0);
                    take(&mut month, 1);
                    take(&mut day, 2);
                }
                "Date.prototype.setMonth" => {
                    take(&mut month, 0);
                    take(&mut day, 1);
                }
                "Date.prototype.setDate" => take(&mut day, 0),
                "Date.prototype.setHours" => {
                    take(&mut hours, 0);
                    take(&mut minutes, 1);
                    take(&mut seconds, 2);
                    take(&mut millis, 3);
                }
                "Date.prototype.setMinutes" => {
                    take(&mut minutes, 0);
                    take(&mut seconds, 1);
                    take(&mut millis, 2);
                }
                "Date.prototype.setSeconds" => {
                    take(&mut seconds, 0);
                    take(&mut millis, 1);
                }
                _ => take(&mut millis, 0),
            }
            Ok(store(
                interp,
                id,
                ms_from_components(year, month, day, hours, minutes, seconds, millis),
            ))
        })(),
        "Date.prototype.toString" => {
            this_date(interp, this).map(|(_, ms)| Value::str(&date_to_string(ms)))
        }
        "Date.prototype.toUTCString" => {
            this_date(interp, this).map(|(_, ms)| Value::str(&date_to_utc_string(ms)))
        }
        "Date.prototype.toISOString" => (|| {
            let (_, ms) = this_date(interp, this)?;
            if !in_range(ms) {
                return Err(raise_range_error!(interp, "Invalid time value"));
            }
            Ok(Value::str(&date_to_iso_string(ms)))
        })(),
        "Date.prototype.toJSON" => (|| {
            let (_, ms) = this_date(interp, this)?;
            if !in_range(ms) {
                return Ok(Value::Null);
            }
            Ok(Value::str(&date_to_iso_string(ms)))
        })(),
        _ => return None,
    })
}

fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_arithmetic_carries() {
        // month 12 is January of the next year
        let jan_2001 = ms_from_components(2000.0, 12.0, 1.0, 0.0, 0.0, 0.0, 0.0);
        let jan_2001_direct = ms_from_components(2001.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(jan_2001, jan_2001_direct);
    }

    #[test]
    fn epoch_is_zero() {
        assert_eq!(ms_from_components(1970.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn iso_round_trip() {
        let ms = ms_from_components(2026.0, 7.0, 1.0, 12.0, 30.0, 15.0, 250.0);
        assert_eq!(date_to_iso_string(ms), "2026-08-01T12:30:15.250Z");
        assert_eq!(parse_date("2026-08-01T12:30:15.250Z"), ms);
    }

    #[test]
    fn invalid_date_formats() {
        assert_eq!(date_to_string(f64::NAN), "Invalid Date");
        assert!(parse_date("definitely not a date").is_nan());
    }
}
