//! Stable (canonical) JSON serialization.
//!
//! [`stable_stringify`] renders any serializable value into a compact JSON
//! string whose object keys are sorted, so two values that are deeply equal
//! produce byte-identical output regardless of key insertion order. The output
//! is used as a cache-key fingerprint and for "did this value change" checks.
//!
//! # Rules
//!
//! - `null`, booleans and strings use their JSON literal form.
//! - Integral numbers print without a fractional part (`1.0` renders as `1`),
//!   matching what a browser's `JSON.stringify` emits.
//! - Arrays keep element order.
//! - Objects are emitted with keys in ascending UTF-16 code-unit order, the
//!   order a browser's default string sort produces.
//! - Dates are represented as ISO-8601 UTC strings with millisecond precision
//!   (`2024-01-02T03:04:05.678Z`); see [`iso_millis`] and [`date_value`].
//!
//! Values `serde_json` cannot represent serialize as `null` instead of
//! failing.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Largest magnitude at which an integral `f64` is still printed as an integer.
const INTEGRAL_FLOAT_LIMIT: f64 = 1e21;

/// Serialize `value` into its canonical JSON string.
#[must_use]
pub fn stable_stringify<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(json) => stable_stringify_value(&json),
        Err(e) => {
            tracing::debug!(error = %e, "value not representable as JSON; using null");
            "null".to_string()
        }
    }
}

/// Serialize an already-built JSON value into its canonical string.
#[must_use]
pub fn stable_stringify_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical string form of a timestamp (`toISOString()` layout).
#[must_use]
pub fn iso_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// JSON value for a timestamp, for building bodies by hand with `json!`.
#[must_use]
pub fn date_value(value: &DateTime<Utc>) -> Value {
    Value::String(iso_timestamp(value))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.encode_utf16().cmp(b.0.encode_utf16()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // guarded by INTEGRAL_FLOAT_LIMIT
fn write_number(out: &mut String, n: &serde_json::Number) {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && f.fract() == 0.0
        && f.abs() < INTEGRAL_FLOAT_LIMIT
    {
        let _ = write!(out, "{}", f as i128);
        return;
    }
    let _ = write!(out, "{n}");
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Serde adapter that (de)serializes `DateTime<Utc>` in canonical
/// millisecond form: `#[serde(with = "triage_core::canonical::iso_millis")]`.
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::iso_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn sorts_object_keys() {
        assert_eq!(stable_stringify(&json!({"b": 2, "a": 1})), r#"{"a":1,"b":2}"#);
        assert_eq!(
            stable_stringify(&json!({"b": 2, "a": 1})),
            stable_stringify(&json!({"a": 1, "b": 2}))
        );
    }

    #[test]
    fn sorts_keys_by_utf16_code_units() {
        // U+1F600 encodes as a surrogate pair (0xD83D ..) and so sorts before
        // U+FF61, although its UTF-8 bytes compare greater.
        let value = json!({"\u{FF61}": 1, "\u{1F600}": 2, "a": 3});
        assert_eq!(
            stable_stringify(&value),
            "{\"a\":3,\"\u{1F600}\":2,\"\u{FF61}\":1}"
        );
    }

    #[test]
    fn preserves_array_order() {
        assert_eq!(stable_stringify(&json!([3, 2, 1])), "[3,2,1]");
    }

    #[test]
    fn sorts_nested_objects_inside_arrays() {
        let value = json!([{"z": {"y": 1, "x": [true, null]}, "a": "s"}]);
        assert_eq!(
            stable_stringify(&value),
            r#"[{"a":"s","z":{"x":[true,null],"y":1}}]"#
        );
    }

    #[test]
    fn scalars_use_json_literals() {
        assert_eq!(stable_stringify(&Value::Null), "null");
        assert_eq!(stable_stringify(&true), "true");
        assert_eq!(stable_stringify(&false), "false");
        assert_eq!(stable_stringify(&-12), "-12");
        assert_eq!(stable_stringify(&2.5), "2.5");
        assert_eq!(stable_stringify("plain"), r#""plain""#);
    }

    #[test]
    fn integral_floats_print_as_integers() {
        assert_eq!(stable_stringify(&1.0_f64), "1");
        assert_eq!(stable_stringify(&json!({"n": 25.0})), r#"{"n":25}"#);
        assert_eq!(stable_stringify(&-0.0_f64), "0");
    }

    #[test]
    fn escapes_strings_like_json() {
        assert_eq!(
            stable_stringify("a\"b\\c\nd\te\u{01}"),
            r#""a\"b\\c\nd\te\u0001""#
        );
        assert_eq!(stable_stringify("héllo ✓"), "\"héllo ✓\"");
    }

    #[test]
    fn escapes_object_keys() {
        assert_eq!(stable_stringify(&json!({"a\"b": 1})), r#"{"a\"b":1}"#);
    }

    #[test]
    fn dates_serialize_as_iso_strings() {
        #[derive(Serialize)]
        struct Body {
            #[serde(with = "iso_millis")]
            d: DateTime<Utc>,
        }

        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let body = Body { d: date };
        assert_eq!(
            stable_stringify(&body),
            r#"{"d":"2024-01-02T03:04:05.000Z"}"#
        );
        assert_eq!(
            stable_stringify(&json!({"d": date_value(&date)})),
            format!("{{\"d\":\"{}\"}}", iso_timestamp(&date))
        );
    }

    #[test]
    fn iso_millis_round_trips() {
        let date = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(678);
        let encoded = serde_json::to_string(&Wrapper { at: date }).unwrap();
        assert_eq!(encoded, r#"{"at":"2023-12-31T23:59:59.678Z"}"#);
        let decoded: Wrapper = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.at, date);
    }

    #[derive(Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "iso_millis")]
        at: DateTime<Utc>,
    }

    #[test]
    fn hash_map_order_does_not_leak() {
        let mut first = HashMap::new();
        let mut second = BTreeMap::new();
        for (k, v) in [("query", 1), ("rows", 25), ("offset", 0), ("fq", 7)] {
            first.insert(k, v);
        }
        for (k, v) in [("fq", 7), ("offset", 0), ("rows", 25), ("query", 1)] {
            second.insert(k, v);
        }
        assert_eq!(stable_stringify(&first), stable_stringify(&second));
    }

    #[test]
    fn non_finite_floats_do_not_panic() {
        assert_eq!(stable_stringify(&f64::NAN), "null");
        assert_eq!(stable_stringify(&vec![f64::INFINITY]), "[null]");
    }
}
