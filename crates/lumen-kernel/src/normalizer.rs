//! Settings normalizer – raw input in, canonical [`Settings`] out.
//!
//! Two input shapes reach the bridge:
//!
//! * **Query parameters** (request front-end) are string-typed and untrusted.
//!   [`from_query`] applies the coercion rule of each [`FieldKind`] and drops
//!   anything that does not pass.
//! * **JSON payloads** (message front-end) are already typed. [`from_json`]
//!   copies recognised keys through unchanged and leaves validation to the
//!   device encoder.
//!
//! Neither function can fail: malformed input for a field only means that
//! field is missing from the result.
//!
//! # Integer quirk
//!
//! An integer field is present only when its parsed value is non-zero, so
//! `level=0` is indistinguishable from no `level` at all. Deployed clients
//! rely on this, so it is kept. Digit runs too long for `i64` saturate to
//! `i64::MAX` (or `i64::MIN`) and stay present.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lumen_types::{FieldKind, FieldSpec, Settings};
use serde_json::Value;

/// Build settings from string-typed query parameters.
pub fn from_query(fields: &[FieldSpec], params: &HashMap<String, String>) -> Settings {
    let mut settings = Settings::new();
    for field in fields {
        if let Some(raw) = params.get(field.name)
            && let Some(value) = coerce(field.kind, raw)
        {
            settings.insert(field.name, value);
        }
    }
    settings
}

/// Build settings from a parsed JSON payload.
///
/// Only keys named in `fields` are taken; values are not re-validated.
/// Anything other than a JSON object yields empty settings.
pub fn from_json(fields: &[FieldSpec], payload: &Value) -> Settings {
    let mut settings = Settings::new();
    let Some(object) = payload.as_object() else {
        return settings;
    };
    for field in fields {
        if let Some(value) = object.get(field.name) {
            settings.insert(field.name, value.clone());
        }
    }
    settings
}

/// Coerce one raw query value according to `kind`.
///
/// Returns `None` when the value must be treated as absent.
pub fn coerce(kind: FieldKind, raw: &str) -> Option<Value> {
    match kind {
        FieldKind::Int => parse_int_prefix(raw)
            .filter(|n| *n != 0)
            .map(Value::from),
        FieldKind::Bool => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldKind::Color => (raw.chars().count() == 6).then(|| Value::from(raw)),
        FieldKind::Text => Some(Value::from(raw)),
        FieldKind::Date => parse_date(raw).map(|d| Value::from(d.to_rfc3339())),
    }
}

/// Parse the leading base-10 integer of `raw`, ignoring leading whitespace
/// and any trailing garbage (`"12px"` → 12). Returns `None` when no digit
/// follows the optional sign. Values beyond `i64` saturate.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value = rest.as_bytes()[..digits].iter().fold(0i64, |acc, d| {
        let digit = i64::from(d - b'0');
        if negative {
            acc.saturating_mul(10).saturating_sub(digit)
        } else {
            acc.saturating_mul(10).saturating_add(digit)
        }
    });
    Some(value)
}

/// Accepts RFC 3339, a local `YYYY-MM-DDTHH:MM:SS` timestamp, or a bare
/// `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
