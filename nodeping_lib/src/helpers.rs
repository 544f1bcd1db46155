//! Helpers for identifier parsing, timestamps, and loose JSON values.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Derive the check ID from a result ID of the form `<check-id>-<suffix>`.
///
/// Only the last hyphen-separated segment is removed, so `"a-b-c"` yields
/// `"a-b"`. Returns `None` when there is no hyphen or nothing precedes it.
pub fn parent_check_id(result_id: &str) -> Option<String> {
    result_id
        .rsplit_once('-')
        .map(|(check_id, _)| check_id)
        .filter(|check_id| !check_id.is_empty())
        .map(String::from)
}

/// Convert a Unix timestamp in milliseconds to UTC.
pub fn timestamp_ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Truthiness used by the service's legacy clients: `false`, `0`, `""`, `"0"`,
/// `null` and empty arrays/objects are false, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Serde adapter for flags the service sends as bool, number or string.
pub(crate) fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(is_truthy(&value))
}

/// Serialize a float as an integer when it has no fractional part, so that an
/// interval sent as `5` is written back as `5` rather than `5.0`.
pub(crate) fn serialize_whole_as_int<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Serde adapter that maps an explicit `null` to the type's default.
pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
