//! Strict deserializers for integer and boolean request properties.
//!
//! Request bodies are loosely typed JSON, so a property such as `limit` may
//! arrive as `"5"` or `true`. Integers are accepted as JSON integers or as
//! strings holding an integer; booleans only as JSON booleans. Anything else
//! is rejected with a message naming the property and the offending value.
//! `null` is treated as an absent property.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn integer<'de, D: Deserializer<'de>>(d: D, prop: &str) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| {
        D::Error::custom(format!(
            "Wrong '{prop}' type. Integer is expected, but {value} found"
        ))
    })
}

fn boolean<'de, D: Deserializer<'de>>(d: D, prop: &str) -> Result<Option<bool>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        other => Err(D::Error::custom(format!(
            "Wrong '{prop}' type. Boolean is expected, but {other} found"
        ))),
    }
}

pub(crate) fn limit<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    integer(d, "limit")
}

pub(crate) fn segment<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    integer(d, "segment")
}

pub(crate) fn total_segments<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    integer(d, "total_segments")
}

pub(crate) fn scan_index_forward<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<bool>, D::Error> {
    boolean(d, "scan_index_forward")
}

pub(crate) fn consistent_read<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    boolean(d, "consistent_read")
}

pub(crate) fn exists<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    boolean(d, "exists")
}
