//! MagnetoDB `AttributeValue` type with custom serialization.
//!
//! `AttributeValue` is a tagged union where exactly one variant is present.
//! The JSON wire format uses single-key objects like `{"S": "hello"}`; typed
//! maps carry a three letter tag such as `{"SNM": {"k": "1"}}` whose first two
//! letters name the key and value types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::number::{Decimal, NumberError};

/// Errors raised while decoding an attribute value from JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeValueError {
    /// The typed value object does not have exactly one key.
    #[error("Can't recognize attribute typed value format: '{0}'")]
    Format(String),
    /// Unknown type tag.
    #[error("Attribute type '{0}' is not recognized")]
    UnknownType(String),
    /// The payload does not match the type tag.
    #[error("Wrong attribute value '{value}' for type '{tag}'")]
    Payload {
        /// The type tag.
        tag: String,
        /// The offending payload as JSON.
        value: String,
    },
    /// Invalid numeric literal.
    #[error(transparent)]
    Number(#[from] NumberError),
    /// Invalid base64 payload.
    #[error("Can't decode base64 value '{0}'")]
    Base64(String),
    /// Empty set or map.
    #[error("An AttributeValue may not contain an empty set")]
    EmptyCollection,
}

/// Scalar attribute type, used for keys and typed map components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    /// String.
    S,
    /// Number.
    N,
    /// Binary.
    B,
}

impl ScalarType {
    /// Wire letter of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
        }
    }

    fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'S' => Some(Self::S),
            b'N' => Some(Self::N),
            b'B' => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar value. Ordered by type first, then by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarValue {
    /// String value, ordered by UTF-8 bytes.
    S(String),
    /// Number value, ordered numerically.
    N(Decimal),
    /// Binary value, ordered by raw bytes.
    B(Bytes),
}

impl ScalarValue {
    /// Type of this scalar.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::S(_) => ScalarType::S,
            Self::N(_) => ScalarType::N,
            Self::B(_) => ScalarType::B,
        }
    }

    /// Wrap as a full attribute value.
    #[must_use]
    pub fn into_attribute_value(self) -> AttributeValue {
        match self {
            Self::S(s) => AttributeValue::S(s),
            Self::N(n) => AttributeValue::N(n),
            Self::B(b) => AttributeValue::B(b),
        }
    }

    /// Text form used as a JSON object key or string payload.
    fn to_wire_string(&self) -> String {
        match self {
            Self::S(s) => s.clone(),
            Self::N(n) => n.to_string(),
            Self::B(b) => BASE64.encode(b),
        }
    }

    fn from_wire_str(ty: ScalarType, s: &str) -> Result<Self, AttributeValueError> {
        Ok(match ty {
            ScalarType::S => Self::S(s.to_owned()),
            ScalarType::N => Self::N(Decimal::parse(s)?),
            ScalarType::B => Self::B(decode_base64(s)?),
        })
    }

    fn from_json(ty: ScalarType, tag: &str, value: &Value) -> Result<Self, AttributeValueError> {
        match (ty, value) {
            (_, Value::String(s)) => Self::from_wire_str(ty, s),
            (ScalarType::N, Value::Number(n)) => Ok(Self::N(Decimal::parse(&n.to_string())?)),
            _ => Err(payload_error(tag, value)),
        }
    }
}

/// Map of scalar keys to scalar values with declared key and value types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScalarMap {
    /// Declared key type.
    pub key_type: ScalarType,
    /// Declared value type.
    pub value_type: ScalarType,
    /// Entries ordered by key.
    pub entries: BTreeMap<ScalarValue, ScalarValue>,
}

impl ScalarMap {
    /// Wire tag, e.g. `SNM`.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        map_tag(self.key_type, self.value_type)
    }
}

fn map_tag(key: ScalarType, value: ScalarType) -> &'static str {
    use ScalarType::{B, N, S};
    match (key, value) {
        (S, S) => "SSM",
        (S, N) => "SNM",
        (S, B) => "SBM",
        (N, S) => "NSM",
        (N, N) => "NNM",
        (N, B) => "NBM",
        (B, S) => "BSM",
        (B, N) => "BNM",
        (B, B) => "BBM",
    }
}

/// MagnetoDB attribute value.
///
/// Numbers are canonical [`Decimal`]s, so structural equality is numeric
/// equality. Sets are ordered and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// String value.
    S(String),
    /// Number value.
    N(Decimal),
    /// Binary value (base64-encoded in JSON).
    B(Bytes),
    /// String set.
    Ss(BTreeSet<String>),
    /// Number set.
    Ns(BTreeSet<Decimal>),
    /// Binary set (base64-encoded in JSON).
    Bs(BTreeSet<Bytes>),
    /// Typed scalar map.
    Map(ScalarMap),
}

impl AttributeValue {
    /// Returns the type descriptor string (e.g., "S", "NS", "SNM").
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Map(m) => m.tag(),
        }
    }

    /// Scalar type, if this is a scalar value.
    #[must_use]
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Self::S(_) => Some(ScalarType::S),
            Self::N(_) => Some(ScalarType::N),
            Self::B(_) => Some(ScalarType::B),
            _ => None,
        }
    }

    /// Borrowed scalar view, if this is a scalar value.
    #[must_use]
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Self::S(s) => Some(ScalarValue::S(s.clone())),
            Self::N(n) => Some(ScalarValue::N(n.clone())),
            Self::B(b) => Some(ScalarValue::B(b.clone())),
            _ => None,
        }
    }

    /// Returns the string value if this is an `S` variant.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if this is an `N` variant.
    #[must_use]
    pub fn as_n(&self) -> Option<&Decimal> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns `true` for set and map variants.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.scalar_type().is_none()
    }

    /// Whether the value is an empty scalar (`""` or zero-length binary).
    #[must_use]
    pub fn is_empty_scalar(&self) -> bool {
        match self {
            Self::S(s) => s.is_empty(),
            Self::B(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Decode from the JSON wire form.
    ///
    /// # Errors
    /// Returns an [`AttributeValueError`] for malformed objects, unknown tags,
    /// bad payloads and empty collections.
    pub fn from_json(value: &Value) -> Result<Self, AttributeValueError> {
        let obj = match value {
            Value::Object(obj) if obj.len() == 1 => obj,
            _ => return Err(AttributeValueError::Format(value.to_string())),
        };
        let Some((tag, payload)) = obj.iter().next() else {
            return Err(AttributeValueError::Format(value.to_string()));
        };

        match tag.as_str() {
            "S" => match payload {
                Value::String(s) => Ok(Self::S(s.clone())),
                _ => Err(payload_error(tag, payload)),
            },
            "N" => match ScalarValue::from_json(ScalarType::N, tag, payload)? {
                ScalarValue::N(n) => Ok(Self::N(n)),
                _ => Err(payload_error(tag, payload)),
            },
            "B" => match payload {
                Value::String(s) => Ok(Self::B(decode_base64(s)?)),
                _ => Err(payload_error(tag, payload)),
            },
            "SS" => {
                let set = decode_set(tag, payload, |v| match v {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(payload_error(tag, v)),
                })?;
                Ok(Self::Ss(set))
            }
            "NS" => {
                let set = decode_set(tag, payload, |v| match v {
                    Value::String(s) => Ok(Decimal::parse(s)?),
                    Value::Number(n) => Ok(Decimal::parse(&n.to_string())?),
                    _ => Err(payload_error(tag, v)),
                })?;
                Ok(Self::Ns(set))
            }
            "BS" => {
                let set = decode_set(tag, payload, |v| match v {
                    Value::String(s) => decode_base64(s),
                    _ => Err(payload_error(tag, v)),
                })?;
                Ok(Self::Bs(set))
            }
            other => {
                let bytes = other.as_bytes();
                let (key_type, value_type) = match bytes {
                    [k, v, b'M'] => (ScalarType::from_letter(*k), ScalarType::from_letter(*v)),
                    _ => (None, None),
                };
                match (key_type, value_type) {
                    (Some(key_type), Some(value_type)) => {
                        Self::decode_map(tag, key_type, value_type, payload)
                    }
                    _ => Err(AttributeValueError::UnknownType(other.to_owned())),
                }
            }
        }
    }

    fn decode_map(
        tag: &str,
        key_type: ScalarType,
        value_type: ScalarType,
        payload: &Value,
    ) -> Result<Self, AttributeValueError> {
        let Value::Object(obj) = payload else {
            return Err(payload_error(tag, payload));
        };
        if obj.is_empty() {
            return Err(AttributeValueError::EmptyCollection);
        }
        let entries = obj
            .iter()
            .map(|(k, v)| {
                Ok((
                    ScalarValue::from_wire_str(key_type, k)?,
                    ScalarValue::from_json(value_type, tag, v)?,
                ))
            })
            .collect::<Result<BTreeMap<_, _>, AttributeValueError>>()?;
        Ok(Self::Map(ScalarMap {
            key_type,
            value_type,
            entries,
        }))
    }

    /// Encode to the JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        // Serializing into a `Value` cannot fail for this type.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn payload_error(tag: &str, value: &Value) -> AttributeValueError {
    AttributeValueError::Payload {
        tag: tag.to_owned(),
        value: value.to_string(),
    }
}

fn decode_base64(s: &str) -> Result<Bytes, AttributeValueError> {
    BASE64
        .decode(s)
        .map(Bytes::from)
        .map_err(|_| AttributeValueError::Base64(s.to_owned()))
}

fn decode_set<T: Ord>(
    tag: &str,
    payload: &Value,
    decode: impl Fn(&Value) -> Result<T, AttributeValueError>,
) -> Result<BTreeSet<T>, AttributeValueError> {
    let Value::Array(items) = payload else {
        return Err(payload_error(tag, payload));
    };
    if items.is_empty() {
        return Err(AttributeValueError::EmptyCollection);
    }
    items.iter().map(decode).collect()
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", &n.to_string())?,
            Self::B(b) => map.serialize_entry("B", &BASE64.encode(b))?,
            Self::Ss(set) => map.serialize_entry("SS", set)?,
            Self::Ns(set) => map.serialize_entry("NS", set)?,
            Self::Bs(set) => map.serialize_entry("BS", &Base64Seq(set))?,
            Self::Map(m) => map.serialize_entry(m.tag(), &WireMap(&m.entries))?,
        }
        map.end()
    }
}

struct Base64Seq<'a>(&'a BTreeSet<Bytes>);

impl Serialize for Base64Seq<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for b in self.0 {
            seq.serialize_element(&BASE64.encode(b))?;
        }
        seq.end()
    }
}

struct WireMap<'a>(&'a BTreeMap<ScalarValue, ScalarValue>);

impl Serialize for WireMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0 {
            map.serialize_entry(&k.to_wire_string(), &v.to_wire_string())?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Deserialize
// ---------------------------------------------------------------------------

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_owned())
    }
}

impl From<Decimal> for AttributeValue {
    fn from(n: Decimal) -> Self {
        Self::N(n)
    }
}

impl From<ScalarValue> for AttributeValue {
    fn from(v: ScalarValue) -> Self {
        v.into_attribute_value()
    }
}
