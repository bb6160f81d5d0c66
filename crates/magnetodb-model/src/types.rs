//! Shared MagnetoDB types for table and item operations.
//!
//! All structs use the `snake_case` JSON field names of the MagnetoDB data
//! API. Enumerations keep unrecognized wire values in an `Unknown` variant so
//! that the engine can reject them with a `ValidationError` carrying the
//! offending value, instead of failing at deserialization time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;

/// An item: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// A primary key (or index key): attribute name to scalar value.
pub type Key = HashMap<String, AttributeValue>;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Declares a string-valued wire enum with an `Unknown` fallback variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value not recognized by this server.
            Unknown(String),
        }

        impl $name {
            /// Returns the wire-format string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::Unknown(s) => s.as_str(),
                }
            }

            /// Returns `true` unless this is the `Unknown` variant.
            #[must_use]
            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $( $wire => Self::$variant, )+
                    other => Self::Unknown(other.to_owned()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s.as_str()))
            }
        }
    };
}

wire_enum! {
    /// Key type within a key schema element.
    KeyType {
        /// Partition key.
        Hash => "HASH",
        /// Sort key.
        Range => "RANGE",
    }
}

wire_enum! {
    /// Declared attribute type in an attribute definition.
    AttributeType {
        /// String.
        S => "S",
        /// Number.
        N => "N",
        /// Binary.
        B => "B",
        /// String set.
        Ss => "SS",
        /// Number set.
        Ns => "NS",
        /// Binary set.
        Bs => "BS",
    }
}

impl AttributeType {
    /// Scalar type for `S`, `N` and `B`.
    #[must_use]
    pub fn scalar(&self) -> Option<crate::attribute_value::ScalarType> {
        use crate::attribute_value::ScalarType;
        match self {
            Self::S => Some(ScalarType::S),
            Self::N => Some(ScalarType::N),
            Self::B => Some(ScalarType::B),
            _ => None,
        }
    }

    /// Returns `true` for the scalar types.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.scalar().is_some()
    }
}

wire_enum! {
    /// Table lifecycle status.
    TableStatus {
        /// Registered, not yet active.
        Creating => "CREATING",
        /// Ready.
        Active => "ACTIVE",
        /// Being removed.
        Deleting => "DELETING",
        /// Creation failed.
        CreateFailed => "CREATE_FAILED",
        /// Deletion failed.
        DeleteFailed => "DELETE_FAILED",
    }
}

impl TableStatus {
    /// Whether data operations may run against a table in this status.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Creating | Self::Active)
    }
}

wire_enum! {
    /// Which attributes an LSI copies.
    ProjectionType {
        /// All attributes.
        All => "ALL",
        /// Only table and index key attributes.
        KeysOnly => "KEYS_ONLY",
        /// Keys plus the listed non-key attributes.
        Include => "INCLUDE",
    }
}

wire_enum! {
    /// What a write operation returns.
    ReturnValue {
        /// Nothing.
        None => "NONE",
        /// The whole item before the write.
        AllOld => "ALL_OLD",
        /// Updated attributes before the write.
        UpdatedOld => "UPDATED_OLD",
        /// The whole item after the write.
        AllNew => "ALL_NEW",
        /// Updated attributes after the write.
        UpdatedNew => "UPDATED_NEW",
    }
}

wire_enum! {
    /// Attribute selection for query and scan.
    Select {
        /// Every attribute of the item.
        AllAttributes => "ALL_ATTRIBUTES",
        /// Attributes projected into the index.
        AllProjectedAttributes => "ALL_PROJECTED_ATTRIBUTES",
        /// The attributes named in `attributes_to_get`.
        SpecificAttributes => "SPECIFIC_ATTRIBUTES",
        /// Only the count.
        Count => "COUNT",
    }
}

wire_enum! {
    /// Comparison operator for key conditions and scan filters.
    ComparisonOperator {
        /// Equal.
        Eq => "EQ",
        /// Not equal.
        Ne => "NE",
        /// Less than or equal.
        Le => "LE",
        /// Less than.
        Lt => "LT",
        /// Greater than or equal.
        Ge => "GE",
        /// Greater than.
        Gt => "GT",
        /// Attribute exists.
        NotNull => "NOT_NULL",
        /// Attribute does not exist.
        Null => "NULL",
        /// Substring or set member.
        Contains => "CONTAINS",
        /// Negated `CONTAINS`.
        NotContains => "NOT_CONTAINS",
        /// Prefix match.
        BeginsWith => "BEGINS_WITH",
        /// Equal to any operand.
        In => "IN",
        /// Inclusive range.
        Between => "BETWEEN",
    }
}

impl ComparisonOperator {
    /// Operators allowed on a range key in a query.
    #[must_use]
    pub fn is_key_operator(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Le | Self::Lt | Self::Ge | Self::Gt | Self::BeginsWith | Self::Between
        )
    }

    /// Required operand count; `None` means one or more (`IN`).
    #[must_use]
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::NotNull | Self::Null => Some(0),
            Self::Between => Some(2),
            Self::In => None,
            _ => Some(1),
        }
    }
}

wire_enum! {
    /// Per-attribute action of `update_item`.
    AttributeAction {
        /// Replace the attribute.
        Put => "PUT",
        /// Numeric increment or set union.
        Add => "ADD",
        /// Remove the attribute or set members.
        Delete => "DELETE",
    }
}

// ---------------------------------------------------------------------------
// Schema structs
// ---------------------------------------------------------------------------

/// One element of a key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeySchemaElement {
    /// Attribute name.
    pub attribute_name: String,
    /// HASH or RANGE.
    pub key_type: KeyType,
}

/// Attribute name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDefinition {
    /// Attribute name.
    pub attribute_name: String,
    /// Declared type.
    pub attribute_type: AttributeType,
}

/// LSI projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Projection {
    /// Projection type.
    pub projection_type: ProjectionType,
    /// Extra attributes for INCLUDE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_key_attributes: Option<Vec<String>>,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            projection_type: ProjectionType::Include,
            non_key_attributes: None,
        }
    }
}

/// LSI definition in a `create_table` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalSecondaryIndex {
    /// Index name.
    pub index_name: String,
    /// HASH (same as the table) and RANGE.
    pub key_schema: Vec<KeySchemaElement>,
    /// Attributes copied into the index.
    #[serde(default)]
    pub projection: Option<Projection>,
}

/// LSI as reported by `describe_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSecondaryIndexDescription {
    /// Index name.
    pub index_name: String,
    /// Index key schema.
    pub key_schema: Vec<KeySchemaElement>,
    /// Projection.
    pub projection: Projection,
    /// Bytes of items present in the index.
    pub index_size_bytes: u64,
    /// Items present in the index.
    pub item_count: u64,
}

/// Hyperlink in table descriptions and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target.
    pub href: String,
    /// Relation, `self` or `bookmark`.
    pub rel: String,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Seconds since the epoch.
    pub creation_date_time: f64,
    pub item_count: u64,
    pub key_schema: Vec<KeySchemaElement>,
    pub table_id: String,
    pub table_name: String,
    pub table_status: TableStatus,
    pub table_size_bytes: u64,
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<LocalSecondaryIndexDescription>,
}

// ---------------------------------------------------------------------------
// Condition structs
// ---------------------------------------------------------------------------

/// Key condition or scan filter clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Operands.
    #[serde(default)]
    pub attribute_value_list: Vec<AttributeValue>,
    /// Operator.
    pub comparison_operator: ComparisonOperator,
}

/// One entry of an `expected` map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedAttributeValue {
    /// Whether the attribute must exist.
    #[serde(default, deserialize_with = "crate::de::exists")]
    pub exists: Option<bool>,
    /// Value the attribute must equal.
    #[serde(default)]
    pub value: Option<AttributeValue>,
}

/// One entry of `attribute_updates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeValueUpdate {
    /// Action, defaults to PUT.
    #[serde(default = "default_action")]
    pub action: AttributeAction,
    /// Operand.
    #[serde(default)]
    pub value: Option<AttributeValue>,
}

fn default_action() -> AttributeAction {
    AttributeAction::Put
}

// ---------------------------------------------------------------------------
// Batch structs
// ---------------------------------------------------------------------------

/// Per-table section of `batch_get_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeysAndAttributes {
    pub keys: Vec<Key>,
    #[serde(default)]
    pub attributes_to_get: Option<Vec<String>>,
    #[serde(default, deserialize_with = "crate::de::consistent_read")]
    pub consistent_read: Option<bool>,
}

/// `put_request` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutRequest {
    pub item: Item,
}

/// `delete_request` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteRequest {
    pub key: Key,
}

/// One entry of `batch_write_item`; exactly one field is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put_request: Option<PutRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_request: Option<DeleteRequest>,
}
