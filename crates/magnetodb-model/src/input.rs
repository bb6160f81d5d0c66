//! MagnetoDB input types.
//!
//! All input structs use `snake_case` JSON field naming and reject unknown
//! properties. Table-scoped operations do not carry the table name in the
//! body: it arrives in the request envelope, mirroring the REST path segment
//! `/<project>/data/tables/<table>/...`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{
    AttributeDefinition, AttributeValueUpdate, Condition, ExpectedAttributeValue, Item, Key,
    KeySchemaElement, KeysAndAttributes, LocalSecondaryIndex, ReturnValue, Select, WriteRequest,
};

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

/// Input for `create_table`.
///
/// Required properties are optional here so that a missing property is
/// reported by the schema validator with its name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTableInput {
    /// The name of the table to create.
    #[serde(default)]
    pub table_name: Option<String>,

    /// Attribute definitions for key and index attributes.
    #[serde(default)]
    pub attribute_definitions: Option<Vec<AttributeDefinition>>,

    /// Primary key schema.
    #[serde(default)]
    pub key_schema: Option<Vec<KeySchemaElement>>,

    /// Local secondary indexes. An explicit empty list is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_secondary_indexes: Option<Vec<LocalSecondaryIndex>>,
}

/// Input for `list_tables`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListTablesInput {
    /// Names after this one are returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_table_name: Option<String>,

    /// Page size.
    #[serde(
        default,
        deserialize_with = "crate::de::limit",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

/// Input for `put_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutItemInput {
    /// The full item to store.
    pub item: Item,

    /// Conditions on the current item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<HashMap<String, ExpectedAttributeValue>>,

    /// `NONE` or `ALL_OLD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

/// Input for `get_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetItemInput {
    /// Primary key.
    pub key: Key,

    /// Attributes to return; empty or absent means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_to_get: Option<Vec<String>>,

    #[serde(
        default,
        deserialize_with = "crate::de::consistent_read",
        skip_serializing_if = "Option::is_none"
    )]
    pub consistent_read: Option<bool>,
}

/// Input for `update_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemInput {
    /// Primary key.
    pub key: Key,

    /// Per-attribute actions.
    #[serde(default)]
    pub attribute_updates: HashMap<String, AttributeValueUpdate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<HashMap<String, ExpectedAttributeValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

/// Input for `delete_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteItemInput {
    /// Primary key.
    pub key: Key,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<HashMap<String, ExpectedAttributeValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,
}

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

/// Input for `query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryInput {
    /// Conditions on the hash key and, optionally, the range key.
    pub key_conditions: HashMap<String, Condition>,

    /// LSI to query instead of the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_to_get: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,

    /// Ascending range key order when true (the default).
    #[serde(
        default,
        deserialize_with = "crate::de::scan_index_forward",
        skip_serializing_if = "Option::is_none"
    )]
    pub scan_index_forward: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Key>,

    /// Page size; zero means unlimited.
    #[serde(
        default,
        deserialize_with = "crate::de::limit",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<i64>,

    #[serde(
        default,
        deserialize_with = "crate::de::consistent_read",
        skip_serializing_if = "Option::is_none"
    )]
    pub consistent_read: Option<bool>,
}

/// Input for `scan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanInput {
    /// Filter clauses, combined with AND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_filter: Option<HashMap<String, Condition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_to_get: Option<Vec<String>>,

    #[serde(
        default,
        deserialize_with = "crate::de::limit",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Key>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,

    /// Segment to scan, `0..total_segments`.
    #[serde(
        default,
        deserialize_with = "crate::de::segment",
        skip_serializing_if = "Option::is_none"
    )]
    pub segment: Option<i64>,

    #[serde(
        default,
        deserialize_with = "crate::de::total_segments",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_segments: Option<i64>,
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// Input for `batch_get_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchGetItemInput {
    /// Table name to keys.
    pub request_items: BTreeMap<String, KeysAndAttributes>,
}

/// Input for `batch_write_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchWriteItemInput {
    /// Table name to write requests.
    pub request_items: BTreeMap<String, Vec<WriteRequest>>,
}
