//! MagnetoDB output types.
//!
//! Optional fields are omitted when `None`, so an absent item or a write
//! without return values serializes as `{}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Item, Key, KeysAndAttributes, Link, TableDescription, WriteRequest};

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

/// Output for `create_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableOutput {
    pub table_description: TableDescription,
}

/// Output for `delete_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTableOutput {
    pub table_description: TableDescription,
}

/// Output for `describe_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeTableOutput {
    pub table: TableDescription,
}

/// Output for `list_tables`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTablesOutput {
    /// Table names of this page, sorted.
    pub table_names: Vec<String>,

    /// `self` links of the same tables.
    pub tables: Vec<Link>,

    /// Set when more names remain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_table_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

/// Output for `put_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutItemOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Item>,
}

/// Output for `get_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetItemOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

/// Output for `update_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItemOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Item>,
}

/// Output for `delete_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteItemOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Item>,
}

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

/// Output for `query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOutput {
    pub count: usize,

    /// Absent for `select = COUNT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Key>,
}

/// Output for `scan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutput {
    pub count: usize,

    pub scanned_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Key>,
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// Output for `batch_get_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchGetItemOutput {
    pub responses: BTreeMap<String, Vec<Item>>,
    pub unprocessed_keys: BTreeMap<String, KeysAndAttributes>,
}

/// Output for `batch_write_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchWriteItemOutput {
    pub unprocessed_items: BTreeMap<String, Vec<WriteRequest>>,
}

/// Output for `bulk_load`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadOutput {
    /// Non-blank records read from the stream.
    pub read: u64,
    /// Records stored.
    pub processed: u64,
    /// Records that could not be parsed or stored.
    pub failed: u64,
    /// Records skipped after the table became unavailable.
    pub unprocessed: u64,
    /// Raw text of the first failed records.
    pub failed_items: Vec<String>,
    /// Raw text of the last record read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_item: Option<String>,
}
