//! MagnetoDB operation enum.

use std::fmt;

/// All supported MagnetoDB data operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagnetoOperation {
    // Table management
    /// Create a new table.
    CreateTable,
    /// Delete a table.
    DeleteTable,
    /// Describe a table.
    DescribeTable,
    /// List the tables of a project.
    ListTables,

    // Item CRUD
    /// Put (insert or replace) an item.
    PutItem,
    /// Get an item by primary key.
    GetItem,
    /// Update an item.
    UpdateItem,
    /// Delete an item by primary key.
    DeleteItem,

    // Query & Scan
    /// Query items by key condition.
    Query,
    /// Scan all items in a table.
    Scan,

    // Batch operations
    /// Batch get items from multiple tables.
    BatchGetItem,
    /// Batch write (put/delete) items to multiple tables.
    BatchWriteItem,
    /// Stream newline-delimited items into one table.
    BulkLoad,
}

impl MagnetoOperation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::CreateTable,
        Self::DeleteTable,
        Self::DescribeTable,
        Self::ListTables,
        Self::PutItem,
        Self::GetItem,
        Self::UpdateItem,
        Self::DeleteItem,
        Self::Query,
        Self::Scan,
        Self::BatchGetItem,
        Self::BatchWriteItem,
        Self::BulkLoad,
    ];

    /// Returns the operation name used in request envelopes.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "create_table",
            Self::DeleteTable => "delete_table",
            Self::DescribeTable => "describe_table",
            Self::ListTables => "list_tables",
            Self::PutItem => "put_item",
            Self::GetItem => "get_item",
            Self::UpdateItem => "update_item",
            Self::DeleteItem => "delete_item",
            Self::Query => "query",
            Self::Scan => "scan",
            Self::BatchGetItem => "batch_get_item",
            Self::BatchWriteItem => "batch_write_item",
            Self::BulkLoad => "bulk_load",
        }
    }

    /// Parse an operation name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Whether the operation addresses a single table named in the envelope.
    #[must_use]
    pub fn is_table_scoped(&self) -> bool {
        !matches!(
            self,
            Self::CreateTable | Self::ListTables | Self::BatchGetItem | Self::BatchWriteItem
        )
    }
}

impl fmt::Display for MagnetoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
