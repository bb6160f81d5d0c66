//! Table catalog: per-project table registry and table lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use magnetodb_core::ProjectId;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::types::{LocalSecondaryIndexDescription, Link, TableDescription, TableStatus};

use crate::schema::TableSchema;
use crate::storage::TableStorage;

/// Tables of one project.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: DashMap<String, Arc<Table>>,
}

impl Catalog {
    /// Get a table by name. A table being deleted stays visible until it is
    /// removed.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Get a table or return `TableNotExistsException`.
    pub fn require_table(&self, name: &str) -> Result<Arc<Table>, MagnetoError> {
        self.get_table(name)
            .ok_or_else(|| MagnetoError::table_not_exists(name))
    }

    /// Register a new table. Fails if the name is taken.
    pub fn insert_table(&self, table: Table) -> Result<Arc<Table>, MagnetoError> {
        match self.tables.entry(table.name.clone()) {
            Entry::Occupied(e) => Err(MagnetoError::table_already_exists(e.key())),
            Entry::Vacant(e) => {
                let table = Arc::new(table);
                e.insert(Arc::clone(&table));
                Ok(table)
            }
        }
    }

    /// Remove `table` if it is still the one registered under its name.
    pub fn remove_table(&self, table: &Arc<Table>) -> bool {
        self.tables
            .remove_if(&table.name, |_, current| Arc::ptr_eq(current, table))
            .is_some()
    }

    /// All table names, sorted.
    #[must_use]
    pub fn list_table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

/// One table: metadata, lifecycle status and item storage.
#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub project_id: ProjectId,
    pub schema: Arc<TableSchema>,
    status: RwLock<TableStatus>,
    /// Stable table id (UUID v4), assigned at creation time.
    pub table_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub storage: TableStorage,
}

impl Table {
    /// Create a table in CREATING status.
    #[must_use]
    pub fn new(project_id: ProjectId, name: String, schema: TableSchema) -> Self {
        let schema = Arc::new(schema);
        Self {
            name,
            project_id,
            storage: TableStorage::new(Arc::clone(&schema)),
            schema,
            status: RwLock::new(TableStatus::Creating),
            table_id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TableStatus {
        self.status.read().clone()
    }

    /// Move from `from` to `to`. Returns `false` if the table was not in
    /// `from`.
    pub fn transition(&self, from: &TableStatus, to: TableStatus) -> bool {
        let mut status = self.status.write();
        if *status != *from {
            return false;
        }
        tracing::info!(
            table = %self.name,
            project = %self.project_id,
            %from,
            %to,
            "table status changed"
        );
        *status = to;
        true
    }

    /// Move to DELETING from any other status. Returns `false` when a
    /// concurrent delete got there first.
    pub fn mark_deleting(&self) -> bool {
        let mut status = self.status.write();
        if *status == TableStatus::Deleting {
            return false;
        }
        tracing::info!(
            table = %self.name,
            project = %self.project_id,
            from = %*status,
            "table marked for deletion"
        );
        *status = TableStatus::Deleting;
        true
    }

    /// Fail unless data operations are allowed in the current status.
    pub fn require_writable(&self) -> Result<(), MagnetoError> {
        if self.status().is_writable() {
            Ok(())
        } else {
            Err(MagnetoError::validation(format!(
                "Table '{}' is not in ACTIVE state",
                self.name
            )))
        }
    }

    /// `self` and `bookmark` links.
    #[must_use]
    pub fn links(&self) -> Vec<Link> {
        table_links(&self.project_id, &self.name)
    }

    /// Build a `TableDescription` from this table's metadata.
    #[must_use]
    pub fn to_description(&self) -> TableDescription {
        self.describe(self.status())
    }

    /// Build a `TableDescription` reporting `status`.
    #[must_use]
    pub fn describe(&self, status: TableStatus) -> TableDescription {
        #[allow(clippy::cast_precision_loss)] // Epoch seconds are reported as a float.
        let creation_time = self.created_at.timestamp_millis() as f64 / 1000.0;
        let key_schema = &self.schema.key_schema;

        let local_secondary_indexes = self
            .schema
            .indexes
            .iter()
            .enumerate()
            .map(|(position, index)| {
                let (item_count, index_size_bytes) = self.storage.index_stats(position);
                LocalSecondaryIndexDescription {
                    index_name: index.name.clone(),
                    key_schema: index.key_schema(key_schema).to_elements(),
                    projection: index.projection.clone(),
                    index_size_bytes,
                    item_count,
                }
            })
            .collect();

        TableDescription {
            attribute_definitions: self.schema.attribute_definitions.clone(),
            creation_date_time: creation_time,
            item_count: self.storage.item_count(),
            key_schema: key_schema.to_elements(),
            table_id: self.table_id.clone(),
            table_name: self.name.clone(),
            table_status: status,
            table_size_bytes: self.storage.total_size_bytes(),
            links: self.links(),
            local_secondary_indexes,
        }
    }
}

/// `self` link of a table, `<project>/data/tables/<name>`.
#[must_use]
pub fn self_link(project_id: &ProjectId, name: &str) -> Link {
    Link {
        href: format!("{project_id}/data/tables/{name}"),
        rel: "self".to_owned(),
    }
}

/// `self` and `bookmark` links of a table.
#[must_use]
pub fn table_links(project_id: &ProjectId, name: &str) -> Vec<Link> {
    let link = self_link(project_id, name);
    let bookmark = Link {
        href: link.href.clone(),
        rel: "bookmark".to_owned(),
    };
    vec![link, bookmark]
}
