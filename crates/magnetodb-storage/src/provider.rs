//! MagnetoDB provider: table management and single-item operations.
//!
//! Query, scan, batch and bulk operations live in their own modules as
//! further `impl MagnetoProvider` blocks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use magnetodb_core::{ProjectId, TenantStore};
use magnetodb_model::error::MagnetoError;
use magnetodb_model::input::{
    CreateTableInput, DeleteItemInput, GetItemInput, ListTablesInput, PutItemInput,
    UpdateItemInput,
};
use magnetodb_model::output::{
    CreateTableOutput, DeleteItemOutput, DeleteTableOutput, DescribeTableOutput, GetItemOutput,
    ListTablesOutput, PutItemOutput, UpdateItemOutput,
};
use magnetodb_model::types::{
    AttributeAction, AttributeValueUpdate, ExpectedAttributeValue, Item, ReturnValue, TableStatus,
};

use crate::condition::{apply_updates, check_expected, validate_expected, validate_updates};
use crate::config::StorageConfig;
use crate::error::{StorageError, storage_error_to_magneto};
use crate::schema::{PrimaryKey, TableSchema, extract_primary_key, parse_key, select_attributes};
use crate::state::{Catalog, Table, self_link};
use crate::storage::{Mutation, calculate_item_size};
use crate::validation::{
    validate_attribute_names, validate_create_table, validate_integer,
    validate_item_attribute_names, validate_table_name,
};

/// MagnetoDB engine. Owns the per-project table catalogs.
#[derive(Debug)]
pub struct MagnetoProvider {
    state: TenantStore<Catalog>,
    config: Arc<StorageConfig>,
}

impl MagnetoProvider {
    /// Create a new provider with the given configuration.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            state: TenantStore::new(),
            config: Arc::new(config),
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Catalog of one project, created on first access.
    #[must_use]
    pub fn catalog(&self, project_id: &ProjectId) -> Arc<Catalog> {
        self.state.get_or_create(project_id)
    }

    /// Drop every table of every project.
    pub fn reset(&self) {
        self.state.reset();
    }

    /// Look up a table that accepts data operations.
    pub(crate) fn data_table(
        &self,
        project_id: &ProjectId,
        table_name: &str,
    ) -> Result<Arc<Table>, MagnetoError> {
        validate_table_name(table_name)?;
        let table = self.catalog(project_id).require_table(table_name)?;
        table.require_writable()?;
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Table management
// ---------------------------------------------------------------------------

impl MagnetoProvider {
    /// Handle `create_table`.
    pub fn handle_create_table(
        &self,
        project_id: &ProjectId,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, MagnetoError> {
        let (name, schema) = validate_create_table(&input)?;
        let table = self
            .catalog(project_id)
            .insert_table(Table::new(project_id.clone(), name, schema))?;

        info!(
            table = %table.name,
            project = %project_id,
            indexes = table.schema.indexes.len(),
            "created table"
        );

        let table_description = table.describe(TableStatus::Creating);
        self.schedule_activation(&table);
        Ok(CreateTableOutput { table_description })
    }

    fn schedule_activation(&self, table: &Arc<Table>) {
        let delay = self.config.table_activation_delay;
        if delay.is_zero() {
            activate(table);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let table = Arc::clone(table);
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    activate(&table);
                });
            }
            Err(_) => activate(table),
        }
    }

    /// Handle `delete_table`.
    pub fn handle_delete_table(
        &self,
        project_id: &ProjectId,
        table_name: &str,
    ) -> Result<DeleteTableOutput, MagnetoError> {
        validate_table_name(table_name)?;
        let catalog = self.catalog(project_id);
        let table = catalog.require_table(table_name)?;
        if !table.mark_deleting() {
            return Err(MagnetoError::table_not_exists(table_name));
        }

        let table_description = table.describe(TableStatus::Deleting);
        self.schedule_removal(catalog, table);
        Ok(DeleteTableOutput { table_description })
    }

    fn schedule_removal(&self, catalog: Arc<Catalog>, table: Arc<Table>) {
        let delay = self.config.table_removal_delay;
        if delay.is_zero() {
            remove(&catalog, &table);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    remove(&catalog, &table);
                });
            }
            Err(_) => remove(&catalog, &table),
        }
    }

    /// Handle `describe_table`.
    pub fn handle_describe_table(
        &self,
        project_id: &ProjectId,
        table_name: &str,
    ) -> Result<DescribeTableOutput, MagnetoError> {
        validate_table_name(table_name)?;
        let table = self.catalog(project_id).require_table(table_name)?;
        Ok(DescribeTableOutput {
            table: table.to_description(),
        })
    }

    /// Handle `list_tables`.
    pub fn handle_list_tables(
        &self,
        project_id: &ProjectId,
        input: ListTablesInput,
    ) -> Result<ListTablesOutput, MagnetoError> {
        let limit = input
            .limit
            .map(|limit| validate_integer("limit", limit, Some(1), None))
            .transpose()?
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX));
        let start = input.exclusive_start_table_name;
        if let Some(start) = &start {
            validate_table_name(start)?;
        }

        let mut remaining = self
            .catalog(project_id)
            .list_table_names()
            .into_iter()
            .filter(|name| start.as_ref().is_none_or(|start| name > start));
        let table_names: Vec<String> = remaining
            .by_ref()
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        let last_evaluated_table_name = if remaining.next().is_some() {
            table_names.last().cloned()
        } else {
            None
        };

        Ok(ListTablesOutput {
            tables: table_names
                .iter()
                .map(|name| self_link(project_id, name))
                .collect(),
            table_names,
            last_evaluated_table_name,
        })
    }
}

fn remove(catalog: &Catalog, table: &Arc<Table>) {
    table.storage.clear();
    if catalog.remove_table(table) {
        info!(table = %table.name, project = %table.project_id, "deleted table");
    }
}

fn activate(table: &Table) {
    if !table.transition(&TableStatus::Creating, TableStatus::Active) {
        debug!(table = %table.name, status = %table.status(), "table left CREATING before activation");
    }
}

// ---------------------------------------------------------------------------
// Item CRUD
// ---------------------------------------------------------------------------

impl MagnetoProvider {
    /// Handle `put_item`.
    pub fn handle_put_item(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        input: PutItemInput,
    ) -> Result<PutItemOutput, MagnetoError> {
        let table = self.data_table(project_id, table_name)?;
        let return_old = returns_old_item(input.return_values.as_ref())?;
        validate_item_attribute_names(&input.item)?;
        let key = check_item(&table.schema, &input.item, self.config.max_item_size)
            .map_err(storage_error_to_magneto)?;
        validate_expected_input(input.expected.as_ref())?;

        let expected = input.expected.as_ref();
        let item = input.item;
        let old = table
            .storage
            .mutate(&key, |current| {
                check_expected(expected, current)?;
                let old = current.filter(|_| return_old).cloned();
                Ok((Mutation::Put(item), old))
            })
            .map_err(storage_error_to_magneto)?;

        debug!(table = %table_name, "put item");
        Ok(PutItemOutput { attributes: old })
    }

    /// Handle `get_item`.
    pub fn handle_get_item(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        input: GetItemInput,
    ) -> Result<GetItemOutput, MagnetoError> {
        let table = self.data_table(project_id, table_name)?;
        if let Some(names) = &input.attributes_to_get {
            validate_attribute_names(names)?;
        }
        let key =
            parse_key(&table.schema.key_schema, &input.key).map_err(storage_error_to_magneto)?;

        let item = table
            .storage
            .get_item(&key)
            .map(|item| match &input.attributes_to_get {
                Some(names) if !names.is_empty() => select_attributes(&item, names),
                _ => item,
            });
        Ok(GetItemOutput { item })
    }

    /// Handle `update_item`.
    pub fn handle_update_item(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        input: UpdateItemInput,
    ) -> Result<UpdateItemOutput, MagnetoError> {
        let table = self.data_table(project_id, table_name)?;
        let return_values = input.return_values.clone().unwrap_or(ReturnValue::None);
        if !return_values.is_known() {
            return Err(return_values_not_allowed(&return_values));
        }

        let schema = &table.schema;
        let key = parse_key(&schema.key_schema, &input.key).map_err(storage_error_to_magneto)?;
        let mut names: Vec<String> = input.attribute_updates.keys().cloned().collect();
        names.sort();
        validate_attribute_names(&names)?;
        validate_updates(&input.attribute_updates, |name| {
            schema.key_schema.is_key_attribute(name)
        })
        .map_err(storage_error_to_magneto)?;
        validate_expected_input(input.expected.as_ref())?;

        let updates = &input.attribute_updates;
        let expected = input.expected.as_ref();
        let max_item_size = self.config.max_item_size;
        let attributes = table
            .storage
            .mutate(&key, |current| {
                check_expected(expected, current)?;
                let only_deletes = updates
                    .values()
                    .all(|update| update.action == AttributeAction::Delete);
                if current.is_none() && only_deletes {
                    return Ok((Mutation::Keep, None));
                }

                let mut updated = current
                    .cloned()
                    .unwrap_or_else(|| key.to_key(&schema.key_schema));
                apply_updates(&mut updated, updates)?;
                check_secondary_keys_and_size(schema, &updated, max_item_size)?;
                let attributes = update_return_values(&return_values, current, &updated, updates);
                Ok((Mutation::Put(updated), attributes))
            })
            .map_err(storage_error_to_magneto)?;

        debug!(table = %table_name, updates = updates.len(), "updated item");
        Ok(UpdateItemOutput { attributes })
    }

    /// Handle `delete_item`.
    pub fn handle_delete_item(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, MagnetoError> {
        let table = self.data_table(project_id, table_name)?;
        let return_old = returns_old_item(input.return_values.as_ref())?;
        let key =
            parse_key(&table.schema.key_schema, &input.key).map_err(storage_error_to_magneto)?;
        validate_expected_input(input.expected.as_ref())?;

        let expected = input.expected.as_ref();
        let old = table
            .storage
            .mutate(&key, |current| {
                check_expected(expected, current)?;
                let old = current.filter(|_| return_old).cloned();
                Ok((Mutation::Delete, old))
            })
            .map_err(storage_error_to_magneto)?;

        debug!(table = %table_name, "deleted item");
        Ok(DeleteItemOutput { attributes: old })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the primary key of a full item and check the rest of it against
/// the schema: index key types and the size limit.
pub(crate) fn check_item(
    schema: &TableSchema,
    item: &Item,
    max_item_size: u64,
) -> Result<PrimaryKey, StorageError> {
    let key = extract_primary_key(&schema.key_schema, item)?;
    check_secondary_keys_and_size(schema, item, max_item_size)?;
    Ok(key)
}

fn check_secondary_keys_and_size(
    schema: &TableSchema,
    item: &Item,
    max_item_size: u64,
) -> Result<(), StorageError> {
    for index in &schema.indexes {
        if let Some(value) = item.get(&index.range.name) {
            index.range.check(value)?;
        }
    }
    let size = calculate_item_size(item);
    if size > max_item_size {
        return Err(StorageError::ItemTooLarge {
            size,
            max: max_item_size,
        });
    }
    Ok(())
}

/// Validate and store a full item unconditionally.
pub(crate) fn store_item(table: &Table, item: Item, max_item_size: u64) -> Result<(), MagnetoError> {
    validate_item_attribute_names(&item)?;
    let key = check_item(&table.schema, &item, max_item_size).map_err(storage_error_to_magneto)?;
    table
        .storage
        .mutate(&key, |_| Ok((Mutation::Put(item), ())))
        .map_err(storage_error_to_magneto)
}

fn validate_expected_input(
    expected: Option<&HashMap<String, ExpectedAttributeValue>>,
) -> Result<(), MagnetoError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let mut names: Vec<String> = expected.keys().cloned().collect();
    names.sort();
    validate_attribute_names(&names)?;
    validate_expected(expected).map_err(storage_error_to_magneto)
}

/// `put_item` and `delete_item` accept `NONE` and `ALL_OLD` only.
fn returns_old_item(return_values: Option<&ReturnValue>) -> Result<bool, MagnetoError> {
    match return_values {
        None | Some(ReturnValue::None) => Ok(false),
        Some(ReturnValue::AllOld) => Ok(true),
        Some(other) => Err(return_values_not_allowed(other)),
    }
}

fn return_values_not_allowed(return_values: &ReturnValue) -> MagnetoError {
    MagnetoError::validation(format!(
        "Return values type '{return_values}' isn't allowed"
    ))
}

fn update_return_values(
    return_values: &ReturnValue,
    old: Option<&Item>,
    new: &Item,
    updates: &HashMap<String, AttributeValueUpdate>,
) -> Option<Item> {
    match return_values {
        ReturnValue::AllOld => old.cloned(),
        ReturnValue::AllNew => Some(new.clone()),
        ReturnValue::UpdatedOld => old.and_then(|item| updated_attributes(item, updates)),
        ReturnValue::UpdatedNew => updated_attributes(new, updates),
        ReturnValue::None | ReturnValue::Unknown(_) => None,
    }
}

fn updated_attributes(
    item: &Item,
    updates: &HashMap<String, AttributeValueUpdate>,
) -> Option<Item> {
    let selected: Item = updates
        .keys()
        .filter_map(|name| item.get(name).map(|value| (name.clone(), value.clone())))
        .collect();
    (!selected.is_empty()).then_some(selected)
}
