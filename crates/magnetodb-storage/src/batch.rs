//! Batch get and batch write.
//!
//! Neither operation is transactional. `batch_write_item` validates every
//! request before the first write, then applies tables in name order; a
//! missing table is reported after the existing tables have been written.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use magnetodb_core::ProjectId;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::input::{BatchGetItemInput, BatchWriteItemInput};
use magnetodb_model::output::{BatchGetItemOutput, BatchWriteItemOutput};
use magnetodb_model::types::{Item, WriteRequest};

use crate::error::storage_error_to_magneto;
use crate::provider::{MagnetoProvider, check_item};
use crate::schema::{PrimaryKey, parse_key, select_attributes};
use crate::state::Table;
use crate::storage::Mutation;
use crate::validation::{
    validate_attribute_names, validate_item_attribute_names, validate_table_name,
};

/// Most keys one `batch_get_item` call may request.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// A validated write, ready to apply.
enum PreparedWrite {
    Put(PrimaryKey, Item),
    Delete(PrimaryKey),
}

impl MagnetoProvider {
    /// Handle `batch_get_item`.
    pub fn handle_batch_get_item(
        &self,
        project_id: &ProjectId,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, MagnetoError> {
        let total: usize = input.request_items.values().map(|r| r.keys.len()).sum();
        if total > MAX_BATCH_GET_KEYS {
            return Err(MagnetoError::validation(
                "Too many items requested for the BatchGetItem call",
            ));
        }

        let mut responses = BTreeMap::new();
        for (table_name, request) in &input.request_items {
            let table = self.data_table(project_id, table_name)?;
            let names = request
                .attributes_to_get
                .as_deref()
                .filter(|names| !names.is_empty());
            if let Some(names) = names {
                validate_attribute_names(names)?;
            }
            let keys = request
                .keys
                .iter()
                .map(|key| parse_key(&table.schema.key_schema, key))
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage_error_to_magneto)?;

            let items: Vec<Item> = keys
                .iter()
                .filter_map(|key| table.storage.get_item(key))
                .map(|item| match names {
                    Some(names) => select_attributes(&item, names),
                    None => item,
                })
                .collect();
            responses.insert(table_name.clone(), items);
        }

        debug!(tables = responses.len(), keys = total, "batch get");
        Ok(BatchGetItemOutput {
            responses,
            unprocessed_keys: BTreeMap::new(),
        })
    }

    /// Handle `batch_write_item`.
    pub fn handle_batch_write_item(
        &self,
        project_id: &ProjectId,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, MagnetoError> {
        // Validate everything first. Requests against a missing table can
        // only be checked for shape.
        let catalog = self.catalog(project_id);
        let mut prepared: Vec<(Arc<Table>, Vec<PreparedWrite>)> = Vec::new();
        let mut missing: Option<String> = None;
        for (table_name, requests) in &input.request_items {
            validate_table_name(table_name)?;
            match catalog.get_table(table_name) {
                Some(table) => {
                    table.require_writable()?;
                    let writes = self.prepare_writes(&table, requests)?;
                    prepared.push((table, writes));
                }
                None => {
                    for request in requests {
                        check_request_shape(request)?;
                    }
                    missing.get_or_insert_with(|| table_name.clone());
                }
            }
        }

        for (table, writes) in prepared {
            let count = writes.len();
            for write in writes {
                let (key, mutation) = match write {
                    PreparedWrite::Put(key, item) => (key, Mutation::Put(item)),
                    PreparedWrite::Delete(key) => (key, Mutation::Delete),
                };
                table
                    .storage
                    .mutate(&key, |_| Ok((mutation, ())))
                    .map_err(storage_error_to_magneto)?;
            }
            debug!(table = %table.name, writes = count, "batch write applied");
        }

        match missing {
            Some(table_name) => Err(MagnetoError::table_not_exists(&table_name)),
            None => Ok(BatchWriteItemOutput::default()),
        }
    }

    fn prepare_writes(
        &self,
        table: &Table,
        requests: &[WriteRequest],
    ) -> Result<Vec<PreparedWrite>, MagnetoError> {
        let mut seen = HashSet::new();
        let mut writes = Vec::with_capacity(requests.len());
        for request in requests {
            check_request_shape(request)?;
            let write = if let Some(put) = &request.put_request {
                let key = check_item(&table.schema, &put.item, self.config().max_item_size)
                    .map_err(storage_error_to_magneto)?;
                PreparedWrite::Put(key, put.item.clone())
            } else if let Some(delete) = &request.delete_request {
                let key = parse_key(&table.schema.key_schema, &delete.key)
                    .map_err(storage_error_to_magneto)?;
                PreparedWrite::Delete(key)
            } else {
                return invalid_write_request();
            };
            let key = match &write {
                PreparedWrite::Put(key, _) | PreparedWrite::Delete(key) => key,
            };
            if !seen.insert(key.clone()) {
                return Err(MagnetoError::validation(format!(
                    "More than one operation requested for the same item in table '{}'",
                    table.name
                )));
            }
            writes.push(write);
        }
        Ok(writes)
    }
}

fn check_request_shape(request: &WriteRequest) -> Result<(), MagnetoError> {
    match (&request.put_request, &request.delete_request) {
        (Some(put), None) => validate_item_attribute_names(&put.item),
        (None, Some(_)) => Ok(()),
        _ => invalid_write_request(),
    }
}

fn invalid_write_request<T>() -> Result<T, MagnetoError> {
    Err(MagnetoError::validation(
        "Write request must contain exactly one of 'put_request' or 'delete_request'",
    ))
}
