//! Parsed table and index schemas, key extraction and projections.

use std::collections::HashSet;

use magnetodb_model::types::{
    AttributeDefinition, Item, Key, KeySchemaElement, KeyType, Projection, ProjectionType,
};
use magnetodb_model::{AttributeValue, ScalarType, ScalarValue};

use crate::error::StorageError;

/// A key attribute with its scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub scalar_type: ScalarType,
}

impl KeyAttribute {
    /// Read and type-check this attribute from an item or key.
    ///
    /// # Errors
    /// Fails when the attribute is absent, has another type, or is an empty
    /// string or binary.
    pub fn extract(&self, item: &Item) -> Result<ScalarValue, StorageError> {
        let value = item
            .get(&self.name)
            .ok_or_else(|| StorageError::MissingKeyAttribute {
                attr: self.name.clone(),
            })?;
        self.check(value)
    }

    /// Type-check a value for this attribute.
    ///
    /// # Errors
    /// Fails on a type mismatch or an empty string or binary.
    pub fn check(&self, value: &AttributeValue) -> Result<ScalarValue, StorageError> {
        match value.as_scalar() {
            Some(scalar) if scalar.scalar_type() == self.scalar_type => {
                if value.is_empty_scalar() {
                    return Err(StorageError::EmptyKeyValue {
                        attr: self.name.clone(),
                    });
                }
                Ok(scalar)
            }
            _ => Err(StorageError::InvalidKeyType {
                attr: self.name.clone(),
                expected: self.scalar_type.as_str().to_owned(),
                actual: value.type_descriptor().to_owned(),
            }),
        }
    }
}

/// Primary key schema of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub hash: KeyAttribute,
    pub range: Option<KeyAttribute>,
}

impl KeySchema {
    /// Whether `name` is the hash or range attribute.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.hash.name == name || self.range.as_ref().is_some_and(|r| r.name == name)
    }

    /// Key attributes, hash first.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.hash).chain(self.range.as_ref())
    }

    /// Wire form of the key schema.
    #[must_use]
    pub fn to_elements(&self) -> Vec<KeySchemaElement> {
        let mut elements = vec![KeySchemaElement {
            attribute_name: self.hash.name.clone(),
            key_type: KeyType::Hash,
        }];
        if let Some(range) = &self.range {
            elements.push(KeySchemaElement {
                attribute_name: range.name.clone(),
                key_type: KeyType::Range,
            });
        }
        elements
    }
}

/// Location of an item: hash value plus optional range value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    pub hash: ScalarValue,
    pub range: Option<ScalarValue>,
}

impl PrimaryKey {
    /// Render as a key map.
    #[must_use]
    pub fn to_key(&self, schema: &KeySchema) -> Key {
        let mut key = Key::new();
        key.insert(
            schema.hash.name.clone(),
            self.hash.clone().into_attribute_value(),
        );
        if let (Some(attr), Some(value)) = (&schema.range, &self.range) {
            key.insert(attr.name.clone(), value.clone().into_attribute_value());
        }
        key
    }
}

/// Local secondary index: the table hash key plus an alternative range key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub range: KeyAttribute,
    /// Normalized projection: INCLUDE always carries at least one attribute.
    pub projection: Projection,
}

impl IndexSchema {
    /// Key schema of the index.
    #[must_use]
    pub fn key_schema(&self, table: &KeySchema) -> KeySchema {
        KeySchema {
            hash: table.hash.clone(),
            range: Some(self.range.clone()),
        }
    }

    /// Whether the index copies `name` for items it contains.
    #[must_use]
    pub fn projects(&self, name: &str, table: &KeySchema) -> bool {
        if table.is_key_attribute(name) || self.range.name == name {
            return true;
        }
        match self.projection.projection_type {
            ProjectionType::All => true,
            ProjectionType::Include => self
                .projection
                .non_key_attributes
                .as_ref()
                .is_some_and(|attrs| attrs.iter().any(|a| a == name)),
            _ => false,
        }
    }

    /// The projected view of an item.
    #[must_use]
    pub fn project(&self, item: &Item, table: &KeySchema) -> Item {
        item.iter()
            .filter(|(name, _)| self.projects(name, table))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Full schema of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: KeySchema,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    /// Look up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<(usize, &IndexSchema)> {
        self.indexes
            .iter()
            .enumerate()
            .find(|(_, index)| index.name == name)
    }
}

/// Extract the primary key from a full item.
///
/// # Errors
/// Fails when a key attribute is missing, mistyped or empty.
#[allow(clippy::implicit_hasher)]
pub fn extract_primary_key(schema: &KeySchema, item: &Item) -> Result<PrimaryKey, StorageError> {
    let hash = schema.hash.extract(item)?;
    let range = schema
        .range
        .as_ref()
        .map(|attr| attr.extract(item))
        .transpose()?;
    Ok(PrimaryKey { hash, range })
}

/// Parse a key map that must hold exactly the key attributes.
///
/// # Errors
/// Fails on extra attributes in addition to the checks of
/// [`extract_primary_key`].
#[allow(clippy::implicit_hasher)]
pub fn parse_key(schema: &KeySchema, key: &Key) -> Result<PrimaryKey, StorageError> {
    reject_extra_attributes(key, |name| schema.is_key_attribute(name))?;
    extract_primary_key(schema, key)
}

/// Parse an index position key: table key attributes plus the index range
/// attribute.
///
/// # Errors
/// Fails on missing, extra, mistyped or empty attributes.
#[allow(clippy::implicit_hasher)]
pub fn parse_index_key(
    table: &KeySchema,
    index: &IndexSchema,
    key: &Key,
) -> Result<(ScalarValue, PrimaryKey), StorageError> {
    reject_extra_attributes(key, |name| {
        table.is_key_attribute(name) || index.range.name == name
    })?;
    let primary = extract_primary_key(table, key)?;
    let index_value = index.range.extract(key)?;
    Ok((index_value, primary))
}

fn reject_extra_attributes(key: &Key, allowed: impl Fn(&str) -> bool) -> Result<(), StorageError> {
    let mut extra: Vec<&String> = key.keys().filter(|name| !allowed(name)).collect();
    extra.sort();
    match extra.first() {
        Some(name) => Err(StorageError::UnexpectedKeyAttribute {
            attr: (*name).clone(),
        }),
        None => Ok(()),
    }
}

/// Retain only the named attributes. Names absent from the item are skipped.
#[must_use]
#[allow(clippy::implicit_hasher)]
pub fn select_attributes(item: &Item, names: &[String]) -> Item {
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    item.iter()
        .filter(|(name, _)| wanted.contains(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
