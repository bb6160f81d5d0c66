//! Request validation: names, integer properties and the `create_table`
//! schema validator.

use std::collections::{HashMap, HashSet};

use magnetodb_model::error::MagnetoError;
use magnetodb_model::input::CreateTableInput;
use magnetodb_model::types::{
    AttributeDefinition, Item, KeySchemaElement, KeyType, LocalSecondaryIndex, Projection,
    ProjectionType,
};
use magnetodb_model::ScalarType;

use crate::schema::{IndexSchema, KeyAttribute, KeySchema, TableSchema};

/// Longest table, index or attribute name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Shortest table or index name.
pub const MIN_TABLE_NAME_LENGTH: usize = 3;

/// Most LSIs per table.
pub const MAX_INDEXES: usize = 5;

/// Most non-key attributes of an INCLUDE projection.
pub const MAX_PROJECTED_ATTRIBUTES: usize = 20;

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

fn is_valid_name(name: &str, min_len: usize) -> bool {
    (min_len..=MAX_NAME_LENGTH).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Validate a table name: 3-255 characters of `[a-zA-Z0-9_.-]`.
pub fn validate_table_name(name: &str) -> Result<(), MagnetoError> {
    if is_valid_name(name, MIN_TABLE_NAME_LENGTH) {
        Ok(())
    } else {
        Err(MagnetoError::validation(format!(
            "Wrong table name '{name}' found"
        )))
    }
}

/// Validate an index name, same rules as table names.
pub fn validate_index_name(name: &str) -> Result<(), MagnetoError> {
    if is_valid_name(name, MIN_TABLE_NAME_LENGTH) {
        Ok(())
    } else {
        Err(MagnetoError::validation(format!(
            "Wrong index name '{name}' found"
        )))
    }
}

/// Validate an attribute name: 1-255 characters of `[a-zA-Z0-9_.-]`.
pub fn validate_attribute_name(name: &str) -> Result<(), MagnetoError> {
    if is_valid_name(name, 1) {
        Ok(())
    } else {
        Err(MagnetoError::validation(format!(
            "Wrong attribute name '{name}' found"
        )))
    }
}

/// Validate every attribute name of an item.
#[allow(clippy::implicit_hasher)]
pub fn validate_item_attribute_names(item: &Item) -> Result<(), MagnetoError> {
    let mut names: Vec<&String> = item.keys().collect();
    names.sort();
    names
        .into_iter()
        .try_for_each(|name| validate_attribute_name(name))
}

/// Validate an `attributes_to_get` list.
pub fn validate_attribute_names(names: &[String]) -> Result<(), MagnetoError> {
    names.iter().try_for_each(|name| validate_attribute_name(name))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Unwrap a required property.
pub fn required<T>(property: &str, value: Option<T>) -> Result<T, MagnetoError> {
    value.ok_or_else(|| {
        MagnetoError::validation(format!(
            "Required property '{property}' wasn't found or it's value is null"
        ))
    })
}

/// Check an integer property against optional bounds.
pub fn validate_integer(
    property: &str,
    value: i64,
    min: Option<i64>,
    max: Option<i64>,
) -> Result<i64, MagnetoError> {
    if let Some(min) = min {
        if value < min {
            return Err(MagnetoError::validation(format!(
                "'{property}' property value[{value}] is less then min_value[{min}]."
            )));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(MagnetoError::validation(format!(
                "'{property}' property value[{value}] is more then max_value[{max}]."
            )));
        }
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Schema validator
// ---------------------------------------------------------------------------

/// Validate a `create_table` request and build the table schema.
///
/// Checks run in a fixed order: attribute definitions, table name, key
/// schema, local secondary indexes, then uniqueness of the table and index
/// key schemas. The first failure is returned.
pub fn validate_create_table(
    input: &CreateTableInput,
) -> Result<(String, TableSchema), MagnetoError> {
    let definitions = required("attribute_definitions", input.attribute_definitions.as_ref())?;
    let types = validate_attribute_definitions(definitions)?;

    let table_name = required("table_name", input.table_name.as_ref())?;
    validate_table_name(table_name)?;

    let key_elements = required("key_schema", input.key_schema.as_ref())?;
    let key_schema = parse_key_schema(key_elements, &types)?;

    let indexes = match &input.local_secondary_indexes {
        Some(lsis) => validate_indexes(lsis, &key_schema, &types)?,
        None => Vec::new(),
    };

    let mut range_keys = HashSet::new();
    for range in key_schema
        .range
        .iter()
        .chain(indexes.iter().map(|index| &index.range))
    {
        if !range_keys.insert(range.name.as_str()) {
            return Err(MagnetoError::validation(
                "Table and its indices must have unique key schema",
            ));
        }
    }

    Ok((
        table_name.clone(),
        TableSchema {
            attribute_definitions: definitions.clone(),
            key_schema,
            indexes,
        },
    ))
}

fn validate_attribute_definitions(
    definitions: &[AttributeDefinition],
) -> Result<HashMap<String, AttributeDefinition>, MagnetoError> {
    if definitions.is_empty() {
        return Err(MagnetoError::validation(
            "'attribute_definitions' must contain at least one definition",
        ));
    }
    let mut types = HashMap::with_capacity(definitions.len());
    for definition in definitions {
        validate_attribute_name(&definition.attribute_name)?;
        if !definition.attribute_type.is_known() {
            return Err(MagnetoError::validation(format!(
                "Attribute type '{}' is not recognized",
                definition.attribute_type
            )));
        }
        if types
            .insert(definition.attribute_name.clone(), definition.clone())
            .is_some()
        {
            return Err(MagnetoError::validation(format!(
                "Attribute '{}' is defined more than once",
                definition.attribute_name
            )));
        }
    }
    Ok(types)
}

/// Split a key schema into its HASH and optional RANGE attribute names.
fn split_key_schema(
    elements: &[KeySchemaElement],
) -> Result<(Option<&str>, Option<&str>), MagnetoError> {
    let mut hash = None;
    let mut range = None;
    for element in elements {
        match &element.key_type {
            KeyType::Hash => {
                if hash.replace(element.attribute_name.as_str()).is_some() {
                    return Err(MagnetoError::validation("Only one 'HASH' key is allowed"));
                }
            }
            KeyType::Range => {
                if range.replace(element.attribute_name.as_str()).is_some() {
                    return Err(MagnetoError::validation("Only one 'RANGE' key is allowed"));
                }
            }
            KeyType::Unknown(other) => {
                return Err(MagnetoError::validation(format!(
                    "Key type '{other}' is not recognized"
                )));
            }
        }
    }
    Ok((hash, range))
}

fn parse_key_schema(
    elements: &[KeySchemaElement],
    types: &HashMap<String, AttributeDefinition>,
) -> Result<KeySchema, MagnetoError> {
    let (hash, range) = split_key_schema(elements)?;
    let Some(hash) = hash else {
        return Err(MagnetoError::validation("HASH key is missing"));
    };
    if elements.first().map(|e| &e.key_type) != Some(&KeyType::Hash) {
        return Err(MagnetoError::validation(
            "HASH key must be the first element of the key schema",
        ));
    }
    Ok(KeySchema {
        hash: key_attribute(hash, types)?,
        range: range.map(|name| key_attribute(name, types)).transpose()?,
    })
}

fn key_attribute(
    name: &str,
    types: &HashMap<String, AttributeDefinition>,
) -> Result<KeyAttribute, MagnetoError> {
    let definition = types
        .get(name)
        .ok_or_else(|| MagnetoError::validation(format!("Attribute '{name}' isn't defined")))?;
    let scalar_type: ScalarType = definition.attribute_type.scalar().ok_or_else(|| {
        MagnetoError::validation(format!(
            "Type '{}' is not a scalar type",
            definition.attribute_type
        ))
    })?;
    Ok(KeyAttribute {
        name: name.to_owned(),
        scalar_type,
    })
}

fn validate_indexes(
    lsis: &[LocalSecondaryIndex],
    table: &KeySchema,
    types: &HashMap<String, AttributeDefinition>,
) -> Result<Vec<IndexSchema>, MagnetoError> {
    if table.range.is_none() {
        return Err(MagnetoError::validation(
            "Table without range key in primary key schema can not have indices",
        ));
    }
    if lsis.is_empty() || lsis.len() > MAX_INDEXES {
        return Err(MagnetoError::validation(format!(
            "Table can have from 1 to {MAX_INDEXES} indices, but {} given",
            lsis.len()
        )));
    }

    let mut names = HashSet::new();
    let mut indexes = Vec::with_capacity(lsis.len());
    for lsi in lsis {
        validate_index_name(&lsi.index_name)?;
        if !names.insert(lsi.index_name.as_str()) {
            return Err(MagnetoError::validation(
                "Two or more indexes with the same name",
            ));
        }

        let (hash, range) = split_key_schema(&lsi.key_schema)?;
        match hash {
            Some(hash) if hash == table.hash.name => {}
            Some(_) => {
                return Err(MagnetoError::validation(format!(
                    "Index '{}' must use the table HASH key '{}'",
                    lsi.index_name, table.hash.name
                )));
            }
            None => return Err(MagnetoError::validation("HASH key is missing")),
        }
        let Some(range) = range else {
            return Err(MagnetoError::validation("Range key in index wasn't specified"));
        };
        let range = key_attribute(range, types)?;
        let projection = validate_projection(lsi.projection.as_ref(), table, &range)?;

        indexes.push(IndexSchema {
            name: lsi.index_name.clone(),
            range,
            projection,
        });
    }
    Ok(indexes)
}

fn validate_projection(
    projection: Option<&Projection>,
    table: &KeySchema,
    index_range: &KeyAttribute,
) -> Result<Projection, MagnetoError> {
    let projection = required("projection", projection)?;

    match &projection.projection_type {
        ProjectionType::Include => {
            let attrs = projection.non_key_attributes.as_deref().unwrap_or_default();
            if attrs.is_empty() || attrs.len() > MAX_PROJECTED_ATTRIBUTES {
                return Err(MagnetoError::validation(format!(
                    "Projection type 'INCLUDE' requires from 1 to \
                     {MAX_PROJECTED_ATTRIBUTES} non-key attributes, but {} given",
                    attrs.len()
                )));
            }
            let mut seen = HashSet::new();
            for attr in attrs {
                validate_attribute_name(attr)?;
                if table.is_key_attribute(attr) || index_range.name == *attr {
                    return Err(MagnetoError::validation(format!(
                        "Non-key attribute '{attr}' is a key attribute"
                    )));
                }
                if !seen.insert(attr.as_str()) {
                    return Err(MagnetoError::validation(format!(
                        "Non-key attribute '{attr}' is listed more than once"
                    )));
                }
            }
            Ok(projection.clone())
        }
        ProjectionType::All | ProjectionType::KeysOnly => {
            if projection.non_key_attributes.is_some() {
                return Err(MagnetoError::validation(
                    "Non-key attributes are only allowed with projection type 'INCLUDE'",
                ));
            }
            Ok(projection.clone())
        }
        ProjectionType::Unknown(other) => Err(MagnetoError::validation(format!(
            "Projection type '{other}' is not recognized"
        ))),
    }
}
