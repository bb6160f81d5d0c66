//! Expected conditions, scan filter clauses and `update_item` actions.

use std::collections::HashMap;

use magnetodb_model::types::{
    AttributeAction, AttributeValueUpdate, ComparisonOperator, Condition,
    ExpectedAttributeValue, Item,
};
use magnetodb_model::{AttributeValue, ScalarValue};

use crate::error::StorageError;
use crate::storage::scalar_begins_with;

// ---------------------------------------------------------------------------
// Expected conditions
// ---------------------------------------------------------------------------

/// Reject malformed `expected` entries.
///
/// # Errors
/// Fails when an entry combines `exists: false` with a value.
#[allow(clippy::implicit_hasher)]
pub fn validate_expected(
    expected: &HashMap<String, ExpectedAttributeValue>,
) -> Result<(), StorageError> {
    for (name, condition) in expected {
        if condition.exists == Some(false) && condition.value.is_some() {
            return Err(StorageError::validation(format!(
                "Expected condition for '{name}' can't have a value when 'exists' is false"
            )));
        }
    }
    Ok(())
}

/// Whether every expected condition holds for `current`.
///
/// A missing item has every attribute absent. When `value` is given it takes
/// precedence: the attribute must be present and equal to it.
#[must_use]
#[allow(clippy::implicit_hasher)]
pub fn expected_holds(
    expected: &HashMap<String, ExpectedAttributeValue>,
    current: Option<&Item>,
) -> bool {
    expected.iter().all(|(name, condition)| {
        let actual = current.and_then(|item| item.get(name));
        match (&condition.value, condition.exists) {
            (Some(value), _) => actual == Some(value),
            (None, Some(true)) => actual.is_some(),
            (None, Some(false)) => actual.is_none(),
            (None, None) => true,
        }
    })
}

/// Check optional expected conditions against the current item.
///
/// # Errors
/// Returns [`StorageError::ConditionalCheckFailed`] when a condition fails.
#[allow(clippy::implicit_hasher)]
pub fn check_expected(
    expected: Option<&HashMap<String, ExpectedAttributeValue>>,
    current: Option<&Item>,
) -> Result<(), StorageError> {
    match expected {
        Some(expected) if !expected_holds(expected, current) => {
            Err(StorageError::ConditionalCheckFailed)
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Condition clauses
// ---------------------------------------------------------------------------

/// Check operator, operand count and operand types of a clause.
///
/// # Errors
/// Fails with a validation error describing the first problem found.
pub fn validate_condition(condition: &Condition) -> Result<(), StorageError> {
    let op = &condition.comparison_operator;
    if !op.is_known() {
        return Err(StorageError::validation(format!(
            "Comparison operator '{op}' is not recognized"
        )));
    }

    let args = &condition.attribute_value_list;
    match op.arity() {
        Some(n) if args.len() != n => {
            return Err(StorageError::validation(format!(
                "{op} requires exactly {n} argument(s), but {} given",
                args.len()
            )));
        }
        None if args.is_empty() => {
            return Err(StorageError::validation(format!(
                "{op} requires at least 1 argument"
            )));
        }
        _ => {}
    }

    match op {
        ComparisonOperator::Lt
        | ComparisonOperator::Le
        | ComparisonOperator::Gt
        | ComparisonOperator::Ge
        | ComparisonOperator::Contains
        | ComparisonOperator::NotContains
        | ComparisonOperator::In => {
            if let Some(arg) = args.iter().find(|a| a.is_collection()) {
                return Err(StorageError::validation(format!(
                    "{op} doesn't support argument of type '{}'",
                    arg.type_descriptor()
                )));
            }
        }
        ComparisonOperator::BeginsWith => {
            if let Some(arg) = args
                .iter()
                .find(|a| !matches!(a, AttributeValue::S(_) | AttributeValue::B(_)))
            {
                return Err(StorageError::validation(format!(
                    "{op} doesn't support argument of type '{}'",
                    arg.type_descriptor()
                )));
            }
        }
        ComparisonOperator::Between => {
            let (low, high) = (args[0].as_scalar(), args[1].as_scalar());
            match (low, high) {
                (Some(low), Some(high)) if low.scalar_type() == high.scalar_type() => {
                    if low > high {
                        return Err(StorageError::validation(
                            "BETWEEN lower bound is greater than its upper bound",
                        ));
                    }
                }
                _ => {
                    return Err(StorageError::validation(
                        "BETWEEN requires arguments of the same scalar type",
                    ));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Evaluate a clause against an attribute value. Absent attributes only
/// satisfy `NULL`; type mismatches never match.
#[must_use]
pub fn condition_matches(condition: &Condition, actual: Option<&AttributeValue>) -> bool {
    let op = &condition.comparison_operator;
    let args = &condition.attribute_value_list;
    let Some(actual) = actual else {
        return *op == ComparisonOperator::Null;
    };
    let first = args.first();

    match op {
        ComparisonOperator::NotNull => true,
        ComparisonOperator::Null => false,
        ComparisonOperator::Eq => first == Some(actual),
        ComparisonOperator::Ne => first.is_some_and(|arg| arg != actual),
        ComparisonOperator::Lt => compare(actual, first, |o| o.is_lt()),
        ComparisonOperator::Le => compare(actual, first, |o| o.is_le()),
        ComparisonOperator::Gt => compare(actual, first, |o| o.is_gt()),
        ComparisonOperator::Ge => compare(actual, first, |o| o.is_ge()),
        ComparisonOperator::Between => {
            compare(actual, args.first(), |o| o.is_ge())
                && compare(actual, args.get(1), |o| o.is_le())
        }
        ComparisonOperator::BeginsWith => {
            match (actual.as_scalar(), first.and_then(AttributeValue::as_scalar)) {
                (Some(value), Some(prefix)) => scalar_begins_with(&value, &prefix),
                _ => false,
            }
        }
        ComparisonOperator::Contains => {
            first.is_some_and(|arg| contains(actual, arg) == Some(true))
        }
        ComparisonOperator::NotContains => {
            first.is_some_and(|arg| contains(actual, arg) == Some(false))
        }
        ComparisonOperator::In => args.iter().any(|arg| arg == actual),
        ComparisonOperator::Unknown(_) => false,
    }
}

fn compare(
    actual: &AttributeValue,
    arg: Option<&AttributeValue>,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match (actual.as_scalar(), arg.and_then(AttributeValue::as_scalar)) {
        (Some(a), Some(b)) if a.scalar_type() == b.scalar_type() => accept(a.cmp(&b)),
        _ => false,
    }
}

/// Membership test for CONTAINS. `None` when the types are incomparable.
fn contains(actual: &AttributeValue, arg: &AttributeValue) -> Option<bool> {
    let needle = arg.as_scalar()?;
    match (actual, &needle) {
        (AttributeValue::S(s), ScalarValue::S(sub)) => Some(s.contains(sub.as_str())),
        (AttributeValue::B(b), ScalarValue::B(sub)) => Some(
            sub.is_empty() || b.windows(sub.len()).any(|window| window == &sub[..]),
        ),
        (AttributeValue::Ss(set), ScalarValue::S(member)) => Some(set.contains(member)),
        (AttributeValue::Ns(set), ScalarValue::N(member)) => Some(set.contains(member)),
        (AttributeValue::Bs(set), ScalarValue::B(member)) => Some(set.contains(member)),
        (AttributeValue::Map(map), key) if map.key_type == key.scalar_type() => {
            Some(map.entries.contains_key(key))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Update actions
// ---------------------------------------------------------------------------

/// Check action names and operands of `attribute_updates`.
///
/// # Errors
/// Fails on unknown actions, missing PUT values, ADD on strings, binaries
/// and maps, and DELETE with a non-set value.
#[allow(clippy::implicit_hasher)]
pub fn validate_updates(
    updates: &HashMap<String, AttributeValueUpdate>,
    is_key_attribute: impl Fn(&str) -> bool,
) -> Result<(), StorageError> {
    let mut names: Vec<&String> = updates.keys().collect();
    names.sort();
    for name in names {
        let update = &updates[name];
        if is_key_attribute(name) {
            return Err(StorageError::validation(format!(
                "Cannot update attribute {name}. This attribute is part of the key"
            )));
        }
        match (&update.action, &update.value) {
            (AttributeAction::Put, None) => {
                return Err(StorageError::validation(format!(
                    "Value is required for PUT action on attribute '{name}'"
                )));
            }
            (AttributeAction::Add, None) => {
                return Err(StorageError::validation(format!(
                    "Value is required for ADD action on attribute '{name}'"
                )));
            }
            (
                AttributeAction::Add,
                Some(value @ (AttributeValue::S(_) | AttributeValue::B(_) | AttributeValue::Map(_))),
            ) => {
                return Err(StorageError::validation(format!(
                    "ADD action is not supported for type '{}'",
                    value.type_descriptor()
                )));
            }
            (AttributeAction::Delete, Some(value))
                if !matches!(
                    value,
                    AttributeValue::Ss(_) | AttributeValue::Ns(_) | AttributeValue::Bs(_)
                ) =>
            {
                return Err(StorageError::validation(format!(
                    "DELETE action with a value is only supported for sets, but '{}' given",
                    value.type_descriptor()
                )));
            }
            (AttributeAction::Unknown(action), _) => {
                return Err(StorageError::validation(format!(
                    "Attribute action '{action}' is not recognized"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Apply validated updates to an item in place.
///
/// # Errors
/// Fails on type mismatches between ADD or DELETE operands and the stored
/// value, and on numeric overflow.
#[allow(clippy::implicit_hasher)]
pub fn apply_updates(
    item: &mut Item,
    updates: &HashMap<String, AttributeValueUpdate>,
) -> Result<(), StorageError> {
    for (name, update) in updates {
        match (&update.action, &update.value) {
            (AttributeAction::Put, Some(value)) => {
                item.insert(name.clone(), value.clone());
            }
            (AttributeAction::Add, Some(value)) => {
                let merged = match item.remove(name) {
                    None => value.clone(),
                    Some(current) => add_values(name, current, value)?,
                };
                item.insert(name.clone(), merged);
            }
            (AttributeAction::Delete, None) => {
                item.remove(name);
            }
            (AttributeAction::Delete, Some(value)) => {
                if let Some(current) = item.remove(name) {
                    if let Some(remaining) = remove_members(name, current, value)? {
                        item.insert(name.clone(), remaining);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn type_mismatch(name: &str, current: &AttributeValue, operand: &AttributeValue) -> StorageError {
    StorageError::validation(format!(
        "Type mismatch for attribute '{name}': '{}' can't be combined with '{}'",
        current.type_descriptor(),
        operand.type_descriptor()
    ))
}

fn add_values(
    name: &str,
    current: AttributeValue,
    operand: &AttributeValue,
) -> Result<AttributeValue, StorageError> {
    Ok(match (current, operand) {
        (AttributeValue::N(a), AttributeValue::N(b)) => AttributeValue::N(a.checked_add(b)?),
        (AttributeValue::Ss(mut a), AttributeValue::Ss(b)) => {
            a.extend(b.iter().cloned());
            AttributeValue::Ss(a)
        }
        (AttributeValue::Ns(mut a), AttributeValue::Ns(b)) => {
            a.extend(b.iter().cloned());
            AttributeValue::Ns(a)
        }
        (AttributeValue::Bs(mut a), AttributeValue::Bs(b)) => {
            a.extend(b.iter().cloned());
            AttributeValue::Bs(a)
        }
        (current, operand) => return Err(type_mismatch(name, &current, operand)),
    })
}

/// Remove set members; `None` when the set became empty.
fn remove_members(
    name: &str,
    current: AttributeValue,
    operand: &AttributeValue,
) -> Result<Option<AttributeValue>, StorageError> {
    let remaining = match (current, operand) {
        (AttributeValue::Ss(mut a), AttributeValue::Ss(b)) => {
            a.retain(|m| !b.contains(m));
            (!a.is_empty()).then_some(AttributeValue::Ss(a))
        }
        (AttributeValue::Ns(mut a), AttributeValue::Ns(b)) => {
            a.retain(|m| !b.contains(m));
            (!a.is_empty()).then_some(AttributeValue::Ns(a))
        }
        (AttributeValue::Bs(mut a), AttributeValue::Bs(b)) => {
            a.retain(|m| !b.contains(m));
            (!a.is_empty()).then_some(AttributeValue::Bs(a))
        }
        (current, operand) => return Err(type_mismatch(name, &current, operand)),
    };
    Ok(remaining)
}
