//! Query and scan operations.

use std::collections::HashMap;

use tracing::debug;

use magnetodb_core::ProjectId;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::input::{QueryInput, ScanInput};
use magnetodb_model::output::{QueryOutput, ScanOutput};
use magnetodb_model::types::{ComparisonOperator, Condition, Item, Select};
use magnetodb_model::{AttributeValue, ScalarValue};

use crate::condition::{condition_matches, validate_condition};
use crate::error::{StorageError, storage_error_to_magneto};
use crate::provider::MagnetoProvider;
use crate::schema::{KeySchema, parse_index_key, parse_key, select_attributes};
use crate::storage::{QuerySpec, ScanSpec, SortKeyCondition, StartPosition};
use crate::validation::{
    validate_attribute_name, validate_attribute_names, validate_index_name, validate_integer,
};

/// Largest accepted `total_segments`.
pub const MAX_TOTAL_SEGMENTS: i64 = 4096;

impl MagnetoProvider {
    /// Handle `query`.
    pub fn handle_query(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        input: QueryInput,
    ) -> Result<QueryOutput, MagnetoError> {
        let table = self.data_table(project_id, table_name)?;
        let schema = &table.schema;

        let index = match &input.index_name {
            Some(name) => {
                validate_index_name(name)?;
                let found = schema.index(name).ok_or_else(|| {
                    MagnetoError::validation(format!(
                        "Index '{name}' doesn't exist for table '{table_name}'"
                    ))
                })?;
                Some(found)
            }
            None => None,
        };

        let attributes = non_empty(input.attributes_to_get.as_deref());
        if let Some(names) = attributes {
            validate_attribute_names(names)?;
        }
        let select = resolve_select(input.select.as_ref(), attributes, index.is_some())?;

        let (target, target_kind) = match index {
            Some((_, index)) => (index.key_schema(&schema.key_schema), "index"),
            None => (schema.key_schema.clone(), "table"),
        };
        let (hash, condition) = parse_key_conditions(&input.key_conditions, &target, target_kind)?;

        let limit = page_limit(input.limit)?;
        let start = match (&input.exclusive_start_key, index) {
            (None, _) => None,
            (Some(key), None) => {
                let primary =
                    parse_key(&schema.key_schema, key).map_err(storage_error_to_magneto)?;
                check_start_hash(&primary.hash, &hash)?;
                Some(StartPosition::Table(primary.range))
            }
            (Some(key), Some((_, index))) => {
                let (value, primary) = parse_index_key(&schema.key_schema, index, key)
                    .map_err(storage_error_to_magneto)?;
                check_start_hash(&primary.hash, &hash)?;
                Some(StartPosition::Index((value, primary.range)))
            }
        };

        let page = table.storage.query(&QuerySpec {
            hash: &hash,
            index: index.map(|(position, _)| position),
            condition: condition.as_ref(),
            forward: input.scan_index_forward.unwrap_or(true),
            exclusive_start: start.as_ref(),
            limit,
        });

        let last_evaluated_key = page.last_position.map(|(primary, index_value)| {
            let mut key = primary.to_key(&schema.key_schema);
            if let (Some((_, index)), Some(value)) = (index, index_value) {
                key.insert(index.range.name.clone(), value.into_attribute_value());
            }
            key
        });

        let count = page.items.len();
        let items = shape_items(page.items, &select, attributes, |item| match index {
            Some((_, index)) => index.project(&item, &schema.key_schema),
            None => item,
        });

        debug!(table = %table_name, count, index = ?input.index_name, "query");
        Ok(QueryOutput {
            count,
            items,
            last_evaluated_key,
        })
    }

    /// Handle `scan`.
    pub fn handle_scan(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        input: ScanInput,
    ) -> Result<ScanOutput, MagnetoError> {
        let table = self.data_table(project_id, table_name)?;
        let schema = &table.schema;

        let attributes = non_empty(input.attributes_to_get.as_deref());
        if let Some(names) = attributes {
            validate_attribute_names(names)?;
        }
        let select = resolve_select(input.select.as_ref(), attributes, false)?;

        let filter = input.scan_filter.unwrap_or_default();
        validate_filter(&filter)?;

        let total_segments = validate_integer(
            "total_segments",
            input.total_segments.unwrap_or(1),
            Some(1),
            Some(MAX_TOTAL_SEGMENTS),
        )?;
        let segment = validate_integer(
            "segment",
            input.segment.unwrap_or(0),
            Some(0),
            Some(total_segments - 1),
        )?;
        let limit = page_limit(input.limit)?;
        let start = input
            .exclusive_start_key
            .as_ref()
            .map(|key| parse_key(&schema.key_schema, key))
            .transpose()
            .map_err(storage_error_to_magneto)?;

        let page = table.storage.scan(&ScanSpec {
            segment: u32::try_from(segment).unwrap_or(0),
            total_segments: u32::try_from(total_segments).unwrap_or(1),
            exclusive_start: start.as_ref(),
            limit,
        });

        let scanned_count = page.items.len();
        let matched: Vec<Item> = page
            .items
            .into_iter()
            .filter(|item| {
                filter
                    .iter()
                    .all(|(name, condition)| condition_matches(condition, item.get(name)))
            })
            .collect();
        let count = matched.len();
        let items = shape_items(matched, &select, attributes, |item| item);
        let last_evaluated_key = page.last_key.map(|key| key.to_key(&schema.key_schema));

        debug!(table = %table_name, count, scanned_count, segment, "scan");
        Ok(ScanOutput {
            count,
            scanned_count,
            items,
            last_evaluated_key,
        })
    }
}

fn non_empty(names: Option<&[String]>) -> Option<&[String]> {
    names.filter(|names| !names.is_empty())
}

/// Resolve the effective `select` and check it against `attributes_to_get`.
fn resolve_select(
    select: Option<&Select>,
    attributes: Option<&[String]>,
    index_query: bool,
) -> Result<Select, MagnetoError> {
    let select = match select {
        Some(select) => select.clone(),
        None if attributes.is_some() => Select::SpecificAttributes,
        None if index_query => Select::AllProjectedAttributes,
        None => Select::AllAttributes,
    };
    match (&select, attributes) {
        (Select::Unknown(value), _) => Err(MagnetoError::validation(format!(
            "Select type '{value}' is not recognized"
        ))),
        (Select::SpecificAttributes, None) => Err(MagnetoError::validation(
            "Attribute list is required for select_type 'SPECIFIC_ATTRIBUTES'",
        )),
        (Select::SpecificAttributes, Some(_)) => Ok(select),
        (_, Some(_)) => Err(MagnetoError::validation(
            "Attribute list is only expected with select_type 'SPECIFIC_ATTRIBUTES'",
        )),
        (Select::AllProjectedAttributes, None) if !index_query => Err(MagnetoError::validation(
            "Select type 'ALL_PROJECTED_ATTRIBUTES' requires an index",
        )),
        _ => Ok(select),
    }
}

/// Apply the select type to result items. `COUNT` yields no item list.
fn shape_items(
    items: Vec<Item>,
    select: &Select,
    attributes: Option<&[String]>,
    project: impl Fn(Item) -> Item,
) -> Option<Vec<Item>> {
    match (select, attributes) {
        (Select::Count, _) => None,
        (Select::SpecificAttributes, Some(names)) => Some(
            items
                .iter()
                .map(|item| select_attributes(item, names))
                .collect(),
        ),
        (Select::AllProjectedAttributes, _) => Some(items.into_iter().map(project).collect()),
        _ => Some(items),
    }
}

/// Zero or absent means unlimited.
fn page_limit(limit: Option<i64>) -> Result<Option<usize>, MagnetoError> {
    let Some(limit) = limit else {
        return Ok(None);
    };
    let limit = validate_integer("limit", limit, Some(0), None)?;
    Ok(usize::try_from(limit).ok().filter(|l| *l > 0))
}

fn check_start_hash(start: &ScalarValue, hash: &ScalarValue) -> Result<(), MagnetoError> {
    if start == hash {
        Ok(())
    } else {
        Err(MagnetoError::validation(
            "Exclusive start key doesn't match the HASH key condition",
        ))
    }
}

/// Split key conditions into the hash value and an optional range condition.
fn parse_key_conditions(
    conditions: &HashMap<String, Condition>,
    target: &KeySchema,
    target_kind: &str,
) -> Result<(ScalarValue, Option<SortKeyCondition>), MagnetoError> {
    let mismatch =
        || MagnetoError::validation(format!("Key condition doesn't match {target_kind} schema"));

    if conditions.keys().any(|name| !target.is_key_attribute(name)) {
        return Err(mismatch());
    }

    let hash_condition = conditions.get(&target.hash.name).ok_or_else(mismatch)?;
    validate_condition(hash_condition).map_err(storage_error_to_magneto)?;
    if hash_condition.comparison_operator != ComparisonOperator::Eq {
        return Err(MagnetoError::validation(format!(
            "Operator '{}' is not allowed for HASH key attribute '{}'",
            hash_condition.comparison_operator, target.hash.name
        )));
    }
    let hash = first_operand(key_operands(hash_condition, |value| target.hash.check(value))?)?;

    let Some(range) = &target.range else {
        return Ok((hash, None));
    };
    let Some(range_condition) = conditions.get(&range.name) else {
        return Ok((hash, None));
    };
    validate_condition(range_condition).map_err(storage_error_to_magneto)?;
    let op = &range_condition.comparison_operator;
    if !op.is_key_operator() {
        return Err(MagnetoError::validation(format!(
            "Operator '{op}' is not allowed for RANGE key attribute '{}'",
            range.name
        )));
    }
    let mut values = key_operands(range_condition, |value| range.check(value))?;

    let condition = if *op == ComparisonOperator::Between {
        let high = values.pop();
        let low = values.pop();
        match (low, high) {
            (Some(low), Some(high)) => SortKeyCondition::Between(low, high),
            _ => return Err(missing_operand()),
        }
    } else {
        let value = first_operand(values)?;
        match op {
            ComparisonOperator::Eq => SortKeyCondition::Eq(value),
            ComparisonOperator::Lt => SortKeyCondition::Lt(value),
            ComparisonOperator::Le => SortKeyCondition::Le(value),
            ComparisonOperator::Gt => SortKeyCondition::Gt(value),
            ComparisonOperator::Ge => SortKeyCondition::Ge(value),
            _ => SortKeyCondition::BeginsWith(value),
        }
    };
    Ok((hash, Some(condition)))
}

/// Type-check every operand of a key condition against the key attribute.
fn key_operands(
    condition: &Condition,
    check: impl Fn(&AttributeValue) -> Result<ScalarValue, StorageError>,
) -> Result<Vec<ScalarValue>, MagnetoError> {
    condition
        .attribute_value_list
        .iter()
        .map(check)
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage_error_to_magneto)
}

fn first_operand(values: Vec<ScalarValue>) -> Result<ScalarValue, MagnetoError> {
    values.into_iter().next().ok_or_else(missing_operand)
}

fn missing_operand() -> MagnetoError {
    MagnetoError::validation("Key condition is missing an operand")
}

fn validate_filter(filter: &HashMap<String, Condition>) -> Result<(), MagnetoError> {
    let mut names: Vec<&String> = filter.keys().collect();
    names.sort();
    for name in names {
        validate_attribute_name(name)?;
        validate_condition(&filter[name]).map_err(storage_error_to_magneto)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use magnetodb_model::error::MagnetoErrorCode;
    use magnetodb_model::input::{CreateTableInput, PutItemInput};
    use magnetodb_model::types::{
        AttributeDefinition, AttributeType, KeySchemaElement, KeyType, LocalSecondaryIndex,
        Projection, ProjectionType,
    };
    use magnetodb_model::Decimal;

    use super::*;
    use crate::config::StorageConfig;

    fn project() -> ProjectId {
        ProjectId::default()
    }

    fn eq(value: AttributeValue) -> Condition {
        cond(ComparisonOperator::Eq, vec![value])
    }

    fn cond(op: ComparisonOperator, values: Vec<AttributeValue>) -> Condition {
        Condition {
            attribute_value_list: values,
            comparison_operator: op,
        }
    }

    fn num(n: i64) -> AttributeValue {
        AttributeValue::N(Decimal::from(n))
    }

    /// Table `posts`: forum (S) / subject (S), index `by_author` on author (S)
    /// projecting `title`.
    fn setup() -> MagnetoProvider {
        let provider = MagnetoProvider::new(StorageConfig::default());
        let def = |n: &str, t: AttributeType| AttributeDefinition {
            attribute_name: n.to_owned(),
            attribute_type: t,
        };
        let key = |n: &str, t: KeyType| KeySchemaElement {
            attribute_name: n.to_owned(),
            key_type: t,
        };
        provider
            .handle_create_table(
                &project(),
                CreateTableInput {
                    table_name: Some("posts".to_owned()),
                    attribute_definitions: Some(vec![
                        def("forum", AttributeType::S),
                        def("subject", AttributeType::S),
                        def("author", AttributeType::S),
                    ]),
                    key_schema: Some(vec![
                        key("forum", KeyType::Hash),
                        key("subject", KeyType::Range),
                    ]),
                    local_secondary_indexes: Some(vec![LocalSecondaryIndex {
                        index_name: "by_author".to_owned(),
                        key_schema: vec![key("forum", KeyType::Hash), key("author", KeyType::Range)],
                        projection: Some(Projection {
                            projection_type: ProjectionType::Include,
                            non_key_attributes: Some(vec!["title".to_owned()]),
                        }),
                    }]),
                },
            )
            .unwrap();
        for (forum, subject, author) in [
            ("f1", "subject1", "carol"),
            ("f1", "subject2", "alice"),
            ("f1", "subject3", "bob"),
            ("f1", "other", "dave"),
            ("f2", "subject1", "erin"),
        ] {
            let item: Item = [
                ("forum".to_owned(), forum.into()),
                ("subject".to_owned(), subject.into()),
                ("author".to_owned(), author.into()),
                ("title".to_owned(), format!("{subject} by {author}").into()),
                ("body".to_owned(), "text".into()),
            ]
            .into();
            provider
                .handle_put_item(
                    &project(),
                    "posts",
                    PutItemInput {
                        item,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        provider
    }

    fn query(provider: &MagnetoProvider, input: QueryInput) -> Result<QueryOutput, MagnetoError> {
        provider.handle_query(&project(), "posts", input)
    }

    fn strings(items: &[Item], attr: &str) -> Vec<String> {
        items
            .iter()
            .map(|item| item[attr].as_s().unwrap_or_default().to_owned())
            .collect()
    }

    #[test]
    fn test_should_query_with_begins_with() {
        let provider = setup();
        let out = query(
            &provider,
            QueryInput {
                key_conditions: [
                    ("forum".to_owned(), eq("f1".into())),
                    (
                        "subject".to_owned(),
                        cond(ComparisonOperator::BeginsWith, vec!["subject".into()]),
                    ),
                ]
                .into(),
                consistent_read: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(out.count, 3);
        let items = out.items.unwrap();
        assert_eq!(strings(&items, "subject"), ["subject1", "subject2", "subject3"]);
        assert_eq!(items[0].len(), 5);
        assert!(out.last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_query_backwards_with_pagination() {
        let provider = setup();
        let base = QueryInput {
            key_conditions: [("forum".to_owned(), eq("f1".into()))].into(),
            scan_index_forward: Some(false),
            limit: Some(3),
            ..Default::default()
        };
        let first = query(&provider, base.clone()).unwrap();
        assert_eq!(
            strings(first.items.as_ref().unwrap(), "subject"),
            ["subject3", "subject2", "subject1"]
        );
        let start = first.last_evaluated_key.unwrap();
        assert_eq!(start.len(), 2);

        let second = query(
            &provider,
            QueryInput {
                exclusive_start_key: Some(start),
                ..base
            },
        )
        .unwrap();
        assert_eq!(strings(second.items.as_ref().unwrap(), "subject"), ["other"]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[test]
    fn test_should_query_index_with_projection() {
        let provider = setup();
        let out = query(
            &provider,
            QueryInput {
                key_conditions: [
                    ("forum".to_owned(), eq("f1".into())),
                    (
                        "author".to_owned(),
                        cond(ComparisonOperator::Le, vec!["carol".into()]),
                    ),
                ]
                .into(),
                index_name: Some("by_author".to_owned()),
                limit: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        let items = out.items.unwrap();
        assert_eq!(strings(&items, "author"), ["alice", "bob"]);
        assert_eq!(items[0].len(), 4);
        assert!(!items[0].contains_key("body"));

        let last = out.last_evaluated_key.unwrap();
        assert_eq!(last.len(), 3);
        assert_eq!(last["author"], AttributeValue::from("bob"));

        let next = query(
            &provider,
            QueryInput {
                key_conditions: [
                    ("forum".to_owned(), eq("f1".into())),
                    (
                        "author".to_owned(),
                        cond(ComparisonOperator::Le, vec!["carol".into()]),
                    ),
                ]
                .into(),
                index_name: Some("by_author".to_owned()),
                select: Some(Select::AllAttributes),
                exclusive_start_key: Some(last),
                ..Default::default()
            },
        )
        .unwrap();
        let items = next.items.unwrap();
        assert_eq!(strings(&items, "author"), ["carol"]);
        assert!(items[0].contains_key("body"));
    }

    #[test]
    fn test_should_count_without_items() {
        let provider = setup();
        let out = query(
            &provider,
            QueryInput {
                key_conditions: [("forum".to_owned(), eq("f1".into()))].into(),
                select: Some(Select::Count),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(out.count, 4);
        assert!(out.items.is_none());
    }

    #[test]
    fn test_should_reject_invalid_key_conditions() {
        let provider = setup();
        let err = query(
            &provider,
            QueryInput {
                key_conditions: [("body".to_owned(), eq("x".into()))].into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.message, "Key condition doesn't match table schema");

        let err = query(
            &provider,
            QueryInput {
                key_conditions: [
                    ("forum".to_owned(), eq("f1".into())),
                    ("author".to_owned(), eq("bob".into())),
                ]
                .into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.message, "Key condition doesn't match table schema");

        let err = query(
            &provider,
            QueryInput {
                key_conditions: [(
                    "forum".to_owned(),
                    cond(ComparisonOperator::Gt, vec!["f1".into()]),
                )]
                .into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, MagnetoErrorCode::ValidationError);

        let err = query(
            &provider,
            QueryInput {
                key_conditions: [
                    ("forum".to_owned(), eq("f1".into())),
                    (
                        "subject".to_owned(),
                        cond(ComparisonOperator::Between, vec!["a".into()]),
                    ),
                ]
                .into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.message, "BETWEEN requires exactly 2 argument(s), but 1 given");

        let err = query(
            &provider,
            QueryInput {
                key_conditions: [("forum".to_owned(), eq(num(1)))].into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, MagnetoErrorCode::ValidationError);
    }

    #[test]
    fn test_should_validate_select_and_index() {
        let provider = setup();
        let hash_only = || [("forum".to_owned(), eq("f1".into()))].into();

        let err = query(
            &provider,
            QueryInput {
                key_conditions: hash_only(),
                index_name: Some("missing".to_owned()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.message, "Index 'missing' doesn't exist for table 'posts'");

        let err = query(
            &provider,
            QueryInput {
                key_conditions: hash_only(),
                attributes_to_get: Some(vec!["title".to_owned()]),
                select: Some(Select::AllAttributes),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(
            err.message,
            "Attribute list is only expected with select_type 'SPECIFIC_ATTRIBUTES'"
        );

        let err = query(
            &provider,
            QueryInput {
                key_conditions: hash_only(),
                select: Some(Select::AllProjectedAttributes),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, MagnetoErrorCode::ValidationError);

        let out = query(
            &provider,
            QueryInput {
                key_conditions: hash_only(),
                attributes_to_get: Some(vec!["title".to_owned()]),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(out.items.unwrap().iter().all(|item| item.len() == 1));
    }

    #[test]
    fn test_should_scan_with_filter() {
        let provider = setup();
        let out = provider
            .handle_scan(
                &project(),
                "posts",
                ScanInput {
                    scan_filter: Some(
                        [(
                            "author".to_owned(),
                            cond(
                                ComparisonOperator::In,
                                vec!["alice".into(), "erin".into(), "zed".into()],
                            ),
                        )]
                        .into(),
                    ),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(out.scanned_count, 5);
        assert_eq!(out.count, 2);
    }

    #[test]
    fn test_should_scan_pages_with_limit() {
        let provider = setup();
        let mut seen = Vec::new();
        let mut start = None;
        loop {
            let out = provider
                .handle_scan(
                    &project(),
                    "posts",
                    ScanInput {
                        limit: Some(2),
                        exclusive_start_key: start.take(),
                        ..Default::default()
                    },
                )
                .unwrap();
            assert!(out.scanned_count <= 2);
            seen.extend(out.items.unwrap());
            match out.last_evaluated_key {
                Some(key) => start = Some(key),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_should_validate_segments() {
        let provider = setup();
        let err = provider
            .handle_scan(
                &project(),
                "posts",
                ScanInput {
                    segment: Some(3),
                    total_segments: Some(3),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            err.message,
            "'segment' property value[3] is more then max_value[2]."
        );

        let err = provider
            .handle_scan(
                &project(),
                "posts",
                ScanInput {
                    total_segments: Some(4097),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, MagnetoErrorCode::ValidationError);

        let total: usize = (0..3)
            .map(|segment| {
                provider
                    .handle_scan(
                        &project(),
                        "posts",
                        ScanInput {
                            segment: Some(segment),
                            total_segments: Some(3),
                            ..Default::default()
                        },
                    )
                    .unwrap()
                    .count
            })
            .sum();
        assert_eq!(total, 5);
    }
}
