//! Query and scan scenarios.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Value, json};

    use crate::Engine;

    async fn forum() -> Engine {
        let engine = Engine::default();
        engine
            .create_table("Thread", &[("ForumName", "S"), ("Subject", "S")], true)
            .await;
        for subject in ["S3 Thread 1", "DynamoDB Thread 2", "DynamoDB Thread 1"] {
            engine
                .put(
                    "Thread",
                    json!({
                        "ForumName": {"S": "Amazon DynamoDB"},
                        "Subject": {"S": subject},
                        "Replies": {"N": "0"}
                    }),
                )
                .await;
        }
        engine
            .put(
                "Thread",
                json!({"ForumName": {"S": "Amazon S3"}, "Subject": {"S": "DynamoDB Thread 9"}}),
            )
            .await;
        engine
    }

    fn subjects(body: &Value) -> Vec<String> {
        body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| item["Subject"]["S"].as_str().unwrap_or_default().to_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_should_query_thread_subjects_by_prefix() {
        let engine = forum().await;
        let key_conditions = json!({
            "ForumName": {
                "attribute_value_list": [{"S": "Amazon DynamoDB"}],
                "comparison_operator": "EQ"
            },
            "Subject": {
                "attribute_value_list": [{"S": "DynamoDB"}],
                "comparison_operator": "BEGINS_WITH"
            }
        });

        let body = engine
            .ok("query", "Thread", json!({"key_conditions": key_conditions}))
            .await;
        assert_eq!(body["count"], 2);
        assert_eq!(
            subjects(&body),
            vec!["DynamoDB Thread 1".to_owned(), "DynamoDB Thread 2".to_owned()]
        );

        let body = engine
            .ok(
                "query",
                "Thread",
                json!({"key_conditions": key_conditions, "scan_index_forward": false}),
            )
            .await;
        assert_eq!(
            subjects(&body),
            vec!["DynamoDB Thread 2".to_owned(), "DynamoDB Thread 1".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_should_page_query_with_exclusive_start_key() {
        let engine = forum().await;
        let key_conditions = json!({
            "ForumName": {
                "attribute_value_list": [{"S": "Amazon DynamoDB"}],
                "comparison_operator": "EQ"
            }
        });

        let mut seen = Vec::new();
        let mut start: Option<Value> = None;
        for _ in 0..5 {
            let mut body = json!({"key_conditions": key_conditions, "limit": 2});
            if let Some(key) = start.take() {
                body["exclusive_start_key"] = key;
            }
            let page = engine.ok("query", "Thread", body).await;
            seen.extend(subjects(&page));
            match page.get("last_evaluated_key") {
                Some(key) if !key.is_null() => start = Some(key.clone()),
                _ => break,
            }
        }
        assert_eq!(
            seen,
            vec![
                "DynamoDB Thread 1".to_owned(),
                "DynamoDB Thread 2".to_owned(),
                "S3 Thread 1".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn test_should_match_numeric_between_bounds() {
        let engine = Engine::default();
        engine
            .create_table("readings", &[("sensor", "S"), ("at", "N")], true)
            .await;
        engine
            .put("readings", json!({"sensor": {"S": "s1"}, "at": {"N": "1"}}))
            .await;

        let between = |low: &str, high: &str| {
            json!({
                "key_conditions": {
                    "sensor": {"attribute_value_list": [{"S": "s1"}], "comparison_operator": "EQ"},
                    "at": {
                        "attribute_value_list": [{"N": low}, {"N": high}],
                        "comparison_operator": "BETWEEN"
                    }
                },
                "select": "COUNT"
            })
        };

        let body = engine.ok("query", "readings", between("1", "1")).await;
        assert_eq!(body["count"], 1);
        assert!(body.get("items").is_none_or(Value::is_null));

        let body = engine.ok("query", "readings", between("2", "3")).await;
        assert_eq!(body["count"], 0);

        let body = engine.ok("query", "readings", between("0.5", "1.00")).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_should_split_scan_into_disjoint_segments() {
        let engine = Engine::default();
        engine.create_table("logs", &[("id", "S")], false).await;
        for i in 0..40 {
            engine
                .put("logs", json!({"id": {"S": format!("log-{i}")}, "n": {"N": i.to_string()}}))
                .await;
        }

        let mut ids = BTreeSet::new();
        let mut total = 0;
        for segment in 0..4 {
            let body = engine
                .ok(
                    "scan",
                    "logs",
                    json!({"segment": segment, "total_segments": 4}),
                )
                .await;
            total += body["count"].as_u64().unwrap();
            for item in body["items"].as_array().unwrap() {
                assert!(ids.insert(item["id"]["S"].as_str().unwrap().to_owned()));
            }
        }
        assert_eq!(total, 40);
        assert_eq!(ids.len(), 40);

        let body = engine
            .ok(
                "scan",
                "logs",
                json!({
                    "scan_filter": {
                        "n": {"attribute_value_list": [{"N": "35"}], "comparison_operator": "GE"}
                    }
                }),
            )
            .await;
        assert_eq!(body["count"], 5);
        assert_eq!(body["scanned_count"], 40);
    }
}
