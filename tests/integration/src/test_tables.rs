//! Table lifecycle, listing and schema validation.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{Engine, table_body};

    fn with_indexes(name: &str, count: usize) -> Value {
        let mut attributes = vec![("user".to_owned(), "S"), ("at".to_owned(), "N")];
        attributes.extend((0..count).map(|i| (format!("attr{i}"), "S")));
        let refs: Vec<(&str, &str)> = attributes.iter().map(|(n, t)| (n.as_str(), *t)).collect();
        let mut body = table_body(name, &refs, true);
        let indexes: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "index_name": format!("by_attr{i}"),
                    "key_schema": [
                        {"attribute_name": "user", "key_type": "HASH"},
                        {"attribute_name": format!("attr{i}"), "key_type": "RANGE"}
                    ],
                    "projection": {"projection_type": "ALL"}
                })
            })
            .collect();
        body["local_secondary_indexes"] = Value::Array(indexes);
        body
    }

    #[tokio::test]
    async fn test_should_page_through_table_list() {
        let engine = Engine::default();
        for i in 0..10 {
            engine
                .create_table(&format!("table_{i:02}"), &[("id", "S")], false)
                .await;
        }

        let mut pages = 0;
        let mut names = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let mut body = json!({"limit": 3});
            if let Some(name) = start.take() {
                body["exclusive_start_table_name"] = Value::String(name);
            }
            let resp = engine.call("list_tables", None, body).await;
            assert!(resp.is_success(), "{}", resp.body);
            pages += 1;
            let tables = resp.body["tables"].as_array().unwrap();
            assert!(tables.len() <= 3);
            for link in tables {
                assert_eq!(link["rel"], "self");
                let href = link["href"].as_str().unwrap();
                names.push(href.rsplit('/').next().unwrap().to_owned());
            }
            match resp.body["last_evaluated_table_name"].as_str() {
                Some(last) => start = Some(last.to_owned()),
                None => break,
            }
        }

        assert_eq!(pages, 4);
        let expected: Vec<String> = (0..10).map(|i| format!("table_{i:02}")).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_should_accept_zero_to_five_local_indexes() {
        let engine = Engine::default();

        let mut body = with_indexes("lsi_none", 0);
        body.as_object_mut()
            .unwrap()
            .remove("local_secondary_indexes");
        assert!(engine.call("create_table", None, body).await.is_success());

        for count in [1, 5] {
            let name = format!("lsi_{count}");
            let resp = engine
                .call("create_table", None, with_indexes(&name, count))
                .await;
            assert!(resp.is_success(), "{}", resp.body);
            let described = engine.ok("describe_table", &name, json!({})).await;
            assert_eq!(
                described["table"]["local_secondary_indexes"]
                    .as_array()
                    .unwrap()
                    .len(),
                count
            );
        }

        for count in [0, 6] {
            let (status, message) = engine
                .err("create_table", None, with_indexes("lsi_bad", count))
                .await;
            assert_eq!(status, 400);
            assert_eq!(
                message,
                format!("Table can have from 1 to 5 indices, but {count} given")
            );
        }
    }

    #[tokio::test]
    async fn test_should_validate_table_names() {
        let engine = Engine::default();
        let longest = "t".repeat(255);
        let too_long = "t".repeat(256);
        for good in ["abc", "My.Table-1_x", longest.as_str()] {
            let resp = engine
                .call("create_table", None, table_body(good, &[("id", "S")], false))
                .await;
            assert!(resp.is_success(), "{good}: {}", resp.body);
        }
        for bad in ["ab", "has space", "ünïcode", too_long.as_str()] {
            let (status, message) = engine
                .err("create_table", None, table_body(bad, &[("id", "S")], false))
                .await;
            assert_eq!(status, 400);
            assert_eq!(message, format!("Wrong table name '{bad}' found"));
        }

        let (status, _) = engine
            .err("describe_table", Some("x"), json!({}))
            .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_should_create_and_delete_table() {
        let engine = Engine::default();
        engine.create_table("gone", &[("id", "S")], false).await;
        engine.put("gone", json!({"id": {"S": "a"}})).await;

        let described = engine.ok("describe_table", "gone", json!({})).await;
        assert_eq!(described["table"]["table_status"], "ACTIVE");
        assert_eq!(described["table"]["item_count"], 1);

        let deleted = engine.ok("delete_table", "gone", json!({})).await;
        assert_eq!(deleted["table_description"]["table_status"], "DELETING");

        let resp = engine.call("describe_table", Some("gone"), json!({})).await;
        assert_eq!(resp.status, 404);

        engine.create_table("gone", &[("id", "S")], false).await;
        let scanned = engine.ok("scan", "gone", json!({})).await;
        assert_eq!(scanned["count"], 0);
    }
}
