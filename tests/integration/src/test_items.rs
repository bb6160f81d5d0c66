//! Item reads and writes, including concurrent conditional updates.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::Engine;

    async fn counters() -> Engine {
        let engine = Engine::default();
        engine.create_table("counters", &[("id", "S")], false).await;
        engine
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_not_lose_concurrent_add_updates() {
        let engine = counters().await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..200 {
            let engine = engine.clone();
            tasks.spawn(async move {
                engine
                    .ok(
                        "update_item",
                        "counters",
                        json!({
                            "key": {"id": {"S": "hits"}},
                            "attribute_updates": {"n": {"action": "ADD", "value": {"N": "1"}}}
                        }),
                    )
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        let got = engine
            .ok("get_item", "counters", json!({"key": {"id": {"S": "hits"}}}))
            .await;
        assert_eq!(got["item"]["n"], json!({"N": "200"}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_should_let_one_conditional_creator_win() {
        let engine = counters().await;

        let attempt = |owner: &'static str| {
            let engine = engine.clone();
            async move {
                engine
                    .call(
                        "update_item",
                        Some("counters"),
                        json!({
                            "key": {"id": {"S": "lock"}},
                            "attribute_updates": {"owner": {"action": "PUT", "value": {"S": owner}}},
                            "expected": {"owner": {"exists": false}}
                        }),
                    )
                    .await
            }
        };
        let (a, b) = tokio::join!(tokio::spawn(attempt("a")), tokio::spawn(attempt("b")));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.is_success(), b.is_success());
        let loser = if a.is_success() { &b } else { &a };
        assert_eq!(loser.status, 400);
        assert_eq!(
            loser.body["error"]["type"],
            "ConditionalCheckFailedException"
        );

        let winner = if a.is_success() { "a" } else { "b" };
        let got = engine
            .ok("get_item", "counters", json!({"key": {"id": {"S": "lock"}}}))
            .await;
        assert_eq!(got["item"]["owner"], json!({"S": winner}));
    }

    #[tokio::test]
    async fn test_should_round_trip_typed_maps_and_sets() {
        let engine = counters().await;
        engine
            .put(
                "counters",
                json!({
                    "id": {"S": "maps"},
                    "scores": {"NNM": {"345": 1, "546": "345"}},
                    "labels": {"SSM": {"a": "x"}},
                    "nums": {"NS": ["1", "1.0", "01", "2"]},
                    "big": {"N": "007.50"}
                }),
            )
            .await;

        let got = engine
            .ok("get_item", "counters", json!({"key": {"id": {"S": "maps"}}}))
            .await;
        let item = &got["item"];
        assert_eq!(item["scores"], json!({"NNM": {"345": "1", "546": "345"}}));
        assert_eq!(item["labels"], json!({"SSM": {"a": "x"}}));
        assert_eq!(item["nums"], json!({"NS": ["1", "2"]}));
        assert_eq!(item["big"], json!({"N": "7.5"}));
    }

    #[tokio::test]
    async fn test_should_apply_add_and_delete_actions() {
        let engine = counters().await;
        engine
            .put(
                "counters",
                json!({"id": {"S": "u1"}, "tags": {"SS": ["a"]}, "n": {"N": "1.5"}}),
            )
            .await;

        let body = engine
            .ok(
                "update_item",
                "counters",
                json!({
                    "key": {"id": {"S": "u1"}},
                    "attribute_updates": {
                        "tags": {"action": "ADD", "value": {"SS": ["c", "b"]}},
                        "n": {"action": "ADD", "value": {"N": "-0.5"}},
                        "fresh": {"action": "ADD", "value": {"N": "3"}}
                    },
                    "return_values": "ALL_NEW"
                }),
            )
            .await;
        let item = &body["attributes"];
        assert_eq!(item["tags"], json!({"SS": ["a", "b", "c"]}));
        assert_eq!(item["n"], json!({"N": "1"}));
        assert_eq!(item["fresh"], json!({"N": "3"}));

        let body = engine
            .ok(
                "update_item",
                "counters",
                json!({
                    "key": {"id": {"S": "u1"}},
                    "attribute_updates": {
                        "tags": {"action": "DELETE", "value": {"SS": ["a", "b", "c"]}},
                        "fresh": {"action": "DELETE"}
                    },
                    "return_values": "ALL_NEW"
                }),
            )
            .await;
        let item = body["attributes"].as_object().unwrap();
        assert!(!item.contains_key("tags"));
        assert!(!item.contains_key("fresh"));

        let (status, message) = engine
            .err(
                "update_item",
                Some("counters"),
                json!({
                    "key": {"id": {"S": "u1"}},
                    "attribute_updates": {"n": {"action": "ADD", "value": {"NS": ["1"]}}}
                }),
            )
            .await;
        assert_eq!(status, 400);
        assert!(message.starts_with("Type mismatch for attribute 'n'"), "{message}");
    }

    #[tokio::test]
    async fn test_should_reject_put_for_missing_table() {
        let engine = Engine::default();
        let resp = engine
            .call(
                "put_item",
                Some("absent"),
                json!({"item": {"id": {"S": "x"}}}),
            )
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body["error"]["type"], "TableNotExistsException");
        assert_eq!(resp.body["title"], Value::from("Not Found"));
    }
}
