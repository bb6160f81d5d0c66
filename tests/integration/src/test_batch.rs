//! Batch and bulk load scenarios.

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use serde_json::{Value, json};

    use crate::Engine;

    async fn orders() -> Engine {
        let engine = Engine::default();
        engine
            .create_table("orders", &[("customer", "S"), ("order", "N")], true)
            .await;
        engine
    }

    fn put(customer: &str, order: u32) -> Value {
        json!({"put_request": {"item": {
            "customer": {"S": customer},
            "order": {"N": order.to_string()},
            "total": {"N": "9.99"}
        }}})
    }

    #[tokio::test]
    async fn test_should_write_and_read_batches() {
        let engine = orders().await;
        let resp = engine
            .call(
                "batch_write_item",
                None,
                json!({"request_items": {"orders": [put("ann", 1), put("ann", 2), put("bob", 1)]}}),
            )
            .await;
        assert!(resp.is_success(), "{}", resp.body);
        assert_eq!(resp.body["unprocessed_items"], json!({}));

        let resp = engine
            .call(
                "batch_get_item",
                None,
                json!({"request_items": {"orders": {
                    "keys": [
                        {"customer": {"S": "ann"}, "order": {"N": "2"}},
                        {"customer": {"S": "bob"}, "order": {"N": "1"}},
                        {"customer": {"S": "cid"}, "order": {"N": "1"}}
                    ],
                    "attributes_to_get": ["order"]
                }}}),
            )
            .await;
        assert!(resp.is_success(), "{}", resp.body);
        let mut orders: Vec<String> = resp.body["responses"]["orders"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| {
                assert_eq!(item.as_object().unwrap().len(), 1);
                item["order"]["N"].as_str().unwrap().to_owned()
            })
            .collect();
        orders.sort();
        assert_eq!(orders, vec!["1".to_owned(), "2".to_owned()]);
    }

    #[tokio::test]
    async fn test_should_apply_existing_tables_before_reporting_absent_one() {
        let engine = orders().await;
        let resp = engine
            .call(
                "batch_write_item",
                None,
                json!({"request_items": {
                    "absent": [put("x", 1)],
                    "orders": [put("ann", 1), {"delete_request": {"key": {
                        "customer": {"S": "ann"}, "order": {"N": "7"}
                    }}}]
                }}),
            )
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body["error"]["type"], "TableNotExistsException");

        let got = engine
            .ok(
                "get_item",
                "orders",
                json!({"key": {"customer": {"S": "ann"}, "order": {"N": "1"}}}),
            )
            .await;
        assert_eq!(got["item"]["total"], json!({"N": "9.99"}));
    }

    #[tokio::test]
    async fn test_should_reject_whole_batch_on_invalid_request() {
        let engine = orders().await;
        let (status, message) = engine
            .err(
                "batch_write_item",
                None,
                json!({"request_items": {"orders": [
                    put("ann", 1),
                    {"put_request": {"item": {"customer": {"S": "ann"}}}}
                ]}}),
            )
            .await;
        assert_eq!(status, 400);
        assert_eq!(message, "Key attribute 'order' is missing");

        let scanned = engine.ok("scan", "orders", json!({})).await;
        assert_eq!(scanned["count"], 0);
    }

    #[tokio::test]
    async fn test_should_report_bulk_load_counters() {
        let engine = orders().await;
        let mut body = String::new();
        for i in 0..20 {
            writeln!(
                body,
                r#"{{"customer": {{"S": "c{}"}}, "order": {{"N": "{i}"}}}}"#,
                i % 3
            )
            .unwrap();
        }
        body.push_str("{\"customer\": {\"S\": \"c9\"}}\n");
        body.push_str("\n{broken\n");

        let summary = engine
            .ok("bulk_load", "orders", Value::String(body))
            .await;
        assert_eq!(summary["read"], 22);
        assert_eq!(summary["processed"], 20);
        assert_eq!(summary["failed"], 2);
        assert_eq!(summary["unprocessed"], 0);
        assert_eq!(summary["last_item"], "{broken");
        assert_eq!(summary["failed_items"].as_array().unwrap().len(), 2);

        let scanned = engine.ok("scan", "orders", json!({"select": "COUNT"})).await;
        assert_eq!(scanned["count"], 20);
    }
}
