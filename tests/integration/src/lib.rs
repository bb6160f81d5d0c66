//! In-process scenario tests for MagnetoDB.
//!
//! Every test builds its own engine and drives it through request envelopes,
//! exactly as the `magnetodb` binary does, so no server is needed:
//!
//! ```text
//! cargo test -p magnetodb-integration
//! ```

use std::sync::{Arc, Once};

use serde_json::{Value, json};

use magnetodb_api::{MagnetoService, MagnetoServiceConfig, RequestEnvelope, ResponseEnvelope};
use magnetodb_storage::{MagnetoProvider, MagnetoStorageHandler, StorageConfig};

mod test_batch;
mod test_items;
mod test_query;
mod test_tables;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A fresh engine behind the request service.
#[derive(Debug, Clone)]
pub struct Engine {
    service: MagnetoService<MagnetoStorageHandler>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl Engine {
    /// Create an engine with the given storage configuration.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        init_tracing();
        let provider = Arc::new(MagnetoProvider::new(config));
        let service = MagnetoService::new(
            Arc::new(MagnetoStorageHandler::new(provider)),
            MagnetoServiceConfig::default(),
        );
        Self { service }
    }

    /// Send one request and return the raw response envelope.
    pub async fn call(&self, operation: &str, table: Option<&str>, body: Value) -> ResponseEnvelope {
        self.service
            .call(RequestEnvelope {
                operation: operation.to_owned(),
                project_id: None,
                table_name: table.map(str::to_owned),
                body: Some(body),
            })
            .await
    }

    /// Send a table-scoped request that must succeed, returning its body.
    ///
    /// # Panics
    /// Panics when the response is not a success.
    pub async fn ok(&self, operation: &str, table: &str, body: Value) -> Value {
        let resp = self.call(operation, Some(table), body).await;
        assert!(
            resp.is_success(),
            "{operation} on {table} failed: {}",
            resp.body
        );
        resp.body
    }

    /// Send a request that must fail, returning `(status, error message)`.
    ///
    /// # Panics
    /// Panics when the response is a success.
    pub async fn err(&self, operation: &str, table: Option<&str>, body: Value) -> (u16, String) {
        let resp = self.call(operation, table, body).await;
        assert!(!resp.is_success(), "{operation} unexpectedly succeeded");
        let message = resp.body["error"]["message"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        (resp.status, message)
    }

    /// Create a table, panicking on failure.
    ///
    /// `attributes` lists `(name, type)` pairs; the first is the HASH key and
    /// the optional second the RANGE key.
    ///
    /// # Panics
    /// Panics when the table cannot be created.
    pub async fn create_table(&self, name: &str, attributes: &[(&str, &str)], with_range: bool) {
        let body = table_body(name, attributes, with_range);
        let resp = self.call("create_table", None, body).await;
        assert!(resp.is_success(), "create_table {name} failed: {}", resp.body);
    }

    /// Put one item, panicking on failure.
    ///
    /// # Panics
    /// Panics when the item is rejected.
    pub async fn put(&self, table: &str, item: Value) {
        self.ok("put_item", table, json!({"item": item})).await;
    }
}

/// Build a `create_table` body.
#[must_use]
pub fn table_body(name: &str, attributes: &[(&str, &str)], with_range: bool) -> Value {
    let definitions: Vec<Value> = attributes
        .iter()
        .map(|(n, t)| json!({"attribute_name": n, "attribute_type": t}))
        .collect();
    let mut key_schema = vec![json!({"attribute_name": attributes[0].0, "key_type": "HASH"})];
    if with_range {
        key_schema.push(json!({"attribute_name": attributes[1].0, "key_type": "RANGE"}));
    }
    json!({
        "table_name": name,
        "attribute_definitions": definitions,
        "key_schema": key_schema,
    })
}
