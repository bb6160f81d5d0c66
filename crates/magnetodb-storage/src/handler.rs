//! MagnetoDB handler implementation bridging the request layer to the engine.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use magnetodb_api::dispatch::{HandlerFuture, MagnetoHandler, MagnetoRequest};
use magnetodb_api::response::json_response;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::operations::MagnetoOperation;

use crate::provider::MagnetoProvider;

/// Handler that bridges routed requests to the MagnetoDB provider.
#[derive(Debug)]
pub struct MagnetoStorageHandler {
    provider: Arc<MagnetoProvider>,
}

impl MagnetoStorageHandler {
    /// Create a new handler wrapping a provider.
    #[must_use]
    pub fn new(provider: Arc<MagnetoProvider>) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<MagnetoProvider> {
        &self.provider
    }
}

impl MagnetoHandler for MagnetoStorageHandler {
    fn handle_operation(&self, request: MagnetoRequest) -> HandlerFuture {
        let provider = Arc::clone(&self.provider);
        Box::pin(async move { dispatch(provider.as_ref(), request).await })
    }
}

/// Dispatch a MagnetoDB operation to the appropriate provider method.
async fn dispatch(
    provider: &MagnetoProvider,
    request: MagnetoRequest,
) -> Result<http::Response<Bytes>, MagnetoError> {
    // Generate a request ID for responses.
    let request_id = uuid::Uuid::new_v4().to_string();
    let project = &request.project_id;
    let table = request.table_name.as_deref().unwrap_or_default();
    let body = &request.body;

    match request.operation {
        MagnetoOperation::CreateTable => {
            let output = provider.handle_create_table(project, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::DeleteTable => {
            let output = provider.handle_delete_table(project, table)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::DescribeTable => {
            let output = provider.handle_describe_table(project, table)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::ListTables => {
            let output = provider.handle_list_tables(project, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::PutItem => {
            let output = provider.handle_put_item(project, table, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::GetItem => {
            let output = provider.handle_get_item(project, table, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::UpdateItem => {
            let output = provider.handle_update_item(project, table, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::DeleteItem => {
            let output = provider.handle_delete_item(project, table, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::Query => {
            let output = provider.handle_query(project, table, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::Scan => {
            let output = provider.handle_scan(project, table, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::BatchGetItem => {
            let output = provider.handle_batch_get_item(project, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::BatchWriteItem => {
            let output = provider.handle_batch_write_item(project, deserialize(body)?)?;
            serialize(&output, &request_id)
        }
        MagnetoOperation::BulkLoad => {
            let output = provider
                .handle_bulk_load(project, table, &body[..])
                .await?;
            serialize(&output, &request_id)
        }
    }
}

/// Deserialize a JSON request body into the input type.
///
/// The body is read as a JSON value first, so that a body that is not a JSON
/// object is reported separately from a body with the wrong shape.
fn deserialize<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, MagnetoError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| MagnetoError::validation(format!("Request body is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(MagnetoError::validation("Request body must be a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| MagnetoError::validation(e.to_string()))
}

/// Serialize an output type into a JSON response.
fn serialize<T: serde::Serialize>(
    output: &T,
    request_id: &str,
) -> Result<http::Response<Bytes>, MagnetoError> {
    let json = serde_json::to_vec(output)
        .map_err(|e| MagnetoError::internal_error(format!("Failed to serialize response: {e}")))?;
    Ok(json_response(json, request_id))
}

#[cfg(test)]
mod tests {
    use magnetodb_api::{MagnetoService, MagnetoServiceConfig};
    use magnetodb_core::ProjectId;

    use super::*;
    use crate::config::StorageConfig;

    fn service() -> MagnetoService<MagnetoStorageHandler> {
        let provider = Arc::new(MagnetoProvider::new(StorageConfig::default()));
        MagnetoService::new(
            Arc::new(MagnetoStorageHandler::new(provider)),
            MagnetoServiceConfig::default(),
        )
    }

    const CREATE: &str = r#"{"operation": "create_table", "body": {
        "table_name": "users",
        "attribute_definitions": [{"attribute_name": "id", "attribute_type": "S"}],
        "key_schema": [{"attribute_name": "id", "key_type": "HASH"}]
    }}"#;

    #[tokio::test]
    async fn test_should_run_item_round_trip_through_service() {
        let service = service();
        let resp = service.call_line(CREATE).await;
        assert_eq!(resp.status, 200, "{:?}", resp.body);
        assert_eq!(resp.body["table_description"]["table_status"], "CREATING");

        let resp = service
            .call_line(
                r#"{"operation": "put_item", "table_name": "users",
                    "body": {"item": {"id": {"S": "u1"}, "tags": {"SS": ["b", "a", "b"]}}}}"#,
            )
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, serde_json::json!({}));

        let resp = service
            .call_line(
                r#"{"operation": "get_item", "table_name": "users",
                    "body": {"key": {"id": {"S": "u1"}}}}"#,
            )
            .await;
        assert_eq!(resp.body["item"]["tags"]["SS"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_should_report_errors_as_json_bodies() {
        let service = service();
        let resp = service
            .call_line(r#"{"operation": "describe_table", "table_name": "nope"}"#)
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body["error"]["type"], "TableNotExistsException");
        assert_eq!(resp.body["explanation"], "The resource could not be found.");

        service.call_line(CREATE).await;
        let resp = service
            .call_line(
                r#"{"operation": "put_item", "table_name": "users",
                    "body": {"item": {"id": {"S": "u1"}}, "unexpected": true}}"#,
            )
            .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["error"]["type"], "ValidationError");

        let resp = service
            .call_line(r#"{"operation": "list_tables", "body": {"limit": "abc"}}"#)
            .await;
        assert_eq!(resp.status, 400);
    }

    #[tokio::test]
    async fn test_should_bulk_load_raw_body() {
        let service = service();
        service.call_line(CREATE).await;
        let resp = service
            .call(magnetodb_api::RequestEnvelope {
                operation: "bulk_load".to_owned(),
                table_name: Some("users".to_owned()),
                body: Some(Value::String(
                    "{\"id\": {\"S\": \"a\"}}\nnot json\n{\"id\": {\"S\": \"b\"}}".to_owned(),
                )),
                ..Default::default()
            })
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["read"], 3);
        assert_eq!(resp.body["processed"], 2);
        assert_eq!(resp.body["failed"], 1);
        assert_eq!(resp.body["failed_items"][0], "not json");
    }

    #[tokio::test]
    async fn test_should_reject_non_object_body() {
        let provider = Arc::new(MagnetoProvider::new(StorageConfig::default()));
        let handler = MagnetoStorageHandler::new(provider);
        let err = handler
            .handle_operation(MagnetoRequest {
                operation: MagnetoOperation::ListTables,
                project_id: ProjectId::default(),
                table_name: None,
                body: Bytes::from_static(b"[1, 2]"),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Request body must be a JSON object");
    }
}
