//! MagnetoDB request service.
//!
//! Wraps a [`MagnetoHandler`] and runs every request envelope through the
//! full pipeline: routing, tenant resolution, table name extraction,
//! dispatch and error formatting. Each call gets a fresh request id.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use magnetodb_core::ProjectId;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::operations::MagnetoOperation;

use crate::dispatch::{MagnetoHandler, MagnetoRequest, dispatch_operation};
use crate::response::error_to_response;
use crate::router::resolve_operation;

/// One request, as read from a newline-delimited request stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestEnvelope {
    /// Operation name, e.g. `put_item`.
    pub operation: String,
    /// Tenant; the configured default project when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Target table for table-scoped operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Operation body. For `bulk_load` a string holding newline-delimited
    /// items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// One response, written as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Request id, also present in the response headers.
    pub request_id: String,
    /// JSON body.
    pub body: Value,
}

impl ResponseEnvelope {
    /// Convert a handler response into an envelope.
    #[must_use]
    pub fn from_response(response: &http::Response<Bytes>, request_id: &str) -> Self {
        let body = serde_json::from_slice(response.body())
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(response.body()).into()));
        Self {
            status: response.status().as_u16(),
            request_id: request_id.to_owned(),
            body,
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Configuration for the MagnetoDB service.
#[derive(Debug, Clone, Default)]
pub struct MagnetoServiceConfig {
    /// Project used for envelopes without `project_id`.
    pub default_project: ProjectId,
    /// Whether error bodies carry the source chain.
    pub show_trace: bool,
}

/// Request service for MagnetoDB.
#[derive(Debug)]
pub struct MagnetoService<H: MagnetoHandler> {
    handler: Arc<H>,
    config: Arc<MagnetoServiceConfig>,
}

impl<H: MagnetoHandler> Clone for MagnetoService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: MagnetoHandler> MagnetoService<H> {
    /// Create a new `MagnetoService`.
    pub fn new(handler: Arc<H>, config: MagnetoServiceConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }

    /// The wrapped handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Process one raw JSON envelope line.
    pub async fn call_line(&self, line: &str) -> ResponseEnvelope {
        match serde_json::from_str::<RequestEnvelope>(line) {
            Ok(envelope) => self.call(envelope).await,
            Err(e) => {
                let request_id = uuid::Uuid::new_v4().to_string();
                let err = MagnetoError::validation(format!("Malformed request envelope: {e}"));
                let response = error_to_response(&err, &request_id, self.config.show_trace);
                ResponseEnvelope::from_response(&response, &request_id)
            }
        }
    }

    /// Process one request envelope.
    pub async fn call(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self.process_request(envelope, &request_id).await;
        ResponseEnvelope::from_response(&response, &request_id)
    }

    /// Process a single request through the full pipeline.
    async fn process_request(
        &self,
        envelope: RequestEnvelope,
        request_id: &str,
    ) -> http::Response<Bytes> {
        let show_trace = self.config.show_trace;

        // 1. Route: resolve the operation name.
        let operation = match resolve_operation(&envelope.operation) {
            Ok(op) => op,
            Err(err) => return error_to_response(&err, request_id, show_trace),
        };

        // 2. Build the request (tenant, table, body).
        let request = match self.build_request(operation, envelope) {
            Ok(request) => request,
            Err(err) => return error_to_response(&err, request_id, show_trace),
        };

        // 3. Dispatch to handler.
        match dispatch_operation(self.handler.as_ref(), request).await {
            Ok(mut response) => {
                if let Ok(hv) = http::HeaderValue::from_str(request_id) {
                    response
                        .headers_mut()
                        .entry(crate::response::REQUEST_ID_HEADER)
                        .or_insert(hv);
                }
                response
            }
            Err(err) => {
                tracing::debug!(%operation, code = %err.code, message = %err.message, "request failed");
                error_to_response(&err, request_id, show_trace)
            }
        }
    }

    fn build_request(
        &self,
        operation: MagnetoOperation,
        envelope: RequestEnvelope,
    ) -> Result<MagnetoRequest, MagnetoError> {
        let project_id = match envelope.project_id {
            Some(id) => ProjectId::new(id).map_err(|e| MagnetoError::validation(e.to_string()))?,
            None => self.config.default_project.clone(),
        };

        let table_name = if operation.is_table_scoped() {
            match envelope.table_name {
                Some(name) => Some(name),
                None => {
                    return Err(MagnetoError::validation(
                        "Required property 'table_name' wasn't found or it's value is null",
                    ));
                }
            }
        } else {
            None
        };

        let body = match (operation, envelope.body) {
            (_, None | Some(Value::Null)) => Bytes::from_static(b"{}"),
            (MagnetoOperation::BulkLoad, Some(Value::String(raw))) => Bytes::from(raw),
            (_, Some(value)) => Bytes::from(value.to_string()),
        };

        Ok(MagnetoRequest {
            operation,
            project_id,
            table_name,
            body,
        })
    }
}
