//! MagnetoDB handler trait and operation dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use magnetodb_core::ProjectId;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::operations::MagnetoOperation;

/// A routed request, ready for the business logic.
#[derive(Debug, Clone)]
pub struct MagnetoRequest {
    /// Resolved operation.
    pub operation: MagnetoOperation,
    /// Tenant the request is scoped to.
    pub project_id: ProjectId,
    /// Target table for table-scoped operations.
    pub table_name: Option<String>,
    /// Raw body: JSON for most operations, newline-delimited items for
    /// `bulk_load`.
    pub body: Bytes,
}

/// Boxed future returned by [`MagnetoHandler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, MagnetoError>> + Send>>;

/// Trait that the MagnetoDB business logic provider must implement.
///
/// The handler receives a routed request and returns a complete response.
/// This trait is the boundary between the request layer and the engine.
pub trait MagnetoHandler: Send + Sync + 'static {
    /// Handle a MagnetoDB operation and produce a response.
    fn handle_operation(&self, request: MagnetoRequest) -> HandlerFuture;
}

/// Dispatch a MagnetoDB operation to the handler.
pub async fn dispatch_operation<H: MagnetoHandler>(
    handler: &H,
    request: MagnetoRequest,
) -> Result<http::Response<Bytes>, MagnetoError> {
    tracing::debug!(
        operation = %request.operation,
        project = %request.project_id,
        table = request.table_name.as_deref().unwrap_or("-"),
        "dispatching MagnetoDB operation"
    );
    handler.handle_operation(request).await
}

/// Default handler that returns an error for all operations.
#[derive(Debug, Clone, Default)]
pub struct NotImplementedHandler;

impl MagnetoHandler for NotImplementedHandler {
    fn handle_operation(&self, request: MagnetoRequest) -> HandlerFuture {
        Box::pin(async move { Err(MagnetoError::unknown_operation(request.operation.as_str())) })
    }
}
