//! MagnetoDB response serialization and error formatting.

use bytes::Bytes;
use serde_json::json;

use magnetodb_model::error::MagnetoError;

/// Content type for MagnetoDB JSON responses.
pub const CONTENT_TYPE: &str = "application/json";

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-openstack-request-id";

/// Serialize a MagnetoDB error into a JSON response body.
///
/// ```json
/// {
///   "code": 404,
///   "title": "Not Found",
///   "explanation": "The resource could not be found.",
///   "error": {
///     "type": "TableNotExistsException",
///     "message": "Table 'users' does not exist",
///     "traceback": null
///   }
/// }
/// ```
///
/// `traceback` lists the source chain when `show_trace` is set.
#[must_use]
pub fn error_to_json(error: &MagnetoError, show_trace: bool) -> serde_json::Value {
    let traceback = if show_trace {
        Some(error.source_chain().join("\n"))
    } else {
        None
    };
    json!({
        "code": error.status_code.as_u16(),
        "title": error.title(),
        "explanation": error.explanation(),
        "error": {
            "type": error.code.as_str(),
            "message": error.message,
            "traceback": traceback,
        },
    })
}

/// Convert a `MagnetoError` into a complete error response.
#[must_use]
pub fn error_to_response(
    error: &MagnetoError,
    request_id: &str,
    show_trace: bool,
) -> http::Response<Bytes> {
    let body = Bytes::from(error_to_json(error, show_trace).to_string());
    build(error.status_code, body, request_id)
}

/// Build a success response from JSON bytes.
#[must_use]
pub fn json_response(json: Vec<u8>, request_id: &str) -> http::Response<Bytes> {
    build(http::StatusCode::OK, Bytes::from(json), request_id)
}

fn build(status: http::StatusCode, body: Bytes, request_id: &str) -> http::Response<Bytes> {
    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(CONTENT_TYPE),
    );
    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, hv);
    }
    response
}
