//! MagnetoDB error types.
//!
//! Errors are reported as a JSON body carrying the HTTP status, its title and
//! explanation, and an `error` object with the type tag and message.

use std::fmt;

/// Well-known MagnetoDB error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum MagnetoErrorCode {
    /// Malformed request shape or values.
    #[default]
    ValidationError,
    /// An expected condition did not hold.
    ConditionalCheckFailedException,
    /// Table name collision on create.
    TableAlreadyExistsException,
    /// Referenced table is absent.
    TableNotExistsException,
    /// Unexpected internal failure.
    BackendInteractionException,
    /// Operation name not recognized.
    UnknownOperation,
}

impl MagnetoErrorCode {
    /// Returns the error type tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::TableAlreadyExistsException => "TableAlreadyExistsException",
            Self::TableNotExistsException => "TableNotExistsException",
            Self::BackendInteractionException => "BackendInteractionException",
            Self::UnknownOperation => "UnknownOperation",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::TableNotExistsException => http::StatusCode::NOT_FOUND,
            Self::BackendInteractionException => http::StatusCode::INTERNAL_SERVER_ERROR,
            _ => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for MagnetoErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A MagnetoDB error response.
#[derive(Debug)]
pub struct MagnetoError {
    /// The error code.
    pub code: MagnetoErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for MagnetoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MagnetoError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for MagnetoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl MagnetoError {
    /// Create a new `MagnetoError` from an error code.
    #[must_use]
    pub fn new(code: MagnetoErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `MagnetoError` with a custom message.
    #[must_use]
    pub fn with_message(code: MagnetoErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Status line reason for the status code, e.g. "Not Found".
    #[must_use]
    pub fn title(&self) -> &'static str {
        self.status_code.canonical_reason().unwrap_or("Unknown")
    }

    /// Long-form explanation for the status code.
    #[must_use]
    pub fn explanation(&self) -> &'static str {
        match self.status_code {
            http::StatusCode::NOT_FOUND => "The resource could not be found.",
            s if s.is_server_error() => {
                "The server has either erred or is incapable of performing the requested operation."
            }
            _ => {
                "The server could not comply with the request since it is either malformed or \
                 otherwise incorrect."
            }
        }
    }

    /// Messages of the source chain, outermost first.
    #[must_use]
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut next = std::error::Error::source(self);
        while let Some(err) = next {
            chain.push(err.to_string());
            next = err.source();
        }
        chain
    }

    // -- Convenience constructors --

    /// Validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(MagnetoErrorCode::ValidationError, message)
    }

    /// Expected condition evaluated to false.
    #[must_use]
    pub fn conditional_check_failed() -> Self {
        Self::with_message(
            MagnetoErrorCode::ConditionalCheckFailedException,
            "The conditional request failed",
        )
    }

    /// Table not found.
    #[must_use]
    pub fn table_not_exists(table_name: &str) -> Self {
        Self::with_message(
            MagnetoErrorCode::TableNotExistsException,
            format!("Table '{table_name}' does not exist"),
        )
    }

    /// Table already exists.
    #[must_use]
    pub fn table_already_exists(table_name: &str) -> Self {
        Self::with_message(
            MagnetoErrorCode::TableAlreadyExistsException,
            format!("Table {table_name} already exists"),
        )
    }

    /// Internal error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(MagnetoErrorCode::BackendInteractionException, message)
    }

    /// Unknown operation.
    #[must_use]
    pub fn unknown_operation(name: &str) -> Self {
        Self::with_message(
            MagnetoErrorCode::UnknownOperation,
            format!("Unrecognized operation: {name}"),
        )
    }
}

/// Create a `MagnetoError` from an error code.
///
/// # Examples
///
/// ```
/// use magnetodb_model::magnetodb_error;
/// use magnetodb_model::error::MagnetoErrorCode;
///
/// let err = magnetodb_error!(ValidationError);
/// assert_eq!(err.code, MagnetoErrorCode::ValidationError);
///
/// let err = magnetodb_error!(TableNotExistsException, "Table 't' does not exist");
/// assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
/// ```
#[macro_export]
macro_rules! magnetodb_error {
    ($code:ident) => {
        $crate::error::MagnetoError::new($crate::error::MagnetoErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::MagnetoError::with_message($crate::error::MagnetoErrorCode::$code, $msg)
    };
}
