//! Storage error type and its mapping onto API errors.

use thiserror::Error;

use magnetodb_model::error::MagnetoError;
use magnetodb_model::{AttributeValueError, NumberError};

/// Errors raised by the item store and condition evaluation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A key attribute is absent from the item or key.
    #[error("Key attribute '{attr}' is missing")]
    MissingKeyAttribute {
        /// The name of the missing attribute.
        attr: String,
    },
    /// A key attribute has the wrong type.
    #[error("Wrong type of key attribute '{attr}': '{expected}' is expected, but '{actual}' found")]
    InvalidKeyType {
        /// The name of the attribute.
        attr: String,
        /// The declared scalar type.
        expected: String,
        /// The type descriptor found.
        actual: String,
    },
    /// A key attribute holds an empty string or binary.
    #[error("Key attribute '{attr}' can't be empty")]
    EmptyKeyValue {
        /// The name of the attribute.
        attr: String,
    },
    /// A key carries an attribute that is not part of the key schema.
    #[error("Key has unexpected attribute '{attr}'")]
    UnexpectedKeyAttribute {
        /// The name of the attribute.
        attr: String,
    },
    /// The item exceeds the configured size limit.
    #[error("Item size {size} exceeds the maximum of {max} bytes")]
    ItemTooLarge {
        /// Computed item size.
        size: u64,
        /// Configured limit.
        max: u64,
    },
    /// An expected condition did not hold.
    #[error("The conditional request failed")]
    ConditionalCheckFailed,
    /// Malformed request content detected while evaluating it.
    #[error("{0}")]
    Validation(String),
    /// Arithmetic failure in an ADD update.
    #[error(transparent)]
    Number(#[from] NumberError),
    /// Attribute value decoding failure.
    #[error(transparent)]
    AttributeValue(#[from] AttributeValueError),
}

impl StorageError {
    /// Shorthand for [`StorageError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Convert a storage error into a MagnetoDB error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn storage_error_to_magneto(e: StorageError) -> MagnetoError {
    match e {
        StorageError::ConditionalCheckFailed => MagnetoError::conditional_check_failed(),
        other => MagnetoError::validation(other.to_string()),
    }
}
