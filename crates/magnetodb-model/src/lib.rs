//! MagnetoDB model types.
//!
//! This crate provides the wire model of the MagnetoDB data API: the
//! arbitrary-precision [`Decimal`] used for numbers, the typed
//! [`AttributeValue`] codec, request and response bodies for every
//! operation, and the error type shared by the request layer and the engine.
// "MagnetoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
mod de;
pub mod error;
pub mod input;
pub mod number;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::{AttributeValue, AttributeValueError, ScalarMap, ScalarType, ScalarValue};
pub use error::{MagnetoError, MagnetoErrorCode};
pub use number::{Decimal, NumberError};
pub use operations::MagnetoOperation;
