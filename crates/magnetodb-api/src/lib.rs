//! MagnetoDB request layer.
//!
//! This crate is transport neutral: it accepts request envelopes rather than
//! HTTP connections, and provides:
//!
//! - **Router**: Resolves the operation named in the envelope
//! - **Handler trait**: Defines the boundary between the request layer and the engine
//! - **Service**: Runs an envelope through routing, dispatch and error formatting
//! - **Response helpers**: JSON success/error response formatting
#![allow(missing_docs)]

pub mod dispatch;
pub mod response;
pub mod router;
pub mod service;

pub use dispatch::{HandlerFuture, MagnetoHandler, MagnetoRequest, NotImplementedHandler};
pub use service::{MagnetoService, MagnetoServiceConfig, RequestEnvelope, ResponseEnvelope};
