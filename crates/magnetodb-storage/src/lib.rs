//! MagnetoDB table engine.
//!
//! Tables live in per-project catalogs. Each table keeps its items in an
//! in-memory partitioned store with local secondary index orderings, and
//! every operation of the data API is served by [`provider::MagnetoProvider`].
#![allow(missing_docs, clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod batch;
pub mod bulk;
pub mod condition;
pub mod config;
pub mod error;
pub mod handler;
pub mod provider;
pub mod query;
pub mod schema;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::StorageConfig;
pub use handler::MagnetoStorageHandler;
pub use provider::MagnetoProvider;
