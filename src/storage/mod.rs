//! Storage Layer - SQLite-backed persistence
//!
//! A single [`Session`] owns the connection. Its operations are split by
//! concern across the submodules:
//! - `session`: open/close, schema bootstrap, transactions, savepoints
//! - `registry`: object id allocation into `tsk_objects`
//! - `writers`: image, volume system, volume and filesystem attribute rows
//! - `ingest`: file ingestion with parent resolution
//! - `layout`: byte runs in `tsk_file_layout`
//! - `reader`: read-back of persisted rows

pub mod schema;
mod session;
mod registry;
mod writers;
mod ingest;
mod layout;
mod reader;

pub use session::{Session, SessionOptions};
pub use ingest::IngestOutcome;
pub use reader::DbStats;
