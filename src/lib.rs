//! # tskdb - Forensic object hierarchy store
//!
//! Persists the structural output of disk image analysis into SQLite so that
//! downstream tools can ask what exists, how it nests, and where its bytes
//! live without re-walking the image.
//!
//! tskdb provides:
//! - A generic containment tree (image, volume system, volume, filesystem, file)
//! - Typed attribute rows per object kind
//! - File ingestion with parent resolution by native metadata address
//! - Optional byte-run layout for fragmented and carved content
//! - Transactions and nested savepoints for partial-failure recovery

pub mod object;
pub mod entity;
pub mod native;
pub mod name;
pub mod storage;
pub mod stream;
pub mod loader;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use object::{Object, ObjectId, ObjectKind};
pub use entity::{FileRow, FileSource, FileSystemInfo, ImageInfo, LayoutRun, VolumeInfo, VolumeSystemInfo};
pub use native::{FileSystemRef, NativeAttribute, NativeFile, NativeMeta, NativeName};
pub use storage::{IngestOutcome, Session, SessionOptions};

use std::path::PathBuf;

/// Result type alias for tskdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tskdb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot open database {path}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Schema initialization failed: {0}")]
    SchemaFailure(#[source] rusqlite::Error),

    #[error("Cannot allocate {kind} under parent {parent:?}: {reason}")]
    ConstraintViolation {
        kind: ObjectKind,
        parent: Option<ObjectId>,
        reason: String,
    },

    #[error("No directory with meta address {par_addr} in filesystem {fs_obj_id} (parent of {name})")]
    OrphanReference {
        fs_obj_id: ObjectId,
        par_addr: u64,
        name: String,
    },

    #[error("Failed writing {table} row for object {obj_id}: {source}")]
    WriteFailure {
        table: &'static str,
        obj_id: ObjectId,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Block mapping is not enabled for this session")]
    LayoutDisabled,

    #[error("Database session is not open")]
    NotOpen,

    #[error("Savepoint error: {0}")]
    Savepoint(String),

    #[error("Entity stream line {line}: {message}")]
    Stream { line: usize, message: String },

    #[error("Line {line}: failed to load {entity}: {source}")]
    Load {
        line: usize,
        entity: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
