//! Object types - the generic containment tree
//!
//! Every analyzed entity maps into one of five object kinds:
//! - `Image`: a (possibly split) disk image, always a tree root
//! - `VolumeSystem`: a partition table inside an image
//! - `Volume`: a single partition
//! - `FileSystem`: a filesystem found in an image or volume
//! - `File`: a file, directory, carved or derived artifact

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Session-unique object identifier.
///
/// Distinct from any filesystem-native address (inode number, MFT entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl ObjectId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for ObjectId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for ObjectId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(ObjectId)
    }
}

/// Discriminant stored in `tsk_objects.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Image,
    VolumeSystem,
    Volume,
    FileSystem,
    File,
}

impl ObjectKind {
    /// Integer code persisted in the object table
    pub fn code(&self) -> i64 {
        match self {
            ObjectKind::Image => 0,
            ObjectKind::VolumeSystem => 1,
            ObjectKind::Volume => 2,
            ObjectKind::FileSystem => 3,
            ObjectKind::File => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ObjectKind::Image),
            1 => Some(ObjectKind::VolumeSystem),
            2 => Some(ObjectKind::Volume),
            3 => Some(ObjectKind::FileSystem),
            4 => Some(ObjectKind::File),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Image => "image",
            ObjectKind::VolumeSystem => "volume_system",
            ObjectKind::Volume => "volume",
            ObjectKind::FileSystem => "file_system",
            ObjectKind::File => "file",
        }
    }

    /// Get all object kinds, in containment order
    pub fn all() -> &'static [ObjectKind] {
        &[
            ObjectKind::Image,
            ObjectKind::VolumeSystem,
            ObjectKind::Volume,
            ObjectKind::FileSystem,
            ObjectKind::File,
        ]
    }

    /// Whether an object of this kind may be allocated without a parent
    pub fn may_be_root(&self) -> bool {
        matches!(self, ObjectKind::Image)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for ObjectKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for ObjectKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = i64::column_result(value)?;
        ObjectKind::from_code(code).ok_or(rusqlite::types::FromSqlError::OutOfRange(code))
    }
}

/// A node of the containment tree as recorded in `tsk_objects`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    /// `None` only for images
    pub parent: Option<ObjectId>,
    pub kind: ObjectKind,
}
