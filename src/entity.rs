//! Attribute records attached to allocated objects
//!
//! One record type per attribute table. Type and flag fields carry the
//! integer codes used by the filesystem analysis library so that rows stay
//! readable by existing tooling.

use crate::object::ObjectId;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Row of `tsk_image_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Image format code (raw, split raw, EWF, ...)
    pub image_type: u32,
    pub sector_size: u32,
}

/// Row of `tsk_vs_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSystemInfo {
    /// Partitioning scheme code (DOS, GPT, BSD, ...)
    pub vs_type: u32,
    /// Byte offset of the scheme within the parent image
    pub offset: u64,
    pub block_size: u32,
}

/// Row of `tsk_vs_parts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Partition index within its volume system
    pub addr: u64,
    /// Starting block, in volume system blocks
    pub start: u64,
    /// Length, in volume system blocks
    pub length: u64,
    #[serde(default)]
    pub description: String,
    /// Allocated / unallocated / metadata bits
    pub flags: u32,
}

/// Row of `tsk_fs_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    /// Byte offset within the parent image
    pub offset: u64,
    pub fs_type: u32,
    pub block_size: u32,
    pub block_count: u64,
    /// Native metadata address of the root directory
    pub root_addr: u64,
    pub first_addr: u64,
    pub last_addr: u64,
}

/// Where a file's content came from (`tsk_files.type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    FromFileSystem,
    Carved,
    Derived,
    LocalArtifact,
}

impl FileSource {
    pub fn code(&self) -> i64 {
        match self {
            FileSource::FromFileSystem => 0,
            FileSource::Carved => 1,
            FileSource::Derived => 2,
            FileSource::LocalArtifact => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FileSource::FromFileSystem),
            1 => Some(FileSource::Carved),
            2 => Some(FileSource::Derived),
            3 => Some(FileSource::LocalArtifact),
            _ => None,
        }
    }
}

/// Directory entry type (`tsk_files.dir_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameType {
    #[default]
    Undefined,
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    Regular,
    Symlink,
    Socket,
    Shadow,
    Whiteout,
    Virtual,
}

impl NameType {
    pub fn code(&self) -> i64 {
        match self {
            NameType::Undefined => 0,
            NameType::Fifo => 1,
            NameType::CharDevice => 2,
            NameType::Directory => 3,
            NameType::BlockDevice => 4,
            NameType::Regular => 5,
            NameType::Symlink => 6,
            NameType::Socket => 7,
            NameType::Shadow => 8,
            NameType::Whiteout => 9,
            NameType::Virtual => 10,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => NameType::Undefined,
            1 => NameType::Fifo,
            2 => NameType::CharDevice,
            3 => NameType::Directory,
            4 => NameType::BlockDevice,
            5 => NameType::Regular,
            6 => NameType::Symlink,
            7 => NameType::Socket,
            8 => NameType::Shadow,
            9 => NameType::Whiteout,
            10 => NameType::Virtual,
            _ => return None,
        })
    }
}

/// Metadata record type (`tsk_files.meta_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaType {
    #[default]
    Undefined,
    Regular,
    Directory,
    Fifo,
    CharDevice,
    BlockDevice,
    Symlink,
    Shadow,
    Socket,
    Whiteout,
    Virtual,
}

impl MetaType {
    pub fn code(&self) -> i64 {
        match self {
            MetaType::Undefined => 0,
            MetaType::Regular => 1,
            MetaType::Directory => 2,
            MetaType::Fifo => 3,
            MetaType::CharDevice => 4,
            MetaType::BlockDevice => 5,
            MetaType::Symlink => 6,
            MetaType::Shadow => 7,
            MetaType::Socket => 8,
            MetaType::Whiteout => 9,
            MetaType::Virtual => 10,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => MetaType::Undefined,
            1 => MetaType::Regular,
            2 => MetaType::Directory,
            3 => MetaType::Fifo,
            4 => MetaType::CharDevice,
            5 => MetaType::BlockDevice,
            6 => MetaType::Symlink,
            7 => MetaType::Shadow,
            8 => MetaType::Socket,
            9 => MetaType::Whiteout,
            10 => MetaType::Virtual,
            _ => return None,
        })
    }
}

/// Directory entry flags (`tsk_files.dir_flags`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameFlags(pub u32);

impl NameFlags {
    pub const ALLOC: NameFlags = NameFlags(0x01);
    pub const UNALLOC: NameFlags = NameFlags(0x02);

    pub fn contains(&self, other: NameFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Metadata record flags (`tsk_files.meta_flags`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaFlags(pub u32);

impl MetaFlags {
    pub const ALLOC: MetaFlags = MetaFlags(0x01);
    pub const UNALLOC: MetaFlags = MetaFlags(0x02);
    pub const USED: MetaFlags = MetaFlags(0x04);
    pub const UNUSED: MetaFlags = MetaFlags(0x08);
    pub const COMPRESSED: MetaFlags = MetaFlags(0x10);
    pub const ORPHAN: MetaFlags = MetaFlags(0x20);

    pub fn contains(&self, other: MetaFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for MetaFlags {
    type Output = MetaFlags;

    fn bitor(self, rhs: MetaFlags) -> MetaFlags {
        MetaFlags(self.0 | rhs.0)
    }
}

fn code_from_sql<T>(value: ValueRef<'_>, decode: fn(i64) -> Option<T>) -> FromSqlResult<T> {
    let code = i64::column_result(value)?;
    decode(code).ok_or(FromSqlError::OutOfRange(code))
}

impl ToSql for FileSource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for FileSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        code_from_sql(value, FileSource::from_code)
    }
}

impl ToSql for NameType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for NameType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        code_from_sql(value, NameType::from_code)
    }
}

impl ToSql for MetaType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for MetaType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        code_from_sql(value, MetaType::from_code)
    }
}

impl ToSql for NameFlags {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for NameFlags {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        u32::column_result(value).map(NameFlags)
    }
}

impl ToSql for MetaFlags {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for MetaFlags {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        u32::column_result(value).map(MetaFlags)
    }
}

/// A row of `tsk_files`.
///
/// `name` holds the sanitized display name exactly as persisted (quote
/// characters doubled, stream suffix appended). Use
/// [`FileRow::original_name`] to recover the on-disk bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub fs_obj_id: ObjectId,
    pub obj_id: ObjectId,
    pub source: FileSource,
    pub attr_type: Option<u32>,
    pub attr_id: Option<u32>,
    pub name: Vec<u8>,
    /// `None` for files without a filesystem-native record (carved)
    pub meta_addr: Option<u64>,
    pub dir_type: NameType,
    pub meta_type: MetaType,
    pub dir_flags: NameFlags,
    pub meta_flags: MetaFlags,
    pub size: u64,
    pub ctime: Option<i64>,
    pub crtime: Option<i64>,
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl FileRow {
    /// Display name with quote escaping undone
    pub fn original_name(&self) -> Vec<u8> {
        crate::name::unescape_quotes(&self.name)
    }

    /// Lossy UTF-8 rendering of the persisted name, for messages
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// A row of `tsk_file_layout`: one contiguous byte range of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRun {
    /// Byte offset relative to the start of the image
    pub byte_start: u64,
    pub byte_len: u64,
}

impl LayoutRun {
    pub fn new(byte_start: u64, byte_len: u64) -> Self {
        Self { byte_start, byte_len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_match_analysis_library() {
        assert_eq!(NameType::Regular.code(), 5);
        assert_eq!(NameType::Directory.code(), 3);
        assert_eq!(MetaType::Regular.code(), 1);
        assert_eq!(MetaType::Directory.code(), 2);
        assert_eq!(FileSource::Carved.code(), 1);
    }

    #[test]
    fn test_type_codes_round_trip() {
        for code in 0..=10 {
            assert_eq!(NameType::from_code(code).unwrap().code(), code);
            assert_eq!(MetaType::from_code(code).unwrap().code(), code);
        }
        assert!(NameType::from_code(11).is_none());
        assert!(FileSource::from_code(-1).is_none());
    }

    #[test]
    fn test_flags() {
        let flags = MetaFlags::ALLOC | MetaFlags::USED;
        assert!(flags.contains(MetaFlags::ALLOC));
        assert!(!flags.contains(MetaFlags::UNALLOC));
        assert!(NameFlags(3).contains(NameFlags::UNALLOC));
    }

    #[test]
    fn test_original_name_undoes_escaping() {
        let row = FileRow {
            fs_obj_id: ObjectId(4),
            obj_id: ObjectId(5),
            source: FileSource::FromFileSystem,
            attr_type: None,
            attr_id: None,
            name: b"it''s".to_vec(),
            meta_addr: Some(70),
            dir_type: NameType::Regular,
            meta_type: MetaType::Regular,
            dir_flags: NameFlags::ALLOC,
            meta_flags: MetaFlags::ALLOC,
            size: 0,
            ctime: None,
            crtime: None,
            atime: None,
            mtime: None,
            mode: None,
            uid: None,
            gid: None,
        };
        assert_eq!(row.original_name(), b"it's");
    }
}
