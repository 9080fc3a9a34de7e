//! Filesystem-native records handed to the ingestion engine
//!
//! These mirror what a filesystem walker reports for one directory entry:
//! the name structure (always needed), the metadata structure (absent when
//! the inode could not be read) and, for filesystems exposing several data
//! streams per entry, the attribute being ingested.

use crate::entity::{MetaFlags, MetaType, NameFlags, NameType};
use crate::object::ObjectId;
use serde::{Deserialize, Serialize};

/// NTFS `$INDEX_ROOT` attribute type
pub const NTFS_ATTR_TYPE_IDXROOT: u32 = 0x90;

/// Name structure of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeName {
    /// Raw on-disk name; not guaranteed to be valid UTF-8
    pub name: Vec<u8>,
    /// Metadata address this entry points to
    pub meta_addr: u64,
    /// Metadata address of the containing directory
    pub par_addr: u64,
    pub name_type: NameType,
    pub flags: NameFlags,
}

impl NativeName {
    pub fn new(name: impl Into<Vec<u8>>, meta_addr: u64, par_addr: u64) -> Self {
        Self {
            name: name.into(),
            meta_addr,
            par_addr,
            name_type: NameType::Regular,
            flags: NameFlags::ALLOC,
        }
    }

    pub fn with_type(mut self, name_type: NameType) -> Self {
        self.name_type = name_type;
        self
    }

    pub fn with_flags(mut self, flags: NameFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Metadata (inode) structure of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeMeta {
    pub meta_type: MetaType,
    pub flags: MetaFlags,
    pub size: u64,
    pub crtime: i64,
    pub ctime: i64,
    pub atime: i64,
    pub mtime: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

/// One data stream of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAttribute {
    pub attr_type: u32,
    pub id: u32,
    /// Stream name, if the stream is named
    pub name: Option<Vec<u8>>,
}

impl NativeAttribute {
    /// The NTFS directory index stream is filesystem structure, not content
    pub fn is_index_root(&self) -> bool {
        self.attr_type == NTFS_ATTR_TYPE_IDXROOT && self.name.as_deref() == Some(b"$I30".as_slice())
    }

    /// Stream name to append to the display name, if any
    pub fn display_suffix(&self) -> Option<&[u8]> {
        match &self.name {
            Some(name) if !name.is_empty() && !self.is_index_root() => Some(name),
            _ => None,
        }
    }
}

/// A file as reported by the filesystem walker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeFile {
    /// `None` for placeholder records, which are never persisted
    pub name: Option<NativeName>,
    pub meta: Option<NativeMeta>,
}

impl NativeFile {
    pub fn new(name: NativeName) -> Self {
        Self { name: Some(name), meta: None }
    }

    pub fn with_meta(mut self, meta: NativeMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Short description for error reports
    pub fn describe(&self) -> String {
        match &self.name {
            Some(n) => format!("'{}' (meta {})", String::from_utf8_lossy(&n.name), n.meta_addr),
            None => "<unnamed>".to_string(),
        }
    }
}

/// The filesystem a file is being ingested into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSystemRef {
    pub obj_id: ObjectId,
    /// Native metadata address of the root directory
    pub root_addr: u64,
}

impl FileSystemRef {
    pub fn new(obj_id: ObjectId, root_addr: u64) -> Self {
        Self { obj_id, root_addr }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_root_stream_is_suppressed() {
        let idx = NativeAttribute {
            attr_type: NTFS_ATTR_TYPE_IDXROOT,
            id: 4,
            name: Some(b"$I30".to_vec()),
        };
        assert!(idx.is_index_root());
        assert_eq!(idx.display_suffix(), None);
    }

    #[test]
    fn test_named_stream_suffix() {
        let ads = NativeAttribute {
            attr_type: 0x80,
            id: 3,
            name: Some(b"Zone.Identifier".to_vec()),
        };
        assert_eq!(ads.display_suffix(), Some(b"Zone.Identifier".as_slice()));

        // $I30 on a non index-root attribute is ordinary content
        let odd = NativeAttribute {
            attr_type: 0x80,
            id: 5,
            name: Some(b"$I30".to_vec()),
        };
        assert_eq!(odd.display_suffix(), Some(b"$I30".as_slice()));

        let unnamed = NativeAttribute { attr_type: 0x80, id: 1, name: None };
        assert_eq!(unnamed.display_suffix(), None);
    }

    #[test]
    fn test_describe_handles_invalid_utf8() {
        let file = NativeFile::new(NativeName::new(vec![0x66, 0xff, 0x6f], 12, 5));
        assert!(file.describe().contains("meta 12"));
        assert_eq!(NativeFile::default().describe(), "<unnamed>");
    }
}
