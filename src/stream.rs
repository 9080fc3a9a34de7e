//! Entity stream - JSON lines emitted by an image walker
//!
//! One entity per line, parents before children. Entities refer to their
//! parent through caller-chosen string keys rather than object ids, which
//! only exist once the store has allocated them:
//!
//! ```text
//! {"entity":"image","key":"img","image_type":1,"sector_size":512,"names":["disk.raw"]}
//! {"entity":"file_system","key":"fs","parent":"img","offset":0,"fs_type":2,...,"root_addr":5,...}
//! {"entity":"file","fs":"fs","name":"report.docx","meta_addr":70,"par_addr":5,"meta":{"size":18944}}
//! {"entity":"carved","fs":"fs","name":"carve_00001234.jpg","size":2048,"runs":[{"byte_start":0,"byte_len":2048}]}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Names that are not
//! valid UTF-8 are written as arrays of byte values.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::entity::{FileSystemInfo, ImageInfo, LayoutRun, NameFlags, NameType, VolumeInfo, VolumeSystemInfo};
use crate::native::{NativeAttribute, NativeFile, NativeMeta, NativeName};
use crate::{Error, Result};

/// A name as text when possible, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawName {
    Text(String),
    Bytes(Vec<u8>),
}

impl RawName {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => RawName::Text(text.to_string()),
            Err(_) => RawName::Bytes(bytes.to_vec()),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RawName::Text(text) => text.into_bytes(),
            RawName::Bytes(bytes) => bytes,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RawName::Text(text) => text.as_bytes(),
            RawName::Bytes(bytes) => bytes,
        }
    }
}

/// Data stream of a file entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAttribute {
    pub attr_type: u32,
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<RawName>,
}

/// A file or directory found by walking a filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntity {
    /// Key of the owning filesystem
    pub fs: String,
    /// Absent for placeholder records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<RawName>,
    #[serde(default)]
    pub meta_addr: u64,
    #[serde(default)]
    pub par_addr: u64,
    #[serde(default)]
    pub name_type: NameType,
    #[serde(default)]
    pub flags: NameFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NativeMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<StreamAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<LayoutRun>,
}

impl FileEntity {
    pub fn to_native(&self) -> NativeFile {
        NativeFile {
            name: self.name.as_ref().map(|name| NativeName {
                name: name.as_bytes().to_vec(),
                meta_addr: self.meta_addr,
                par_addr: self.par_addr,
                name_type: self.name_type,
                flags: self.flags,
            }),
            meta: self.meta,
        }
    }

    pub fn native_attribute(&self) -> Option<NativeAttribute> {
        self.attr.as_ref().map(|a| NativeAttribute {
            attr_type: a.attr_type,
            id: a.id,
            name: a.name.as_ref().map(|n| n.as_bytes().to_vec()),
        })
    }
}

/// A file recovered from unallocated space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarvedEntity {
    pub fs: String,
    pub name: RawName,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<LayoutRun>,
}

/// One line of the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    Image {
        key: String,
        #[serde(flatten)]
        info: ImageInfo,
        /// Segment names in concatenation order
        #[serde(default)]
        names: Vec<String>,
    },
    VolumeSystem {
        key: String,
        parent: String,
        #[serde(flatten)]
        info: VolumeSystemInfo,
    },
    Volume {
        key: String,
        parent: String,
        #[serde(flatten)]
        info: VolumeInfo,
    },
    FileSystem {
        key: String,
        parent: String,
        #[serde(flatten)]
        info: FileSystemInfo,
    },
    File(FileEntity),
    Carved(CarvedEntity),
}

impl Entity {
    /// Short description for progress and error reports
    pub fn describe(&self) -> String {
        match self {
            Entity::Image { key, .. } => format!("image '{}'", key),
            Entity::VolumeSystem { key, .. } => format!("volume system '{}'", key),
            Entity::Volume { key, info, .. } => format!("volume '{}' (addr {})", key, info.addr),
            Entity::FileSystem { key, .. } => format!("file system '{}'", key),
            Entity::File(f) => format!("file {}", f.to_native().describe()),
            Entity::Carved(c) => format!("carved file '{}'", String::from_utf8_lossy(c.name.as_bytes())),
        }
    }

    /// Serialize as one stream line (without the newline)
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Stream {
            line: 0,
            message: e.to_string(),
        })
    }
}

/// Parse one line. `line` is 1-based and only used for error reporting.
pub fn parse_line(line: usize, text: &str) -> Result<Entity> {
    serde_json::from_str(text).map_err(|e| Error::Stream {
        line,
        message: e.to_string(),
    })
}

/// Iterate the entities of a stream with their line numbers.
pub fn read_entities<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, Entity)>> {
    reader.lines().enumerate().filter_map(|(idx, line)| {
        let line_no = idx + 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => return Some(Err(Error::Io(e))),
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some(parse_line(line_no, trimmed).map(|entity| (line_no, entity)))
    })
}
