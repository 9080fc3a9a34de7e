//! Read-back of persisted rows

use rusqlite::OptionalExtension;

use super::Session;
use crate::entity::{FileRow, FileSystemInfo};
use crate::name::NameBytes;
use crate::object::{Object, ObjectId, ObjectKind};
use crate::Result;

impl Session {
    /// Get an object by id
    pub fn object(&self, id: ObjectId) -> Result<Option<Object>> {
        self.conn()?
            .prepare_cached("SELECT obj_id, par_obj_id, type FROM tsk_objects WHERE obj_id = ?1")?
            .query_row([id], row_to_object)
            .optional()
            .map_err(Into::into)
    }

    /// Direct children of an object, in allocation order
    pub fn children(&self, parent: ObjectId) -> Result<Vec<Object>> {
        let mut stmt = self
            .conn()?
            .prepare_cached("SELECT obj_id, par_obj_id, type FROM tsk_objects WHERE par_obj_id = ?1 ORDER BY obj_id")?;
        let children = stmt
            .query_map([parent], row_to_object)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(children)
    }

    /// Get a file row by object id
    pub fn file(&self, obj_id: ObjectId) -> Result<Option<FileRow>> {
        self.conn()?
            .prepare_cached(
                r#"
                SELECT fs_obj_id, obj_id, type, attr_type, attr_id, name, meta_addr,
                       dir_type, meta_type, dir_flags, meta_flags, size,
                       ctime, crtime, atime, mtime, mode, uid, gid
                FROM tsk_files WHERE obj_id = ?1
                "#,
            )?
            .query_row([obj_id], row_to_file)
            .optional()
            .map_err(Into::into)
    }

    pub fn file_system_info(&self, obj_id: ObjectId) -> Result<Option<FileSystemInfo>> {
        self.conn()?
            .prepare_cached(
                r#"
                SELECT img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum
                FROM tsk_fs_info WHERE obj_id = ?1
                "#,
            )?
            .query_row([obj_id], |row| {
                Ok(FileSystemInfo {
                    offset: row.get(0)?,
                    fs_type: row.get(1)?,
                    block_size: row.get(2)?,
                    block_count: row.get(3)?,
                    root_addr: row.get(4)?,
                    first_addr: row.get(5)?,
                    last_addr: row.get(6)?,
                })
            })
            .optional()
            .map_err(Into::into)
    }

    /// Image segment names in concatenation order
    pub fn image_names(&self, obj_id: ObjectId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()?
            .prepare_cached("SELECT name FROM tsk_image_names WHERE obj_id = ?1 ORDER BY sequence")?;
        let names = stmt
            .query_map([obj_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Object counts by kind
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn()?;
        let mut stats = DbStats::default();
        let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM tsk_objects GROUP BY type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, ObjectKind>(0)?, row.get::<_, usize>(1)?)))?;
        for row in rows {
            let (kind, count) = row?;
            match kind {
                ObjectKind::Image => stats.images = count,
                ObjectKind::VolumeSystem => stats.volume_systems = count,
                ObjectKind::Volume => stats.volumes = count,
                ObjectKind::FileSystem => stats.file_systems = count,
                ObjectKind::File => stats.files = count,
            }
        }
        stats.carved = conn.query_row("SELECT COUNT(*) FROM tsk_files WHERE type = 1", [], |row| row.get(0))?;
        if self.block_map_enabled() {
            stats.runs = conn.query_row("SELECT COUNT(*) FROM tsk_file_layout", [], |row| row.get(0))?;
        }
        Ok(stats)
    }
}

fn row_to_object(row: &rusqlite::Row) -> rusqlite::Result<Object> {
    Ok(Object {
        id: row.get(0)?,
        parent: row.get(1)?,
        kind: row.get(2)?,
    })
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRow> {
    let name: NameBytes = row.get(5)?;
    Ok(FileRow {
        fs_obj_id: row.get(0)?,
        obj_id: row.get(1)?,
        source: row.get(2)?,
        attr_type: row.get(3)?,
        attr_id: row.get(4)?,
        name: name.0,
        meta_addr: row.get(6)?,
        dir_type: row.get(7)?,
        meta_type: row.get(8)?,
        dir_flags: row.get(9)?,
        meta_flags: row.get(10)?,
        size: row.get(11)?,
        ctime: row.get(12)?,
        crtime: row.get(13)?,
        atime: row.get(14)?,
        mtime: row.get(15)?,
        mode: row.get(16)?,
        uid: row.get(17)?,
        gid: row.get(18)?,
    })
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbStats {
    pub images: usize,
    pub volume_systems: usize,
    pub volumes: usize,
    pub file_systems: usize,
    pub files: usize,
    pub carved: usize,
    pub runs: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Images: {}", self.images)?;
        writeln!(f, "  Volume systems: {}", self.volume_systems)?;
        writeln!(f, "  Volumes: {}", self.volumes)?;
        writeln!(f, "  File systems: {}", self.file_systems)?;
        writeln!(f, "  Files: {} (carved: {})", self.files, self.carved)?;
        writeln!(f, "  Layout runs: {}", self.runs)
    }
}
