//! Attribute writers: one allocation plus one attribute row per entity

use rusqlite::params;
use tracing::debug;

use super::Session;
use crate::entity::{FileSystemInfo, ImageInfo, VolumeInfo, VolumeSystemInfo};
use crate::object::{ObjectId, ObjectKind};
use crate::{Error, Result};

impl Session {
    /// Record a top-level image
    pub fn record_image(&self, info: &ImageInfo) -> Result<ObjectId> {
        let obj_id = self.allocate(ObjectKind::Image, None)?;
        self.write_row(
            "tsk_image_info",
            obj_id,
            "INSERT INTO tsk_image_info (obj_id, type, ssize) VALUES (?1, ?2, ?3)",
            params![obj_id, info.image_type, info.sector_size],
        )?;
        debug!(%obj_id, image_type = info.image_type, "recorded image");
        Ok(obj_id)
    }

    /// Record one segment name of an image. `sequence` gives concatenation
    /// order for split images, starting at 0.
    pub fn record_image_name(&self, obj_id: ObjectId, name: &str, sequence: usize) -> Result<()> {
        self.write_row(
            "tsk_image_names",
            obj_id,
            "INSERT INTO tsk_image_names (obj_id, name, sequence) VALUES (?1, ?2, ?3)",
            params![obj_id, name, sequence],
        )
    }

    pub fn record_volume_system(&self, parent: ObjectId, info: &VolumeSystemInfo) -> Result<ObjectId> {
        let obj_id = self.allocate(ObjectKind::VolumeSystem, Some(parent))?;
        self.write_row(
            "tsk_vs_info",
            obj_id,
            "INSERT INTO tsk_vs_info (obj_id, vs_type, img_offset, block_size) VALUES (?1, ?2, ?3, ?4)",
            params![obj_id, info.vs_type, info.offset, info.block_size],
        )?;
        debug!(%obj_id, %parent, vs_type = info.vs_type, "recorded volume system");
        Ok(obj_id)
    }

    pub fn record_volume(&self, parent: ObjectId, info: &VolumeInfo) -> Result<ObjectId> {
        let obj_id = self.allocate(ObjectKind::Volume, Some(parent))?;
        self.write_row(
            "tsk_vs_parts",
            obj_id,
            "INSERT INTO tsk_vs_parts (obj_id, addr, start, length, desc, flags) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![obj_id, info.addr, info.start, info.length, info.description, info.flags],
        )?;
        debug!(%obj_id, %parent, addr = info.addr, "recorded volume");
        Ok(obj_id)
    }

    pub fn record_file_system(&self, parent: ObjectId, info: &FileSystemInfo) -> Result<ObjectId> {
        let obj_id = self.allocate(ObjectKind::FileSystem, Some(parent))?;
        self.write_row(
            "tsk_fs_info",
            obj_id,
            r#"
            INSERT INTO tsk_fs_info (obj_id, img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                obj_id,
                info.offset,
                info.fs_type,
                info.block_size,
                info.block_count,
                info.root_addr,
                info.first_addr,
                info.last_addr,
            ],
        )?;
        debug!(%obj_id, %parent, fs_type = info.fs_type, root = info.root_addr, "recorded file system");
        Ok(obj_id)
    }

    /// Insert one attribute row, reporting failures against the owning object
    pub(crate) fn write_row(
        &self,
        table: &'static str,
        obj_id: ObjectId,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params))
            .map_err(|source| Error::WriteFailure { table, obj_id, source })?;
        Ok(())
    }
}
