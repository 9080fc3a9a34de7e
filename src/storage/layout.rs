//! Block layout: byte runs mapping file objects onto the image

use rusqlite::params;

use super::Session;
use crate::entity::LayoutRun;
use crate::object::ObjectId;
use crate::{Error, Result};

impl Session {
    /// Record one run of `file_obj_id`. Runs are read back in the order they
    /// were recorded, so callers emit them in logical-offset order.
    /// Zero-length runs are accepted.
    pub fn record_run(&self, fs_obj_id: ObjectId, file_obj_id: ObjectId, byte_start: u64, byte_len: u64) -> Result<()> {
        if !self.block_map_enabled() {
            return Err(Error::LayoutDisabled);
        }
        self.write_row(
            "tsk_file_layout",
            file_obj_id,
            "INSERT INTO tsk_file_layout (fs_id, byte_start, byte_len, obj_id) VALUES (?1, ?2, ?3, ?4)",
            params![fs_obj_id, byte_start, byte_len, file_obj_id],
        )
    }

    pub fn record_runs(&self, fs_obj_id: ObjectId, file_obj_id: ObjectId, runs: &[LayoutRun]) -> Result<()> {
        for run in runs {
            self.record_run(fs_obj_id, file_obj_id, run.byte_start, run.byte_len)?;
        }
        Ok(())
    }

    /// Runs of a file in recording order
    pub fn runs(&self, file_obj_id: ObjectId) -> Result<Vec<LayoutRun>> {
        if !self.block_map_enabled() {
            return Err(Error::LayoutDisabled);
        }
        let mut stmt = self
            .conn()?
            .prepare_cached("SELECT byte_start, byte_len FROM tsk_file_layout WHERE obj_id = ?1 ORDER BY rowid")?;
        let runs = stmt
            .query_map([file_obj_id], |row| Ok(LayoutRun::new(row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FileSystemInfo, ImageInfo};
    use crate::storage::SessionOptions;

    fn carved_file(options: SessionOptions) -> (Session, ObjectId, ObjectId) {
        let session = Session::open_in_memory(options).unwrap();
        session.initialize_schema().unwrap();
        let img = session.record_image(&ImageInfo { image_type: 1, sector_size: 512 }).unwrap();
        let fs = session
            .record_file_system(
                img,
                &FileSystemInfo {
                    offset: 0,
                    fs_type: 0x100,
                    block_size: 512,
                    block_count: 4096,
                    root_addr: 2,
                    first_addr: 2,
                    last_addr: 1000,
                },
            )
            .unwrap();
        let file = session.ingest_carved_file(fs, b"carve_0001.jpg", 1536).unwrap();
        (session, fs, file)
    }

    #[test]
    fn test_fragmented_runs_keep_order() {
        let (session, fs, file) = carved_file(SessionOptions::default().with_block_map(true));
        let runs = [
            LayoutRun::new(900_000, 512),
            LayoutRun::new(10_240, 512),
            LayoutRun::new(4_000_000, 512),
        ];
        session.record_runs(fs, file, &runs).unwrap();
        assert_eq!(session.runs(file).unwrap(), runs.to_vec());
    }

    #[test]
    fn test_zero_length_run_round_trips() {
        let (session, fs, file) = carved_file(SessionOptions::default().with_block_map(true));
        session.record_run(fs, file, 65_536, 0).unwrap();
        assert_eq!(session.runs(file).unwrap(), vec![LayoutRun::new(65_536, 0)]);
    }

    #[test]
    fn test_runs_are_per_file() {
        let (session, fs, file) = carved_file(SessionOptions::default().with_block_map(true));
        let other = session.ingest_carved_file(fs, b"carve_0002.jpg", 512).unwrap();
        session.record_run(fs, file, 0, 512).unwrap();
        session.record_run(fs, other, 512, 512).unwrap();
        assert_eq!(session.runs(other).unwrap(), vec![LayoutRun::new(512, 512)]);
        assert!(session.runs(ObjectId(999)).unwrap().is_empty());
    }

    #[test]
    fn test_disabled_block_map() {
        let (session, fs, file) = carved_file(SessionOptions::default());
        assert!(matches!(session.record_run(fs, file, 0, 512), Err(Error::LayoutDisabled)));
    }

    #[test]
    fn test_offset_beyond_i64_is_write_failure() {
        let (session, fs, file) = carved_file(SessionOptions::default().with_block_map(true));
        let err = session.record_run(fs, file, u64::MAX, 1).unwrap_err();
        assert!(matches!(err, Error::WriteFailure { table: "tsk_file_layout", .. }));
    }
}
