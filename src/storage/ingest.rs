//! File ingestion: parent resolution, name sanitization and `tsk_files` rows

use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::Session;
use crate::entity::{FileRow, FileSource, LayoutRun, MetaFlags, MetaType, NameFlags, NameType};
use crate::name::{StoredName, display_name, escape_quotes};
use crate::native::{FileSystemRef, NativeAttribute, NativeFile, NativeName};
use crate::object::{ObjectId, ObjectKind};
use crate::{Error, Result};

/// Result of ingesting one native record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Added(ObjectId),
    /// The record had no name and was not persisted
    Skipped,
}

impl IngestOutcome {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            IngestOutcome::Added(id) => Some(*id),
            IngestOutcome::Skipped => None,
        }
    }
}

const SELECT_FILE_ID_BY_META_ADDR: &str =
    "SELECT obj_id FROM tsk_files WHERE meta_addr IS ?1 AND fs_obj_id IS ?2 ORDER BY obj_id LIMIT 1";

const INSERT_FILE: &str = r#"
INSERT INTO tsk_files (fs_obj_id, obj_id, type, attr_type, attr_id, name, meta_addr,
                       dir_type, meta_type, dir_flags, meta_flags, size,
                       crtime, ctime, atime, mtime, mode, gid, uid)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
"#;

impl Session {
    /// Ingest a file or directory reported by a filesystem walker.
    ///
    /// The containing directory must already have been ingested under the
    /// same filesystem; otherwise the call fails with
    /// [`Error::OrphanReference`]. Records without a name are skipped.
    pub fn ingest_file(
        &self,
        fs: &FileSystemRef,
        file: &NativeFile,
        attr: Option<&NativeAttribute>,
    ) -> Result<IngestOutcome> {
        let Some(name) = &file.name else {
            debug!(fs_obj_id = %fs.obj_id, "skipping unnamed record");
            return Ok(IngestOutcome::Skipped);
        };

        let parent = self.resolve_parent(fs, name)?;
        let display = display_name(&name.name, attr);
        let obj_id = self.allocate(ObjectKind::File, Some(parent))?;

        let meta = file.meta.unwrap_or_default();
        let row = FileRow {
            fs_obj_id: fs.obj_id,
            obj_id,
            source: FileSource::FromFileSystem,
            attr_type: attr.map(|a| a.attr_type),
            attr_id: attr.map(|a| a.id),
            name: display,
            meta_addr: Some(name.meta_addr),
            dir_type: name.name_type,
            meta_type: meta.meta_type,
            dir_flags: name.flags,
            meta_flags: meta.flags,
            size: meta.size,
            ctime: Some(meta.ctime),
            crtime: Some(meta.crtime),
            atime: Some(meta.atime),
            mtime: Some(meta.mtime),
            mode: Some(meta.mode),
            uid: Some(meta.uid),
            gid: Some(meta.gid),
        };
        self.insert_file_row(&row)?;

        debug!(%obj_id, %parent, meta_addr = name.meta_addr, name = %row.name_lossy(), "ingested file");
        Ok(IngestOutcome::Added(obj_id))
    }

    /// Ingest a carved file. Its parent is always the filesystem itself and
    /// it carries no native metadata.
    pub fn ingest_carved_file(&self, fs_obj_id: ObjectId, name: &[u8], size: u64) -> Result<ObjectId> {
        let obj_id = self.allocate(ObjectKind::File, Some(fs_obj_id))?;
        let row = FileRow {
            fs_obj_id,
            obj_id,
            source: FileSource::Carved,
            attr_type: None,
            attr_id: None,
            name: escape_quotes(name),
            meta_addr: None,
            dir_type: NameType::Regular,
            meta_type: MetaType::Regular,
            dir_flags: NameFlags::UNALLOC,
            meta_flags: MetaFlags::UNALLOC,
            size,
            ctime: None,
            crtime: None,
            atime: None,
            mtime: None,
            mode: None,
            uid: None,
            gid: None,
        };
        self.insert_file_row(&row)?;

        debug!(%obj_id, %fs_obj_id, size, name = %row.name_lossy(), "ingested carved file");
        Ok(obj_id)
    }

    /// Ingest a carved file together with its byte runs, all or nothing.
    pub fn ingest_carved_file_with_runs(
        &mut self,
        fs_obj_id: ObjectId,
        name: &[u8],
        size: u64,
        runs: &[LayoutRun],
    ) -> Result<ObjectId> {
        self.with_savepoint("carved_file", |s| {
            let obj_id = s.ingest_carved_file(fs_obj_id, name, size)?;
            s.record_runs(fs_obj_id, obj_id, runs)?;
            Ok(obj_id)
        })
    }

    /// Object id of the directory containing `name`.
    fn resolve_parent(&self, fs: &FileSystemRef, name: &NativeName) -> Result<ObjectId> {
        if name.meta_addr == fs.root_addr {
            return Ok(fs.obj_id);
        }

        self.count_lookup();
        let mut stmt = self.conn()?.prepare_cached(SELECT_FILE_ID_BY_META_ADDR)?;
        let parent: Option<ObjectId> = stmt
            .query_row(params![name.par_addr, fs.obj_id], |row| row.get(0))
            .optional()?;

        parent.ok_or_else(|| Error::OrphanReference {
            fs_obj_id: fs.obj_id,
            par_addr: name.par_addr,
            name: String::from_utf8_lossy(&name.name).into_owned(),
        })
    }

    fn insert_file_row(&self, row: &FileRow) -> Result<()> {
        self.write_row(
            "tsk_files",
            row.obj_id,
            INSERT_FILE,
            params![
                row.fs_obj_id,
                row.obj_id,
                row.source,
                row.attr_type,
                row.attr_id,
                StoredName(&row.name),
                row.meta_addr,
                row.dir_type,
                row.meta_type,
                row.dir_flags,
                row.meta_flags,
                row.size,
                row.crtime,
                row.ctime,
                row.atime,
                row.mtime,
                row.mode,
                row.gid,
                row.uid,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FileSystemInfo, ImageInfo, VolumeInfo, VolumeSystemInfo};
    use crate::native::{NTFS_ATTR_TYPE_IDXROOT, NativeMeta};
    use crate::storage::SessionOptions;

    const ROOT: u64 = 5;

    /// Image -> volume system -> volume -> filesystem, ids 1..=4
    fn with_filesystem(options: SessionOptions) -> (Session, FileSystemRef) {
        let session = Session::open_in_memory(options).unwrap();
        session.initialize_schema().unwrap();
        let img = session.record_image(&ImageInfo { image_type: 1, sector_size: 512 }).unwrap();
        let vs = session
            .record_volume_system(img, &VolumeSystemInfo { vs_type: 1, offset: 0, block_size: 512 })
            .unwrap();
        let vol = session
            .record_volume(
                vs,
                &VolumeInfo { addr: 0, start: 2048, length: 409600, description: "Linux (0x83)".into(), flags: 1 },
            )
            .unwrap();
        let fs_info = FileSystemInfo {
            offset: 2048 * 512,
            fs_type: 0x800,
            block_size: 4096,
            block_count: 51200,
            root_addr: ROOT,
            first_addr: 1,
            last_addr: 12800,
        };
        let fs = session.record_file_system(vol, &fs_info).unwrap();
        (session, FileSystemRef::new(fs, fs_info.root_addr))
    }

    fn dir(name: &str, meta_addr: u64, par_addr: u64) -> NativeFile {
        NativeFile::new(NativeName::new(name, meta_addr, par_addr).with_type(NameType::Directory)).with_meta(
            NativeMeta {
                meta_type: MetaType::Directory,
                flags: MetaFlags::ALLOC | MetaFlags::USED,
                size: 4096,
                mode: 0o755,
                ..Default::default()
            },
        )
    }

    fn regular(name: &[u8], meta_addr: u64, par_addr: u64) -> NativeFile {
        NativeFile::new(NativeName::new(name, meta_addr, par_addr)).with_meta(NativeMeta {
            meta_type: MetaType::Regular,
            flags: MetaFlags::ALLOC | MetaFlags::USED,
            size: 18_944,
            crtime: 1_600_000_000,
            ctime: 1_600_000_100,
            atime: 1_600_000_200,
            mtime: 1_600_000_300,
            mode: 0o644,
            uid: 1000,
            gid: 100,
        })
    }

    #[test]
    fn test_end_to_end_tree() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        assert_eq!(fs.obj_id, ObjectId(4));

        let root = session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();
        assert_eq!(root, IngestOutcome::Added(ObjectId(5)));
        assert_eq!(session.lookup_count(), 0);

        let child = session.ingest_file(&fs, &regular(b"report.docx", 70, ROOT), None).unwrap();
        assert_eq!(child, IngestOutcome::Added(ObjectId(6)));
        assert_eq!(session.lookup_count(), 1);

        let chain: Vec<_> = (2..=6)
            .map(|id| session.object(ObjectId(id)).unwrap().unwrap().parent)
            .collect();
        assert_eq!(
            chain,
            vec![Some(ObjectId(1)), Some(ObjectId(2)), Some(ObjectId(3)), Some(ObjectId(4)), Some(ObjectId(5))]
        );

        let row = session.file(ObjectId(6)).unwrap().unwrap();
        assert_eq!(row.name, b"report.docx");
        assert_eq!(row.source, FileSource::FromFileSystem);
        assert_eq!(row.meta_addr, Some(70));
        assert_eq!(row.size, 18_944);
        assert_eq!(row.mtime, Some(1_600_000_300));
        assert_eq!(row.uid, Some(1000));
        assert_eq!(row.attr_type, None);
    }

    #[test]
    fn test_root_shortcut_skips_lookup() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        // parent address is irrelevant for the root entry
        let root = session.ingest_file(&fs, &dir(".", ROOT, 9999), None).unwrap();
        let obj = session.object(root.object_id().unwrap()).unwrap().unwrap();
        assert_eq!(obj.parent, Some(fs.obj_id));
        assert_eq!(session.lookup_count(), 0);
    }

    #[test]
    fn test_nested_directories() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        let root = session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap().object_id().unwrap();
        let home = session.ingest_file(&fs, &dir("home", 11, ROOT), None).unwrap().object_id().unwrap();
        let user = session.ingest_file(&fs, &dir("alice", 12, 11), None).unwrap().object_id().unwrap();
        let file = session
            .ingest_file(&fs, &regular(b"notes.txt", 13, 12), None)
            .unwrap()
            .object_id()
            .unwrap();

        assert_eq!(session.object(home).unwrap().unwrap().parent, Some(root));
        assert_eq!(session.object(user).unwrap().unwrap().parent, Some(home));
        assert_eq!(session.object(file).unwrap().unwrap().parent, Some(user));
        assert_eq!(session.children(home).unwrap().len(), 1);
    }

    #[test]
    fn test_orphan_is_error_not_guess() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();

        let err = session.ingest_file(&fs, &regular(b"lost.bin", 40, 33), None).unwrap_err();
        match err {
            Error::OrphanReference { fs_obj_id, par_addr, name } => {
                assert_eq!(fs_obj_id, fs.obj_id);
                assert_eq!(par_addr, 33);
                assert_eq!(name, "lost.bin");
            }
            other => panic!("expected orphan reference, got {:?}", other),
        }
        // nothing was allocated for the orphan
        assert!(session.object(ObjectId(6)).unwrap().is_none());
    }

    #[test]
    fn test_parent_lookup_scoped_to_filesystem() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();
        session.ingest_file(&fs, &dir("etc", 20, ROOT), None).unwrap();

        // a second filesystem in the same volume with the same addresses
        let other_info = session.file_system_info(fs.obj_id).unwrap().unwrap();
        let vol = session.object(fs.obj_id).unwrap().unwrap().parent.unwrap();
        let other = FileSystemRef::new(session.record_file_system(vol, &other_info).unwrap(), ROOT);

        let err = session.ingest_file(&other, &regular(b"passwd", 21, 20), None).unwrap_err();
        assert!(matches!(err, Error::OrphanReference { .. }));
    }

    #[test]
    fn test_unnamed_record_skipped() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        let outcome = session.ingest_file(&fs, &NativeFile::default(), None).unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped);
        assert_eq!(outcome.object_id(), None);
        assert_eq!(session.stats().unwrap().files, 0);
    }

    #[test]
    fn test_quoted_name_round_trip() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();

        let raw: &[u8] = &[b'O', b'\'', b'B', 0xe9, b'\'', b'\'', b'.', b't', b'x', b't'];
        let id = session
            .ingest_file(&fs, &regular(raw, 71, ROOT), None)
            .unwrap()
            .object_id()
            .unwrap();

        let row = session.file(id).unwrap().unwrap();
        assert_eq!(row.name, crate::name::escape_quotes(raw));
        assert_eq!(row.original_name(), raw);
    }

    #[test]
    fn test_named_stream_in_display_name() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();

        let ads = NativeAttribute { attr_type: 0x80, id: 4, name: Some(b"Zone.Identifier".to_vec()) };
        let id = session
            .ingest_file(&fs, &regular(b"setup.exe", 80, ROOT), Some(&ads))
            .unwrap()
            .object_id()
            .unwrap();
        let row = session.file(id).unwrap().unwrap();
        assert_eq!(row.name, b"setup.exe:Zone.Identifier");
        assert_eq!(row.attr_type, Some(0x80));
        assert_eq!(row.attr_id, Some(4));

        let idx = NativeAttribute { attr_type: NTFS_ATTR_TYPE_IDXROOT, id: 1, name: Some(b"$I30".to_vec()) };
        let id = session
            .ingest_file(&fs, &dir("Windows", 81, ROOT), Some(&idx))
            .unwrap()
            .object_id()
            .unwrap();
        assert_eq!(session.file(id).unwrap().unwrap().name, b"Windows");
    }

    #[test]
    fn test_missing_metadata_defaults_to_zero() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();

        let deleted = NativeFile::new(NativeName::new("gone.tmp", 99, ROOT).with_flags(NameFlags::UNALLOC));
        let id = session.ingest_file(&fs, &deleted, None).unwrap().object_id().unwrap();
        let row = session.file(id).unwrap().unwrap();
        assert_eq!(row.meta_type, MetaType::Undefined);
        assert_eq!(row.size, 0);
        assert_eq!(row.mtime, Some(0));
        assert_eq!(row.mode, Some(0));
        assert_eq!(row.dir_flags, NameFlags::UNALLOC);
    }

    #[test]
    fn test_carved_file() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        let id = session.ingest_carved_file(fs.obj_id, b"carve_00001234.jpg", 2048).unwrap();

        assert_eq!(session.lookup_count(), 0);
        assert_eq!(session.object(id).unwrap().unwrap().parent, Some(fs.obj_id));

        let row = session.file(id).unwrap().unwrap();
        assert_eq!(row.source, FileSource::Carved);
        assert_eq!(row.size, 2048);
        assert_eq!(row.meta_addr, None);
        assert_eq!(row.dir_type, NameType::Regular);
        assert_eq!(row.meta_type, MetaType::Regular);
        assert_eq!(row.dir_flags, NameFlags::UNALLOC);
        assert_eq!(row.meta_flags, MetaFlags::UNALLOC);
        assert!(row.crtime.is_none() && row.ctime.is_none() && row.atime.is_none() && row.mtime.is_none());
        assert!(row.mode.is_none() && row.uid.is_none() && row.gid.is_none());
        assert!(row.attr_type.is_none() && row.attr_id.is_none());
    }

    #[test]
    fn test_carved_file_name_escaped() {
        let (session, fs) = with_filesystem(SessionOptions::default());
        let id = session.ingest_carved_file(fs.obj_id, b"it's.jpg", 10).unwrap();
        assert_eq!(session.file(id).unwrap().unwrap().name, b"it''s.jpg");
    }

    #[test]
    fn test_carved_file_with_runs_is_atomic() {
        let (mut session, fs) = with_filesystem(SessionOptions::default());
        // block map disabled: the run insert fails and the file is rolled back
        session.begin_transaction().unwrap();
        let err = session
            .ingest_carved_file_with_runs(fs.obj_id, b"carve.png", 512, &[LayoutRun::new(1_048_576, 512)])
            .unwrap_err();
        assert!(matches!(err, Error::LayoutDisabled));
        session.commit().unwrap();
        assert_eq!(session.stats().unwrap().files, 0);

        let (mut session, fs) = with_filesystem(SessionOptions::default().with_block_map(true));
        let id = session
            .ingest_carved_file_with_runs(
                fs.obj_id,
                b"carve.png",
                1024,
                &[LayoutRun::new(1_048_576, 512), LayoutRun::new(2_097_152, 512)],
            )
            .unwrap();
        assert_eq!(session.runs(id).unwrap().len(), 2);
    }

    #[test]
    fn test_savepoint_per_file_recovers_from_orphan() {
        let (mut session, fs) = with_filesystem(SessionOptions::default());
        session.begin_transaction().unwrap();
        session.ingest_file(&fs, &dir("", ROOT, ROOT), None).unwrap();

        let result = session.with_savepoint("file", |s| s.ingest_file(&fs, &regular(b"x", 50, 49), None));
        assert!(result.is_err());

        let ok = session.ingest_file(&fs, &regular(b"y", 51, ROOT), None).unwrap();
        session.commit().unwrap();
        assert!(ok.object_id().is_some());
        assert_eq!(session.stats().unwrap().files, 2);
    }
}
