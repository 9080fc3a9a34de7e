//! Object registry: id allocation and the containment tree

use rusqlite::{ErrorCode, params};
use tracing::debug;

use super::Session;
use crate::object::{ObjectId, ObjectKind};
use crate::{Error, Result};

impl Session {
    /// Allocate a new object and record its parent edge in one insert.
    ///
    /// Ids come from an in-process high-water mark, so they are strictly
    /// increasing for the life of the session and ids undone by a savepoint
    /// rollback are not handed out again. On failure nothing is recorded and
    /// the high-water mark is unchanged.
    pub fn allocate(&self, kind: ObjectKind, parent: Option<ObjectId>) -> Result<ObjectId> {
        if parent.is_none() && !kind.may_be_root() {
            return Err(Error::ConstraintViolation {
                kind,
                parent,
                reason: "only images may be allocated without a parent".to_string(),
            });
        }

        let conn = self.conn()?;
        let id = ObjectId(self.next_obj_id().get());

        let mut stmt = conn.prepare_cached("INSERT INTO tsk_objects (obj_id, par_obj_id, type) VALUES (?1, ?2, ?3)")?;
        match stmt.execute(params![id, parent, kind]) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, msg)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(Error::ConstraintViolation {
                    kind,
                    parent,
                    reason: msg.unwrap_or_else(|| "parent object does not exist".to_string()),
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.next_obj_id().set(id.get() + 1);
        debug!(obj_id = %id, parent = ?parent.map(ObjectId::get), %kind, "allocated object");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SessionOptions;

    fn fresh() -> Session {
        let session = Session::open_in_memory(SessionOptions::default()).unwrap();
        session.initialize_schema().unwrap();
        session
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let session = fresh();
        let img = session.allocate(ObjectKind::Image, None).unwrap();
        let mut last = img;
        for _ in 0..20 {
            let id = session.allocate(ObjectKind::VolumeSystem, Some(img)).unwrap();
            assert!(id > last);
            last = id;
        }
        assert_eq!(img, ObjectId(1));
        assert_eq!(last, ObjectId(21));
    }

    #[test]
    fn test_parent_edge_recorded() {
        let session = fresh();
        let img = session.allocate(ObjectKind::Image, None).unwrap();
        let vs = session.allocate(ObjectKind::VolumeSystem, Some(img)).unwrap();

        let obj = session.object(vs).unwrap().unwrap();
        assert_eq!(obj.parent, Some(img));
        assert_eq!(obj.kind, ObjectKind::VolumeSystem);
        assert_eq!(session.object(img).unwrap().unwrap().parent, None);
    }

    #[test]
    fn test_missing_parent_is_constraint_violation() {
        let session = fresh();
        session.allocate(ObjectKind::Image, None).unwrap();
        let err = session.allocate(ObjectKind::Volume, Some(ObjectId(99))).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation { kind: ObjectKind::Volume, .. }));

        // failed allocation leaves the registry unchanged
        assert_eq!(session.allocate(ObjectKind::Image, None).unwrap(), ObjectId(2));
        assert!(session.object(ObjectId(99)).unwrap().is_none());
    }

    #[test]
    fn test_rootless_non_image_rejected() {
        let session = fresh();
        for kind in [ObjectKind::VolumeSystem, ObjectKind::Volume, ObjectKind::FileSystem, ObjectKind::File] {
            assert!(matches!(
                session.allocate(kind, None),
                Err(Error::ConstraintViolation { parent: None, .. })
            ));
        }
    }

    #[test]
    fn test_ids_not_reused_after_rollback() {
        let mut session = fresh();
        session.begin_transaction().unwrap();
        let img = session.allocate(ObjectKind::Image, None).unwrap();

        session.create_savepoint("A").unwrap();
        let discarded = session.allocate(ObjectKind::FileSystem, Some(img)).unwrap();
        session.rollback_to_savepoint("A").unwrap();
        session.release_savepoint("A").unwrap();

        let next = session.allocate(ObjectKind::FileSystem, Some(img)).unwrap();
        assert!(next > discarded);
        assert!(session.object(discarded).unwrap().is_none());
        session.commit().unwrap();
    }

    #[test]
    fn test_ids_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.db");

        let mut session = Session::open_file(&path, SessionOptions::default()).unwrap();
        session.initialize_schema().unwrap();
        session.allocate(ObjectKind::Image, None).unwrap();
        session.allocate(ObjectKind::Image, None).unwrap();
        session.close().unwrap();

        let session = Session::open_file(&path, SessionOptions::default()).unwrap();
        assert_eq!(session.allocate(ObjectKind::Image, None).unwrap(), ObjectId(3));
    }
}
