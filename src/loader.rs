//! Loader - drives a session from an entity stream
//!
//! The whole run is one transaction. Each entity is applied inside its own
//! savepoint, so a failing entity is undone without losing earlier progress.
//! By default the first failure ends the run: everything before it is
//! committed and the failing entity is reported. With `continue_on_error`
//! the failure is recorded and loading goes on.

use std::collections::HashMap;
use std::io::BufRead;

use tracing::{debug, info, warn};

use crate::native::FileSystemRef;
use crate::object::ObjectId;
use crate::storage::{IngestOutcome, Session};
use crate::stream::{Entity, read_entities};
use crate::{Error, Result};

const ENTITY_SAVEPOINT: &str = "entity";

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub continue_on_error: bool,
}

/// An entity that was rolled back
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub line: usize,
    pub entity: String,
    pub error: String,
}

/// Counts of what a load run persisted
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub images: usize,
    pub volume_systems: usize,
    pub volumes: usize,
    pub file_systems: usize,
    pub files: usize,
    pub carved: usize,
    pub skipped: usize,
    pub runs: usize,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Entities seen so far, including skipped and failed ones
    pub fn processed(&self) -> usize {
        self.images
            + self.volume_systems
            + self.volumes
            + self.file_systems
            + self.files
            + self.carved
            + self.skipped
            + self.failures.len()
    }
}

/// Stream keys resolved to stored objects
#[derive(Debug, Default)]
struct KeyMap {
    objects: HashMap<String, ObjectId>,
    file_systems: HashMap<String, FileSystemRef>,
}

impl KeyMap {
    fn object(&self, line: usize, key: &str) -> Result<ObjectId> {
        self.objects.get(key).copied().ok_or_else(|| Error::Stream {
            line,
            message: format!("unknown parent key '{}'", key),
        })
    }

    fn file_system(&self, line: usize, key: &str) -> Result<FileSystemRef> {
        self.file_systems.get(key).copied().ok_or_else(|| Error::Stream {
            line,
            message: format!("unknown file system key '{}'", key),
        })
    }

    fn ensure_new(&self, line: usize, key: &str) -> Result<()> {
        if self.objects.contains_key(key) {
            return Err(Error::Stream {
                line,
                message: format!("duplicate key '{}'", key),
            });
        }
        Ok(())
    }
}

/// What applying one entity did
enum Applied {
    Image,
    VolumeSystem,
    Volume,
    FileSystem,
    File { runs: usize },
    Carved { runs: usize },
    Skipped,
}

pub struct Loader<'s> {
    session: &'s mut Session,
    options: LoadOptions,
    keys: KeyMap,
    report: LoadReport,
}

impl<'s> Loader<'s> {
    pub fn new(session: &'s mut Session, options: LoadOptions) -> Self {
        Self {
            session,
            options,
            keys: KeyMap::default(),
            report: LoadReport::default(),
        }
    }

    /// Load every entity from `reader`, calling `progress` after each one.
    pub fn load<R: BufRead>(mut self, reader: R, mut progress: impl FnMut(&LoadReport)) -> Result<LoadReport> {
        self.session.begin_transaction()?;

        for item in read_entities(reader) {
            let (line, entity) = match item {
                Ok(item) => item,
                Err(e) => return self.abort(e),
            };

            let keys = &mut self.keys;
            let result = self
                .session
                .with_savepoint(ENTITY_SAVEPOINT, |s| apply(s, keys, line, &entity));

            match result {
                Ok(applied) => self.count(applied),
                Err(e) if self.options.continue_on_error => {
                    warn!(line, entity = %entity.describe(), "rolled back: {}", e);
                    self.report.failures.push(LoadFailure {
                        line,
                        entity: entity.describe(),
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    let err = Error::Load {
                        line,
                        entity: entity.describe(),
                        source: Box::new(e),
                    };
                    return self.abort(err);
                }
            }
            progress(&self.report);
        }

        self.session.commit()?;
        info!(
            processed = self.report.processed(),
            failures = self.report.failures.len(),
            "load complete"
        );
        Ok(self.report)
    }

    /// Keep the progress made so far and surface `err`
    fn abort(self, err: Error) -> Result<LoadReport> {
        warn!("aborting load after {} entities: {}", self.report.processed(), err);
        self.session.commit()?;
        Err(err)
    }

    fn count(&mut self, applied: Applied) {
        let report = &mut self.report;
        match applied {
            Applied::Image => report.images += 1,
            Applied::VolumeSystem => report.volume_systems += 1,
            Applied::Volume => report.volumes += 1,
            Applied::FileSystem => report.file_systems += 1,
            Applied::File { runs } => {
                report.files += 1;
                report.runs += runs;
            }
            Applied::Carved { runs } => {
                report.carved += 1;
                report.runs += runs;
            }
            Applied::Skipped => report.skipped += 1,
        }
    }
}

fn apply(session: &mut Session, keys: &mut KeyMap, line: usize, entity: &Entity) -> Result<Applied> {
    match entity {
        Entity::Image { key, info, names } => {
            keys.ensure_new(line, key)?;
            let id = session.record_image(info)?;
            for (sequence, name) in names.iter().enumerate() {
                session.record_image_name(id, name, sequence)?;
            }
            keys.objects.insert(key.clone(), id);
            Ok(Applied::Image)
        }
        Entity::VolumeSystem { key, parent, info } => {
            keys.ensure_new(line, key)?;
            let id = session.record_volume_system(keys.object(line, parent)?, info)?;
            keys.objects.insert(key.clone(), id);
            Ok(Applied::VolumeSystem)
        }
        Entity::Volume { key, parent, info } => {
            keys.ensure_new(line, key)?;
            let id = session.record_volume(keys.object(line, parent)?, info)?;
            keys.objects.insert(key.clone(), id);
            Ok(Applied::Volume)
        }
        Entity::FileSystem { key, parent, info } => {
            keys.ensure_new(line, key)?;
            let id = session.record_file_system(keys.object(line, parent)?, info)?;
            keys.objects.insert(key.clone(), id);
            keys.file_systems.insert(key.clone(), FileSystemRef::new(id, info.root_addr));
            Ok(Applied::FileSystem)
        }
        Entity::File(file) => {
            let fs = keys.file_system(line, &file.fs)?;
            let attr = file.native_attribute();
            match session.ingest_file(&fs, &file.to_native(), attr.as_ref())? {
                IngestOutcome::Added(id) => {
                    let runs = record_runs(session, fs.obj_id, id, &file.runs)?;
                    Ok(Applied::File { runs })
                }
                IngestOutcome::Skipped => Ok(Applied::Skipped),
            }
        }
        Entity::Carved(carved) => {
            let fs = keys.file_system(line, &carved.fs)?;
            let id = session.ingest_carved_file(fs.obj_id, carved.name.as_bytes(), carved.size)?;
            let runs = record_runs(session, fs.obj_id, id, &carved.runs)?;
            Ok(Applied::Carved { runs })
        }
    }
}

/// Runs are dropped when the session keeps no block map
fn record_runs(
    session: &Session,
    fs_obj_id: ObjectId,
    file_obj_id: ObjectId,
    runs: &[crate::entity::LayoutRun],
) -> Result<usize> {
    if !session.block_map_enabled() {
        if !runs.is_empty() {
            debug!(%file_obj_id, count = runs.len(), "block map disabled, dropping runs");
        }
        return Ok(0);
    }
    session.record_runs(fs_obj_id, file_obj_id, runs)?;
    Ok(runs.len())
}
