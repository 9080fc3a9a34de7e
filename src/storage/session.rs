//! Storage session: database handle lifecycle, transactions and savepoints

use std::cell::Cell;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

use super::schema;
use crate::name::quote_identifier;
use crate::{Error, Result};

/// Per-session switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Create `tsk_file_layout` and accept byte-run records
    pub block_map: bool,
    /// `PRAGMA synchronous = OFF` for bulk loading
    pub synchronous_off: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            block_map: false,
            synchronous_off: true,
        }
    }
}

impl SessionOptions {
    pub fn with_block_map(mut self, block_map: bool) -> Self {
        self.block_map = block_map;
        self
    }
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// A single-writer connection to an ingestion store.
///
/// The session is created closed; [`Session::open`] acquires the handle and
/// [`Session::close`] releases it together with every cached statement.
/// Closing is idempotent.
pub struct Session {
    location: Location,
    options: SessionOptions,
    conn: Option<Connection>,
    savepoints: Vec<String>,
    next_obj_id: Cell<i64>,
    lookups: Cell<u64>,
}

impl Session {
    /// A closed session targeting a database file
    pub fn new(path: impl Into<PathBuf>, options: SessionOptions) -> Self {
        Self::with_location(Location::File(path.into()), options)
    }

    /// A closed session targeting a private in-memory database
    pub fn in_memory(options: SessionOptions) -> Self {
        Self::with_location(Location::Memory, options)
    }

    fn with_location(location: Location, options: SessionOptions) -> Self {
        Self {
            location,
            options,
            conn: None,
            savepoints: Vec::new(),
            next_obj_id: Cell::new(1),
            lookups: Cell::new(0),
        }
    }

    /// Open a database file (creates if doesn't exist)
    pub fn open_file(path: &Path, options: SessionOptions) -> Result<Self> {
        let mut session = Self::new(path, options);
        session.open()?;
        Ok(session)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(options: SessionOptions) -> Result<Self> {
        let mut session = Self::in_memory(options);
        session.open()?;
        Ok(session)
    }

    /// Acquire the database handle. No-op if already open.
    pub fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let io_failure = |source| Error::IoFailure {
            path: self.display_path(),
            source,
        };

        let conn = match &self.location {
            Location::File(path) => Connection::open(path),
            Location::Memory => Connection::open_in_memory(),
        }
        .map_err(io_failure)?;

        conn.pragma_update(None, "foreign_keys", true).map_err(io_failure)?;
        if self.options.synchronous_off {
            // no crash recovery during bulk load anyway
            conn.pragma_update(None, "synchronous", 0).map_err(io_failure)?;
        }

        let high_water = existing_max_obj_id(&conn).map_err(io_failure)?;
        self.next_obj_id.set(high_water + 1);

        // an initialized store decides its own block map
        if let Some(has_layout) = existing_layout_table(&conn).map_err(io_failure)? {
            if self.options.block_map && !has_layout {
                warn!("store was created without a block map, byte runs will not be recorded");
            }
            self.options.block_map = has_layout;
        }
        self.conn = Some(conn);

        info!(
            path = %self.display_path().display(),
            next_obj_id = high_water + 1,
            block_map = self.options.block_map,
            "opened database"
        );
        Ok(())
    }

    /// Create all tables, indexes and the version row.
    ///
    /// Must only be called on a fresh store; a second call fails with
    /// [`Error::SchemaFailure`].
    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("SAVEPOINT schema_init").map_err(Error::SchemaFailure)?;

        let result = (|| -> rusqlite::Result<()> {
            for stmt in schema::all_schema_statements(self.options.block_map) {
                conn.execute(stmt, [])?;
            }
            conn.execute(
                "INSERT INTO tsk_db_info (schema_ver, tool_ver) VALUES (?1, ?2)",
                params![schema::SCHEMA_VERSION, schema::tool_version()],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute_batch("RELEASE schema_init").map_err(Error::SchemaFailure)?;
                info!(block_map = self.options.block_map, "initialized schema");
                Ok(())
            }
            Err(e) => {
                if let Err(undo) = conn.execute_batch("ROLLBACK TO schema_init; RELEASE schema_init") {
                    warn!("failed to undo partial schema: {}", undo);
                }
                Err(Error::SchemaFailure(e))
            }
        }
    }

    /// Release the handle and all cached statements. Safe to call repeatedly
    /// or on a session that was never opened.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.savepoints.clear();
        conn.flush_prepared_statement_cache();
        conn.close().map_err(|(_, e)| Error::Storage(e))?;
        info!(path = %self.display_path().display(), "closed database");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn block_map_enabled(&self) -> bool {
        self.options.block_map
    }

    /// Number of parent lookups by native metadata address issued so far
    pub fn lookup_count(&self) -> u64 {
        self.lookups.get()
    }

    fn display_path(&self) -> PathBuf {
        match &self.location {
            Location::File(path) => path.clone(),
            Location::Memory => PathBuf::from(":memory:"),
        }
    }

    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::NotOpen)
    }

    pub(crate) fn next_obj_id(&self) -> &Cell<i64> {
        &self.next_obj_id
    }

    pub(crate) fn count_lookup(&self) {
        self.lookups.set(self.lookups.get() + 1);
    }

    // ========== Transactions ==========

    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn()?.execute_batch("BEGIN")?;
        debug!("begin transaction");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.conn()?.execute_batch("COMMIT")?;
        self.savepoints.clear();
        debug!("commit");
        Ok(())
    }

    /// Abandon the whole open transaction, savepoints included
    pub fn rollback(&mut self) -> Result<()> {
        self.conn()?.execute_batch("ROLLBACK")?;
        self.savepoints.clear();
        debug!("rollback");
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.is_autocommit())
    }

    // ========== Savepoints ==========

    /// Open a named savepoint. Savepoints nest; names may repeat, in which
    /// case the innermost one is addressed.
    pub fn create_savepoint(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Savepoint("savepoint name must not be empty".to_string()));
        }
        self.conn()?
            .execute_batch(&format!("SAVEPOINT {}", quote_identifier(name)))?;
        self.savepoints.push(name.to_string());
        debug!(savepoint = name, depth = self.savepoints.len(), "savepoint");
        Ok(())
    }

    /// Undo everything since `name` was created. The savepoint itself stays
    /// open, as does the enclosing transaction.
    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let pos = self.savepoint_position(name)?;
        self.conn()?
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {}", quote_identifier(name)))?;
        self.savepoints.truncate(pos + 1);
        debug!(savepoint = name, "rolled back to savepoint");
        Ok(())
    }

    /// Close `name` and every savepoint nested inside it, keeping their writes
    pub fn release_savepoint(&mut self, name: &str) -> Result<()> {
        let pos = self.savepoint_position(name)?;
        self.conn()?
            .execute_batch(&format!("RELEASE SAVEPOINT {}", quote_identifier(name)))?;
        self.savepoints.truncate(pos);
        debug!(savepoint = name, "released savepoint");
        Ok(())
    }

    /// Names of the open savepoints, outermost first
    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    /// Run `f` inside a savepoint: released on success, rolled back and
    /// released on error.
    pub fn with_savepoint<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.create_savepoint(name)?;
        match f(self) {
            Ok(value) => {
                self.release_savepoint(name)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(undo) = self
                    .rollback_to_savepoint(name)
                    .and_then(|_| self.release_savepoint(name))
                {
                    warn!(savepoint = name, "failed to roll back savepoint: {}", undo);
                }
                Err(e)
            }
        }
    }

    fn savepoint_position(&self, name: &str) -> Result<usize> {
        self.savepoints
            .iter()
            .rposition(|s| s == name)
            .ok_or_else(|| Error::Savepoint(format!("no open savepoint named '{}'", name)))
    }
}

/// Highest object id already stored, or 0 for a fresh database
fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn existing_max_obj_id(conn: &Connection) -> rusqlite::Result<i64> {
    if !table_exists(conn, "tsk_objects")? {
        return Ok(0);
    }
    conn.query_row("SELECT COALESCE(MAX(obj_id), 0) FROM tsk_objects", [], |row| row.get(0))
}

/// `None` for a fresh store, otherwise whether it carries `tsk_file_layout`
fn existing_layout_table(conn: &Connection) -> rusqlite::Result<Option<bool>> {
    if !table_exists(conn, "tsk_objects")? {
        return Ok(None);
    }
    table_exists(conn, "tsk_file_layout").map(Some)
}
