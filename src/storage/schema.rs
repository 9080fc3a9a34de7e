//! Database schema definitions
//!
//! Statements deliberately omit `IF NOT EXISTS`: initializing a populated
//! store is a caller error and must fail loudly.

/// Version of the table layout below
pub const SCHEMA_VERSION: i64 = 2;

/// SQL to create the version table
pub const CREATE_DB_INFO_TABLE: &str = r#"
CREATE TABLE tsk_db_info (
    schema_ver INTEGER,
    tool_ver INTEGER
)
"#;

/// SQL to create the object table (containment tree)
pub const CREATE_OBJECTS_TABLE: &str = r#"
CREATE TABLE tsk_objects (
    obj_id INTEGER PRIMARY KEY,
    par_obj_id INTEGER REFERENCES tsk_objects(obj_id),
    type INTEGER NOT NULL
)
"#;

pub const CREATE_IMAGE_INFO_TABLE: &str = r#"
CREATE TABLE tsk_image_info (
    obj_id INTEGER,
    type INTEGER,
    ssize INTEGER
)
"#;

pub const CREATE_IMAGE_NAMES_TABLE: &str = r#"
CREATE TABLE tsk_image_names (
    obj_id INTEGER,
    name TEXT,
    sequence INTEGER
)
"#;

pub const CREATE_VS_INFO_TABLE: &str = r#"
CREATE TABLE tsk_vs_info (
    obj_id INTEGER,
    vs_type INTEGER,
    img_offset INTEGER NOT NULL,
    block_size INTEGER NOT NULL
)
"#;

pub const CREATE_VS_PARTS_TABLE: &str = r#"
CREATE TABLE tsk_vs_parts (
    obj_id INTEGER PRIMARY KEY,
    addr INTEGER,
    start INTEGER NOT NULL,
    length INTEGER NOT NULL,
    desc TEXT,
    flags INTEGER
)
"#;

pub const CREATE_FS_INFO_TABLE: &str = r#"
CREATE TABLE tsk_fs_info (
    obj_id INTEGER PRIMARY KEY,
    img_offset INTEGER,
    fs_type INTEGER,
    block_size INTEGER,
    block_count INTEGER,
    root_inum INTEGER,
    first_inum INTEGER,
    last_inum INTEGER
)
"#;

/// SQL to create the file table.
/// `name` holds quote-escaped bytes (TEXT, or BLOB when not UTF-8). Older
/// TSK writers spliced the escaped name into a SQL literal, so their rows
/// hold the unescaped name instead.
pub const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE tsk_files (
    fs_obj_id INTEGER NOT NULL,
    obj_id INTEGER NOT NULL UNIQUE,
    attr_type INTEGER,
    attr_id INTEGER,
    name TEXT NOT NULL,
    meta_addr INTEGER,
    type INTEGER,
    dir_type INTEGER,
    meta_type INTEGER,
    dir_flags INTEGER,
    meta_flags INTEGER,
    size INTEGER,
    ctime INTEGER,
    crtime INTEGER,
    atime INTEGER,
    mtime INTEGER,
    mode INTEGER,
    uid INTEGER,
    gid INTEGER
)
"#;

pub const CREATE_FILES_PATH_TABLE: &str = r#"
CREATE TABLE tsk_files_path (
    obj_id INTEGER,
    path TEXT
)
"#;

pub const CREATE_FILES_DERIVED_TABLE: &str = r#"
CREATE TABLE tsk_files_derived (
    obj_id INTEGER UNIQUE,
    derived_id INTEGER,
    rederive TEXT
)
"#;

pub const CREATE_FILES_DERIVED_METHOD_TABLE: &str = r#"
CREATE TABLE tsk_files_derived_method (
    derived_id INTEGER PRIMARY KEY,
    tool_name TEXT,
    tool_version TEXT,
    other TEXT
)
"#;

/// SQL to create the block layout table (block mapping sessions only)
pub const CREATE_FILE_LAYOUT_TABLE: &str = r#"
CREATE TABLE tsk_file_layout (
    fs_id INTEGER NOT NULL,
    byte_start INTEGER NOT NULL,
    byte_len INTEGER NOT NULL,
    obj_id INTEGER
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX parObjId ON tsk_objects(par_obj_id)",
    "CREATE INDEX metaAddrFsObjId ON tsk_files(meta_addr, fs_obj_id)",
];

pub const CREATE_LAYOUT_INDEXES: &[&str] = &["CREATE INDEX layoutObjId ON tsk_file_layout(obj_id)"];

/// All schema creation statements
pub fn all_schema_statements(block_map: bool) -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_DB_INFO_TABLE,
        CREATE_OBJECTS_TABLE,
        CREATE_IMAGE_INFO_TABLE,
        CREATE_IMAGE_NAMES_TABLE,
        CREATE_VS_INFO_TABLE,
        CREATE_VS_PARTS_TABLE,
        CREATE_FS_INFO_TABLE,
        CREATE_FILES_TABLE,
        CREATE_FILES_PATH_TABLE,
        CREATE_FILES_DERIVED_TABLE,
        CREATE_FILES_DERIVED_METHOD_TABLE,
    ];
    if block_map {
        stmts.push(CREATE_FILE_LAYOUT_TABLE);
    }
    stmts.extend(CREATE_INDEXES.iter().copied());
    if block_map {
        stmts.extend(CREATE_LAYOUT_INDEXES.iter().copied());
    }
    stmts
}

/// Crate version packed as `0xMMmmpp00`
pub fn tool_version() -> i64 {
    let mut parts = env!("CARGO_PKG_VERSION")
        .split(['.', '-'])
        .map(|p| p.parse::<i64>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    (major << 24) | (minor << 16) | (patch << 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_table_only_with_block_map() {
        let without = all_schema_statements(false);
        let with = all_schema_statements(true);
        assert!(!without.contains(&CREATE_FILE_LAYOUT_TABLE));
        assert!(with.contains(&CREATE_FILE_LAYOUT_TABLE));
        assert_eq!(with.len(), without.len() + 1 + CREATE_LAYOUT_INDEXES.len());
    }

    #[test]
    fn test_tool_version_packing() {
        // 0.1.0 -> 0x00010000
        assert_eq!(tool_version(), 0x0001_0000);
    }
}
