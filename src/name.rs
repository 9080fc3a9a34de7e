//! Name sanitization
//!
//! File names come straight from on-disk structures and may contain any
//! byte. All escaping happens here:
//! - [`escape_quotes`] / [`unescape_quotes`]: quote doubling for persisted names
//! - [`display_name`]: `name[:stream]` construction
//! - [`quote_identifier`]: identifiers that cannot be bound as parameters
//! - [`StoredName`]: byte-preserving SQL value (TEXT when UTF-8, BLOB otherwise)

use crate::native::NativeAttribute;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

pub const QUOTE: u8 = b'\'';
pub const STREAM_SEPARATOR: u8 = b':';

/// Double every quote character.
pub fn escape_quotes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.iter().filter(|&&b| b == QUOTE).count());
    push_escaped(&mut out, raw);
    out
}

fn push_escaped(out: &mut Vec<u8>, raw: &[u8]) {
    for &b in raw {
        if b == QUOTE {
            out.push(QUOTE);
        }
        out.push(b);
    }
}

/// Inverse of [`escape_quotes`]. A lone quote is kept as is.
pub fn unescape_quotes(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut bytes = escaped.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        out.push(b);
        if b == QUOTE && bytes.peek() == Some(&QUOTE) {
            bytes.next();
        }
    }
    out
}

/// Build the sanitized display name for a file, with an optional stream
/// suffix (`name:stream`). The NTFS `$I30` index stream is never shown.
pub fn display_name(name: &[u8], attr: Option<&NativeAttribute>) -> Vec<u8> {
    let suffix = attr.and_then(NativeAttribute::display_suffix);
    let mut out = Vec::with_capacity(2 * (name.len() + suffix.map_or(0, |s| s.len() + 1)));
    push_escaped(&mut out, name);
    if let Some(stream) = suffix {
        out.push(STREAM_SEPARATOR);
        push_escaped(&mut out, stream);
    }
    out
}

/// Quote an SQL identifier (savepoint names and the like).
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Byte-exact SQL value for names that may not be valid UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct StoredName<'a>(pub &'a [u8]);

impl ToSql for StoredName<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match std::str::from_utf8(self.0) {
            Ok(text) => ValueRef::Text(text.as_bytes()),
            Err(_) => ValueRef::Blob(self.0),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Owned counterpart of [`StoredName`] for reading rows back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameBytes(pub Vec<u8>);

impl FromSql for NameBytes {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(b) | ValueRef::Blob(b) => Ok(NameBytes(b.to_vec())),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
