//! On-disk layout of an address store and connection tuning.
//!
//! A valid store holds an `addresses` table and an FTS5 index named
//! `address_fts` whose rowids equal `addresses.id`. Files produced by
//! [`create_schema`] keep the index in lockstep through triggers.

use rusqlite::{Connection, OptionalExtension};

/// Tuning applied to every connection, in order. Each one is mandatory.
pub const PRAGMAS: [(&str, &str); 6] = [
    ("page_size", "16384"),
    ("cache_size", "-4000"),
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("mmap_size", "30000000000"),
    ("temp_store", "MEMORY"),
];

/// Table holding the address records.
pub const ADDRESSES_TABLE: &str = "addresses";

/// FTS5 index over street, house number and city.
pub const FTS_INDEX: &str = "address_fts";

/// DDL for the address table.
pub const ADDRESSES_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY,
    street TEXT NOT NULL,
    house_number TEXT NOT NULL,
    city TEXT NOT NULL,
    longitude REAL NOT NULL,
    latitude REAL NOT NULL
);";

const FTS_INDEX_SQL: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS address_fts USING fts5(
    street,
    house_number,
    city,
    content='addresses',
    content_rowid='id'
);
CREATE TRIGGER IF NOT EXISTS addresses_ai AFTER INSERT ON addresses BEGIN
    INSERT INTO address_fts (rowid, street, house_number, city)
    VALUES (new.id, new.street, new.house_number, new.city);
END;
CREATE TRIGGER IF NOT EXISTS addresses_ad AFTER DELETE ON addresses BEGIN
    INSERT INTO address_fts (address_fts, rowid, street, house_number, city)
    VALUES ('delete', old.id, old.street, old.house_number, old.city);
END;
CREATE TRIGGER IF NOT EXISTS addresses_au AFTER UPDATE ON addresses BEGIN
    INSERT INTO address_fts (address_fts, rowid, street, house_number, city)
    VALUES ('delete', old.id, old.street, old.house_number, old.city);
    INSERT INTO address_fts (rowid, street, house_number, city)
    VALUES (new.id, new.street, new.house_number, new.city);
END;";

/// Create the address table, its index and the sync triggers.
///
/// # Errors
/// Returns the underlying `rusqlite` error.
pub fn create_schema(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(ADDRESSES_TABLE_SQL)?;
    connection.execute_batch(FTS_INDEX_SQL)
}

/// Apply a single pragma from [`PRAGMAS`].
pub(crate) fn apply_pragma(
    connection: &Connection,
    name: &str,
    value: &str,
) -> Result<(), rusqlite::Error> {
    connection.execute_batch(&format!("PRAGMA {name} = {value};"))
}

/// Whether `name` exists in the schema as a table (virtual tables included).
pub(crate) fn table_exists(connection: &Connection, name: &str) -> Result<bool, rusqlite::Error> {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
}
