//! SQL schema for the Marginalia SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per comment. Notes are kept together as a JSON array, in order.
CREATE TABLE IF NOT EXISTS comments (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    comment_id  TEXT    NOT NULL UNIQUE,
    file_path   TEXT    NOT NULL,
    line        INTEGER NOT NULL,   -- zero-based anchor line
    line_count  INTEGER NOT NULL DEFAULT 1,
    revision    TEXT    NOT NULL,
    resolved    INTEGER NOT NULL DEFAULT 0,
    notes_json  TEXT    NOT NULL DEFAULT '[]',
    created_at  TEXT    NOT NULL,   -- ISO 8601 UTC
    updated_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS comments_file_idx ON comments(file_path);

PRAGMA user_version = 1;
";
