//! v001 -- Initial schema creation.
//!
//! Creates the `sources` and `puzzles` tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Sources (puzzle feeds)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sources (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name       TEXT NOT NULL,
    short_code TEXT UNIQUE,                   -- folder name when present
    created_at TEXT NOT NULL                  -- RFC-3339
);

-- ----------------------------------------------------------------
-- Puzzles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS puzzles (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    source_id   TEXT NOT NULL,                -- FK -> sources(id)
    title       TEXT NOT NULL,
    author      TEXT,
    puzzle_date TEXT NOT NULL,                -- YYYY-MM-DD
    filename    TEXT NOT NULL,                -- name inside puzzles/, no path
    file_hash   TEXT NOT NULL,                -- BLAKE3 hex of the .puz bytes
    created_at  TEXT NOT NULL,

    FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE,
    UNIQUE (source_id, file_hash),
    UNIQUE (source_id, filename)
);

CREATE INDEX IF NOT EXISTS idx_puzzles_source_date
    ON puzzles(source_id, puzzle_date DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
