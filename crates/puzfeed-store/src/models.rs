//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the feed layer or printed by the CLI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A configured puzzle feed with its own directory tree on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Unique source identifier.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Optional short code; used as the folder name when present.
    pub short_code: Option<String>,
    /// When the source was created.
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Build a new source with a fresh id. The short code is normalized.
    pub fn new(name: impl Into<String>, short_code: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            short_code: normalize_short_code(short_code),
            created_at: Utc::now(),
        }
    }

    /// Directory name under the puzzle root: the short code if set, else the
    /// UUID string.
    pub fn folder_name(&self) -> String {
        match self.short_code.as_deref() {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// Trim a short code; blank codes become `None`.
pub fn normalize_short_code(short_code: Option<&str>) -> Option<String> {
    short_code
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Puzzle record
// ---------------------------------------------------------------------------

/// One imported puzzle. Created once per successful import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PuzzleRecord {
    /// Unique puzzle identifier, generated at import time.
    pub id: Uuid,
    /// The source this puzzle was imported for.
    pub source_id: Uuid,
    /// Resolved title (sidecar, then puzzle file, then `"Untitled"`).
    pub title: String,
    /// Resolved author (sidecar, then puzzle file).
    pub author: Option<String>,
    /// Publication date from the sidecar.
    pub puzzle_date: NaiveDate,
    /// Name of the `.puz` file inside the source's `puzzles/` directory.
    pub filename: String,
    /// BLAKE3 hash (hex) of the `.puz` bytes, used to spot re-drops.
    pub file_hash: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}
