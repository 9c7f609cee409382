//! Read-only consistency check between `puzzles/` folders and the database.
//!
//! After an interrupted accept a `.puz` can sit in `puzzles/` with no row, or
//! a row can point at a file that was removed by hand. Neither is repaired
//! automatically; the report lists them for an operator.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::layout::{check_folder_name, SourceLayout};
use crate::pairing::PUZ_EXT;
use crate::processor::{Processor, PuzzleRepository};

/// A database row whose file is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFile {
    pub puzzle_id: Uuid,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Accepted puzzle files with no database row.
    pub orphan_files: Vec<PathBuf>,
    pub missing_files: Vec<MissingFile>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_files.is_empty() && self.missing_files.is_empty()
    }
}

impl<R: PuzzleRepository> Processor<R> {
    /// Compare every source's accepted folder against its rows.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for source in self.repo().active_sources()? {
            let folder = source.folder_name();
            check_folder_name(&folder)?;
            let layout = SourceLayout::for_folder(self.puzzles_root(), &folder);

            let rows = self.repo().puzzles_for_source(source.id)?;
            let known: HashSet<&str> = rows.iter().map(|r| r.filename.as_str()).collect();

            for row in &rows {
                let path = layout.accepted_dir.join(&row.filename);
                if !path.is_file() {
                    warn!(puzzle_id = %row.id, path = %path.display(), "puzzle file is missing");
                    report.missing_files.push(MissingFile {
                        puzzle_id: row.id,
                        path,
                    });
                }
            }

            let entries = match std::fs::read_dir(&layout.accepted_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ImportError::io(&layout.accepted_dir, e)),
            };
            let mut orphans = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| ImportError::io(&layout.accepted_dir, e))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || name.ends_with(".tmp") || !name.ends_with(PUZ_EXT) {
                    continue;
                }
                if !known.contains(name.as_str()) {
                    warn!(path = %entry.path().display(), "puzzle file has no database row");
                    orphans.push(entry.path());
                }
            }
            orphans.sort();
            report.orphan_files.extend(orphans);
        }

        info!(
            orphan_files = report.orphan_files.len(),
            missing_files = report.missing_files.len(),
            "reconcile complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{NaiveDate, Utc};
    use puzfeed_store::{Database, PuzzleRecord, Source};

    use super::*;
    use crate::layout::provision;

    #[test]
    fn reports_orphans_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("puzzles");
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let source = Source::new("Daily", Some("daily"));
        db.create_source(&source).unwrap();
        let layout = provision(&root, &source).unwrap();

        let row = |filename: &str, hash: &str| PuzzleRecord {
            id: Uuid::new_v4(),
            source_id: source.id,
            title: "T".into(),
            author: None,
            puzzle_date: NaiveDate::from_ymd_opt(2020, 12, 21).unwrap(),
            filename: filename.into(),
            file_hash: hash.into(),
            created_at: Utc::now(),
        };
        let present = row("2020-12-21.puz", "a");
        let gone = row("2020-12-21-2.puz", "b");
        db.insert_puzzle(&present).unwrap();
        db.insert_puzzle(&gone).unwrap();

        fs::write(layout.accepted_dir.join("2020-12-21.puz"), b"x").unwrap();
        fs::write(layout.accepted_dir.join("2020-12-22.puz"), b"x").unwrap();
        fs::write(layout.accepted_dir.join("2020-12-22.meta.json"), b"{}").unwrap();
        fs::write(layout.accepted_dir.join(".2020-12-23.puz.1234.tmp"), b"x").unwrap();

        let report = Processor::new(&root, db).reconcile().unwrap();
        assert_eq!(report.orphan_files, vec![layout.accepted_dir.join("2020-12-22.puz")]);
        assert_eq!(
            report.missing_files,
            vec![MissingFile {
                puzzle_id: gone.id,
                path: layout.accepted_dir.join("2020-12-21-2.puz"),
            }]
        );
        assert!(!report.is_clean());

        // reconcile never changes anything
        assert!(layout.accepted_dir.join("2020-12-22.puz").exists());
    }

    #[test]
    fn clean_tree_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("puzzles");
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let source = Source::new("Daily", None);
        db.create_source(&source).unwrap();

        // folders never provisioned
        let report = Processor::new(&root, db).reconcile().unwrap();
        assert!(report.is_clean());
    }
}
