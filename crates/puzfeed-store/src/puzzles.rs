use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::PuzzleRecord;

const PUZZLE_COLUMNS: &str =
    "id, source_id, title, author, puzzle_date, filename, file_hash, created_at";

impl Database {
    /// Insert a new puzzle row.
    ///
    /// Fails with [`StoreError::Conflict`](crate::StoreError::Conflict) when
    /// the source already has a puzzle with the same file hash or filename.
    pub fn insert_puzzle(&self, puzzle: &PuzzleRecord) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO puzzles ({PUZZLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                puzzle.id.to_string(),
                puzzle.source_id.to_string(),
                puzzle.title,
                puzzle.author,
                puzzle.puzzle_date.format("%Y-%m-%d").to_string(),
                puzzle.filename,
                puzzle.file_hash,
                puzzle.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_puzzle(&self, id: Uuid) -> Result<PuzzleRecord> {
        let puzzle = self.conn().query_row(
            &format!("SELECT {PUZZLE_COLUMNS} FROM puzzles WHERE id = ?1"),
            params![id.to_string()],
            row_to_puzzle,
        )?;
        Ok(puzzle)
    }

    pub fn find_puzzle_by_hash(&self, source_id: Uuid, file_hash: &str) -> Result<Option<PuzzleRecord>> {
        let puzzle = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {PUZZLE_COLUMNS} FROM puzzles WHERE source_id = ?1 AND file_hash = ?2"
                ),
                params![source_id.to_string(), file_hash],
                row_to_puzzle,
            )
            .optional()?;
        Ok(puzzle)
    }

    pub fn find_puzzle_by_filename(&self, source_id: Uuid, filename: &str) -> Result<Option<PuzzleRecord>> {
        let puzzle = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {PUZZLE_COLUMNS} FROM puzzles WHERE source_id = ?1 AND filename = ?2"
                ),
                params![source_id.to_string(), filename],
                row_to_puzzle,
            )
            .optional()?;
        Ok(puzzle)
    }

    /// All puzzles of a source, newest date first.
    pub fn list_puzzles_for_source(&self, source_id: Uuid) -> Result<Vec<PuzzleRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PUZZLE_COLUMNS} FROM puzzles
             WHERE source_id = ?1
             ORDER BY puzzle_date DESC, filename DESC"
        ))?;
        let rows = stmt.query_map(params![source_id.to_string()], row_to_puzzle)?;

        let mut puzzles = Vec::new();
        for row in rows {
            puzzles.push(row?);
        }
        Ok(puzzles)
    }
}

fn row_to_puzzle(row: &rusqlite::Row<'_>) -> rusqlite::Result<PuzzleRecord> {
    let id_str: String = row.get(0)?;
    let source_str: String = row.get(1)?;
    let title: String = row.get(2)?;
    let author: Option<String> = row.get(3)?;
    let date_str: String = row.get(4)?;
    let filename: String = row.get(5)?;
    let file_hash: String = row.get(6)?;
    let created_str: String = row.get(7)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let source_id = Uuid::parse_str(&source_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let puzzle_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(PuzzleRecord {
        id,
        source_id,
        title,
        author,
        puzzle_date,
        filename,
        file_hash,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::Source;

    fn test_db() -> (Database, Source, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let source = Source::new("Daily", Some("daily"));
        db.create_source(&source).unwrap();
        (db, source, dir)
    }

    fn record(source_id: Uuid, filename: &str, hash: &str) -> PuzzleRecord {
        PuzzleRecord {
            id: Uuid::new_v4(),
            source_id,
            title: "Crossword".to_string(),
            author: None,
            puzzle_date: NaiveDate::from_ymd_opt(2020, 12, 21).unwrap(),
            filename: filename.to_string(),
            file_hash: hash.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_get() {
        let (db, source, _dir) = test_db();
        let puzzle = record(source.id, "2020-12-21.puz", "aa");
        db.insert_puzzle(&puzzle).unwrap();

        let loaded = db.get_puzzle(puzzle.id).unwrap();
        assert_eq!(loaded.filename, "2020-12-21.puz");
        assert_eq!(loaded.puzzle_date, puzzle.puzzle_date);
        assert_eq!(loaded.author, None);
    }

    #[test]
    fn same_hash_in_same_source_conflicts() {
        let (db, source, _dir) = test_db();
        db.insert_puzzle(&record(source.id, "2020-12-21.puz", "aa")).unwrap();
        let err = db
            .insert_puzzle(&record(source.id, "2020-12-21-2.puz", "aa"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn same_filename_in_same_source_conflicts() {
        let (db, source, _dir) = test_db();
        db.insert_puzzle(&record(source.id, "2020-12-21.puz", "aa")).unwrap();
        let err = db
            .insert_puzzle(&record(source.id, "2020-12-21.puz", "bb"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let (db, _source, _dir) = test_db();
        let err = db
            .insert_puzzle(&record(Uuid::new_v4(), "2020-12-21.puz", "aa"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn find_by_hash_is_scoped_to_source() {
        let (db, source, _dir) = test_db();
        let other = Source::new("Other", None);
        db.create_source(&other).unwrap();
        db.insert_puzzle(&record(source.id, "2020-12-21.puz", "aa")).unwrap();

        assert!(db.find_puzzle_by_hash(source.id, "aa").unwrap().is_some());
        assert!(db.find_puzzle_by_hash(other.id, "aa").unwrap().is_none());
        assert!(db.find_puzzle_by_hash(source.id, "bb").unwrap().is_none());
    }

    #[test]
    fn find_by_filename() {
        let (db, source, _dir) = test_db();
        let puzzle = record(source.id, "2020-12-21.puz", "aa");
        db.insert_puzzle(&puzzle).unwrap();

        let found = db.find_puzzle_by_filename(source.id, "2020-12-21.puz").unwrap();
        assert_eq!(found.map(|p| p.id), Some(puzzle.id));
        assert!(db
            .find_puzzle_by_filename(source.id, "2020-12-21-2.puz")
            .unwrap()
            .is_none());
    }

    #[test]
    fn deleting_source_cascades() {
        let (db, source, _dir) = test_db();
        db.insert_puzzle(&record(source.id, "2020-12-21.puz", "aa")).unwrap();
        db.delete_source(source.id).unwrap();
        assert!(db.list_puzzles_for_source(source.id).unwrap().is_empty());
    }
}
