use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::Source;

const SOURCE_COLUMNS: &str = "id, name, short_code, created_at";

impl Database {
    pub fn create_source(&self, source: &Source) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sources (id, name, short_code, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                source.id.to_string(),
                source.name,
                source.short_code,
                source.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_source(&self, id: Uuid) -> Result<Source> {
        let source = self.conn().query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
            params![id.to_string()],
            row_to_source,
        )?;
        Ok(source)
    }

    /// Look a source up by short code first, then by UUID string.
    pub fn find_source(&self, identifier: &str) -> Result<Option<Source>> {
        let by_code = self
            .conn()
            .query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE short_code = ?1"),
                params![identifier],
                row_to_source,
            )
            .optional()?;
        if by_code.is_some() {
            return Ok(by_code);
        }

        let Ok(id) = Uuid::parse_str(identifier) else {
            return Ok(None);
        };
        let by_id = self
            .conn()
            .query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                params![id.to_string()],
                row_to_source,
            )
            .optional()?;
        Ok(by_id)
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map([], row_to_source)?;

        let mut sources = Vec::new();
        for row in rows {
            sources.push(row?);
        }
        Ok(sources)
    }

    // ON DELETE CASCADE: the source's puzzle rows go with it
    pub fn delete_source(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sources WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<Source> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let short_code: Option<String> = row.get(2)?;
    let created_str: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Source {
        id,
        name,
        short_code,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    #[test]
    fn create_and_list() {
        let (db, _dir) = test_db();
        let b = Source::new("Beta", None);
        let a = Source::new("Alpha", Some("alpha"));
        db.create_source(&b).unwrap();
        db.create_source(&a).unwrap();

        let names: Vec<String> = db.list_sources().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert_eq!(db.get_source(a.id).unwrap().short_code.as_deref(), Some("alpha"));
    }

    #[test]
    fn duplicate_short_code_conflicts() {
        let (db, _dir) = test_db();
        db.create_source(&Source::new("One", Some("same"))).unwrap();
        let err = db.create_source(&Source::new("Two", Some("same"))).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn find_by_short_code_or_uuid() {
        let (db, _dir) = test_db();
        let coded = Source::new("Coded", Some("cd"));
        let plain = Source::new("Plain", None);
        db.create_source(&coded).unwrap();
        db.create_source(&plain).unwrap();

        assert_eq!(db.find_source("cd").unwrap().unwrap().id, coded.id);
        assert_eq!(db.find_source(&plain.id.to_string()).unwrap().unwrap().id, plain.id);
        assert!(db.find_source("nope").unwrap().is_none());
    }

    #[test]
    fn get_missing_source_is_not_found() {
        let (db, _dir) = test_db();
        assert!(matches!(db.get_source(Uuid::new_v4()), Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_source() {
        let (db, _dir) = test_db();
        let source = Source::new("Gone", None);
        db.create_source(&source).unwrap();
        assert!(db.delete_source(source.id).unwrap());
        assert!(!db.delete_source(source.id).unwrap());
    }
}
