//! Source lifecycle: the database row and the folder tree move together.

use std::path::Path;

use puzfeed_store::{Database, Source, StoreError};
use tracing::{info, warn};

use crate::error::{ImportError, Result};
use crate::layout::{check_folder_name, provision, teardown, SourceLayout};

/// Register a source and create its folders.
///
/// Fails if another source already maps to the same folder name.
pub fn add_source(
    db: &Database,
    puzzles_root: &Path,
    name: &str,
    short_code: Option<&str>,
) -> Result<(Source, SourceLayout)> {
    let source = Source::new(name, short_code);
    let folder = source.folder_name();
    check_folder_name(&folder)?;

    if let Some(existing) = db.find_source(&folder)? {
        return Err(ImportError::PersistenceFailure(StoreError::Conflict(format!(
            "folder {folder:?} is already used by source {}",
            existing.id
        ))));
    }

    db.create_source(&source)?;
    let layout = match provision(puzzles_root, &source) {
        Ok(layout) => layout,
        Err(e) => {
            // keep the row and the tree in step
            if let Err(undo) = db.delete_source(source.id) {
                warn!(source = %source.id, error = %undo, "could not roll back source row");
            }
            return Err(e);
        }
    };

    info!(source = %source.id, folder = %folder, name = %source.name, "added source");
    Ok((source, layout))
}

/// Delete a source (by short code or id), its puzzle rows and its folders.
///
/// Returns `None` when no source matches.
pub fn remove_source(db: &Database, puzzles_root: &Path, identifier: &str) -> Result<Option<Source>> {
    let Some(source) = db.find_source(identifier)? else {
        return Ok(None);
    };

    db.delete_source(source.id)?;
    teardown(puzzles_root, &source)?;

    info!(source = %source.id, name = %source.name, "removed source");
    Ok(Some(source))
}

/// Ensure every registered source has its folders. Safe to repeat.
pub fn provision_all(db: &Database, puzzles_root: &Path) -> Result<Vec<SourceLayout>> {
    let mut layouts = Vec::new();
    for source in db.list_sources()? {
        layouts.push(provision(puzzles_root, &source)?);
    }
    Ok(layouts)
}
