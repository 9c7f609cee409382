//! Per-source directory layout.
//!
//! ```text
//! {puzzles_root}/{folder_name}/
//!   import/    staged {base}.puz + {base}.meta.json pairs
//!   puzzles/   accepted {date}[-N].puz, .meta.json, .preview.png
//!   errors/    rejected {base}_{timestamp}.puz, .meta.json, .error.txt
//!   icon.png   optional
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};

use puzfeed_store::Source;
use tracing::{debug, info};

use crate::error::{ImportError, Result};

pub const STAGING_DIR: &str = "import";
pub const ACCEPTED_DIR: &str = "puzzles";
pub const ERROR_DIR: &str = "errors";
pub const ICON_FILE: &str = "icon.png";

/// Paths of one source's tree. Computing it never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub root: PathBuf,
    pub staging_dir: PathBuf,
    pub accepted_dir: PathBuf,
    pub error_dir: PathBuf,
    pub icon_path: PathBuf,
}

impl SourceLayout {
    pub fn for_folder(puzzles_root: &Path, folder_name: &str) -> Self {
        let root = puzzles_root.join(folder_name);
        Self {
            staging_dir: root.join(STAGING_DIR),
            accepted_dir: root.join(ACCEPTED_DIR),
            error_dir: root.join(ERROR_DIR),
            icon_path: root.join(ICON_FILE),
            root,
        }
    }

    /// The icon path, if an icon has been dropped in.
    pub fn icon(&self) -> Option<&Path> {
        self.icon_path.is_file().then_some(self.icon_path.as_path())
    }
}

/// Layout for a source, keyed by its folder name.
pub fn layout_for(puzzles_root: &Path, source: &Source) -> SourceLayout {
    SourceLayout::for_folder(puzzles_root, &source.folder_name())
}

/// Reject folder names that would not stay a single directory under the root.
pub fn check_folder_name(folder_name: &str) -> Result<()> {
    let mut components = Path::new(folder_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None)
            if !folder_name.contains('/') && !folder_name.contains('\\') =>
        {
            Ok(())
        }
        _ => Err(ImportError::UnsafeFolderName(folder_name.to_string())),
    }
}

/// Create the staging, accepted and error directories. Safe to repeat.
pub fn provision(puzzles_root: &Path, source: &Source) -> Result<SourceLayout> {
    let folder = source.folder_name();
    check_folder_name(&folder)?;
    let layout = SourceLayout::for_folder(puzzles_root, &folder);

    for dir in [&layout.staging_dir, &layout.accepted_dir, &layout.error_dir] {
        std::fs::create_dir_all(dir).map_err(|e| ImportError::io(dir, e))?;
    }

    info!(source = %folder, path = %layout.root.display(), "provisioned source folders");
    Ok(layout)
}

/// Remove a source's whole tree.
///
/// Returns `false` when there was nothing to remove.
pub fn teardown(puzzles_root: &Path, source: &Source) -> Result<bool> {
    let folder = source.folder_name();
    check_folder_name(&folder)?;
    let layout = SourceLayout::for_folder(puzzles_root, &folder);

    match std::fs::remove_dir_all(&layout.root) {
        Ok(()) => {
            info!(source = %folder, "removed source folders");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(source = %folder, "no folders to remove");
            Ok(false)
        }
        Err(e) => Err(ImportError::io(&layout.root, e)),
    }
}
