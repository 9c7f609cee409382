//! Grouping staged files into puzzle/sidecar pairs.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub const PUZ_EXT: &str = ".puz";
pub const META_EXT: &str = ".meta.json";

/// A `.puz` file and its `.meta.json` sidecar sharing a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPair {
    pub base: String,
    pub puz_path: PathBuf,
    pub meta_path: PathBuf,
}

/// Result of listing one staging directory.
#[derive(Debug, Default)]
pub struct StagingScan {
    /// Complete pairs, ordered by base name.
    pub pairs: Vec<StagedPair>,
    /// Base names with only one of the two files (possibly still uploading).
    pub incomplete: Vec<String>,
}

#[derive(Default)]
struct Seen {
    puz: bool,
    meta: bool,
}

/// List `dir` and pair up its files.
///
/// Hidden files, subdirectories and unrelated extensions are ignored.
pub fn scan_staging(dir: &Path) -> io::Result<StagingScan> {
    let mut seen: BTreeMap<String, Seen> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        if let Some(base) = name.strip_suffix(META_EXT) {
            seen.entry(base.to_string()).or_default().meta = true;
        } else if let Some(base) = name.strip_suffix(PUZ_EXT) {
            seen.entry(base.to_string()).or_default().puz = true;
        }
    }

    let mut scan = StagingScan::default();
    for (base, files) in seen {
        if base.is_empty() {
            continue;
        }
        if files.puz && files.meta {
            scan.pairs.push(StagedPair {
                puz_path: dir.join(format!("{base}{PUZ_EXT}")),
                meta_path: dir.join(format!("{base}{META_EXT}")),
                base,
            });
        } else {
            scan.incomplete.push(base);
        }
    }
    Ok(scan)
}
