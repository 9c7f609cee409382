//! Collision-free filename selection.
//!
//! Candidates are tried in the fixed order `{base}`, `{base}-2`, `{base}-3`,
//! ... and a candidate is free only when none of its companion files exist.
//! The existence check is a plain predicate so the search can run against
//! anything, a real directory or a set in a test.

use std::path::Path;

use crate::error::{ImportError, Result};

/// Extensions that share a base name inside `puzzles/`.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[".puz", ".meta.json", ".preview.png"];

/// Extensions that share a base name inside `errors/`.
pub const ERROR_EXTENSIONS: &[&str] = &[".puz", ".meta.json", ".error.txt"];

/// The `n`th candidate name, counting from 1.
pub fn candidate(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

/// First candidate in `1..=max_suffix` whose companion files are all absent.
pub fn resolve_name(
    base: &str,
    extensions: &[&str],
    max_suffix: u32,
    exists: impl Fn(&str) -> bool,
) -> Result<String> {
    (1..=max_suffix)
        .map(|n| candidate(base, n))
        .find(|name| !extensions.iter().any(|ext| exists(&format!("{name}{ext}"))))
        .ok_or_else(|| ImportError::CollisionResolutionExhausted {
            base: base.to_string(),
            attempts: max_suffix,
        })
}

/// Existence predicate over the entries of `dir`.
pub fn exists_in(dir: &Path) -> impl Fn(&str) -> bool + '_ {
    move |file_name| dir.join(file_name).exists()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn resolve(existing: &[&str]) -> Result<String> {
        let set: HashSet<&str> = existing.iter().copied().collect();
        resolve_name("2020-12-21", ACCEPTED_EXTENSIONS, 1000, |name| set.contains(name))
    }

    #[test]
    fn free_base_is_used_as_is() {
        assert_eq!(resolve(&[]).unwrap(), "2020-12-21");
    }

    #[test]
    fn suffixes_grow_by_one() {
        assert_eq!(
            resolve(&["2020-12-21.puz", "2020-12-21.meta.json"]).unwrap(),
            "2020-12-21-2"
        );
        assert_eq!(
            resolve(&[
                "2020-12-21.puz",
                "2020-12-21.meta.json",
                "2020-12-21-2.puz",
                "2020-12-21-2.meta.json",
            ])
            .unwrap(),
            "2020-12-21-3"
        );
    }

    #[test]
    fn any_companion_file_blocks_a_name() {
        assert_eq!(resolve(&["2020-12-21.meta.json"]).unwrap(), "2020-12-21-2");
        assert_eq!(resolve(&["2020-12-21.preview.png"]).unwrap(), "2020-12-21-2");
    }

    #[test]
    fn gaps_are_filled_first() {
        // -2 is free even though -3 is taken
        assert_eq!(
            resolve(&["2020-12-21.puz", "2020-12-21-3.puz"]).unwrap(),
            "2020-12-21-2"
        );
    }

    #[test]
    fn gives_up_after_max_suffix() {
        let err = resolve_name("d", &[".puz"], 3, |_| true).unwrap_err();
        assert!(matches!(
            err,
            ImportError::CollisionResolutionExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn checks_real_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2020-12-21.puz"), b"").unwrap();
        let name = resolve_name("2020-12-21", ACCEPTED_EXTENSIONS, 10, exists_in(dir.path())).unwrap();
        assert_eq!(name, "2020-12-21-2");
    }
}
