//! No-clobber file placement.
//!
//! A staged file is moved in two steps: [`claim`] links it under its final
//! name (failing with `AlreadyExists` rather than replacing anything), and
//! the staged original is removed only once the caller has committed to the
//! import. Between the two steps the file is visible in both places, never in
//! neither.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Place `src` at `dest` unless `dest` already exists.
///
/// Uses a hard link, which is atomic and refuses to overwrite. Across
/// filesystems the file is copied to a temporary name next to `dest`, synced,
/// and then linked into place, so a reader never observes a half-written
/// `dest`. Where the destination filesystem has no hard links at all the
/// file is copied straight into a newly created `dest`.
pub fn claim(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(src = %src.display(), dest = %dest.display(), "crossing filesystems, copying");
            copy_claim(src, dest)
        }
        Err(e) if links_unsupported(&e) => {
            debug!(src = %src.display(), dest = %dest.display(), error = %e, "hard links refused, copying");
            write_new(src, dest)
        }
        Err(e) => Err(e),
    }
}

/// Whether a failed `hard_link` means the filesystem cannot link at all.
///
/// Linux reports `EPERM` for vfat and many SMB and FUSE mounts. A genuine
/// permission problem fails again in [`write_new`] with the same error.
fn links_unsupported(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied)
}

fn copy_claim(src: &Path, dest: &Path) -> io::Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{name}.{}.tmp", Uuid::new_v4()));

    let result = fs::copy(src, &tmp)
        .and_then(|_| File::open(&tmp)?.sync_all())
        .and_then(|_| match fs::hard_link(&tmp, dest) {
            Err(e) if links_unsupported(&e) => write_new(&tmp, dest),
            other => other,
        });

    if let Err(e) = fs::remove_file(&tmp) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %tmp.display(), error = %e, "failed to remove temporary copy");
        }
    }
    result
}

/// Copy `src` into a `dest` that must not exist yet, then sync it.
///
/// `create_new` keeps the no-clobber guarantee without links. A partly
/// written `dest` is removed before the error is returned.
fn write_new(src: &Path, dest: &Path) -> io::Result<()> {
    let mut out = OpenOptions::new().write(true).create_new(true).open(dest)?;
    let result = fill_from(src, &mut out);
    drop(out);
    if result.is_err() {
        if let Err(e) = remove_if_present(dest) {
            warn!(path = %dest.display(), error = %e, "failed to remove partial copy");
        }
    }
    result
}

fn fill_from(src: &Path, out: &mut File) -> io::Result<()> {
    let mut input = File::open(src)?;
    io::copy(&mut input, out)?;
    out.sync_all()
}

/// Claim several files as a unit.
///
/// If any claim fails the ones already made are released and the first error
/// is returned.
pub fn claim_all(moves: &[(PathBuf, PathBuf)]) -> io::Result<()> {
    for (i, (src, dest)) in moves.iter().enumerate() {
        if let Err(e) = claim(src, dest) {
            release(moves[..i].iter().map(|(_, dest)| dest.as_path()));
            return Err(e);
        }
    }
    Ok(())
}

/// Undo claims by removing their destinations.
pub fn release<'a>(dests: impl IntoIterator<Item = &'a Path>) {
    for dest in dests {
        if let Err(e) = remove_if_present(dest) {
            warn!(path = %dest.display(), error = %e, "failed to release claimed file");
        }
    }
}

/// Remove a file; a file that is already gone is not an error.
pub fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_links_without_touching_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.puz");
        let dest = dir.path().join("b.puz");
        fs::write(&src, b"data").unwrap();

        claim(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"data");
        assert!(src.exists());
    }

    #[test]
    fn claim_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.puz");
        let dest = dir.path().join("b.puz");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = claim(&src, &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn copy_claim_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.puz");
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"data").unwrap();

        copy_claim(&src, &out.join("b.puz")).unwrap();
        let names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["b.puz"]);

        assert_eq!(
            copy_claim(&src, &out.join("b.puz")).unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn write_new_copies_without_clobbering() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.puz");
        let dest = dir.path().join("b.puz");
        fs::write(&src, b"data").unwrap();

        write_new(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"data");
        assert!(src.exists());

        fs::write(&src, b"newer").unwrap();
        assert_eq!(write_new(&src, &dest).unwrap_err().kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn write_new_cleans_up_when_source_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("b.puz");

        assert_eq!(
            write_new(&dir.path().join("gone.puz"), &dest).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(!dest.exists());
    }

    #[test]
    fn refused_links_fall_back_to_copying() {
        assert!(links_unsupported(&io::Error::from(ErrorKind::PermissionDenied)));
        assert!(links_unsupported(&io::Error::from(ErrorKind::Unsupported)));
        assert!(!links_unsupported(&io::Error::from(ErrorKind::AlreadyExists)));
        assert!(!links_unsupported(&io::Error::from(ErrorKind::NotFound)));
    }

    #[test]
    fn claim_all_rolls_back_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        fs::write(d.join("x.puz"), b"p").unwrap();
        fs::write(d.join("x.meta.json"), b"m").unwrap();
        fs::write(d.join("taken.meta.json"), b"other").unwrap();

        let moves = vec![
            (d.join("x.puz"), d.join("taken.puz")),
            (d.join("x.meta.json"), d.join("taken.meta.json")),
        ];
        assert!(claim_all(&moves).is_err());
        assert!(!d.join("taken.puz").exists());
        assert_eq!(fs::read(d.join("taken.meta.json")).unwrap(), b"other");
    }

    #[test]
    fn remove_if_present_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        remove_if_present(&dir.path().join("nope")).unwrap();
    }
}
