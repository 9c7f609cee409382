//! The import pass.
//!
//! One pass walks every active source's `import/` directory and drives each
//! complete pair to exactly one terminal state:
//!
//! - **accepted**: files claimed into `puzzles/` under a collision-free
//!   `{date}[-N]` name, record inserted, staged originals removed;
//! - **errored**: files claimed into `errors/` under `{base}_{timestamp}`
//!   with an `.error.txt` report, staged originals removed, no database work.
//!
//! Infrastructure failures (database, I/O, exhausted names) leave the pair
//! staged so the next pass retries it. The filesystem and the database are
//! the only record of what has been handled; the processor keeps no state
//! between pairs.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use puzfeed_store::{Database, PuzzleRecord, Source, StoreError};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::fsops;
use crate::layout::{check_folder_name, SourceLayout};
use crate::metadata::{resolve_author, resolve_title, PuzzleMetadata};
use crate::pairing::{scan_staging, StagedPair, META_EXT, PUZ_EXT};
use crate::resolver::{exists_in, resolve_name, ACCEPTED_EXTENSIONS, ERROR_EXTENSIONS};

/// How many times a lost race for a filename is retried before giving up.
const MAX_CLAIM_RETRIES: u32 = 8;

/// Persistence the processor needs.
///
/// Implemented for [`Database`]; tests substitute failing implementations.
pub trait PuzzleRepository {
    fn active_sources(&self) -> std::result::Result<Vec<Source>, StoreError>;

    fn find_by_hash(
        &self,
        source_id: Uuid,
        file_hash: &str,
    ) -> std::result::Result<Option<PuzzleRecord>, StoreError>;

    fn find_by_filename(
        &self,
        source_id: Uuid,
        filename: &str,
    ) -> std::result::Result<Option<PuzzleRecord>, StoreError>;

    fn insert_puzzle(&self, record: &PuzzleRecord) -> std::result::Result<(), StoreError>;

    fn puzzles_for_source(&self, source_id: Uuid) -> std::result::Result<Vec<PuzzleRecord>, StoreError>;
}

impl PuzzleRepository for Database {
    fn active_sources(&self) -> std::result::Result<Vec<Source>, StoreError> {
        self.list_sources()
    }

    fn find_by_hash(
        &self,
        source_id: Uuid,
        file_hash: &str,
    ) -> std::result::Result<Option<PuzzleRecord>, StoreError> {
        self.find_puzzle_by_hash(source_id, file_hash)
    }

    fn find_by_filename(
        &self,
        source_id: Uuid,
        filename: &str,
    ) -> std::result::Result<Option<PuzzleRecord>, StoreError> {
        self.find_puzzle_by_filename(source_id, filename)
    }

    fn insert_puzzle(&self, record: &PuzzleRecord) -> std::result::Result<(), StoreError> {
        Database::insert_puzzle(self, record)
    }

    fn puzzles_for_source(&self, source_id: Uuid) -> std::result::Result<Vec<PuzzleRecord>, StoreError> {
        self.list_puzzles_for_source(source_id)
    }
}

/// What happened to one staged pair.
#[derive(Debug)]
pub enum PairOutcome {
    Accepted { puzzle_id: Uuid, filename: String },
    Errored { report: PathBuf, reason: String },
    /// Already imported earlier; the staged copy was removed.
    Duplicate { existing: Uuid },
    /// Left staged for the next pass.
    Failed(ImportError),
}

/// Counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub accepted: usize,
    pub errored: usize,
    /// Half pairs left alone in staging.
    pub skipped: usize,
    pub duplicates: usize,
    /// Pairs left staged because of an infrastructure failure.
    pub failed: usize,
    /// Pass-level problems: missing folders, exhausted name searches.
    pub warnings: Vec<String>,
}

impl PassReport {
    fn record(&mut self, source: &str, pair: &StagedPair, outcome: &PairOutcome) {
        match outcome {
            PairOutcome::Accepted { .. } => self.accepted += 1,
            PairOutcome::Errored { .. } => self.errored += 1,
            PairOutcome::Duplicate { .. } => self.duplicates += 1,
            PairOutcome::Failed(err) => {
                self.failed += 1;
                if let ImportError::CollisionResolutionExhausted { .. } = err {
                    self.warnings.push(format!("{source}/{}: {err}", pair.base));
                }
            }
        }
    }

    /// True when the pass moved nothing.
    pub fn is_idle(&self) -> bool {
        self.accepted == 0 && self.errored == 0 && self.duplicates == 0
    }
}

/// Drives import passes over a puzzle root.
pub struct Processor<R> {
    puzzles_root: PathBuf,
    repo: R,
    max_suffix: u32,
}

impl<R: PuzzleRepository> Processor<R> {
    pub fn new(puzzles_root: impl Into<PathBuf>, repo: R) -> Self {
        Self {
            puzzles_root: puzzles_root.into(),
            repo,
            max_suffix: 1000,
        }
    }

    /// Upper bound on the `-N` suffix search.
    pub fn with_max_suffix(mut self, max_suffix: u32) -> Self {
        self.max_suffix = max_suffix.max(1);
        self
    }

    pub fn puzzles_root(&self) -> &Path {
        &self.puzzles_root
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Run one full pass over every active source.
    pub fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        if !self.puzzles_root.is_dir() {
            let msg = format!("puzzle root {} does not exist", self.puzzles_root.display());
            warn!("{msg}");
            report.warnings.push(msg);
            return report;
        }

        let sources = match self.repo.active_sources() {
            Ok(sources) => sources,
            Err(e) => {
                error!(error = %e, "could not load sources, skipping pass");
                report.warnings.push(format!("could not load sources: {e}"));
                return report;
            }
        };

        self.log_unknown_folders(&sources);

        for source in &sources {
            self.process_source(source, &mut report);
        }

        info!(
            accepted = report.accepted,
            errored = report.errored,
            skipped = report.skipped,
            duplicates = report.duplicates,
            failed = report.failed,
            warnings = report.warnings.len(),
            "import pass complete"
        );
        report
    }

    fn log_unknown_folders(&self, sources: &[Source]) {
        let known: HashSet<String> = sources.iter().map(Source::folder_name).collect();
        let Ok(entries) = std::fs::read_dir(&self.puzzles_root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !known.contains(&name) {
                debug!(folder = %name, "skipping unknown source folder");
            }
        }
    }

    fn process_source(&self, source: &Source, report: &mut PassReport) {
        let folder = source.folder_name();
        if let Err(e) = check_folder_name(&folder) {
            warn!(source = %source.id, error = %e, "skipping source");
            report.warnings.push(format!("source {}: {e}", source.id));
            return;
        }
        let layout = SourceLayout::for_folder(&self.puzzles_root, &folder);

        if !layout.staging_dir.is_dir() {
            warn!(source = %folder, path = %layout.staging_dir.display(), "staging directory missing, skipping source");
            report
                .warnings
                .push(format!("{folder}: staging directory {} is missing", layout.staging_dir.display()));
            return;
        }

        let scan = match scan_staging(&layout.staging_dir) {
            Ok(scan) => scan,
            Err(e) => {
                warn!(source = %folder, error = %e, "could not list staging directory");
                report.warnings.push(format!("{folder}: could not list staging directory: {e}"));
                return;
            }
        };

        for base in &scan.incomplete {
            debug!(source = %folder, base = %base, "waiting for the other half of the pair");
        }
        report.skipped += scan.incomplete.len();

        for pair in &scan.pairs {
            let outcome = self.process_pair(source, &layout, pair);
            report.record(&folder, pair, &outcome);
        }
    }

    /// Drive one pair to its outcome.
    pub fn process_pair(&self, source: &Source, layout: &SourceLayout, pair: &StagedPair) -> PairOutcome {
        match self.import_pair(source, layout, pair) {
            Ok(outcome) => outcome,
            Err(err) if err.is_terminal() => match self.reject_pair(layout, pair, &err) {
                Ok(report) => {
                    error!(
                        base = %pair.base,
                        report = %report.display(),
                        error = %err,
                        "moved failed import to errors"
                    );
                    PairOutcome::Errored {
                        report,
                        reason: err.to_string(),
                    }
                }
                Err(move_err) => {
                    error!(base = %pair.base, error = %move_err, cause = %err, "could not move failed import");
                    PairOutcome::Failed(move_err)
                }
            },
            Err(err) => {
                warn!(base = %pair.base, error = %err, "import failed, leaving pair staged");
                PairOutcome::Failed(err)
            }
        }
    }

    fn import_pair(&self, source: &Source, layout: &SourceLayout, pair: &StagedPair) -> Result<PairOutcome> {
        let meta_bytes = std::fs::read(&pair.meta_path).map_err(|e| ImportError::io(&pair.meta_path, e))?;
        let metadata = PuzzleMetadata::parse(&meta_bytes)?;

        let puz_bytes = std::fs::read(&pair.puz_path).map_err(|e| ImportError::io(&pair.puz_path, e))?;
        let decoded = puzfeed_format::decode(&puz_bytes)?;
        let file_hash = blake3::hash(&puz_bytes).to_hex().to_string();

        if let Some(existing) = self.repo.find_by_hash(source.id, &file_hash)? {
            return self.drop_duplicate(pair, existing.id);
        }

        let title = resolve_title(&metadata, &decoded.title);
        let author = resolve_author(&metadata, &decoded.author);

        let mut record = PuzzleRecord {
            id: Uuid::new_v4(),
            source_id: source.id,
            title,
            author,
            puzzle_date: metadata.puzzle_date,
            filename: String::new(),
            file_hash,
            created_at: Utc::now(),
        };

        // filenames held by rows whose files are gone from disk
        let mut recorded: HashSet<String> = HashSet::new();
        loop {
            let (name, claimed) = self.claim_pair(
                pair,
                &layout.accepted_dir,
                &metadata.date_stem(),
                ACCEPTED_EXTENSIONS,
                |file_name| recorded.contains(file_name),
            )?;
            record.filename = format!("{name}{PUZ_EXT}");

            let Err(e) = self.repo.insert_puzzle(&record) else {
                break;
            };
            fsops::release(claimed.iter().map(PathBuf::as_path));
            if let StoreError::Conflict(_) = e {
                // another pass imported the same bytes first
                if let Some(existing) = self.repo.find_by_hash(source.id, &record.file_hash)? {
                    return self.drop_duplicate(pair, existing.id);
                }
                if let Some(stale) = self.repo.find_by_filename(source.id, &record.filename)? {
                    warn!(
                        filename = %record.filename,
                        puzzle_id = %stale.id,
                        "filename is recorded but missing on disk, trying the next name"
                    );
                    recorded.insert(record.filename.clone());
                    continue;
                }
            }
            return Err(ImportError::PersistenceFailure(e));
        }

        self.remove_staged(pair);

        info!(
            puzzle_id = %record.id,
            filename = %record.filename,
            title = %record.title,
            date = %record.puzzle_date,
            "imported puzzle"
        );
        Ok(PairOutcome::Accepted {
            puzzle_id: record.id,
            filename: record.filename,
        })
    }

    fn drop_duplicate(&self, pair: &StagedPair, existing: Uuid) -> Result<PairOutcome> {
        info!(base = %pair.base, existing = %existing, "puzzle already imported, removing staged copy");
        for path in [&pair.puz_path, &pair.meta_path] {
            fsops::remove_if_present(path).map_err(|e| ImportError::io(path, e))?;
        }
        Ok(PairOutcome::Duplicate { existing })
    }

    /// Resolve a free name in `dir` and claim both files under it.
    ///
    /// A name is free when no companion file exists in `dir` and `reserved`
    /// does not hold it either. A claim that loses a race to another writer
    /// re-resolves and tries again. Returns the chosen name and the claimed
    /// paths.
    fn claim_pair(
        &self,
        pair: &StagedPair,
        dir: &Path,
        base: &str,
        extensions: &[&str],
        reserved: impl Fn(&str) -> bool,
    ) -> Result<(String, Vec<PathBuf>)> {
        std::fs::create_dir_all(dir).map_err(|e| ImportError::io(dir, e))?;
        let on_disk = exists_in(dir);

        let mut retries = 0;
        loop {
            let name = resolve_name(base, extensions, self.max_suffix, |file_name| {
                on_disk(file_name) || reserved(file_name)
            })?;
            let moves = vec![
                (pair.puz_path.clone(), dir.join(format!("{name}{PUZ_EXT}"))),
                (pair.meta_path.clone(), dir.join(format!("{name}{META_EXT}"))),
            ];
            match fsops::claim_all(&moves) {
                Ok(()) => return Ok((name, moves.into_iter().map(|(_, dest)| dest).collect())),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && retries < MAX_CLAIM_RETRIES => {
                    retries += 1;
                    debug!(name = %name, retries, "filename taken concurrently, resolving again");
                }
                Err(e) => return Err(ImportError::io(&moves[0].1, e)),
            }
        }
    }

    /// Move a bad pair to `errors/` and write the report next to it.
    ///
    /// A pair already filed there byte for byte (left staged by an
    /// interrupted pass) only has its staged copy removed.
    fn reject_pair(&self, layout: &SourceLayout, pair: &StagedPair, err: &ImportError) -> Result<PathBuf> {
        if let Some(report) = prior_rejection(&layout.error_dir, pair)? {
            debug!(base = %pair.base, report = %report.display(), "pair was already filed in errors");
            self.remove_staged(pair);
            return Ok(report);
        }

        let stamped = format!("{}_{}", pair.base, Utc::now().format("%Y%m%d_%H%M%S"));
        let (name, claimed) = self.claim_pair(pair, &layout.error_dir, &stamped, ERROR_EXTENSIONS, |_| false)?;

        let report = layout.error_dir.join(format!("{name}.error.txt"));
        if let Err(e) = std::fs::write(&report, format!("{err}\n")) {
            fsops::release(claimed.iter().map(PathBuf::as_path));
            return Err(ImportError::io(&report, e));
        }

        self.remove_staged(pair);
        Ok(report)
    }

    /// Remove the staged originals after their copies were committed.
    ///
    /// A leftover original is harmless: the next pass recognizes it by hash
    /// or fails it again.
    fn remove_staged(&self, pair: &StagedPair) {
        for path in [&pair.puz_path, &pair.meta_path] {
            if let Err(e) = fsops::remove_if_present(path) {
                warn!(path = %path.display(), error = %e, "could not remove staged file");
            }
        }
    }
}

/// The report of an earlier rejection of the same two files, if any.
///
/// Candidates are `{base}_*` entries in `error_dir` with a report next to
/// them; both files must match the staged ones exactly.
fn prior_rejection(error_dir: &Path, pair: &StagedPair) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(error_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ImportError::io(error_dir, e)),
    };

    let prefix = format!("{}_", pair.base);
    let mut staged: Option<(blake3::Hash, blake3::Hash)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| ImportError::io(error_dir, e))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(name) = file_name
            .strip_suffix(PUZ_EXT)
            .filter(|name| name.starts_with(&prefix))
        else {
            continue;
        };
        let report = error_dir.join(format!("{name}.error.txt"));
        let meta = error_dir.join(format!("{name}{META_EXT}"));
        if !report.is_file() || !meta.is_file() {
            continue;
        }

        let wanted = match staged {
            Some(hashes) => hashes,
            None => *staged.insert((hash_file(&pair.puz_path)?, hash_file(&pair.meta_path)?)),
        };
        if (hash_file(&entry.path())?, hash_file(&meta)?) == wanted {
            return Ok(Some(report));
        }
    }
    Ok(None)
}

fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let bytes = std::fs::read(path).map_err(|e| ImportError::io(path, e))?;
    Ok(blake3::hash(&bytes))
}
