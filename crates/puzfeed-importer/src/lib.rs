//! # puzfeed-importer
//!
//! Turns uploaded `.puz` + `.meta.json` pairs into catalogued puzzles.
//!
//! Each source owns a folder tree under the puzzle root. A pass lists every
//! source's `import/` directory, validates each complete pair, and either
//! files it into `puzzles/` with a database record or sets it aside in
//! `errors/` with a report. Pairs that hit an infrastructure failure stay in
//! `import/` and are retried on the next pass.

pub mod config;
pub mod error;
pub mod fsops;
pub mod layout;
pub mod metadata;
pub mod pairing;
pub mod processor;
pub mod reconcile;
pub mod resolver;
pub mod sources;

pub use config::ImporterConfig;
pub use error::{ImportError, Result};
pub use layout::SourceLayout;
pub use processor::{PairOutcome, PassReport, Processor, PuzzleRepository};
pub use reconcile::{MissingFile, ReconcileReport};
