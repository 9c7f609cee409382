use std::path::{Path, PathBuf};

use puzfeed_format::FormatError;
use puzfeed_store::StoreError;
use thiserror::Error;

/// Why a staged pair (or a whole source) could not be imported.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The sidecar is unreadable as JSON or lacks a valid `puzzle_date`.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Corrupt puzzle file: {0}")]
    CorruptFormat(String),

    #[error("Unsupported puzzle variant: {0}")]
    UnsupportedVariant(String),

    /// Database unavailable or rejected the write; the pair stays staged.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("No free filename for {base} after {attempts} candidates")]
    CollisionResolutionExhausted { base: String, attempts: u32 },

    /// A source's folder name would escape the puzzle root.
    #[error("Unsafe folder name: {0:?}")]
    UnsafeFolderName(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImportError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the failure is a property of the pair itself.
    ///
    /// Terminal failures route the pair to `errors/`; everything else leaves
    /// it staged for the next pass.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidMetadata(_) | Self::CorruptFormat(_) | Self::UnsupportedVariant(_)
        )
    }
}

impl From<FormatError> for ImportError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::CorruptFormat(msg) => Self::CorruptFormat(msg),
            FormatError::UnsupportedVariant(msg) => Self::UnsupportedVariant(msg),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ImportError>;
