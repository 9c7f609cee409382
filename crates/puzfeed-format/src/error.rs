use thiserror::Error;

/// Errors produced while decoding or encoding an Across Lite puzzle file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Structural damage: bad magic, truncation, checksum mismatch,
    /// impossible grid dimensions.
    #[error("Corrupt puzzle file: {0}")]
    CorruptFormat(String),

    /// A well-formed file that uses flags or an encoding we do not know.
    #[error("Unsupported puzzle variant: {0}")]
    UnsupportedVariant(String),
}

impl FormatError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptFormat(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedVariant(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormatError>;
