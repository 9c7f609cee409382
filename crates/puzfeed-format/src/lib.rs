//! # puzfeed-format
//!
//! Reader and writer for the Across Lite `.puz` crossword format.
//!
//! Decoding is pure: it takes a byte slice and either returns a [`Puzzle`]
//! or a [`FormatError`]. All three header checksums and every extra-section
//! checksum are verified, so a file that decodes is byte-for-byte what its
//! author saved. Rebus, diagramless and scrambled puzzles are represented
//! through optional fields and flags rather than rejected.

pub mod checksum;
pub mod decode;
pub mod encode;
pub mod puzzle;
pub mod text;

mod error;

pub use checksum::Checksums;
pub use decode::decode;
pub use encode::encode;
pub use error::{FormatError, Result};
pub use puzzle::{Clue, Numbering, Puzzle, PuzzleKind, Rebus, Section, SolutionState, Timer};
