//! In-memory representation of a decoded puzzle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checksum::Checksums;
use crate::error::{FormatError, Result};

/// Solution byte marking a black square.
pub const BLACK: u8 = b'.';
/// Fill byte for a white square the solver has not touched.
pub const EMPTY: u8 = b'-';
/// Fill byte used by diagramless puzzles for a black square.
pub const DIAGRAMLESS_BLACK: u8 = b':';

/// Markup flag: square is circled.
pub const MARKUP_CIRCLED: u8 = 0x80;
/// Markup flag: square was revealed.
pub const MARKUP_REVEALED: u8 = 0x40;
/// Markup flag: square currently incorrect.
pub const MARKUP_INCORRECT: u8 = 0x20;
/// Markup flag: square was previously marked incorrect.
pub const MARKUP_PREVIOUSLY_INCORRECT: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PuzzleKind {
    Normal,
    Diagramless,
}

impl PuzzleKind {
    pub fn from_flags(flags: u16) -> Result<Self> {
        match flags {
            0x0000 | 0x0001 => Ok(Self::Normal),
            0x0401 => Ok(Self::Diagramless),
            other => Err(FormatError::unsupported(format!(
                "unknown puzzle type flags 0x{other:04x}"
            ))),
        }
    }

    pub fn flags(self) -> u16 {
        match self {
            Self::Normal => 0x0001,
            Self::Diagramless => 0x0401,
        }
    }
}

/// How the header says the solution grid is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolutionState {
    #[default]
    Plain,
    /// Locked with a four-digit key; the bytes cannot be read directly.
    Scrambled,
    /// The file carries no solution, only the grid shape.
    NotProvided,
}

impl SolutionState {
    pub fn from_flags(flags: u16) -> Result<Self> {
        match flags {
            0x0000 => Ok(Self::Plain),
            0x0002 => Ok(Self::NotProvided),
            0x0004 => Ok(Self::Scrambled),
            other => Err(FormatError::unsupported(format!(
                "unknown solution state 0x{other:04x}"
            ))),
        }
    }

    pub fn flags(self) -> u16 {
        match self {
            Self::Plain => 0x0000,
            Self::NotProvided => 0x0002,
            Self::Scrambled => 0x0004,
        }
    }
}

/// Rebus squares (`GRBS`) and the solutions they point to (`RTBL`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rebus {
    /// One byte per square; zero means "no rebus", `n` means table key `n - 1`.
    pub squares: Vec<u8>,
    pub table: BTreeMap<u8, String>,
}

impl Rebus {
    /// Full rebus solution for the square at `index`, if it has one.
    pub fn solution_at(&self, index: usize) -> Option<&str> {
        let key = *self.squares.get(index)?;
        if key == 0 {
            return None;
        }
        self.table.get(&(key - 1)).map(String::as_str)
    }
}

/// Solving timer (`LTIM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub elapsed_secs: u32,
    pub running: bool,
}

/// An extra section we do not interpret, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: [u8; 4],
    pub data: Vec<u8>,
}

/// A numbered clue placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    pub number: u16,
    pub row: u8,
    pub col: u8,
    pub length: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Numbering {
    pub across: Vec<Clue>,
    pub down: Vec<Clue>,
}

impl Numbering {
    pub fn len(&self) -> usize {
        self.across.len() + self.down.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded Across Lite puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    /// Version string from the header, e.g. `"1.3"`.
    pub version: String,
    pub width: u8,
    pub height: u8,
    pub kind: PuzzleKind,
    pub solution_state: SolutionState,
    /// Row-major solution grid, `width * height` bytes.
    pub solution: Vec<u8>,
    /// Row-major player state grid, same shape as `solution`.
    pub fill: Vec<u8>,
    pub title: String,
    pub author: String,
    pub copyright: String,
    /// Clues in file order: by number, across before down for each number.
    pub clues: Vec<String>,
    pub notes: String,
    pub rebus: Option<Rebus>,
    /// Per-square `MARKUP_*` flags (`GEXT`).
    pub markup: Option<Vec<u8>>,
    pub timer: Option<Timer>,
    /// User-entered rebus strings per square (`RUSR`).
    pub user_rebus: Option<Vec<Option<String>>>,
    pub extra_sections: Vec<Section>,
    /// Bytes after the last section too short to be one, often a stray `\r\n`.
    pub postscript: Vec<u8>,
    /// Checksums as stored in the file. Ignored when encoding.
    pub checksums: Checksums,
}

impl Puzzle {
    /// Build an unsolved puzzle from a row-major solution string.
    ///
    /// Use `.` for black squares. The player grid starts empty.
    pub fn new(width: u8, height: u8, solution: &str, clues: Vec<String>) -> Result<Self> {
        let cells = usize::from(width) * usize::from(height);
        if cells == 0 {
            return Err(FormatError::corrupt("grid must have at least one square"));
        }
        let solution = solution.as_bytes().to_vec();
        if solution.len() != cells {
            return Err(FormatError::corrupt(format!(
                "solution has {} squares, expected {cells}",
                solution.len()
            )));
        }
        let fill = solution
            .iter()
            .map(|&c| if c == BLACK { BLACK } else { EMPTY })
            .collect();

        Ok(Self {
            version: "1.3".to_string(),
            width,
            height,
            kind: PuzzleKind::Normal,
            solution_state: SolutionState::Plain,
            solution,
            fill,
            title: String::new(),
            author: String::new(),
            copyright: String::new(),
            clues,
            notes: String::new(),
            rebus: None,
            markup: None,
            timer: None,
            user_rebus: None,
            extra_sections: Vec::new(),
            postscript: Vec::new(),
            checksums: Checksums::default(),
        })
    }

    pub fn cell_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    fn is_black(&self, row: usize, col: usize) -> bool {
        matches!(
            self.solution[row * usize::from(self.width) + col],
            BLACK | DIAGRAMLESS_BLACK
        )
    }

    /// Whether the square at `index` is circled.
    pub fn is_circled(&self, index: usize) -> bool {
        self.markup
            .as_ref()
            .and_then(|m| m.get(index))
            .is_some_and(|flags| flags & MARKUP_CIRCLED != 0)
    }

    /// Number the grid and attach clue text.
    ///
    /// Fails when the grid calls for a different number of clues than the
    /// file carries.
    pub fn numbering(&self) -> Result<Numbering> {
        let width = usize::from(self.width);
        let height = usize::from(self.height);
        let mut numbering = Numbering::default();
        let mut clues = self.clues.iter();
        let mut number: u16 = 1;

        for row in 0..height {
            for col in 0..width {
                if self.is_black(row, col) {
                    continue;
                }
                let across_len = self.run_length(row, col, 0, 1);
                let down_len = self.run_length(row, col, 1, 0);
                let starts_across = (col == 0 || self.is_black(row, col - 1)) && across_len > 1;
                let starts_down = (row == 0 || self.is_black(row - 1, col)) && down_len > 1;
                if !starts_across && !starts_down {
                    continue;
                }

                for (starts, len, list) in [
                    (starts_across, across_len, &mut numbering.across),
                    (starts_down, down_len, &mut numbering.down),
                ] {
                    if !starts {
                        continue;
                    }
                    let text = clues.next().ok_or_else(|| {
                        FormatError::corrupt(format!(
                            "grid needs more than the {} clues present",
                            self.clues.len()
                        ))
                    })?;
                    list.push(Clue {
                        number,
                        row: row as u8,
                        col: col as u8,
                        length: len as u8,
                        text: text.clone(),
                    });
                }
                number += 1;
            }
        }

        if clues.next().is_some() {
            return Err(FormatError::corrupt(format!(
                "file has {} clues but the grid only numbers {}",
                self.clues.len(),
                numbering.len()
            )));
        }
        Ok(numbering)
    }

    fn run_length(&self, row: usize, col: usize, drow: usize, dcol: usize) -> usize {
        let (mut r, mut c, mut len) = (row, col, 0);
        while r < usize::from(self.height) && c < usize::from(self.width) && !self.is_black(r, c) {
            len += 1;
            r += drow;
            c += dcol;
        }
        len
    }
}
