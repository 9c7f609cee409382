//! Binary decoder for Across Lite `.puz` files.

use std::collections::BTreeMap;

use crate::checksum::{checksum_region, Checksums, TextFields};
use crate::error::{FormatError, Result};
use crate::puzzle::{Puzzle, PuzzleKind, Rebus, Section, SolutionState, Timer};
use crate::text::{parse_version, TextEncoding};

/// File magic, found two bytes into the header.
pub const MAGIC: &[u8; 12] = b"ACROSS&DOWN\0";

/// Offset of the width byte, where the checksummed CIB block starts.
pub(crate) const CIB_OFFSET: usize = 0x2C;
pub(crate) const CIB_LEN: usize = 8;

/// Title, length and checksum in front of every extra section.
const SECTION_HEADER_LEN: usize = 8;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining().len() < n {
            return Err(FormatError::corrupt(format!("truncated while reading {what}")));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn array4(&mut self, what: &str) -> Result<[u8; 4]> {
        let b = self.take(4, what)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// NUL-terminated string, returned without the terminator.
    fn zstring(&mut self, what: &str) -> Result<&'a [u8]> {
        let rest = self.remaining();
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| FormatError::corrupt(format!("unterminated {what}")))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }
}

/// Decode a puzzle from raw file bytes.
///
/// Bytes before the header (some generators prepend a preamble) are skipped.
/// Every checksum in the file is verified.
pub fn decode(bytes: &[u8]) -> Result<Puzzle> {
    let magic_at = bytes
        .windows(MAGIC.len())
        .position(|w| w == MAGIC)
        .filter(|&at| at >= 2)
        .ok_or_else(|| FormatError::corrupt("missing ACROSS&DOWN magic"))?;
    let data = &bytes[magic_at - 2..];
    let mut r = Reader::new(data);

    let global = r.u16("global checksum")?;
    r.take(MAGIC.len(), "magic")?;
    let cib = r.u16("CIB checksum")?;
    let masked_low = r.array4("masked checksums")?;
    let masked_high = r.array4("masked checksums")?;
    let version_raw = r.take(4, "version")?;
    r.take(2, "reserved")?;
    let scrambled_checksum = r.u16("scrambled checksum")?;
    r.take(12, "reserved")?;
    let width = r.u8("width")?;
    let height = r.u8("height")?;
    let clue_count = r.u16("clue count")?;
    let kind = PuzzleKind::from_flags(r.u16("puzzle type")?)?;
    let solution_state = SolutionState::from_flags(r.u16("solution state")?)?;

    let version_end = version_raw.iter().position(|&b| b == 0).unwrap_or(4);
    let version = TextEncoding::Latin1.decode(&version_raw[..version_end])?;
    let version_tuple = parse_version(&version)?;
    if version_tuple.0 >= 3 {
        return Err(FormatError::unsupported(format!("format version {version}")));
    }
    let encoding = TextEncoding::for_version(version_tuple);

    if width == 0 || height == 0 {
        return Err(FormatError::corrupt(format!("unsupported grid size {width}x{height}")));
    }
    let cells = usize::from(width) * usize::from(height);

    let solution = r.take(cells, "solution grid")?;
    let fill = r.take(cells, "player grid")?;
    let title = r.zstring("title")?;
    let author = r.zstring("author")?;
    let copyright = r.zstring("copyright")?;
    let raw_clues = (0..clue_count)
        .map(|i| r.zstring(&format!("clue {}", i + 1)).map(<[u8]>::to_vec))
        .collect::<Result<Vec<_>>>()?;
    let notes = r.zstring("notes")?;

    let text = TextFields {
        title,
        author,
        copyright,
        clues: &raw_clues,
        notes,
        include_notes: version_tuple >= (1, 3),
    };
    let computed = Checksums::compute(&data[CIB_OFFSET..CIB_OFFSET + CIB_LEN], solution, fill, &text);
    let stored = Checksums {
        global,
        cib,
        masked_low,
        masked_high,
        scrambled: scrambled_checksum,
    };
    if let Some(field) = stored.first_mismatch(&computed) {
        return Err(FormatError::corrupt(format!("{field} mismatch")));
    }

    let mut puzzle = Puzzle {
        version,
        width,
        height,
        kind,
        solution_state,
        solution: solution.to_vec(),
        fill: fill.to_vec(),
        title: encoding.decode(title)?,
        author: encoding.decode(author)?,
        copyright: encoding.decode(copyright)?,
        clues: raw_clues
            .iter()
            .map(|c| encoding.decode(c))
            .collect::<Result<Vec<_>>>()?,
        notes: encoding.decode(notes)?,
        rebus: None,
        markup: None,
        timer: None,
        user_rebus: None,
        extra_sections: Vec::new(),
        postscript: Vec::new(),
        checksums: stored,
    };

    read_sections(&mut r, &mut puzzle, encoding)?;
    puzzle.numbering()?;

    Ok(puzzle)
}

fn read_sections(r: &mut Reader<'_>, puzzle: &mut Puzzle, encoding: TextEncoding) -> Result<()> {
    let cells = puzzle.cell_count();
    let mut squares = None;
    let mut table = None;

    while !r.remaining().is_empty() {
        // stray line endings or NUL padding after the last section
        let rest = r.remaining();
        if rest.len() < SECTION_HEADER_LEN || rest.iter().all(|&b| b == 0) {
            puzzle.postscript = rest.to_vec();
            break;
        }
        let title = r.array4("section title")?;
        let name = String::from_utf8_lossy(&title).into_owned();
        let len = usize::from(r.u16(&format!("{name} length"))?);
        let expected = r.u16(&format!("{name} checksum"))?;
        let data = r.take(len, &format!("{name} section"))?;
        if r.u8(&format!("{name} terminator"))? != 0 {
            return Err(FormatError::corrupt(format!("{name} section is not NUL-terminated")));
        }
        if checksum_region(data, 0) != expected {
            return Err(FormatError::corrupt(format!("{name} section checksum mismatch")));
        }

        match &title {
            b"GRBS" => squares = Some(grid_sized(data, cells, &name)?),
            b"RTBL" => table = Some(parse_rebus_table(&encoding.decode(data)?)?),
            b"GEXT" => puzzle.markup = Some(grid_sized(data, cells, &name)?),
            b"LTIM" => puzzle.timer = Some(parse_timer(&encoding.decode(data)?)?),
            b"RUSR" => puzzle.user_rebus = Some(parse_user_rebus(data, cells, encoding)?),
            _ => puzzle.extra_sections.push(Section {
                title,
                data: data.to_vec(),
            }),
        }
    }

    if squares.is_some() || table.is_some() {
        puzzle.rebus = Some(Rebus {
            squares: squares.unwrap_or_else(|| vec![0; cells]),
            table: table.unwrap_or_default(),
        });
    }
    Ok(())
}

fn grid_sized(data: &[u8], cells: usize, name: &str) -> Result<Vec<u8>> {
    if data.len() != cells {
        return Err(FormatError::corrupt(format!(
            "{name} section has {} bytes for {cells} squares",
            data.len()
        )));
    }
    Ok(data.to_vec())
}

fn parse_rebus_table(text: &str) -> Result<BTreeMap<u8, String>> {
    let mut table = BTreeMap::new();
    for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| FormatError::corrupt(format!("bad rebus table entry {entry:?}")))?;
        let key = key
            .trim()
            .parse()
            .map_err(|_| FormatError::corrupt(format!("bad rebus table key {key:?}")))?;
        table.insert(key, value.to_string());
    }
    Ok(table)
}

fn parse_timer(text: &str) -> Result<Timer> {
    let bad = || FormatError::corrupt(format!("bad timer {text:?}"));
    let (elapsed, stopped) = text.split_once(',').ok_or_else(bad)?;
    Ok(Timer {
        elapsed_secs: elapsed.trim().parse().map_err(|_| bad())?,
        running: stopped.trim() == "0",
    })
}

fn parse_user_rebus(data: &[u8], cells: usize, encoding: TextEncoding) -> Result<Vec<Option<String>>> {
    let entries: Vec<&[u8]> = data.split(|&b| b == 0).take(cells).collect();
    if entries.len() != cells {
        return Err(FormatError::corrupt("RUSR section is shorter than the grid"));
    }
    entries
        .into_iter()
        .map(|e| {
            if e.is_empty() {
                Ok(None)
            } else {
                encoding.decode(e).map(Some)
            }
        })
        .collect()
}
