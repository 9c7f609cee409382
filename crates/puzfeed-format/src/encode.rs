//! Binary encoder, the inverse of [`crate::decode`].
//!
//! Checksums are always recomputed; the `checksums` field of the input is
//! ignored except for the scrambled checksum of a scrambled puzzle.

use crate::checksum::{checksum_region, Checksums, TextFields};
use crate::decode::{CIB_LEN, MAGIC};
use crate::error::{FormatError, Result};
use crate::puzzle::{Puzzle, SolutionState};
use crate::text::{parse_version, TextEncoding};

pub fn encode(puzzle: &Puzzle) -> Result<Vec<u8>> {
    let version = parse_version(&puzzle.version)?;
    if puzzle.version.len() > 3 {
        return Err(FormatError::unsupported(format!(
            "version string {:?} does not fit the header",
            puzzle.version
        )));
    }
    let encoding = TextEncoding::for_version(version);

    let cells = puzzle.cell_count();
    if cells == 0 || puzzle.solution.len() != cells || puzzle.fill.len() != cells {
        return Err(FormatError::corrupt("grid size does not match width and height"));
    }
    let clue_count = u16::try_from(puzzle.clues.len())
        .map_err(|_| FormatError::corrupt("too many clues"))?;

    let title = encoding.encode(&puzzle.title)?;
    let author = encoding.encode(&puzzle.author)?;
    let copyright = encoding.encode(&puzzle.copyright)?;
    let notes = encoding.encode(&puzzle.notes)?;
    let clues = puzzle
        .clues
        .iter()
        .map(|c| encoding.encode(c))
        .collect::<Result<Vec<_>>>()?;

    let mut cib = Vec::with_capacity(CIB_LEN);
    cib.push(puzzle.width);
    cib.push(puzzle.height);
    cib.extend_from_slice(&clue_count.to_le_bytes());
    cib.extend_from_slice(&puzzle.kind.flags().to_le_bytes());
    cib.extend_from_slice(&puzzle.solution_state.flags().to_le_bytes());

    let text = TextFields {
        title: &title,
        author: &author,
        copyright: &copyright,
        clues: &clues,
        notes: &notes,
        include_notes: version >= (1, 3),
    };
    let checksums = Checksums::compute(&cib, &puzzle.solution, &puzzle.fill, &text);

    let mut out = Vec::with_capacity(0x34 + cells * 2 + 256);
    out.extend_from_slice(&checksums.global.to_le_bytes());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&checksums.cib.to_le_bytes());
    out.extend_from_slice(&checksums.masked_low);
    out.extend_from_slice(&checksums.masked_high);
    let mut version_bytes = [0u8; 4];
    version_bytes[..puzzle.version.len()].copy_from_slice(puzzle.version.as_bytes());
    out.extend_from_slice(&version_bytes);
    out.extend_from_slice(&[0; 2]);
    let scrambled_checksum = match puzzle.solution_state {
        SolutionState::Scrambled => puzzle.checksums.scrambled,
        _ => 0,
    };
    out.extend_from_slice(&scrambled_checksum.to_le_bytes());
    out.extend_from_slice(&[0; 12]);
    out.extend_from_slice(&cib);
    out.extend_from_slice(&puzzle.solution);
    out.extend_from_slice(&puzzle.fill);
    for field in [&title, &author, &copyright] {
        push_zstring(&mut out, field);
    }
    for clue in &clues {
        push_zstring(&mut out, clue);
    }
    push_zstring(&mut out, &notes);

    write_sections(&mut out, puzzle, encoding)?;
    out.extend_from_slice(&puzzle.postscript);
    Ok(out)
}

fn push_zstring(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    out.push(0);
}

fn write_sections(out: &mut Vec<u8>, puzzle: &Puzzle, encoding: TextEncoding) -> Result<()> {
    if let Some(rebus) = &puzzle.rebus {
        write_section(out, b"GRBS", &rebus.squares)?;
        let table: String = rebus
            .table
            .iter()
            .map(|(key, value)| format!("{key:>2}:{value};"))
            .collect();
        write_section(out, b"RTBL", &encoding.encode(&table)?)?;
    }
    if let Some(timer) = &puzzle.timer {
        let text = format!("{},{}", timer.elapsed_secs, if timer.running { 0 } else { 1 });
        write_section(out, b"LTIM", text.as_bytes())?;
    }
    if let Some(markup) = &puzzle.markup {
        write_section(out, b"GEXT", markup)?;
    }
    if let Some(user) = &puzzle.user_rebus {
        let mut data = Vec::new();
        for entry in user {
            if let Some(text) = entry {
                data.extend_from_slice(&encoding.encode(text)?);
            }
            data.push(0);
        }
        write_section(out, b"RUSR", &data)?;
    }
    for section in &puzzle.extra_sections {
        write_section(out, &section.title, &section.data)?;
    }
    Ok(())
}

fn write_section(out: &mut Vec<u8>, title: &[u8; 4], data: &[u8]) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| {
        FormatError::corrupt(format!(
            "{} section is too large",
            String::from_utf8_lossy(title)
        ))
    })?;
    out.extend_from_slice(title);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&checksum_region(data, 0).to_le_bytes());
    out.extend_from_slice(data);
    out.push(0);
    Ok(())
}
