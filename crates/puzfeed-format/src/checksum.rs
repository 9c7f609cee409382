//! Across Lite checksum primitives.
//!
//! Every checksum in the format is the same rotate-right-and-add over a byte
//! region, seeded either with zero or with the result of a previous region.
//! The "masked" checksums XOR four partial sums with the bytes of the string
//! `ICHEATED`.

use serde::{Deserialize, Serialize};

const MASK: &[u8; 8] = b"ICHEATED";

/// Checksum a byte region, continuing from `seed`.
pub fn checksum_region(data: &[u8], seed: u16) -> u16 {
    let mut cksum = seed;
    for &byte in data {
        if cksum & 0x0001 != 0 {
            cksum = (cksum >> 1) | 0x8000;
        } else {
            cksum >>= 1;
        }
        cksum = cksum.wrapping_add(byte as u16);
    }
    cksum
}

/// Raw, still-encoded text fields in the order the checksums consume them.
#[derive(Debug, Clone, Copy)]
pub struct TextFields<'a> {
    pub title: &'a [u8],
    pub author: &'a [u8],
    pub copyright: &'a [u8],
    pub clues: &'a [Vec<u8>],
    pub notes: &'a [u8],
    /// Notes only participate from format version 1.3 on.
    pub include_notes: bool,
}

impl TextFields<'_> {
    /// Checksum of the string section.
    ///
    /// Title, author, copyright and notes are summed with their terminating
    /// NUL and only when non-empty; clues are summed without the NUL.
    pub fn checksum(&self, seed: u16) -> u16 {
        let mut cksum = seed;
        for field in [self.title, self.author, self.copyright] {
            cksum = zstring_checksum(field, cksum);
        }
        for clue in self.clues {
            if !clue.is_empty() {
                cksum = checksum_region(clue, cksum);
            }
        }
        if self.include_notes {
            cksum = zstring_checksum(self.notes, cksum);
        }
        cksum
    }
}

fn zstring_checksum(field: &[u8], seed: u16) -> u16 {
    if field.is_empty() {
        return seed;
    }
    checksum_region(&[0], checksum_region(field, seed))
}

/// Checksum values carried by (or computed for) a puzzle file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checksums {
    pub global: u16,
    pub cib: u16,
    pub masked_low: [u8; 4],
    pub masked_high: [u8; 4],
    /// Checksum of the unscrambled solution; zero for plain puzzles.
    pub scrambled: u16,
}

impl Checksums {
    /// Compute the checksums for a puzzle from its encoded regions.
    ///
    /// `cib` is the eight byte block starting at the width field.
    pub fn compute(cib: &[u8], solution: &[u8], fill: &[u8], text: &TextFields<'_>) -> Self {
        let c_cib = checksum_region(cib, 0);
        let c_solution = checksum_region(solution, 0);
        let c_fill = checksum_region(fill, 0);
        let c_text = text.checksum(0);

        let global = text.checksum(checksum_region(fill, checksum_region(solution, c_cib)));

        let parts = [c_cib, c_solution, c_fill, c_text];
        let mut masked_low = [0u8; 4];
        let mut masked_high = [0u8; 4];
        for (i, part) in parts.iter().enumerate() {
            masked_low[i] = MASK[i] ^ (part & 0xFF) as u8;
            masked_high[i] = MASK[i + 4] ^ (part >> 8) as u8;
        }

        Self {
            global,
            cib: c_cib,
            masked_low,
            masked_high,
            scrambled: 0,
        }
    }

    /// First mismatching field between the stored and recomputed checksums.
    pub fn first_mismatch(&self, computed: &Checksums) -> Option<&'static str> {
        if self.cib != computed.cib {
            Some("CIB checksum")
        } else if self.global != computed.global {
            Some("global checksum")
        } else if self.masked_low != computed.masked_low || self.masked_high != computed.masked_high {
            Some("masked checksum")
        } else {
            None
        }
    }
}
