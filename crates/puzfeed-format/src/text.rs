//! String encoding rules.
//!
//! Files before version 2.0 store text as ISO-8859-1; 2.0 and later use UTF-8.

use crate::error::{FormatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Latin1,
    Utf8,
}

impl TextEncoding {
    pub fn for_version(version: (u8, u8)) -> Self {
        if version.0 >= 2 {
            Self::Utf8
        } else {
            Self::Latin1
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| FormatError::corrupt(format!("invalid UTF-8 text: {e}"))),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        FormatError::unsupported(format!("character {c:?} is outside ISO-8859-1"))
                    })
                })
                .collect::<Result<Vec<u8>>>()?,
        };
        if bytes.contains(&0) {
            return Err(FormatError::corrupt("text may not contain NUL"));
        }
        Ok(bytes)
    }
}

/// Parse a header version string such as `"1.3"`.
pub fn parse_version(raw: &str) -> Result<(u8, u8)> {
    let (major, minor) = raw
        .split_once('.')
        .ok_or_else(|| FormatError::corrupt(format!("bad version string {raw:?}")))?;
    let major = major
        .parse()
        .map_err(|_| FormatError::corrupt(format!("bad version string {raw:?}")))?;
    let minor = minor
        .parse()
        .map_err(|_| FormatError::corrupt(format!("bad version string {raw:?}")))?;
    Ok((major, minor))
}
