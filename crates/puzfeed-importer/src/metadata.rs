//! The JSON sidecar and the title/author fallback chains.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ImportError, Result};

pub const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Deserialize)]
struct RawMetadata {
    puzzle_date: Option<String>,
    title: Option<String>,
    author: Option<String>,
}

/// Validated contents of a `.meta.json` sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleMetadata {
    pub puzzle_date: NaiveDate,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl PuzzleMetadata {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: RawMetadata = serde_json::from_slice(bytes)
            .map_err(|e| ImportError::InvalidMetadata(format!("sidecar is not valid JSON: {e}")))?;

        let date = raw
            .puzzle_date
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| ImportError::InvalidMetadata("missing required field: puzzle_date".into()))?;
        let puzzle_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
            ImportError::InvalidMetadata(format!("puzzle_date {date:?} is not a valid date: {e}"))
        })?;

        Ok(Self {
            puzzle_date,
            title: raw.title,
            author: raw.author,
        })
    }

    /// Base name for the accepted files, `YYYY-MM-DD`.
    pub fn date_stem(&self) -> String {
        self.puzzle_date.format("%Y-%m-%d").to_string()
    }
}

/// First candidate that is present and not blank.
pub fn first_present<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Sidecar title, then the puzzle's own title, then [`DEFAULT_TITLE`].
pub fn resolve_title(metadata: &PuzzleMetadata, decoded_title: &str) -> String {
    first_present([metadata.title.as_deref(), Some(decoded_title)])
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

/// Sidecar author, then the puzzle's own author.
pub fn resolve_author(metadata: &PuzzleMetadata, decoded_author: &str) -> Option<String> {
    first_present([metadata.author.as_deref(), Some(decoded_author)]).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: Option<&str>, author: Option<&str>) -> PuzzleMetadata {
        PuzzleMetadata {
            puzzle_date: NaiveDate::from_ymd_opt(2020, 12, 21).unwrap(),
            title: title.map(str::to_string),
            author: author.map(str::to_string),
        }
    }

    #[test]
    fn parses_full_sidecar() {
        let m = PuzzleMetadata::parse(br#"{"puzzle_date":"2020-12-21","title":"T","author":"A"}"#)
            .unwrap();
        assert_eq!(m, meta(Some("T"), Some("A")));
        assert_eq!(m.date_stem(), "2020-12-21");
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        let m = PuzzleMetadata::parse(br#"{"puzzle_date":"2020-12-21","title":null}"#).unwrap();
        assert_eq!(m, meta(None, None));
    }

    #[test]
    fn missing_date_is_invalid() {
        let err = PuzzleMetadata::parse(br#"{"title":"T"}"#).unwrap_err();
        assert!(matches!(err, ImportError::InvalidMetadata(ref m) if m.contains("puzzle_date")));
    }

    #[test]
    fn impossible_date_is_invalid() {
        let err = PuzzleMetadata::parse(br#"{"puzzle_date":"2021-13-40"}"#).unwrap_err();
        match err {
            ImportError::InvalidMetadata(msg) => assert!(msg.contains("2021-13-40"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_json_is_invalid() {
        assert!(matches!(
            PuzzleMetadata::parse(b"not json"),
            Err(ImportError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn title_falls_back_through_decoded_to_default() {
        assert_eq!(resolve_title(&meta(Some("Sidecar"), None), "Crossword"), "Sidecar");
        assert_eq!(resolve_title(&meta(Some(""), None), "Crossword"), "Crossword");
        assert_eq!(resolve_title(&meta(None, None), "Crossword"), "Crossword");
        assert_eq!(resolve_title(&meta(Some(""), None), ""), "Untitled");
    }

    #[test]
    fn author_falls_back_to_decoded_then_none() {
        assert_eq!(resolve_author(&meta(None, Some("Meta")), "Decoded").as_deref(), Some("Meta"));
        assert_eq!(resolve_author(&meta(None, Some(" ")), "Decoded").as_deref(), Some("Decoded"));
        assert_eq!(resolve_author(&meta(None, None), ""), None);
    }
}
