//! Cell addresses and textual address normalization.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coord::{
    A1ParseError, MAX_COLUMNS, MAX_ROWS, column_to_letters, decode_token_lenient,
    decode_token_strict,
};

/// A single cell, 1-based on both axes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    col: u32,
    row: u32,
}

impl CellAddress {
    /// Construct from 1-based indices, clamping into the worksheet grid.
    pub fn new(col: u32, row: u32) -> Self {
        Self {
            col: col.clamp(1, MAX_COLUMNS),
            row: row.clamp(1, MAX_ROWS),
        }
    }

    #[inline]
    pub const fn col(self) -> u32 {
        self.col
    }

    #[inline]
    pub const fn row(self) -> u32 {
        self.row
    }

    /// Parse a single-cell A1 token (`B3`, `$B$3`, `b3`).
    pub fn try_from_a1(token: &str) -> Result<Self, A1ParseError> {
        let parts = decode_token_strict(token)?;
        let col = parts
            .col
            .ok_or_else(|| A1ParseError::MissingColumn(token.trim().to_string()))?;
        let row = parts
            .row
            .ok_or_else(|| A1ParseError::MissingRow(token.trim().to_string()))?;
        Ok(Self { col, row })
    }

    /// Parse without failing. Missing letters mean column 1 and missing or
    /// zero digits mean row 1, so `"ZZ"` is column 702, row 1.
    pub fn parse_lenient(token: &str) -> Self {
        let parts = decode_token_lenient(token);
        Self::new(parts.col.unwrap_or(1), parts.row.unwrap_or(1))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.col), self.row)
    }
}

impl std::str::FromStr for CellAddress {
    type Err = A1ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_a1(s)
    }
}

/// Canonical textual form of an address list.
///
/// Each comma-separated part loses its sheet qualifier (`Sheet1!`), its
/// absolute markers and any whitespace, and is uppercased. Empty parts are
/// dropped. The function is idempotent.
pub fn normalize_address(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for part in text.split(',') {
        let (_, local) = split_sheet_qualifier(part);
        let cleaned: String = local
            .chars()
            .filter(|c| *c != '$' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&cleaned);
    }
    out
}

/// Split `Sheet!A1:B2` into the sheet name and the local address.
///
/// Quoted sheet names (`'Q1 Plan'!A1`, with `''` as an escaped quote) are
/// unquoted. Text without `!` has no qualifier.
pub fn split_sheet_qualifier(text: &str) -> (Option<String>, &str) {
    let text = text.trim();
    let Some(bang) = text.rfind('!') else {
        return (None, text);
    };
    let (sheet, local) = (&text[..bang], &text[bang + 1..]);
    let sheet = sheet.trim();
    let name = if sheet.len() >= 2 && sheet.starts_with('\'') && sheet.ends_with('\'') {
        sheet[1..sheet.len() - 1].replace("''", "'")
    } else {
        sheet.to_string()
    };
    if name.is_empty() {
        (None, local.trim())
    } else {
        (Some(name), local.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse_requires_both_axes() {
        let b3 = CellAddress::try_from_a1("$b$3").expect("valid cell");
        assert_eq!((b3.col(), b3.row()), (2, 3));
        assert_eq!(b3.to_string(), "B3");
        assert!(matches!(
            CellAddress::try_from_a1("ZZ"),
            Err(A1ParseError::MissingRow(_))
        ));
        assert!(matches!(
            CellAddress::try_from_a1("12"),
            Err(A1ParseError::MissingColumn(_))
        ));
    }

    #[test]
    fn lenient_parse_defaults_missing_parts() {
        let zz = CellAddress::parse_lenient("ZZ");
        assert_eq!((zz.col(), zz.row()), (702, 1));
        let digits = CellAddress::parse_lenient("42");
        assert_eq!((digits.col(), digits.row()), (1, 42));
        let junk = CellAddress::parse_lenient("!!");
        assert_eq!((junk.col(), junk.row()), (1, 1));
    }

    #[test]
    fn normalize_strips_markers_and_qualifiers() {
        assert_eq!(normalize_address("Sheet1!$b$3"), "B3");
        assert_eq!(
            normalize_address(" 'Q1 Plan'!a1:$C$4 , d5 ,,"),
            "A1:C4,D5"
        );
        assert_eq!(normalize_address(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in [
            "Sheet1!$A$1:$B$2,C3",
            " a1 , b2:c3 ",
            "'It''s'!$Z$9",
            "ZZ",
            ",,",
        ] {
            let once = normalize_address(input);
            assert_eq!(normalize_address(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn sheet_qualifier_unquotes() {
        assert_eq!(
            split_sheet_qualifier("'It''s'!$A$1"),
            (Some("It's".to_string()), "$A$1")
        );
        assert_eq!(
            split_sheet_qualifier("Orders!B2:C9"),
            (Some("Orders".to_string()), "B2:C9")
        );
        assert_eq!(split_sheet_qualifier("B2"), (None, "B2"));
    }
}
