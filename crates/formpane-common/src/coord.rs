//! Column-letter helpers and A1 token decoding.
//!
//! Columns and rows are 1-based throughout (`A1` is column 1, row 1) and are
//! bounded by the Excel grid: 16,384 columns × 1,048,576 rows. Two decoders
//! are provided. [`decode_token_strict`] backs manifest validation and rejects
//! anything that is not `[$]LETTERS[$]DIGITS`. [`decode_token_lenient`] backs
//! runtime routing and never fails: it keeps whatever letters and digits it
//! finds and leaves the caller to fill in defaults.

use core::fmt;
use std::error::Error;

/// Number of columns in a worksheet (`XFD`).
pub const MAX_COLUMNS: u32 = 16_384;
/// Number of rows in a worksheet.
pub const MAX_ROWS: u32 = 1_048_576;

/// Errors raised while strictly parsing an A1 token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum A1ParseError {
    /// The token was empty after trimming.
    Empty,
    /// A character other than `$`, `A-Z` or `0-9` appeared in the token.
    InvalidCharacter { token: String, ch: char },
    /// Letters were required but none were found.
    MissingColumn(String),
    /// Digits were required but none were found.
    MissingRow(String),
    /// Letters appeared after the row digits (`1A`).
    Misordered(String),
    /// Column letters decode past `XFD`.
    ColumnOutOfRange(String),
    /// Row is zero or larger than [`MAX_ROWS`].
    RowOutOfRange(String),
    /// An area had more than two corners (`A1:B2:C3`).
    TooManyCorners(String),
    /// One corner was column-only and the other row-only (`A:1`).
    MixedCorners(String),
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A1ParseError::Empty => write!(f, "empty A1 reference"),
            A1ParseError::InvalidCharacter { token, ch } => {
                write!(f, "invalid character `{ch}` in A1 reference `{token}`")
            }
            A1ParseError::MissingColumn(token) => {
                write!(f, "A1 reference `{token}` has no column letters")
            }
            A1ParseError::MissingRow(token) => {
                write!(f, "A1 reference `{token}` has no row number")
            }
            A1ParseError::Misordered(token) => {
                write!(f, "A1 reference `{token}` must put column letters before the row")
            }
            A1ParseError::ColumnOutOfRange(token) => {
                write!(f, "column in `{token}` exceeds {MAX_COLUMNS}")
            }
            A1ParseError::RowOutOfRange(token) => {
                write!(f, "row in `{token}` must be between 1 and {MAX_ROWS}")
            }
            A1ParseError::TooManyCorners(token) => {
                write!(f, "range `{token}` has more than two corners")
            }
            A1ParseError::MixedCorners(token) => {
                write!(
                    f,
                    "range `{token}` mixes a column-only corner with a row-only corner"
                )
            }
        }
    }
}

impl Error for A1ParseError {}

/// Column/row components found in a single A1 token. Either may be absent
/// (`"C"` is column-only, `"7"` is row-only).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TokenParts {
    pub col: Option<u32>,
    pub row: Option<u32>,
}

/// Render a 1-based column index as letters (`1` → `A`, `28` → `AB`).
///
/// Index `0` is treated as column 1.
pub fn column_to_letters(col: u32) -> String {
    let mut n = col.max(1);
    let mut buf = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        buf.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

/// Decode base-26 column letters into a 1-based index.
///
/// Only uppercase ASCII letters are accepted. Returns `None` for empty
/// input, other characters, or arithmetic overflow; the result is not
/// checked against [`MAX_COLUMNS`].
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in letters.bytes() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add((ch - b'A' + 1) as u32)?;
    }
    Some(col)
}

/// Decode a token leniently.
///
/// Absolute markers are ignored, letters are uppercased, and every other
/// character is skipped. Out-of-range values clamp to the grid limits and a
/// zero row is reported as absent.
pub fn decode_token_lenient(token: &str) -> TokenParts {
    let mut letters = String::new();
    let mut digits = String::new();
    for ch in token.chars() {
        if ch.is_ascii_alphabetic() {
            letters.push(ch.to_ascii_uppercase());
        } else if ch.is_ascii_digit() {
            digits.push(ch);
        }
    }

    let col = if letters.is_empty() {
        None
    } else {
        Some(letters_to_column(&letters).map_or(MAX_COLUMNS, |c| c.min(MAX_COLUMNS)))
    };
    let row = if digits.is_empty() {
        None
    } else {
        // all-digit strings only fail to parse on overflow
        match digits.parse::<u64>() {
            Ok(0) => None,
            Ok(n) => Some(n.min(MAX_ROWS as u64) as u32),
            Err(_) => Some(MAX_ROWS),
        }
    };
    TokenParts { col, row }
}

/// Decode a token strictly: `[$]LETTERS[$]DIGITS`, `[$]LETTERS` or
/// `[$]DIGITS`, uppercase or lowercase letters.
pub fn decode_token_strict(token: &str) -> Result<TokenParts, A1ParseError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(A1ParseError::Empty);
    }

    let mut letters = String::new();
    let mut digits = String::new();
    for ch in trimmed.chars() {
        match ch {
            '$' => {}
            c if c.is_ascii_alphabetic() => {
                if !digits.is_empty() {
                    return Err(A1ParseError::Misordered(trimmed.to_string()));
                }
                letters.push(c.to_ascii_uppercase());
            }
            c if c.is_ascii_digit() => digits.push(c),
            other => {
                return Err(A1ParseError::InvalidCharacter {
                    token: trimmed.to_string(),
                    ch: other,
                });
            }
        }
    }

    let col = if letters.is_empty() {
        None
    } else {
        match letters_to_column(&letters) {
            Some(c) if c <= MAX_COLUMNS => Some(c),
            _ => return Err(A1ParseError::ColumnOutOfRange(trimmed.to_string())),
        }
    };
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<u32>() {
            Ok(r) if (1..=MAX_ROWS).contains(&r) => Some(r),
            _ => return Err(A1ParseError::RowOutOfRange(trimmed.to_string())),
        }
    };
    if col.is_none() && row.is_none() {
        return Err(A1ParseError::Empty);
    }
    Ok(TokenParts { col, row })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letter_roundtrip() {
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(26), "Z");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(702), "ZZ");
        assert_eq!(column_to_letters(MAX_COLUMNS), "XFD");
        for col in [1, 2, 26, 27, 52, 53, 702, 703, 16_384] {
            assert_eq!(letters_to_column(&column_to_letters(col)), Some(col));
        }
        assert!(letters_to_column("a").is_none());
        assert!(letters_to_column("").is_none());
    }

    #[test]
    fn lenient_keeps_what_it_finds() {
        assert_eq!(
            decode_token_lenient("$b$3"),
            TokenParts {
                col: Some(2),
                row: Some(3)
            }
        );
        assert_eq!(
            decode_token_lenient("ZZ"),
            TokenParts {
                col: Some(702),
                row: None
            }
        );
        assert_eq!(decode_token_lenient("A0").row, None);
        assert_eq!(decode_token_lenient("").col, None);
        assert_eq!(decode_token_lenient("ZZZZZZZZ").col, Some(MAX_COLUMNS));
        assert_eq!(decode_token_lenient("A99999999999").row, Some(MAX_ROWS));
    }

    #[test]
    fn strict_rejects_garbage() {
        assert_eq!(
            decode_token_strict("$C$10"),
            Ok(TokenParts {
                col: Some(3),
                row: Some(10)
            })
        );
        assert!(matches!(
            decode_token_strict("B-3"),
            Err(A1ParseError::InvalidCharacter { ch: '-', .. })
        ));
        assert!(matches!(
            decode_token_strict("3B"),
            Err(A1ParseError::Misordered(_))
        ));
        assert!(matches!(
            decode_token_strict("XFE1"),
            Err(A1ParseError::ColumnOutOfRange(_))
        ));
        assert!(matches!(
            decode_token_strict("A0"),
            Err(A1ParseError::RowOutOfRange(_))
        ));
        assert_eq!(decode_token_strict("   "), Err(A1ParseError::Empty));
    }
}
