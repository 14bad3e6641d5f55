//! Rectangular areas and multi-area address sets.
//!
//! Containment is existential per area: an [`AddressSet`] covers another
//! when every target area fits inside one single area of the covering set.
//! Two selected cells `A1` and `C1` therefore do not cover `A1:C1`, and
//! neither do `A1:B1` and `C1`.

use std::fmt;

use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::address::{CellAddress, normalize_address};
use crate::coord::{
    A1ParseError, MAX_COLUMNS, MAX_ROWS, TokenParts, decode_token_lenient, decode_token_strict,
};

/// Inclusive rectangle `(c1, r1)-(c2, r2)` with `c1 <= c2` and `r1 <= r2`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Area {
    start: CellAddress,
    end: CellAddress,
}

impl Area {
    /// Build from two corners in any order.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.col().min(b.col()), a.row().min(b.row())),
            end: CellAddress::new(a.col().max(b.col()), a.row().max(b.row())),
        }
    }

    pub fn cell(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Top-left corner.
    pub fn start(&self) -> CellAddress {
        self.start
    }

    /// Bottom-right corner.
    pub fn end(&self) -> CellAddress {
        self.end
    }

    pub fn width(&self) -> u32 {
        self.end.col() - self.start.col() + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row() - self.start.row() + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// `self` contains `other` when `other`'s bounds lie within `self`'s.
    pub fn contains(&self, other: &Area) -> bool {
        self.start.col() <= other.start.col()
            && self.start.row() <= other.start.row()
            && self.end.col() >= other.end.col()
            && self.end.row() >= other.end.row()
    }

    pub fn contains_cell(&self, cell: CellAddress) -> bool {
        self.contains(&Area::cell(cell))
    }

    /// Parse `A1`, `A1:C4`, `A:C` or `2:5` without failing.
    ///
    /// A lone token always denotes a single cell with lenient defaults. When
    /// both corners of a range lack digits the area spans every row; when
    /// both lack letters it spans every column.
    pub fn parse_lenient(token: &str) -> Self {
        let mut corners = token.split(':');
        let first = corners.next().unwrap_or_default();
        let Some(second) = corners.next() else {
            return Area::cell(CellAddress::parse_lenient(first));
        };
        let a = decode_token_lenient(first);
        let b = decode_token_lenient(second);
        Self::from_corner_parts(a, b)
    }

    /// Strict counterpart of [`Area::parse_lenient`].
    pub fn try_from_a1(token: &str) -> Result<Self, A1ParseError> {
        let trimmed = token.trim();
        let corners: SmallVec<[&str; 2]> = trimmed.split(':').collect();
        match corners.as_slice() {
            [single] => Ok(Area::cell(CellAddress::try_from_a1(single)?)),
            [first, second] => {
                let a = decode_token_strict(first)?;
                let b = decode_token_strict(second)?;
                let column_only = a.row.is_none() && b.row.is_none();
                let row_only = a.col.is_none() && b.col.is_none();
                let complete = a.col.is_some()
                    && a.row.is_some()
                    && b.col.is_some()
                    && b.row.is_some();
                if column_only || row_only || complete {
                    Ok(Self::from_corner_parts(a, b))
                } else {
                    Err(A1ParseError::MixedCorners(trimmed.to_string()))
                }
            }
            _ => Err(A1ParseError::TooManyCorners(trimmed.to_string())),
        }
    }

    fn from_corner_parts(a: TokenParts, b: TokenParts) -> Self {
        let whole_columns = a.row.is_none() && b.row.is_none() && (a.col.is_some() || b.col.is_some());
        let whole_rows = a.col.is_none() && b.col.is_none() && (a.row.is_some() || b.row.is_some());

        let (r1, r2) = if whole_columns {
            (1, MAX_ROWS)
        } else {
            (a.row.unwrap_or(1), b.row.unwrap_or(1))
        };
        let (c1, c2) = if whole_rows {
            (1, MAX_COLUMNS)
        } else {
            (a.col.unwrap_or(1), b.col.unwrap_or(1))
        };
        Area::new(CellAddress::new(c1, r1), CellAddress::new(c2, r2))
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl From<CellAddress> for Area {
    fn from(value: CellAddress) -> Self {
        Area::cell(value)
    }
}

/// Union of areas, as produced by a multi-area selection (`A1:B2,D4`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct AddressSet {
    areas: SmallVec<[Area; 2]>,
}

impl AddressSet {
    pub fn new(areas: impl IntoIterator<Item = Area>) -> Self {
        Self {
            areas: areas.into_iter().collect(),
        }
    }

    /// Normalize then parse every part leniently. Empty text gives an empty set.
    pub fn parse_lenient(text: &str) -> Self {
        let normalized = normalize_address(text);
        Self::new(
            normalized
                .split(',')
                .filter(|part| !part.is_empty())
                .map(Area::parse_lenient),
        )
    }

    /// Normalize then parse every part strictly.
    pub fn try_parse(text: &str) -> Result<Self, A1ParseError> {
        let normalized = normalize_address(text);
        if normalized.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let mut areas = SmallVec::new();
        for part in normalized.split(',') {
            areas.push(Area::try_from_a1(part)?);
        }
        Ok(Self { areas })
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// Every area of `target` is contained by some single area of `self`.
    ///
    /// An empty target is vacuously covered.
    pub fn covers(&self, target: &AddressSet) -> bool {
        target
            .areas
            .iter()
            .all(|t| self.areas.iter().any(|s| s.contains(t)))
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, area) in self.areas.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{area}")?;
        }
        Ok(())
    }
}

impl From<Area> for AddressSet {
    fn from(value: Area) -> Self {
        AddressSet::new([value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(text: &str) -> Area {
        Area::try_from_a1(text).expect("valid area")
    }

    #[test]
    fn corners_are_normalized() {
        let reversed = Area::new(
            CellAddress::try_from_a1("C5").unwrap(),
            CellAddress::try_from_a1("A2").unwrap(),
        );
        assert_eq!(reversed, area("A2:C5"));
        assert_eq!(area("C2:A5"), area("A2:C5"));
        assert_eq!(reversed.width(), 3);
        assert_eq!(reversed.height(), 4);
        assert_eq!(reversed.to_string(), "A2:C5");
    }

    #[test]
    fn containment_is_reflexive() {
        for text in ["A1", "B2:D9", "A:C", "3:4"] {
            let a = area(text);
            assert!(a.contains(&a), "{text} should contain itself");
        }
    }

    #[test]
    fn containment_checks_all_bounds() {
        let outer = area("B2:E10");
        assert!(outer.contains(&area("C3:D4")));
        assert!(outer.contains(&area("B2")));
        assert!(!outer.contains(&area("A2:C3")));
        assert!(!outer.contains(&area("E10:F10")));
        assert!(!area("C3:D4").contains(&outer));
    }

    #[test]
    fn whole_columns_and_rows() {
        let cols = area("A:C");
        assert_eq!(cols.start(), CellAddress::new(1, 1));
        assert_eq!(cols.end(), CellAddress::new(3, MAX_ROWS));
        assert!(cols.contains(&area("B500")));

        let rows = area("2:5");
        assert_eq!(rows.start(), CellAddress::new(1, 2));
        assert_eq!(rows.end(), CellAddress::new(MAX_COLUMNS, 5));
        assert!(!rows.contains(&area("A1")));

        assert!(matches!(
            Area::try_from_a1("A:1"),
            Err(A1ParseError::MixedCorners(_))
        ));
        assert!(matches!(
            Area::try_from_a1("A1:B2:C3"),
            Err(A1ParseError::TooManyCorners(_))
        ));
    }

    #[test]
    fn lenient_area_never_fails() {
        assert_eq!(Area::parse_lenient("ZZ"), area("ZZ1"));
        assert_eq!(Area::parse_lenient("??:B2"), area("A1:B2"));
        assert_eq!(Area::parse_lenient(""), area("A1"));
    }

    #[test]
    fn set_covers_per_area() {
        let selection = AddressSet::parse_lenient("A1:C3,E5");
        assert!(selection.covers(&AddressSet::parse_lenient("B2")));
        assert!(selection.covers(&AddressSet::parse_lenient("A1:B2,E5")));
        assert!(!selection.covers(&AddressSet::parse_lenient("C3:E5")));
    }

    #[test]
    fn disjoint_cells_do_not_cover_spanning_target() {
        let selection = AddressSet::parse_lenient("A1,C1");
        let target = AddressSet::parse_lenient("A1:C1");
        assert!(selection.covers(&AddressSet::parse_lenient("A1")));
        assert!(selection.covers(&AddressSet::parse_lenient("C1")));
        assert!(!selection.covers(&target));

        let adjacent = AddressSet::parse_lenient("A1:B1,C1");
        assert!(!adjacent.covers(&target));
    }

    #[test]
    fn parse_handles_qualifiers_and_markers() {
        let set = AddressSet::parse_lenient("Sheet1!$A$1:$B$2, d4");
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "A1:B2,D4");
        assert!(AddressSet::parse_lenient("").is_empty());
        assert!(AddressSet::try_parse(" , ").is_err());
        assert!(AddressSet::try_parse("A1,B-2").is_err());
    }
}
