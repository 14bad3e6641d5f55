use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scalar stored in a worksheet cell, as returned by a range read.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Truthiness used by boolean fields: everything is true except empty
    /// cells, `false`, zero, and the texts `"false"` / `"0"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Boolean(b) => *b,
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Text(s) => text_is_truthy(s),
        }
    }

    /// Numeric coercion; blank and unparsable text give `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Empty => None,
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Number(n) => n.is_finite().then_some(*n),
            CellValue::Text(s) => parse_number(s),
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(b) => write!(f, "{b}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// How a bound field interprets its cell.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueKind {
    #[default]
    Text,
    Number,
    Boolean,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(ValueKind::Text),
            "number" => Ok(ValueKind::Number),
            "boolean" | "bool" | "checkbox" => Ok(ValueKind::Boolean),
            other => Err(format!("unknown value kind `{other}`")),
        }
    }
}

/// Value held by a panel field after coercion.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// `None` renders as an empty input.
    Number(Option<f64>),
    Boolean(bool),
}

impl FieldValue {
    /// Coerce a cell into the representation a field of `kind` displays.
    pub fn from_cell(kind: ValueKind, cell: &CellValue) -> Self {
        match kind {
            ValueKind::Text => FieldValue::Text(cell.to_string()),
            ValueKind::Number => FieldValue::Number(cell.as_number()),
            ValueKind::Boolean => FieldValue::Boolean(cell.is_truthy()),
        }
    }

    /// Coerce raw panel input (`"true"`, `"3.5"`, free text).
    pub fn from_input(kind: ValueKind, raw: &str) -> Self {
        match kind {
            ValueKind::Text => FieldValue::Text(raw.to_string()),
            ValueKind::Number => FieldValue::Number(parse_number(raw)),
            ValueKind::Boolean => FieldValue::Boolean(text_is_truthy(raw)),
        }
    }

    /// Value written back to the source cell.
    pub fn to_cell(&self) -> CellValue {
        match self {
            FieldValue::Text(s) => CellValue::Text(s.clone()),
            FieldValue::Number(Some(n)) => CellValue::Number(*n),
            FieldValue::Number(None) => CellValue::Empty,
            FieldValue::Boolean(b) => CellValue::Boolean(*b),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Number(_) => ValueKind::Number,
            FieldValue::Boolean(_) => ValueKind::Boolean,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(Some(n)) => write!(f, "{n}"),
            FieldValue::Number(None) => Ok(()),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

fn text_is_truthy(s: &str) -> bool {
    let t = s.trim();
    !(t.is_empty() || t.eq_ignore_ascii_case("false") || parse_number(t) == Some(0.0))
}

fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_truthiness() {
        assert!(!CellValue::Empty.is_truthy());
        assert!(!CellValue::Boolean(false).is_truthy());
        assert!(!CellValue::Number(0.0).is_truthy());
        assert!(!CellValue::from("FALSE").is_truthy());
        assert!(!CellValue::from("0").is_truthy());
        assert!(!CellValue::from("  ").is_truthy());
        assert!(CellValue::from("yes").is_truthy());
        assert!(CellValue::Number(-2.0).is_truthy());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(CellValue::from(" 3.5 ").as_number(), Some(3.5));
        assert_eq!(CellValue::from("abc").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
        assert_eq!(CellValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(CellValue::from("inf").as_number(), None);
    }

    #[test]
    fn field_from_cell_per_kind() {
        assert_eq!(
            FieldValue::from_cell(ValueKind::Text, &CellValue::Number(3.0)),
            FieldValue::Text("3".into())
        );
        assert_eq!(
            FieldValue::from_cell(ValueKind::Number, &CellValue::from("12")),
            FieldValue::Number(Some(12.0))
        );
        assert_eq!(
            FieldValue::from_cell(ValueKind::Number, &CellValue::from("twelve")),
            FieldValue::Number(None)
        );
        assert_eq!(
            FieldValue::from_cell(ValueKind::Boolean, &CellValue::Number(1.0)),
            FieldValue::Boolean(true)
        );
    }

    #[test]
    fn input_coercion_and_write_shape() {
        assert_eq!(
            FieldValue::from_input(ValueKind::Boolean, "true").to_cell(),
            CellValue::Boolean(true)
        );
        assert_eq!(
            FieldValue::from_input(ValueKind::Number, "3.5").to_cell(),
            CellValue::Number(3.5)
        );
        assert_eq!(
            FieldValue::from_input(ValueKind::Number, "n/a").to_cell(),
            CellValue::Empty
        );
        assert_eq!(
            FieldValue::from_input(ValueKind::Text, "  keep me ").to_cell(),
            CellValue::Text("  keep me ".into())
        );
    }

    #[test]
    fn value_kind_parses_aliases() {
        assert_eq!("Number".parse::<ValueKind>(), Ok(ValueKind::Number));
        assert_eq!("checkbox".parse::<ValueKind>(), Ok(ValueKind::Boolean));
        assert!("date".parse::<ValueKind>().is_err());
    }
}
