use std::fmt;

use formpane_common::{CellAddress, ValueKind};
use formpane_spec::{DEFAULT_FORM_ID, FieldDecl, FormDecl, FormKindDecl, Manifest};

use crate::error::FormpaneError;

/// Key into the form catalog, spelled as declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormId(String);

impl FormId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ASCII case-insensitive comparison, as used for routing.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    pub fn is_default(&self) -> bool {
        self.matches(DEFAULT_FORM_ID)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FormId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for FormId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for FormId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Behaviour attached to a form beyond its bound fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormKind {
    #[default]
    Fields,
    /// Submit appends the bound field values as one row of `table`.
    TableEntry { table: String },
    /// Panel actions activate (creating when missing) one of `sheets`.
    Navigator { sheets: Vec<String> },
}

impl FormKind {
    pub fn offers_sheet(&self, sheet: &str) -> bool {
        match self {
            FormKind::Navigator { sheets } => sheets
                .iter()
                .any(|candidate| candidate.trim().eq_ignore_ascii_case(sheet.trim())),
            _ => false,
        }
    }
}

impl From<&FormKindDecl> for FormKind {
    fn from(value: &FormKindDecl) -> Self {
        match value {
            FormKindDecl::Fields => FormKind::Fields,
            FormKindDecl::TableEntry { table } => FormKind::TableEntry {
                table: table.trim().to_string(),
            },
            FormKindDecl::Navigator { sheets } => FormKind::Navigator {
                sheets: sheets.iter().map(|s| s.trim().to_string()).collect(),
            },
        }
    }
}

/// Cell a field is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellRef {
    /// Single cell on whichever sheet is active.
    Address(CellAddress),
    /// Workbook-scoped defined name.
    Name(String),
}

impl CellRef {
    /// A1 text becomes an address, anything else is treated as a name.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match CellAddress::try_from_a1(text) {
            Ok(addr) => CellRef::Address(addr),
            Err(_) => CellRef::Name(text.to_string()),
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellRef::Address(addr) => write!(f, "{addr}"),
            CellRef::Name(name) => f.write_str(name),
        }
    }
}

/// Association between a panel field and a worksheet cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub field: String,
    pub cell: CellRef,
    pub kind: ValueKind,
}

impl BindingSpec {
    pub fn new(field: impl Into<String>, cell: CellRef, kind: ValueKind) -> Self {
        Self {
            field: field.into(),
            cell,
            kind,
        }
    }
}

impl From<&FieldDecl> for BindingSpec {
    fn from(value: &FieldDecl) -> Self {
        BindingSpec::new(
            value.field.trim(),
            CellRef::parse(&value.cell),
            value.kind.into(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormDefinition {
    pub id: FormId,
    pub kind: FormKind,
    /// Template location handed to the form source.
    pub resource: String,
    /// Bindings declared in the manifest, in declaration order.
    pub bindings: Vec<BindingSpec>,
}

impl From<&FormDecl> for FormDefinition {
    fn from(value: &FormDecl) -> Self {
        Self {
            id: FormId::new(value.id.trim()),
            kind: FormKind::from(&value.kind),
            resource: value.resource.trim().to_string(),
            bindings: value.fields.iter().map(BindingSpec::from).collect(),
        }
    }
}

/// Every form the panel may show. Always holds a `default` form.
#[derive(Debug, Clone)]
pub struct FormCatalog {
    forms: Vec<FormDefinition>,
    default_index: usize,
}

impl FormCatalog {
    pub fn new(forms: Vec<FormDefinition>) -> Result<Self, FormpaneError> {
        let default_index = forms
            .iter()
            .position(|form| form.id.is_default())
            .ok_or(FormpaneError::MissingDefaultForm(DEFAULT_FORM_ID))?;
        Ok(Self {
            forms,
            default_index,
        })
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self, FormpaneError> {
        Self::new(manifest.forms.iter().map(FormDefinition::from).collect())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, id: &str) -> Option<&FormDefinition> {
        self.forms.iter().find(|form| form.id.matches(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Declared spelling of a known id.
    pub fn resolve(&self, id: &str) -> Option<&FormId> {
        self.get(id).map(|form| &form.id)
    }

    pub fn default_form(&self) -> &FormDefinition {
        &self.forms[self.default_index]
    }

    /// Declared id of `id`, or the default form's id when unknown.
    pub fn resolve_or_default(&self, id: &str) -> FormId {
        self.resolve(id)
            .unwrap_or(&self.default_form().id)
            .clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormDefinition> {
        self.forms.iter()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}
