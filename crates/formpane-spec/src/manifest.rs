use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use formpane_common::{AddressSet, CellAddress, ValueKind};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use semver::Version;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::validation::{ManifestError, ManifestIssue, ValidationError};

/// Current supported manifest version.
pub const CURRENT_SPEC_VERSION: &str = "0.1.0";
/// Constant identifier for this manifest format.
pub const SPEC_IDENT: &str = "formpane";
/// Form that must always exist and that routing falls back to.
pub const DEFAULT_FORM_ID: &str = "default";

static FORM_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("form id regex must compile"));
static FIELD_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("field id regex must compile")
});
static DEFINED_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_\\][A-Za-z0-9_.\\]*$").expect("defined name regex must compile")
});

/// Canonical manifest representation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(
    title = "Formpane panel manifest",
    description = "Declares the forms a task panel can show, how fields bind to cells, and which selections route to which form."
)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Identifier for this format (must be `formpane`).
    pub spec: String,
    pub spec_version: SpecVersion,
    /// Panel timing and hint-cell settings.
    #[serde(default)]
    pub panel: PanelConfig,
    /// Rate limits for user-facing error notices.
    #[serde(default)]
    pub notifications: NotificationPolicy,
    /// Hidden diagnostics sheet settings.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Every form the panel can render. Must include `default`.
    pub forms: Vec<FormDecl>,
    /// Selection routing rules, evaluated in declaration order.
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
}

impl Manifest {
    /// Construct a manifest by reading YAML from any reader.
    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(reader)
    }

    /// Construct a manifest from a YAML string slice.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Construct a manifest from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize this manifest to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Read, parse and validate a manifest file. `.json` files are parsed
    /// as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest = if is_json {
            Manifest::from_json_str(&text)?
        } else {
            Manifest::from_yaml_str(&text)?
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Normalize the manifest in-place for deterministic comparison.
    ///
    /// - Ids, sheet names and cell references are trimmed.
    /// - Forms are sorted by id (case-insensitive). Field order is kept
    ///   because it is the column order of table rows.
    /// - Navigator sheet lists are deduplicated, keeping first occurrence.
    /// - Rule order is preserved because it decides precedence.
    pub fn normalize(&mut self) {
        for form in &mut self.forms {
            form.id = form.id.trim().to_string();
            form.resource = form.resource.trim().to_string();
            for field in &mut form.fields {
                field.field = field.field.trim().to_string();
                field.cell = field.cell.trim().to_string();
            }
            if let FormKindDecl::Navigator { sheets } = &mut form.kind {
                let mut seen = HashSet::new();
                sheets.retain(|sheet| seen.insert(sheet.trim().to_ascii_lowercase()));
            }
        }
        self.forms
            .sort_by_key(|form| form.id.to_ascii_lowercase());

        for rule in &mut self.rules {
            rule.sheet = rule.sheet.trim().to_string();
            rule.form = rule.form.trim().to_string();
            if let Some(address) = &mut rule.address {
                *address = formpane_common::normalize_address(address);
            }
            if let Some(name) = &mut rule.named_range {
                *name = name.trim().to_string();
            }
        }
    }

    /// Return a normalized copy of the manifest.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Look up a declared form, ignoring ASCII case.
    pub fn form(&self, id: &str) -> Option<&FormDecl> {
        let id = id.trim();
        self.forms
            .iter()
            .find(|form| form.id.trim().eq_ignore_ascii_case(id))
    }

    /// Validate the manifest and return granular issues when invariants fail.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.spec != SPEC_IDENT {
            issues.push(ManifestIssue::new(
                "spec",
                format!(
                    "expected spec identifier `{}`, found `{}`",
                    SPEC_IDENT, self.spec
                ),
            ));
        }

        let current_version = Version::parse(CURRENT_SPEC_VERSION)
            .expect("CURRENT_SPEC_VERSION must be valid semver");
        let spec_version = &self.spec_version.0;
        if spec_version.major != current_version.major
            || (current_version.major == 0 && spec_version.minor != current_version.minor)
        {
            issues.push(ManifestIssue::new(
                "spec_version",
                format!(
                    "incompatible version `{}` (expected `{}.{}.x`)",
                    spec_version, current_version.major, current_version.minor
                ),
            ));
        }

        self.validate_panel(&mut issues);
        self.validate_forms(&mut issues);
        self.validate_rules(&mut issues);

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }

    fn validate_panel(&self, issues: &mut Vec<ManifestIssue>) {
        if let Err(err) = CellAddress::try_from_a1(&self.panel.hint_cell) {
            issues.push(ManifestIssue::new(
                "panel.hint_cell",
                format!("hint cell must be a single A1 cell: {err}"),
            ));
        }
        if self.panel.selection_cooldown_ms == 0 {
            issues.push(ManifestIssue::new(
                "panel.selection_cooldown_ms",
                "cooldown must be greater than zero",
            ));
        }
        if self.panel.cell_change_debounce_ms == 0 {
            issues.push(ManifestIssue::new(
                "panel.cell_change_debounce_ms",
                "debounce window must be greater than zero",
            ));
        }
        check_bucket(
            "notifications",
            self.notifications.capacity,
            self.notifications.refill_per_sec,
            issues,
        );
        if self.diagnostics.enabled {
            check_bucket(
                "diagnostics",
                self.diagnostics.capacity,
                self.diagnostics.refill_per_sec,
                issues,
            );
            if self.diagnostics.sheet.trim().is_empty() {
                issues.push(ManifestIssue::new(
                    "diagnostics.sheet",
                    "diagnostics sheet name must not be empty",
                ));
            }
        }
    }

    fn validate_forms(&self, issues: &mut Vec<ManifestIssue>) {
        let mut seen_ids = HashSet::new();
        for (idx, form) in self.forms.iter().enumerate() {
            let path = format!("forms[{idx}].id");
            if !FORM_ID_PATTERN.is_match(form.id.trim()) {
                issues.push(ManifestIssue::new(
                    &path,
                    "form id must contain only letters, digits, '-' or '_'",
                ));
            }
            if !seen_ids.insert(form.id.trim().to_ascii_lowercase()) {
                issues.push(ManifestIssue::new(
                    &path,
                    format!("duplicate form id `{}`", form.id),
                ));
            }
            if form.resource.trim().is_empty() {
                issues.push(ManifestIssue::new(
                    format!("forms[{idx}].resource"),
                    "form resource must not be empty",
                ));
            }

            match &form.kind {
                FormKindDecl::TableEntry { table } if table.trim().is_empty() => {
                    issues.push(ManifestIssue::new(
                        format!("forms[{idx}].kind.table"),
                        "table entry forms must name a workbook table",
                    ));
                }
                FormKindDecl::TableEntry { .. } if form.fields.is_empty() => {
                    issues.push(ManifestIssue::new(
                        format!("forms[{idx}].fields"),
                        "table entry forms must declare at least one field",
                    ));
                }
                FormKindDecl::Navigator { sheets } => {
                    for (sheet_idx, sheet) in sheets.iter().enumerate() {
                        if sheet.trim().is_empty() {
                            issues.push(ManifestIssue::new(
                                format!("forms[{idx}].kind.sheets[{sheet_idx}]"),
                                "sheet name must not be empty",
                            ));
                        }
                    }
                }
                _ => {}
            }

            let mut seen_fields = HashSet::new();
            for (field_idx, field) in form.fields.iter().enumerate() {
                let field_path = format!("forms[{idx}].fields[{field_idx}]");
                if !FIELD_ID_PATTERN.is_match(field.field.trim()) {
                    issues.push(ManifestIssue::new(
                        format!("{field_path}.field"),
                        format!("invalid field id `{}`", field.field),
                    ));
                }
                if !seen_fields.insert(field.field.trim()) {
                    issues.push(ManifestIssue::new(
                        format!("{field_path}.field"),
                        format!("duplicate field `{}`", field.field),
                    ));
                }
                if !is_cell_reference(&field.cell) {
                    issues.push(ManifestIssue::new(
                        format!("{field_path}.cell"),
                        format!(
                            "`{}` is neither a single A1 cell nor a defined name",
                            field.cell
                        ),
                    ));
                }
            }
        }

        if self.form(DEFAULT_FORM_ID).is_none() {
            issues.push(ManifestIssue::new(
                "forms",
                format!("a `{DEFAULT_FORM_ID}` form must be declared"),
            ));
        }
    }

    fn validate_rules(&self, issues: &mut Vec<ManifestIssue>) {
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.sheet.trim().is_empty() {
                issues.push(ManifestIssue::new(
                    format!("rules[{idx}].sheet"),
                    "rule sheet must not be empty",
                ));
            }
            if self.form(&rule.form).is_none() {
                issues.push(ManifestIssue::new(
                    format!("rules[{idx}].form"),
                    format!("rule targets unknown form `{}`", rule.form),
                ));
            }
            match (&rule.address, &rule.named_range) {
                (None, None) => issues.push(ManifestIssue::new(
                    format!("rules[{idx}]"),
                    "rule must define `address` or `named_range`",
                )),
                (address, name) => {
                    if let Some(address) = address {
                        if let Err(err) = AddressSet::try_parse(address) {
                            issues.push(ManifestIssue::new(
                                format!("rules[{idx}].address"),
                                format!("invalid address `{address}`: {err}"),
                            ));
                        }
                    }
                    if let Some(name) = name {
                        if !is_defined_name(name) {
                            issues.push(ManifestIssue::new(
                                format!("rules[{idx}].named_range"),
                                format!("`{name}` is not a valid defined name"),
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn check_bucket(prefix: &str, capacity: u32, refill_per_sec: f64, issues: &mut Vec<ManifestIssue>) {
    if capacity == 0 {
        issues.push(ManifestIssue::new(
            format!("{prefix}.capacity"),
            "capacity must be at least 1",
        ));
    }
    if !refill_per_sec.is_finite() || refill_per_sec < 0.0 {
        issues.push(ManifestIssue::new(
            format!("{prefix}.refill_per_sec"),
            "refill rate must be a finite, non-negative number",
        ));
    }
}

/// A defined name: identifier-like and not itself an A1 reference.
pub fn is_defined_name(text: &str) -> bool {
    let text = text.trim();
    DEFINED_NAME_PATTERN.is_match(text) && CellAddress::try_from_a1(text).is_err()
}

/// A binding target: a single A1 cell or a defined name.
pub fn is_cell_reference(text: &str) -> bool {
    CellAddress::try_from_a1(text).is_ok() || is_defined_name(text)
}

/// Panel behaviour knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PanelConfig {
    /// Cell whose text may carry a `form:<id>` routing directive.
    #[serde(default = "default_hint_cell")]
    pub hint_cell: String,
    /// Selection events closer than this to the last render are ignored.
    #[serde(default = "default_selection_cooldown_ms")]
    pub selection_cooldown_ms: u64,
    /// Bursts of cell-change events inside this window collapse into one refresh.
    #[serde(default = "default_cell_change_debounce_ms")]
    pub cell_change_debounce_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            hint_cell: default_hint_cell(),
            selection_cooldown_ms: default_selection_cooldown_ms(),
            cell_change_debounce_ms: default_cell_change_debounce_ms(),
        }
    }
}

fn default_hint_cell() -> String {
    "A1".to_string()
}

fn default_selection_cooldown_ms() -> u64 {
    250
}

fn default_cell_change_debounce_ms() -> u64 {
    120
}

/// Token-bucket settings for user-facing notices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NotificationPolicy {
    #[serde(default = "default_notice_capacity")]
    pub capacity: u32,
    #[serde(default = "default_notice_refill")]
    pub refill_per_sec: f64,
    /// Identical messages inside this window are shown once.
    #[serde(default = "default_dedupe_window_ms")]
    pub dedupe_window_ms: u64,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            capacity: default_notice_capacity(),
            refill_per_sec: default_notice_refill(),
            dedupe_window_ms: default_dedupe_window_ms(),
        }
    }
}

fn default_notice_capacity() -> u32 {
    3
}

fn default_notice_refill() -> f64 {
    0.5
}

fn default_dedupe_window_ms() -> u64 {
    5_000
}

/// Hidden log sheet settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_diagnostics_sheet")]
    pub sheet: String,
    #[serde(default = "default_diagnostics_capacity")]
    pub capacity: u32,
    #[serde(default = "default_diagnostics_refill")]
    pub refill_per_sec: f64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sheet: default_diagnostics_sheet(),
            capacity: default_diagnostics_capacity(),
            refill_per_sec: default_diagnostics_refill(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_diagnostics_sheet() -> String {
    "_Diagnostics".to_string()
}

fn default_diagnostics_capacity() -> u32 {
    10
}

fn default_diagnostics_refill() -> f64 {
    1.0
}

/// A form the panel can render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FormDecl {
    /// Routing key. Matched case-insensitively.
    pub id: String,
    /// Location of the HTML template, passed verbatim to the form source.
    pub resource: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: FormKindDecl,
    /// Field-to-cell bindings. Templates may declare more via `data-cell`.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

/// What the form does beyond showing bound fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormKindDecl {
    /// Bound fields only.
    #[default]
    Fields,
    /// Submitting appends the field values as a row of `table`.
    TableEntry { table: String },
    /// Panel actions activate or reveal the listed sheets.
    Navigator {
        #[serde(default)]
        sheets: Vec<String>,
    },
}

/// One field-to-cell binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    /// Field identifier inside the template.
    pub field: String,
    /// A1 cell on the active sheet, or a workbook-scoped defined name.
    pub cell: String,
    #[serde(default)]
    pub kind: FieldKind,
}

/// Value interpretation for a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Boolean,
}

impl From<FieldKind> for ValueKind {
    fn from(value: FieldKind) -> Self {
        match value {
            FieldKind::Text => ValueKind::Text,
            FieldKind::Number => ValueKind::Number,
            FieldKind::Boolean => ValueKind::Boolean,
        }
    }
}

/// Selection routing rule. When both `address` and `named_range` are set
/// the address is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
    /// Sheet the rule applies to (case-insensitive).
    pub sheet: String,
    /// Target address set that the selection must cover.
    #[serde(default)]
    pub address: Option<String>,
    /// Defined name whose range the selection must cover.
    #[serde(default)]
    pub named_range: Option<String>,
    /// Form shown when the rule fires.
    pub form: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Wrapper around semver::Version for serde compatibility.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecVersion(pub Version);

impl SpecVersion {
    pub fn new(version: Version) -> Self {
        Self(version)
    }
}

impl Serialize for SpecVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for SpecVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionVisitor;

        impl<'de> Visitor<'de> for VersionVisitor {
            type Value = SpecVersion;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("semantic version string (e.g. 0.1.0)")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Version::parse(v)
                    .map(SpecVersion)
                    .map_err(|err| de::Error::custom(format!("invalid spec_version: {err}")))
            }
        }

        deserializer.deserialize_str(VersionVisitor)
    }
}

impl JsonSchema for SpecVersion {
    fn schema_name() -> Cow<'static, str> {
        "SpecVersion".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "pattern": r"^[0-9]+\.[0-9]+\.[0-9]+(?:-[0-9A-Za-z-.]+)?(?:\+[0-9A-Za-z-.]+)?$"
        })
    }
}

impl std::str::FromStr for Manifest {
    type Err = serde_yaml::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Manifest::from_yaml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
spec: formpane
spec_version: "0.1.0"
forms:
  - id: default
    resource: forms/default.html
"#;

    #[test]
    fn minimal_manifest_uses_defaults() {
        let manifest = Manifest::from_yaml_str(MINIMAL).expect("parses");
        manifest.validate().expect("valid");
        assert_eq!(manifest.panel, PanelConfig::default());
        assert_eq!(manifest.panel.hint_cell, "A1");
        assert_eq!(manifest.panel.cell_change_debounce_ms, 120);
        assert!(manifest.rules.is_empty());
        assert_eq!(manifest.forms[0].kind, FormKindDecl::Fields);
    }

    #[test]
    fn form_lookup_ignores_case() {
        let manifest = Manifest::from_yaml_str(MINIMAL).expect("parses");
        assert!(manifest.form("DEFAULT").is_some());
        assert!(manifest.form(" default ").is_some());
        assert!(manifest.form("other").is_none());
    }

    #[test]
    fn defined_names_exclude_cell_lookalikes() {
        assert!(is_defined_name("OrderBlock"));
        assert!(is_defined_name("_tax.rate"));
        assert!(!is_defined_name("B3"));
        assert!(!is_defined_name("has space"));
        assert!(is_cell_reference("$B$3"));
        assert!(is_cell_reference("TaxRate"));
        assert!(!is_cell_reference("A1:B2"));
    }

    #[test]
    fn normalize_keeps_rule_order() {
        let yaml = r#"
spec: formpane
spec_version: "0.1.0"
forms:
  - id: zeta
    resource: z.html
  - id: default
    resource: d.html
rules:
  - { sheet: " B ", address: "$b$2", form: zeta }
  - { sheet: A, named_range: " Block ", form: default }
"#;
        let manifest = Manifest::from_yaml_str(yaml).expect("parses").normalized();
        assert_eq!(manifest.forms[0].id, "default");
        assert_eq!(manifest.rules[0].sheet, "B");
        assert_eq!(manifest.rules[0].address.as_deref(), Some("B2"));
        assert_eq!(manifest.rules[1].named_range.as_deref(), Some("Block"));
    }

    #[test]
    fn normalize_keeps_field_declaration_order() {
        let yaml = r#"
spec: formpane
spec_version: "0.1.0"
forms:
  - id: default
    resource: d.html
  - id: entry
    resource: e.html
    kind: { type: table_entry, table: Log }
    fields:
      - { field: " zone ", cell: B2 }
      - { field: amount, cell: " B3 ", kind: number }
      - { field: approved, cell: B4, kind: boolean }
"#;
        let manifest = Manifest::from_yaml_str(yaml).expect("parses").normalized();
        let entry = manifest.form("entry").expect("entry form");
        let fields: Vec<_> = entry.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["zone", "amount", "approved"]);
        assert_eq!(entry.fields[1].cell, "B3");
        assert_eq!(manifest.clone().normalized().forms, manifest.forms);
    }
}
