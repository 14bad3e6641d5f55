//! Selection router.
//!
//! [`resolve_form_id`] picks the form for the current sheet from three
//! signals: a `form:<id>` directive in the hint cell, the sheet name, and
//! selection rules. It performs no I/O. Defined names used by rules are
//! resolved ahead of time and handed in as a [`NameTable`].

use formpane_common::AddressSet;
use formpane_spec::{Manifest, RuleDecl};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::catalog::{FormCatalog, FormId};
use crate::host::NamedItem;

static HINT_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)form:([a-z0-9_-]+)").expect("hint directive regex must compile"));

/// Selection rule with its address parsed for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub sheet: String,
    pub address: Option<AddressSet>,
    pub named_range: Option<String>,
    pub form: String,
}

impl RouteRule {
    pub fn applies_to(&self, sheet: &str) -> bool {
        same_sheet(&self.sheet, sheet)
    }

    /// Address first, then the named range as a fallback.
    fn fires(&self, selection: &AddressSet, sheet: &str, names: &NameTable) -> bool {
        if let Some(target) = &self.address {
            if selection.covers(target) {
                return true;
            }
        }
        let Some(name) = &self.named_range else {
            return false;
        };
        let Some(item) = names.get(name) else {
            return false;
        };
        match &item.sheet {
            Some(item_sheet) if same_sheet(item_sheet, sheet) => {
                let target = AddressSet::parse_lenient(&item.address);
                !target.is_empty() && selection.covers(&target)
            }
            _ => false,
        }
    }
}

impl From<&RuleDecl> for RouteRule {
    fn from(value: &RuleDecl) -> Self {
        Self {
            sheet: value.sheet.trim().to_string(),
            address: value
                .address
                .as_deref()
                .map(AddressSet::parse_lenient)
                .filter(|set| !set.is_empty()),
            named_range: value
                .named_range
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            form: value.form.trim().to_string(),
        }
    }
}

/// Ordered rule list. Earlier rules take precedence.
#[derive(Debug, Clone, Default)]
pub struct RouteRules {
    rules: Vec<RouteRule>,
}

impl RouteRules {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self::new(manifest.rules.iter().map(RouteRule::from).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules.iter()
    }

    /// Whether any rule applies to `sheet`; decides selection subscriptions.
    pub fn targets_sheet(&self, sheet: &str) -> bool {
        self.rules.iter().any(|rule| rule.applies_to(sheet))
    }

    /// Defined names the rules for `sheet` need resolved, deduplicated.
    pub fn names_for_sheet(&self, sheet: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in self.rules.iter().filter(|rule| rule.applies_to(sheet)) {
            if let Some(name) = rule.named_range.as_deref() {
                if !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Pre-resolved defined names, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    items: FxHashMap<String, NamedItem>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: NamedItem) {
        self.items.insert(item.name.trim().to_ascii_lowercase(), item);
    }

    pub fn get(&self, name: &str) -> Option<&NamedItem> {
        self.items.get(&name.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<NamedItem> for NameTable {
    fn from_iter<I: IntoIterator<Item = NamedItem>>(iter: I) -> Self {
        let mut table = NameTable::new();
        for item in iter {
            table.insert(item);
        }
        table
    }
}

/// The identifier of the first `form:<id>` directive in `text`, lowercased.
pub fn extract_hint_directive(text: &str) -> Option<String> {
    HINT_DIRECTIVE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Decide which form the panel shows.
///
/// The base form comes from the hint directive when it names a known
/// form, else from the sheet name, else `default`. The first rule for
/// this sheet whose target the selection covers overrides the base; a
/// rule naming an unknown form overrides with `default`.
pub fn resolve_form_id(
    sheet: &str,
    hint_text: &str,
    selection: &str,
    rules: &RouteRules,
    catalog: &FormCatalog,
    names: &NameTable,
) -> FormId {
    let base = extract_hint_directive(hint_text)
        .and_then(|id| catalog.resolve(&id).cloned())
        .or_else(|| {
            catalog
                .resolve(&sheet.trim().to_lowercase())
                .cloned()
        })
        .unwrap_or_else(|| catalog.default_form().id.clone());

    let selection = AddressSet::parse_lenient(selection);
    let override_form = rules
        .iter()
        .filter(|rule| rule.applies_to(sheet))
        .find(|rule| rule.fires(&selection, sheet, names));

    match override_form {
        Some(rule) => catalog.resolve_or_default(&rule.form),
        None => base,
    }
}

fn same_sheet(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FormDefinition, FormKind};

    fn catalog(ids: &[&str]) -> FormCatalog {
        FormCatalog::new(
            ids.iter()
                .map(|id| FormDefinition {
                    id: FormId::new(*id),
                    kind: FormKind::Fields,
                    resource: format!("{id}.html"),
                    bindings: Vec::new(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn address_rule(sheet: &str, address: &str, form: &str) -> RouteRule {
        RouteRule {
            sheet: sheet.into(),
            address: Some(AddressSet::parse_lenient(address)),
            named_range: None,
            form: form.into(),
        }
    }

    #[test]
    fn hint_directive_is_case_insensitive() {
        assert_eq!(
            extract_hint_directive("see FORM:Inventory please").as_deref(),
            Some("inventory")
        );
        assert_eq!(extract_hint_directive("form: inventory"), None);
        assert_eq!(extract_hint_directive(""), None);
    }

    #[test]
    fn unknown_hint_falls_back_to_sheet_name() {
        let forms = catalog(&["default", "orders"]);
        let rules = RouteRules::default();
        let names = NameTable::new();
        let id = resolve_form_id(" Orders ", "form:nope", "A1", &rules, &forms, &names);
        assert_eq!(id, "orders");
    }

    #[test]
    fn first_matching_rule_wins() {
        let forms = catalog(&["default", "first", "second"]);
        let rules = RouteRules::new(vec![
            address_rule("Plan", "B2:C3", "first"),
            address_rule("Plan", "B2", "second"),
        ]);
        let names = NameTable::new();
        let id = resolve_form_id("plan", "", "A1:D4", &rules, &forms, &names);
        assert_eq!(id, "first");
        let id = resolve_form_id("plan", "", "B2", &rules, &forms, &names);
        assert_eq!(id, "second");
    }

    #[test]
    fn rule_for_unknown_form_overrides_with_default() {
        let forms = catalog(&["default", "plan"]);
        let rules = RouteRules::new(vec![address_rule("Plan", "B2", "ghost")]);
        let id = resolve_form_id("Plan", "", "B2", &rules, &forms, &NameTable::new());
        assert_eq!(id, "default");
    }

    #[test]
    fn named_range_on_other_sheet_does_not_fire() {
        let forms = catalog(&["default", "block"]);
        let rules = RouteRules::new(vec![RouteRule {
            sheet: "Plan".into(),
            address: None,
            named_range: Some("Block".into()),
            form: "block".into(),
        }]);
        let mut names = NameTable::new();
        names.insert(NamedItem::from_reference("Block", "Other!$B$2:$C$3"));
        let id = resolve_form_id("Plan", "", "B2:C3", &rules, &forms, &names);
        assert_eq!(id, "default");

        let mut names = NameTable::new();
        names.insert(NamedItem::from_reference("block", "plan!$B$2:$C$3"));
        let id = resolve_form_id("Plan", "", "A1:D9", &rules, &forms, &names);
        assert_eq!(id, "block");
    }

    #[test]
    fn address_is_tried_before_named_range() {
        let forms = catalog(&["default", "both"]);
        let rules = RouteRules::new(vec![RouteRule {
            sheet: "Plan".into(),
            address: Some(AddressSet::parse_lenient("Z99")),
            named_range: Some("Block".into()),
            form: "both".into(),
        }]);
        let names: NameTable = [NamedItem::from_reference("Block", "Plan!B2")]
            .into_iter()
            .collect();
        assert_eq!(resolve_form_id("Plan", "", "Z99", &rules, &forms, &names), "both");
        assert_eq!(resolve_form_id("Plan", "", "B2", &rules, &forms, &names), "both");
        assert_eq!(resolve_form_id("Plan", "", "C3", &rules, &forms, &names), "default");
    }

    #[test]
    fn names_for_sheet_are_deduplicated() {
        let rules = RouteRules::new(vec![
            RouteRule {
                sheet: "Plan".into(),
                address: None,
                named_range: Some("Block".into()),
                form: "a".into(),
            },
            RouteRule {
                sheet: "plan".into(),
                address: None,
                named_range: Some("BLOCK".into()),
                form: "b".into(),
            },
            RouteRule {
                sheet: "Other".into(),
                address: None,
                named_range: Some("Elsewhere".into()),
                form: "c".into(),
            },
        ]);
        assert_eq!(rules.names_for_sheet("PLAN"), vec!["Block"]);
        assert!(rules.targets_sheet("other"));
        assert!(!rules.targets_sheet("Settings"));
    }
}
