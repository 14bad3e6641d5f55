//! Form templates: fetching through a per-panel cache and discovering the
//! field bindings a template declares inline.

use std::rc::Rc;

use formpane_common::ValueKind;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::catalog::{BindingSpec, CellRef, FormDefinition};
use crate::error::FormpaneError;
use crate::host::FormSource;

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Za-z][^>]*>").expect("tag regex must compile"));
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex must compile")
});

/// Scan a template for elements carrying `data-cell`.
///
/// The field id comes from `data-field`, then `name`, then `id`; elements
/// with none of them are skipped. The value kind comes from `data-kind`,
/// else from `type="checkbox"` / `type="number"`, else text.
pub fn discover_bindings(html: &str) -> Vec<BindingSpec> {
    let mut out: Vec<BindingSpec> = Vec::new();
    for tag in TAG.find_iter(html) {
        let mut attrs: FxHashMap<String, &str> = FxHashMap::default();
        for caps in ATTRIBUTE.captures_iter(tag.as_str()) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2).or_else(|| caps.get(3)))
            else {
                continue;
            };
            attrs
                .entry(name.as_str().to_ascii_lowercase())
                .or_insert(value.as_str());
        }

        let Some(cell) = attrs.get("data-cell").map(|c| c.trim()).filter(|c| !c.is_empty())
        else {
            continue;
        };
        let Some(field) = ["data-field", "name", "id"]
            .iter()
            .find_map(|key| attrs.get(*key).map(|v| v.trim()).filter(|v| !v.is_empty()))
        else {
            continue;
        };
        if out.iter().any(|existing| existing.field == field) {
            continue;
        }

        let kind = attrs
            .get("data-kind")
            .and_then(|kind| kind.parse::<ValueKind>().ok())
            .or_else(|| match attrs.get("type").map(|t| t.trim().to_ascii_lowercase()) {
                Some(t) if t == "checkbox" => Some(ValueKind::Boolean),
                Some(t) if t == "number" => Some(ValueKind::Number),
                _ => None,
            })
            .unwrap_or_default();

        out.push(BindingSpec::new(field, CellRef::parse(cell), kind));
    }
    out
}

/// Manifest bindings first, then template bindings for fields the manifest
/// does not mention.
pub fn merge_bindings(declared: &[BindingSpec], discovered: Vec<BindingSpec>) -> Vec<BindingSpec> {
    let mut merged = declared.to_vec();
    for binding in discovered {
        if !merged.iter().any(|existing| existing.field == binding.field) {
            merged.push(binding);
        }
    }
    merged
}

/// Templates fetched so far, keyed by lowercased form id. Lives as long as
/// the panel. Failed fetches are not cached.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: FxHashMap<String, Rc<str>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<S: FormSource + ?Sized>(
        &mut self,
        source: &mut S,
        form: &FormDefinition,
    ) -> Result<Rc<str>, FormpaneError> {
        let key = form.id.as_str().to_ascii_lowercase();
        if let Some(html) = self.entries.get(&key) {
            tracing::debug!(form = %form.id, "template cache hit");
            return Ok(Rc::clone(html));
        }
        let html: Rc<str> = source
            .fetch(&form.resource)
            .map_err(|source| FormpaneError::Fetch {
                form: form.id.clone(),
                source,
            })?
            .into();
        self.entries.insert(key, Rc::clone(&html));
        Ok(html)
    }

    pub fn contains(&self, form: &str) -> bool {
        self.entries.contains_key(&form.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FormId, FormKind};
    use crate::error::FetchError;
    use formpane_common::CellAddress;

    struct CountingSource {
        calls: usize,
        fail: bool,
    }

    impl FormSource for CountingSource {
        fn fetch(&mut self, resource: &str) -> Result<String, FetchError> {
            self.calls += 1;
            if self.fail {
                Err(FetchError::new(resource, "offline").with_status(503))
            } else {
                Ok(format!("<form data-src=\"{resource}\"></form>"))
            }
        }
    }

    fn definition() -> FormDefinition {
        FormDefinition {
            id: FormId::new("Inventory"),
            kind: FormKind::Fields,
            resource: "forms/inventory.html".into(),
            bindings: Vec::new(),
        }
    }

    #[test]
    fn discovers_bindings_from_data_attributes() {
        let html = r#"
            <label>SKU <input id="sku" data-cell="B2"></label>
            <input data-field="qty" data-cell="$C$2" data-kind="number">
            <input type="checkbox" name="active" data-cell='Flag'>
            <input name="note">
            <span data-cell="D4"></span>
        "#;
        let bindings = discover_bindings(html);
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].field, "sku");
        assert_eq!(bindings[0].kind, ValueKind::Text);
        assert_eq!(bindings[1].cell, CellRef::Address(CellAddress::new(3, 2)));
        assert_eq!(bindings[1].kind, ValueKind::Number);
        assert_eq!(bindings[2].cell, CellRef::Name("Flag".into()));
        assert_eq!(bindings[2].kind, ValueKind::Boolean);
    }

    #[test]
    fn declared_bindings_win() {
        let declared = vec![BindingSpec::new(
            "qty",
            CellRef::parse("E5"),
            ValueKind::Number,
        )];
        let discovered = discover_bindings(r#"<input name="qty" data-cell="C2"><input name="sku" data-cell="B2">"#);
        let merged = merge_bindings(&declared, discovered);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].cell, CellRef::parse("E5"));
        assert_eq!(merged[1].field, "sku");
    }

    #[test]
    fn cache_fetches_once_and_skips_failures() {
        let mut cache = TemplateCache::new();
        let form = definition();

        let mut failing = CountingSource { calls: 0, fail: true };
        let err = cache.load(&mut failing, &form).unwrap_err();
        assert!(matches!(err, FormpaneError::Fetch { .. }));
        assert!(cache.is_empty());

        let mut source = CountingSource { calls: 0, fail: false };
        let first = cache.load(&mut source, &form).unwrap();
        let second = cache.load(&mut source, &form).unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls, 1);
        assert!(cache.contains("INVENTORY"));
    }
}
