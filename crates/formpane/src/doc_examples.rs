use formpane_runtime::{FormCatalog, FormId, NameTable, RouteRules, resolve_form_id};
use formpane_spec::Manifest;

/// Route one selection against a manifest without touching a workbook.
///
/// This helper is intended for documentation examples to avoid repetitive setup.
/// Rules that depend on defined names never fire here.
///
/// # Example
///
/// ```rust
/// # use formpane::doc_examples::route_once;
/// let manifest = r#"
/// spec: formpane
/// spec_version: "0.1.0"
/// forms:
///   - { id: default, resource: forms/default.html }
///   - { id: colorPalette, resource: forms/palette.html }
/// rules:
///   - { sheet: settings, address: B3, form: colorPalette }
/// "#;
/// let form = route_once(manifest, "Settings", "", "Settings!B3")?;
/// assert_eq!(form.as_str(), "colorPalette");
/// # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
/// ```
pub fn route_once(
    manifest_yaml: &str,
    sheet: &str,
    hint_text: &str,
    selection: &str,
) -> Result<FormId, Box<dyn std::error::Error + Send + Sync>> {
    let manifest = Manifest::from_yaml_str(manifest_yaml)?;
    manifest.validate()?;
    let catalog = FormCatalog::from_manifest(&manifest)?;
    let rules = RouteRules::from_manifest(&manifest);
    Ok(resolve_form_id(
        sheet,
        hint_text,
        selection,
        &rules,
        &catalog,
        &NameTable::new(),
    ))
}
