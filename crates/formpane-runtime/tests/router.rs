use formpane_common::{AddressSet, CellAddress};
use formpane_runtime::{
    FormCatalog, NameTable, NamedItem, RouteRule, RouteRules, resolve_form_id,
};
use formpane_spec::Manifest;

fn manifest() -> Manifest {
    Manifest::from_yaml_str(include_str!(
        "../../formpane-spec/tests/fixtures/order_desk.yaml"
    ))
    .expect("fixture parses")
}

fn catalog() -> FormCatalog {
    FormCatalog::from_manifest(&manifest()).expect("catalog builds")
}

fn address_rule(sheet: &str, address: &str, form: &str) -> RouteRule {
    RouteRule {
        sheet: sheet.to_string(),
        address: Some(AddressSet::parse_lenient(address)),
        named_range: None,
        form: form.to_string(),
    }
}

#[test]
fn selection_rule_routes_settings_to_palette() {
    let rules = RouteRules::new(vec![address_rule("settings", "B3", "colorPalette")]);
    let id = resolve_form_id("Settings", "", "B3", &rules, &catalog(), &NameTable::new());
    assert_eq!(id, "colorPalette");
}

#[test]
fn hint_directive_beats_sheet_name() {
    let rules = RouteRules::from_manifest(&manifest());
    let id = resolve_form_id(
        "Orders",
        "FORM:Inventory",
        "A1",
        &rules,
        &catalog(),
        &NameTable::new(),
    );
    assert_eq!(id, "inventory");

    // The hint wins over a sheet that names a form too.
    let id = resolve_form_id(
        "Settings",
        "form:inventory",
        "A1",
        &rules,
        &catalog(),
        &NameTable::new(),
    );
    assert_eq!(id, "inventory");
}

#[test]
fn unknown_sheet_without_hint_or_rule_is_default() {
    let rules = RouteRules::from_manifest(&manifest());
    let id = resolve_form_id("Scratch", "", "C7", &rules, &catalog(), &NameTable::new());
    assert_eq!(id, "default");
}

#[test]
fn sheet_name_selects_form_case_insensitively() {
    let rules = RouteRules::default();
    let id = resolve_form_id("  SETTINGS ", "", "A1", &rules, &catalog(), &NameTable::new());
    assert_eq!(id, "settings");
}

#[test]
fn rule_override_beats_hint() {
    let rules = RouteRules::from_manifest(&manifest());
    let id = resolve_form_id(
        "Settings",
        "form:inventory",
        "$B$3",
        &rules,
        &catalog(),
        &NameTable::new(),
    );
    assert_eq!(id, "colorPalette");
}

#[test]
fn named_range_rule_needs_full_coverage_on_the_same_sheet() {
    let rules = RouteRules::from_manifest(&manifest());
    let names: NameTable = [NamedItem::from_reference("OrderBlock", "Orders!$B$2:$B$4")]
        .into_iter()
        .collect();
    let catalog = catalog();

    assert_eq!(
        resolve_form_id("Orders", "", "Orders!B2:B4", &rules, &catalog, &names),
        "inventory"
    );
    assert_eq!(
        resolve_form_id("Orders", "", "A1:C9", &rules, &catalog, &names),
        "inventory"
    );
    assert_eq!(
        resolve_form_id("Orders", "", "B2:B3", &rules, &catalog, &names),
        "default"
    );
    // Unresolved names never fire.
    assert_eq!(
        resolve_form_id("Orders", "", "B2:B4", &rules, &catalog, &NameTable::new()),
        "default"
    );
}

#[test]
fn separate_cells_do_not_cover_the_span_between_them() {
    let rules = RouteRules::new(vec![address_rule("Plan", "A1:C1", "inventory")]);
    let catalog = catalog();
    let names = NameTable::new();
    assert_eq!(
        resolve_form_id("Plan", "", "A1,C1", &rules, &catalog, &names),
        "default"
    );
    assert_eq!(
        resolve_form_id("Plan", "", "A1,B1,C1", &rules, &catalog, &names),
        "default"
    );
    assert_eq!(
        resolve_form_id("Plan", "", "A1:C1", &rules, &catalog, &names),
        "inventory"
    );
}

#[test]
fn multi_area_target_needs_each_area_covered() {
    let rules = RouteRules::new(vec![address_rule("Plan", "A1,E5", "inventory")]);
    let catalog = catalog();
    let names = NameTable::new();
    assert_eq!(
        resolve_form_id("Plan", "", "A1:B2,D4:E5", &rules, &catalog, &names),
        "inventory"
    );
    assert_eq!(
        resolve_form_id("Plan", "", "A1:B2", &rules, &catalog, &names),
        "default"
    );
}

#[test]
fn whole_column_selection_covers_cells_in_it() {
    let rules = RouteRules::new(vec![address_rule("Plan", "B3:B9", "inventory")]);
    let id = resolve_form_id("Plan", "", "B:B", &rules, &catalog(), &NameTable::new());
    assert_eq!(id, "inventory");
}

#[test]
fn malformed_tokens_degrade_without_panicking() {
    assert_eq!(CellAddress::parse_lenient("ZZ"), CellAddress::new(702, 1));

    let rules = RouteRules::new(vec![address_rule("Plan", "ZZ1", "inventory")]);
    let catalog = catalog();
    let names = NameTable::new();
    assert_eq!(
        resolve_form_id("Plan", "", "ZZ", &rules, &catalog, &names),
        "inventory"
    );
    for garbage in ["", "!!", "1A", ":", ",,,", "Sheet!"] {
        let id = resolve_form_id("Plan", garbage, garbage, &rules, &catalog, &names);
        assert!(id == "default" || id == "inventory", "{garbage:?} gave {id}");
    }
}

#[test]
fn routing_is_deterministic() {
    let rules = RouteRules::from_manifest(&manifest());
    let names: NameTable = [NamedItem::from_reference("OrderBlock", "Orders!B2:B4")]
        .into_iter()
        .collect();
    let catalog = catalog();
    let first = resolve_form_id("Orders", "note", "B2:B4", &rules, &catalog, &names);
    for _ in 0..5 {
        assert_eq!(
            resolve_form_id("Orders", "note", "B2:B4", &rules, &catalog, &names),
            first
        );
    }
}
