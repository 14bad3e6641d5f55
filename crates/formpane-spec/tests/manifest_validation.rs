use formpane_spec::{FormKindDecl, Manifest, generate_schema_value};

fn load_fixture(name: &str) -> Manifest {
    let path = format!("tests/fixtures/{}.yaml", name);
    let text = std::fs::read_to_string(path).expect("failed to read fixture");
    serde_yaml::from_str::<Manifest>(&text).expect("fixture should deserialize")
}

#[test]
fn order_desk_fixture_validates() {
    let manifest = load_fixture("order_desk");
    manifest.validate().expect("fixture should validate");
    assert_eq!(manifest.forms.len(), 4);
    assert_eq!(
        manifest.form("inventory").map(|f| &f.kind),
        Some(&FormKindDecl::TableEntry {
            table: "InventoryTable".to_string()
        })
    );
}

#[test]
fn load_reads_and_validates_from_disk() {
    let manifest = Manifest::load("tests/fixtures/order_desk.yaml").expect("loads");
    assert_eq!(manifest.rules.len(), 2);
    assert!(Manifest::load("tests/fixtures/missing.yaml").is_err());
}

#[test]
fn missing_default_form_rejected() {
    let mut manifest = load_fixture("order_desk");
    manifest.forms.retain(|form| form.id != "default");
    let err = manifest.validate().expect_err("validation should fail");
    assert!(err.has_issue_at("forms"), "issues: {:?}", err.issues());
}

#[test]
fn rule_issues_are_collected_together() {
    let mut manifest = load_fixture("order_desk");
    manifest.rules[0].form = "nope".to_string();
    manifest.rules[0].address = Some("B-3".to_string());
    manifest.rules[1].named_range = None;

    let err = manifest.validate().expect_err("validation should fail");
    assert!(err.has_issue_at("rules[0].form"));
    assert!(err.has_issue_at("rules[0].address"));
    assert!(err.has_issue_at("rules[1]"));
    assert_eq!(err.issues().len(), 3);
}

#[test]
fn duplicate_form_ids_ignore_case() {
    let mut manifest = load_fixture("order_desk");
    let mut copy = manifest.forms[1].clone();
    copy.id = "INVENTORY".to_string();
    manifest.forms.push(copy);
    let err = manifest.validate().expect_err("duplicate id");
    assert!(err.has_issue_at("forms[4].id"));
}

#[test]
fn bad_binding_cells_rejected() {
    let mut manifest = load_fixture("order_desk");
    manifest.forms[1].fields[0].cell = "B2:B9".to_string();
    let err = manifest.validate().expect_err("range is not a cell");
    assert!(err.has_issue_at("forms[1].fields[0].cell"));
}

#[test]
fn zero_timing_and_capacity_rejected() {
    let mut manifest = load_fixture("order_desk");
    manifest.panel.selection_cooldown_ms = 0;
    manifest.notifications.capacity = 0;
    manifest.panel.hint_cell = "A1:B1".to_string();
    let err = manifest.validate().expect_err("bad panel config");
    assert!(err.has_issue_at("panel.selection_cooldown_ms"));
    assert!(err.has_issue_at("notifications.capacity"));
    assert!(err.has_issue_at("panel.hint_cell"));
}

#[test]
fn wrong_spec_identity_rejected() {
    let yaml = r#"
spec: fio
spec_version: "1.0.0"
forms:
  - id: default
    resource: d.html
"#;
    let manifest = Manifest::from_yaml_str(yaml).expect("parses");
    let err = manifest.validate().expect_err("wrong spec");
    assert!(err.has_issue_at("spec"));
    assert!(err.has_issue_at("spec_version"));
}

#[test]
fn unknown_fields_are_parse_errors() {
    let yaml = r#"
spec: formpane
spec_version: "0.1.0"
forms:
  - id: default
    resource: d.html
    colour: blue
"#;
    assert!(Manifest::from_yaml_str(yaml).is_err());
}

#[test]
fn json_and_yaml_agree() {
    let manifest = load_fixture("order_desk");
    let json = serde_json::to_string(&manifest).expect("serializes");
    let reparsed = Manifest::from_json_str(&json).expect("json parses");
    assert_eq!(reparsed.forms, manifest.forms);
    assert_eq!(reparsed.rules, manifest.rules);
}

#[test]
fn schema_is_an_object() {
    let value = generate_schema_value();
    assert!(value.is_object(), "schema root should be an object");
    assert!(value.get("properties").is_some());
}
