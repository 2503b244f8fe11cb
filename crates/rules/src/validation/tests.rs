use super::*;
use crate::registry::CapabilityRegistry;

fn validate(yaml: &str) -> ValidationResult {
    validate_yaml(yaml, Some(&CapabilityRegistry::new()))
}

#[test]
fn clean_set_is_valid() {
    let result = validate(
        r#"
rules:
  - id: vip-upgrade
    priority: 10
    conditions:
      - field: user.tier
        type: equals
        value: gold
    actions:
      - type: set
        target: user.perks
        value: [lounge]
"#,
    );
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn duplicate_and_empty_ids_are_errors() {
    let result = validate(
        r#"
rules:
  - id: a
  - id: a
  - id: ""
"#,
    );
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].path, "rules[1].id");
    assert!(result.summary().contains("duplicate rule id 'a'"));
}

#[test]
fn out_of_range_numbers_are_errors() {
    let result = validate(
        r#"
neuralConfig:
  parallelismLevel: 0
  activationThreshold: 1.5
rules:
  - id: r1
    metadata:
      signalWeight: -0.1
"#,
    );
    let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "neuralConfig.parallelismLevel",
            "neuralConfig.activationThreshold",
            "rules[0].metadata.signalWeight",
        ]
    );
}

#[test]
fn malformed_regex_is_only_a_warning() {
    let result = validate(
        r#"
rules:
  - id: r1
    conditions:
      - field: email
        type: regex
        value: "(["
"#,
    );
    assert!(result.valid);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].path, "rules[0].conditions[0].value");
}

#[test]
fn unknown_transform_suggests_registered_name() {
    let result = validate(
        r#"
rules:
  - id: r1
    actions:
      - type: transform
        target: name
        functionName: identiy
"#,
    );
    assert!(result.valid);
    assert_eq!(result.warnings[0].suggestion.as_deref(), Some("identity"));
    assert!(result.warnings[0].to_string().contains("did you mean 'identity'"));
}

#[test]
fn registry_checks_skipped_without_registry() {
    let result = validate_yaml(
        r#"
rules:
  - id: r1
    conditions:
      - field: x
        type: custom
        handler: geo
"#,
        None,
    );
    assert!(result.valid);
    assert!(result.warnings.is_empty());
}

#[test]
fn empty_trigger_name_is_an_error() {
    let result = validate(
        r#"
rules:
  - id: r1
    actions:
      - type: trigger
        functionName: ""
"#,
    );
    assert!(!result.valid);
    assert_eq!(result.errors[0].path, "rules[0].actions[0].functionName");
}

#[test]
fn parse_errors_are_reported() {
    let result = validate("rules: [ {id: ");
    assert!(!result.valid);
    assert!(result.errors[0].message.starts_with("YAML parse error"));
}
