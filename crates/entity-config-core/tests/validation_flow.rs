//! End-to-end validation scenarios

use chrono::{Duration, Local};
use entity_config_core::{
    ConfigSchema, FieldDefinition, FieldOption, IssueKind, OptionValue, RuleInvocation, ValidationEngine,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn employee_schema() -> ConfigSchema {
    ConfigSchema::default()
        .with_field(
            FieldDefinition::integer("salary", "Salario").with_validation(
                RuleInvocation::new("numeric_comparation", "El salario no puede ser mayor a 50000")
                    .with_param("threshold", 50000)
                    .with_param("operator", "lte"),
            ),
        )
        .with_field(
            FieldDefinition::string("contract_end", "Fin de contrato").with_validation(
                RuleInvocation::new("date_comparation", "La fecha debe ser futura")
                    .with_param("reference_date", "now")
                    .with_param("operator", "gt"),
            ),
        )
}

fn days_from_today(days: i64) -> String {
    (Local::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

#[test]
fn test_business_rules_report_configured_messages_in_order() {
    let engine = ValidationEngine::with_builtins();
    let input = payload(json!({"salary": 60000, "contract_end": days_from_today(-1)}));

    let err = engine.validate(&input, &employee_schema()).unwrap_err();
    let issues = err.issues().unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues.issues[0].message, "El salario no puede ser mayor a 50000");
    assert_eq!(issues.issues[0].field_path, vec!["custom_data", "salary"]);
    assert_eq!(issues.issues[1].message, "La fecha debe ser futura");
    assert_eq!(issues.issues[1].field_path, vec!["custom_data", "contract_end"]);
    assert!(issues.iter().all(|i| i.kind == IssueKind::BusinessRuleError));
}

#[test]
fn test_business_rules_pass() {
    let engine = ValidationEngine::with_builtins();
    let input = payload(json!({"salary": 40000, "contract_end": days_from_today(30)}));
    assert_eq!(engine.validate(&input, &employee_schema()).unwrap(), input);
}

#[test]
fn test_structural_and_business_issues_combine() {
    let engine = ValidationEngine::with_builtins();
    let schema = employee_schema().with_field(FieldDefinition::select(
        "size",
        "Talla",
        vec![
            FieldOption::new("S", OptionValue::Text("S".to_string())),
            FieldOption::new("M", OptionValue::Text("M".to_string())),
        ],
    ).required());

    let input = payload(json!({"salary": "60000", "contract_end": days_from_today(-1)}));
    let err = engine.validate(&input, &schema).unwrap_err();
    let kinds: Vec<IssueKind> = err.issues().unwrap().iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        vec![IssueKind::TypeError, IssueKind::BusinessRuleError, IssueKind::RequiredError]
    );
}

#[test]
fn test_repeated_validation_is_identical() {
    let engine = ValidationEngine::with_builtins();
    let input = payload(json!({"salary": 99999, "contract_end": "garbage"}));

    let first = serde_json::to_vec(&engine.validate(&input, &employee_schema()).unwrap_err().issues()).unwrap();
    for _ in 0..5 {
        let again = serde_json::to_vec(&engine.validate(&input, &employee_schema()).unwrap_err().issues()).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn test_schema_loaded_from_json() {
    let schema: ConfigSchema = serde_json::from_value(json!({
        "fields": [
            {"name": "codigo", "label": "Código", "type": "string", "required": true, "regex": "^[A-Z]{3}-\\d+$"},
            {"name": "nivel", "label": "Nivel", "type": "select",
             "options": [{"label": "Uno", "value": 1}, {"label": "Dos", "value": 2}]},
            {"name": "activo", "label": "Activo", "type": "boolean"}
        ]
    }))
    .unwrap();

    let engine = ValidationEngine::with_builtins();
    assert!(engine
        .validate(&payload(json!({"codigo": "ABC-12", "nivel": 2, "activo": true})), &schema)
        .is_ok());

    let err = engine
        .validate(&payload(json!({"codigo": "abc-12", "nivel": "2", "activo": 1})), &schema)
        .unwrap_err();
    let kinds: Vec<IssueKind> = err.issues().unwrap().iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![IssueKind::PatternError, IssueKind::EnumError, IssueKind::TypeError]);
}

fn field_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,11}"
}

proptest! {
    #[test]
    fn prop_required_fields_only_validates_unchanged(
        names in prop::collection::btree_set(field_name(), 1..6),
        ints in prop::collection::vec(any::<i64>(), 6),
    ) {
        let mut schema = ConfigSchema::default();
        let mut input = Map::new();
        for (i, name) in names.iter().enumerate() {
            schema = schema.with_field(FieldDefinition::integer(name.clone(), name.clone()).required());
            input.insert(name.clone(), json!(ints[i]));
        }

        let engine = ValidationEngine::with_builtins();
        prop_assert_eq!(engine.validate(&input, &schema).unwrap(), input);
    }

    #[test]
    fn prop_missing_required_field_reports_required_error(
        names in prop::collection::btree_set(field_name(), 2..6),
        omit in any::<prop::sample::Index>(),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let omitted = omit.get(&names).clone();
        let schema = ConfigSchema::new(
            names
                .iter()
                .map(|n| {
                    FieldDefinition::integer(n.clone(), n.clone()).required().with_validation(
                        RuleInvocation::new("numeric_comparation", "never")
                            .with_param("threshold", 0)
                            .with_param("operator", "lt"),
                    )
                })
                .collect(),
        );
        let input: Map<String, Value> = names
            .iter()
            .filter(|n| **n != omitted)
            .map(|n| (n.clone(), json!(-1)))
            .collect();

        let engine = ValidationEngine::with_builtins();
        let err = engine.validate(&input, &schema).unwrap_err();
        let issues: Vec<_> = err.issues().unwrap().for_field(&omitted).collect();
        prop_assert_eq!(issues.len(), 1);
        prop_assert_eq!(issues[0].kind, IssueKind::RequiredError);
        prop_assert_eq!(err.issues().unwrap().len(), 1);
    }

    #[test]
    fn prop_values_outside_options_are_enum_errors(
        value in prop_oneof![
            "[a-z]{1,4}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
    ) {
        let options = [OptionValue::Text("S".to_string()), OptionValue::Text("M".to_string()), OptionValue::Integer(7)];
        prop_assume!(!options.iter().any(|o| o.matches(&value)));

        let schema = ConfigSchema::default().with_field(FieldDefinition::select(
            "size",
            "Size",
            options.iter().cloned().map(|o| FieldOption::new(o.to_string(), o)).collect(),
        ));
        let mut input = Map::new();
        input.insert("size".to_string(), value);

        let engine = ValidationEngine::with_builtins();
        let err = engine.validate(&input, &schema).unwrap_err();
        prop_assert_eq!(err.issues().unwrap().issues[0].kind, IssueKind::EnumError);
    }
}
