//! Schema model for per-tenant custom fields
//!
//! A [`ConfigSchema`] is the declarative description of the custom fields an
//! entity type carries for one tenant: an ordered list of typed fields, each
//! optionally constrained by a regex, a closed set of options, and a list of
//! business-rule invocations resolved through the
//! [`RuleRegistry`](crate::registry::RuleRegistry) at validation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::SchemaError;

/// Primitive type of a custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// Closed set of options, see [`FieldDefinition::options`]
    Select,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a select option. Integer and string options never match each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Integer(i64),
    Text(String),
}

impl OptionValue {
    /// Exact type + value comparison against a payload value
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match (self, value) {
            (OptionValue::Integer(expected), serde_json::Value::Number(n)) => {
                n.as_i64() == Some(*expected)
            }
            (OptionValue::Text(expected), serde_json::Value::String(s)) => expected == s,
            _ => false,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// One selectable option of a `select` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: OptionValue,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: OptionValue) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Invocation of a registered business rule on a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInvocation {
    /// Name of the registered rule
    pub action: String,
    /// Rule-specific parameters, passed to the rule untouched
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Message reported verbatim when the rule returns `false`
    pub error_message: String,
}

impl RuleInvocation {
    pub fn new(action: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: serde_json::Map::new(),
            error_message: error_message.into(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Definition of a single custom field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Key of the field in the payload, unique within a schema
    pub name: String,
    /// Display name
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Allowed values; only for `select`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    /// Pattern the value must match; only for `string`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<RuleInvocation>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            required: false,
            options: None,
            regex: None,
            validations: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldType::String)
    }

    pub fn integer(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldType::Integer)
    }

    pub fn boolean(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldType::Boolean)
    }

    pub fn select(
        name: impl Into<String>,
        label: impl Into<String>,
        options: Vec<FieldOption>,
    ) -> Self {
        let mut field = Self::new(name, label, FieldType::Select);
        field.options = Some(options);
        field
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    pub fn with_validation(mut self, rule: RuleInvocation) -> Self {
        self.validations.push(rule);
        self
    }

    /// Check the per-field invariants
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyFieldName);
        }

        match (self.field_type, &self.options) {
            (FieldType::Select, None) => {
                return Err(SchemaError::MissingOptions(self.name.clone()));
            }
            (FieldType::Select, Some(options)) if options.is_empty() => {
                return Err(SchemaError::MissingOptions(self.name.clone()));
            }
            (FieldType::Select, Some(_)) => {}
            (field_type, Some(_)) => {
                return Err(SchemaError::OptionsNotAllowed {
                    field: self.name.clone(),
                    field_type,
                });
            }
            (_, None) => {}
        }

        if let Some(pattern) = &self.regex {
            if self.field_type != FieldType::String {
                return Err(SchemaError::RegexNotAllowed {
                    field: self.name.clone(),
                    field_type: self.field_type,
                });
            }
            regex::Regex::new(pattern).map_err(|e| SchemaError::InvalidRegex {
                field: self.name.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

/// Ordered list of field definitions for one (tenant, entity type) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub fields: Vec<FieldDefinition>,
}

impl ConfigSchema {
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self { fields }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of every rule the schema invokes, in declaration order, without duplicates
    pub fn referenced_rules(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .flat_map(|f| f.validations.iter())
            .map(|v| v.action.as_str())
            .filter(|action| seen.insert(*action))
            .collect()
    }

    /// Check the schema invariants. Rule names are not resolved here.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut names = HashSet::new();
        for field in &self.fields {
            field.check()?;
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }
}

/// Persisted custom-field configuration of one entity type for one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub config: ConfigSchema,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityConfig {
    pub fn new(tenant_id: Uuid, entity_type: impl Into<String>, config: ConfigSchema) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            entity_type: entity_type.into(),
            name: None,
            config,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the whole field list
    pub fn replace_config(&mut self, config: ConfigSchema) {
        self.config = config;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn size_options() -> Vec<FieldOption> {
        vec![
            FieldOption::new("Small", OptionValue::Text("S".to_string())),
            FieldOption::new("Large", OptionValue::Text("L".to_string())),
        ]
    }

    #[test]
    fn test_deserialize_schema() {
        let schema: ConfigSchema = serde_json::from_value(json!({
            "fields": [
                {"name": "talla_camisa", "label": "Talla", "type": "select", "required": true,
                 "options": [{"label": "S", "value": "S"}, {"label": "Uno", "value": 1}]},
                {"name": "codigo", "label": "Código", "type": "string", "regex": "^[A-Z]{3}$"},
                {"name": "salary", "label": "Salario", "type": "integer",
                 "validations": [{"action": "numeric_comparation",
                                  "params": {"threshold": 50000, "operator": "lte"},
                                  "error_message": "too high"}]}
            ]
        }))
        .unwrap();

        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.fields[0].field_type, FieldType::Select);
        assert!(schema.fields[0].required);
        let options = schema.fields[0].options.as_ref().unwrap();
        assert_eq!(options[0].value, OptionValue::Text("S".to_string()));
        assert_eq!(options[1].value, OptionValue::Integer(1));
        assert!(!schema.fields[1].required);
        assert_eq!(schema.fields[2].validations[0].params["operator"], "lte");
        assert!(schema.check().is_ok());
    }

    #[test]
    fn test_option_value_matching_is_type_strict() {
        let one = OptionValue::Integer(1);
        assert!(one.matches(&json!(1)));
        assert!(!one.matches(&json!("1")));
        assert!(!one.matches(&json!(1.5)));
        assert!(!one.matches(&json!(true)));

        let text = OptionValue::Text("1".to_string());
        assert!(text.matches(&json!("1")));
        assert!(!text.matches(&json!(1)));
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let schema = ConfigSchema::default()
            .with_field(FieldDefinition::string("code", "Code"))
            .with_field(FieldDefinition::integer("code", "Code again"));
        assert_eq!(
            schema.check(),
            Err(SchemaError::DuplicateField("code".to_string()))
        );
    }

    #[test]
    fn test_select_requires_options() {
        let field = FieldDefinition::new("size", "Size", FieldType::Select);
        assert_eq!(field.check(), Err(SchemaError::MissingOptions("size".to_string())));

        let field = FieldDefinition::select("size", "Size", vec![]);
        assert!(matches!(field.check(), Err(SchemaError::MissingOptions(_))));

        assert!(FieldDefinition::select("size", "Size", size_options()).check().is_ok());
    }

    #[test]
    fn test_options_only_on_select() {
        let mut field = FieldDefinition::string("size", "Size");
        field.options = Some(size_options());
        assert!(matches!(
            field.check(),
            Err(SchemaError::OptionsNotAllowed { field_type: FieldType::String, .. })
        ));
    }

    #[test]
    fn test_regex_only_on_string() {
        let field = FieldDefinition::integer("age", "Age").with_regex("^\\d+$");
        assert!(matches!(field.check(), Err(SchemaError::RegexNotAllowed { .. })));

        let field = FieldDefinition::string("code", "Code").with_regex("([a-z");
        assert!(matches!(field.check(), Err(SchemaError::InvalidRegex { .. })));
    }

    #[test]
    fn test_unknown_actions_do_not_fail_check() {
        let schema = ConfigSchema::default().with_field(
            FieldDefinition::string("code", "Code")
                .with_validation(RuleInvocation::new("does_not_exist", "nope")),
        );
        assert!(schema.check().is_ok());
        assert_eq!(schema.referenced_rules(), vec!["does_not_exist"]);
    }

    #[test]
    fn test_serialization_omits_empty_parts() {
        let field = FieldDefinition::boolean("active", "Active");
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(
            value,
            json!({"name": "active", "label": "Active", "type": "boolean", "required": false})
        );
    }

    #[test]
    fn test_replace_config_bumps_updated_at() {
        let mut config = EntityConfig::new(Uuid::new_v4(), "usuario", ConfigSchema::default());
        let before = config.updated_at;
        config.replace_config(
            ConfigSchema::default().with_field(FieldDefinition::string("code", "Code")),
        );
        assert_eq!(config.config.fields.len(), 1);
        assert!(config.updated_at >= before);
    }
}
