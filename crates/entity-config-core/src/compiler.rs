//! Schema compiler
//!
//! Turns a declarative [`ConfigSchema`] into a [`CompiledSchema`]: one
//! [`ShapeCheck`] per field plus the rule invocations to run once the shape
//! holds. Regexes are compiled once here, so a compiled schema can be shared
//! (see [`SchemaCache`](crate::engine::SchemaCache)) and applied to any number
//! of payloads concurrently.

use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::SchemaError;
use crate::report::{IssueKind, ValidationIssue};
use crate::schema::{ConfigSchema, FieldDefinition, FieldType, OptionValue, RuleInvocation};

pub const REQUIRED_MESSAGE: &str = "Field required";

/// Structural predicate for one field value
#[derive(Debug, Clone)]
pub enum ShapeCheck {
    String,
    /// String that must contain a match of the pattern
    Pattern(Regex),
    Integer,
    Boolean,
    /// Exact type and value match against one of the options
    OneOf(Vec<OptionValue>),
}

impl ShapeCheck {
    fn for_field(field: &FieldDefinition) -> Result<Self, SchemaError> {
        let shape = match field.field_type {
            FieldType::String => match &field.regex {
                Some(pattern) => {
                    let regex = Regex::new(pattern).map_err(|e| SchemaError::InvalidRegex {
                        field: field.name.clone(),
                        reason: e.to_string(),
                    })?;
                    ShapeCheck::Pattern(regex)
                }
                None => ShapeCheck::String,
            },
            FieldType::Integer => ShapeCheck::Integer,
            FieldType::Boolean => ShapeCheck::Boolean,
            FieldType::Select => {
                let options = field
                    .options
                    .as_ref()
                    .filter(|o| !o.is_empty())
                    .ok_or_else(|| SchemaError::MissingOptions(field.name.clone()))?;
                ShapeCheck::OneOf(options.iter().map(|o| o.value.clone()).collect())
            }
        };
        Ok(shape)
    }

    /// Check a present, non-null value
    pub fn check(&self, value: &Value) -> Result<(), (IssueKind, String)> {
        match self {
            ShapeCheck::String => match value {
                Value::String(_) => Ok(()),
                _ => Err((IssueKind::TypeError, "Input should be a valid string".to_string())),
            },
            ShapeCheck::Pattern(regex) => match value {
                Value::String(s) if regex.is_match(s) => Ok(()),
                Value::String(_) => Err((
                    IssueKind::PatternError,
                    format!("String should match pattern '{}'", regex.as_str()),
                )),
                _ => Err((IssueKind::TypeError, "Input should be a valid string".to_string())),
            },
            ShapeCheck::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
                _ => Err((IssueKind::TypeError, "Input should be a valid integer".to_string())),
            },
            ShapeCheck::Boolean => match value {
                Value::Bool(_) => Ok(()),
                _ => Err((IssueKind::TypeError, "Input should be a valid boolean".to_string())),
            },
            ShapeCheck::OneOf(options) => {
                if options.iter().any(|o| o.matches(value)) {
                    Ok(())
                } else {
                    Err((IssueKind::EnumError, format!("Input should be {}", describe_options(options))))
                }
            }
        }
    }
}

/// `'a'`, `'a' or 'b'`, `'a', 'b' or 'c'`
fn describe_options(options: &[OptionValue]) -> String {
    let rendered: Vec<String> = options.iter().map(ToString::to_string).collect();
    match rendered.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        None => String::new(),
    }
}

/// Result of the structural check for one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome<'a> {
    /// Absent or null on an optional field; rules are skipped
    Skipped,
    /// Failed the structural check; rules are skipped
    Invalid(IssueKind, String),
    /// Present and well-formed; rules run against the value
    Valid(&'a Value),
}

/// A field ready to be checked
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub shape: ShapeCheck,
    pub rules: Vec<RuleInvocation>,
}

impl CompiledField {
    pub fn check<'a>(&self, payload: &'a Map<String, Value>) -> FieldOutcome<'a> {
        match payload.get(&self.name) {
            None | Some(Value::Null) if self.required => {
                FieldOutcome::Invalid(IssueKind::RequiredError, REQUIRED_MESSAGE.to_string())
            }
            None | Some(Value::Null) => FieldOutcome::Skipped,
            Some(value) => match self.shape.check(value) {
                Ok(()) => FieldOutcome::Valid(value),
                Err((kind, message)) => FieldOutcome::Invalid(kind, message),
            },
        }
    }
}

/// Structural validator derived from a [`ConfigSchema`]
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    fields: Vec<CompiledField>,
    fingerprint: String,
}

impl CompiledSchema {
    /// Check the schema invariants and build the per-field checks
    pub fn compile(schema: &ConfigSchema) -> Result<Self, SchemaError> {
        schema.check()?;

        let fields = schema
            .fields
            .iter()
            .map(|field| {
                Ok(CompiledField {
                    name: field.name.clone(),
                    label: field.label.clone(),
                    required: field.required,
                    shape: ShapeCheck::for_field(field)?,
                    rules: field.validations.clone(),
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        Ok(Self {
            fields,
            fingerprint: fingerprint(schema),
        })
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn rule_count(&self) -> usize {
        self.fields.iter().map(|f| f.rules.len()).sum()
    }

    /// Structural issues only, in field declaration order
    pub fn structural_errors(&self, payload: &Map<String, Value>, container: &str) -> Vec<ValidationIssue> {
        self.fields
            .iter()
            .filter_map(|field| match field.check(payload) {
                FieldOutcome::Invalid(kind, message) => {
                    Some(ValidationIssue::new(container, &field.name, kind, message))
                }
                _ => None,
            })
            .collect()
    }
}

/// SHA-256 of the schema's canonical JSON form
pub fn fingerprint(schema: &ConfigSchema) -> String {
    let canonical = serde_json::to_vec(schema).unwrap_or_else(|_| format!("{:?}", schema).into_bytes());
    hex::encode(Sha256::digest(&canonical))
}
