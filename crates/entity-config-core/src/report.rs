//! Validation issues and the aggregated error report

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Value has the wrong primitive type
    TypeError,
    /// Required field is absent or null
    RequiredError,
    /// String does not match the field regex
    PatternError,
    /// Value is not one of the select options
    EnumError,
    /// A business rule returned `false` or could not run
    BusinessRuleError,
    /// A business rule is not registered
    UnknownRuleError,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::TypeError => "type_error",
            IssueKind::RequiredError => "required_error",
            IssueKind::PatternError => "pattern_error",
            IssueKind::EnumError => "enum_error",
            IssueKind::BusinessRuleError => "business_rule_error",
            IssueKind::UnknownRuleError => "unknown_rule_error",
        }
    }

    /// Structural issues come from the compiled schema, the rest from the registry
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IssueKind::TypeError
                | IssueKind::RequiredError
                | IssueKind::PatternError
                | IssueKind::EnumError
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem found in a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// `[container_key, field_name]`
    pub field_path: Vec<String>,
    pub message: String,
    pub kind: IssueKind,
    /// Rule that produced the issue, for business-rule issues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Underlying failure text when a rule could not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        container: &str,
        field: &str,
        kind: IssueKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field_path: vec![container.to_string(), field.to_string()],
            message: message.into(),
            kind,
            rule: None,
            cause: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Name of the field the issue belongs to
    pub fn field(&self) -> &str {
        self.field_path.last().map(String::as_str).unwrap_or("")
    }

    /// Dotted form of the field path, e.g. `custom_data.salary`
    pub fn path(&self) -> String {
        self.field_path.join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path(), self.message)
    }
}

/// Every issue found in one payload, in field declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Validation failed with {} issue(s)", .issues.len())]
pub struct AggregatedValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl AggregatedValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationIssue> {
        self.issues.iter()
    }

    /// Issues for a single field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues.iter().filter(move |i| i.field() == field)
    }
}

impl IntoIterator for AggregatedValidationError {
    type Item = ValidationIssue;
    type IntoIter = std::vec::IntoIter<ValidationIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

/// Non-failing summary of a validation pass, used by dry runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
    pub fields_checked: usize,
    pub rules_applied: usize,
}
