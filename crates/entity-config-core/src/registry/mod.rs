//! Registry of named business rules
//!
//! A rule is a predicate over one field value plus static parameters taken
//! from the schema's [`RuleInvocation`](crate::schema::RuleInvocation). The
//! registry is filled once at startup (see [`RuleRegistry::with_builtins`]),
//! then frozen behind an `Arc` and shared by every validation. Registering a
//! name twice replaces the earlier entry.

pub mod date;
pub mod numeric;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{RuleError, RuleExecutionError, UnknownRuleError};

/// Parameters of a rule invocation
pub type RuleParams = serde_json::Map<String, Value>;

/// Signature every rule implements
pub type RuleFn =
    Arc<dyn Fn(&Value, &RuleParams, &RuleContext) -> Result<bool, RuleExecutionError> + Send + Sync>;

/// Per-call context handed to every rule of one validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleContext {
    /// Calendar date `"now"` and `"today"` resolve to
    pub today: NaiveDate,
}

impl RuleContext {
    /// Capture the current local date
    pub fn now() -> Self {
        Self {
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Context pinned to a fixed date
    pub fn at(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Default for RuleContext {
    fn default() -> Self {
        Self::now()
    }
}

/// Description of one rule parameter for schema authoring tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub label: String,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            options: None,
            label: label.into(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }
}

/// UI descriptor of a registered rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub label: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Field types the rule is meant for. Advisory only.
    #[serde(default)]
    pub applicable_types: Vec<String>,
}

impl RuleMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            params: Vec::new(),
            applicable_types: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn applicable_to<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicable_types = types.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone)]
struct RegisteredRule {
    function: RuleFn,
    metadata: RuleMetadata,
}

/// Catalog of rules by name
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, RegisteredRule>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in rule
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Add or replace the rule registered under `name`
    pub fn register<F>(&mut self, name: impl Into<String>, function: F, metadata: RuleMetadata) -> &mut Self
    where
        F: Fn(&Value, &RuleParams, &RuleContext) -> Result<bool, RuleExecutionError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if self.rules.contains_key(&name) {
            tracing::debug!(rule = %name, "Replacing registered validation rule");
        }
        self.rules.insert(
            name,
            RegisteredRule {
                function: Arc::new(function),
                metadata,
            },
        );
        self
    }

    /// Function registered under `name`
    pub fn lookup(&self, name: &str) -> Option<RuleFn> {
        self.rules.get(name).map(|r| Arc::clone(&r.function))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Run the rule `name` against `value`
    pub fn execute(
        &self,
        name: &str,
        value: &Value,
        params: &RuleParams,
        context: &RuleContext,
    ) -> Result<bool, RuleError> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| UnknownRuleError(name.to_string()))?;

        (rule.function)(value, params, context).map_err(|source| RuleError::Execution {
            rule: name.to_string(),
            source,
        })
    }

    /// Metadata of every registered rule, sorted by name
    pub fn list_metadata(&self) -> BTreeMap<String, RuleMetadata> {
        self.rules
            .iter()
            .map(|(name, rule)| (name.clone(), rule.metadata.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Freeze the registry for sharing across validations
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

/// Register `numeric_comparation` and `date_comparation`
pub fn register_builtins(registry: &mut RuleRegistry) {
    registry.register(numeric::NAME, numeric::numeric_comparation, numeric::metadata());
    registry.register(date::NAME, date::date_comparation, date::metadata());
}

/// Comparison operator shared by the built-in rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

impl ComparisonOperator {
    pub const NAMES: [&'static str; 6] = ["gt", "lt", "gte", "lte", "eq", "neq"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Neq => "neq",
        }
    }

    /// Operator named by a parameter value; `None` for anything unrecognized
    pub fn from_param(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }

    /// `left <op> right`
    pub fn compare<T: PartialOrd>(&self, left: &T, right: &T) -> bool {
        match self {
            ComparisonOperator::Gt => left > right,
            ComparisonOperator::Lt => left < right,
            ComparisonOperator::Gte => left >= right,
            ComparisonOperator::Lte => left <= right,
            ComparisonOperator::Eq => left == right,
            ComparisonOperator::Neq => left != right,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(ComparisonOperator::Gt),
            "lt" => Ok(ComparisonOperator::Lt),
            "gte" => Ok(ComparisonOperator::Gte),
            "lte" => Ok(ComparisonOperator::Lte),
            "eq" => Ok(ComparisonOperator::Eq),
            "neq" => Ok(ComparisonOperator::Neq),
            _ => Err(format!("Unknown comparison operator: {}", s)),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch a parameter every invocation must supply
pub(crate) fn require_param<'a>(
    params: &'a RuleParams,
    name: &str,
) -> Result<&'a Value, RuleExecutionError> {
    params
        .get(name)
        .ok_or_else(|| RuleExecutionError::MissingParam(name.to_string()))
}

/// Fail on parameters the rule does not accept
pub(crate) fn reject_unexpected(params: &RuleParams, accepted: &[&str]) -> Result<(), RuleExecutionError> {
    match params.keys().find(|k| !accepted.contains(&k.as_str())) {
        Some(unexpected) => Err(RuleExecutionError::UnexpectedParam(unexpected.clone())),
        None => Ok(()),
    }
}
