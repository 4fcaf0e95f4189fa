//! Validation orchestrator
//!
//! [`ValidationEngine`] applies a compiled schema and then the business rules
//! of every structurally valid field, collecting every issue before deciding.
//! The engine holds no per-call state: the registry is frozen behind an `Arc`
//! and compiled schemas are shared through [`SchemaCache`].

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::compiler::{CompiledSchema, FieldOutcome};
use crate::error::{Result, RuleError, SchemaError};
use crate::registry::{RuleContext, RuleRegistry};
use crate::report::{AggregatedValidationError, IssueKind, ValidationIssue, ValidationReport};
use crate::schema::ConfigSchema;

/// Key the custom fields live under in a record, used in issue paths
pub const DEFAULT_CONTAINER_KEY: &str = "custom_data";

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Compiled schemas keyed by schema fingerprint
#[derive(Debug)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<CompiledSchema>>>,
    capacity: usize,
}

impl SchemaCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Compiled form of `schema`, compiling it on first use.
    ///
    /// Once `capacity` distinct schemas are held the cache starts over empty.
    pub fn get_or_compile(&self, schema: &ConfigSchema) -> std::result::Result<Arc<CompiledSchema>, SchemaError> {
        let key = crate::compiler::fingerprint(schema);

        if let Some(compiled) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(compiled));
        }

        let compiled = Arc::new(CompiledSchema::compile(schema)?);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            debug!(capacity = self.capacity, "Schema cache full, clearing");
            entries.clear();
        }
        Ok(Arc::clone(entries.entry(key).or_insert(compiled)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Applies schemas and business rules to custom-field payloads
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    registry: Arc<RuleRegistry>,
    cache: Arc<SchemaCache>,
    container_key: String,
}

impl ValidationEngine {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry,
            cache: Arc::new(SchemaCache::default()),
            container_key: DEFAULT_CONTAINER_KEY.to_string(),
        }
    }

    /// Engine backed by the built-in rules
    pub fn with_builtins() -> Self {
        Self::new(RuleRegistry::with_builtins().into_shared())
    }

    pub fn with_container_key(mut self, key: impl Into<String>) -> Self {
        self.container_key = key.into();
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Arc::new(SchemaCache::new(capacity));
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn container_key(&self) -> &str {
        &self.container_key
    }

    /// Compile `schema`, reusing a cached compilation when there is one
    pub fn compile(&self, schema: &ConfigSchema) -> std::result::Result<Arc<CompiledSchema>, SchemaError> {
        self.cache.get_or_compile(schema)
    }

    /// Validate `payload` against `schema`, returning the payload unchanged on success
    pub fn validate(&self, payload: &Map<String, Value>, schema: &ConfigSchema) -> Result<Map<String, Value>> {
        let compiled = self.compile(schema)?;
        Ok(self.validate_compiled(payload, &compiled)?)
    }

    /// Like [`validate`](Self::validate); no schema means no constraints
    pub fn validate_optional(
        &self,
        payload: &Map<String, Value>,
        schema: Option<&ConfigSchema>,
    ) -> Result<Map<String, Value>> {
        match schema {
            Some(schema) => self.validate(payload, schema),
            None => Ok(payload.clone()),
        }
    }

    /// Validate against an already compiled schema, resolving "today" now
    pub fn validate_compiled(
        &self,
        payload: &Map<String, Value>,
        compiled: &CompiledSchema,
    ) -> std::result::Result<Map<String, Value>, AggregatedValidationError> {
        self.validate_at(payload, compiled, &RuleContext::now())
    }

    /// Validate with an explicit rule context
    pub fn validate_at(
        &self,
        payload: &Map<String, Value>,
        compiled: &CompiledSchema,
        context: &RuleContext,
    ) -> std::result::Result<Map<String, Value>, AggregatedValidationError> {
        let (issues, _) = self.collect_issues(payload, compiled, context);
        if issues.is_empty() {
            Ok(payload.clone())
        } else {
            Err(AggregatedValidationError::new(issues))
        }
    }

    /// Full report without failing on payload problems
    pub fn dry_run(
        &self,
        payload: &Map<String, Value>,
        schema: &ConfigSchema,
    ) -> std::result::Result<ValidationReport, SchemaError> {
        let compiled = self.compile(schema)?;
        let (issues, rules_applied) = self.collect_issues(payload, &compiled, &RuleContext::now());
        Ok(ValidationReport {
            valid: issues.is_empty(),
            issues,
            fields_checked: compiled.fields().len(),
            rules_applied,
        })
    }

    /// Every issue of `payload` in field declaration order, plus the number of rules run
    fn collect_issues(
        &self,
        payload: &Map<String, Value>,
        compiled: &CompiledSchema,
        context: &RuleContext,
    ) -> (Vec<ValidationIssue>, usize) {
        let container = self.container_key.as_str();
        let mut issues = Vec::new();
        let mut rules_applied = 0;

        for field in compiled.fields() {
            let value = match field.check(payload) {
                FieldOutcome::Valid(value) => value,
                FieldOutcome::Skipped => continue,
                FieldOutcome::Invalid(kind, message) => {
                    issues.push(ValidationIssue::new(container, &field.name, kind, message));
                    continue;
                }
            };

            for rule in &field.rules {
                rules_applied += 1;
                match self.registry.execute(&rule.action, value, &rule.params, context) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(field = %field.name, rule = %rule.action, "Business rule rejected value");
                        issues.push(
                            ValidationIssue::new(
                                container,
                                &field.name,
                                IssueKind::BusinessRuleError,
                                rule.error_message.clone(),
                            )
                            .with_rule(&rule.action),
                        );
                    }
                    Err(err) => {
                        let issue = match &err {
                            RuleError::Unknown(_) => {
                                warn!(field = %field.name, rule = %rule.action, "Schema references an unregistered rule");
                                ValidationIssue::new(container, &field.name, IssueKind::UnknownRuleError, err.to_string())
                            }
                            RuleError::Execution { source, .. } => {
                                debug!(field = %field.name, rule = %rule.action, error = %source, "Business rule could not run");
                                ValidationIssue::new(container, &field.name, IssueKind::BusinessRuleError, err.to_string())
                                    .with_cause(source.to_string())
                            }
                        };
                        issues.push(issue.with_rule(&rule.action));
                    }
                }
            }
        }

        (issues, rules_applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, RuleExecutionError};
    use crate::registry::{RuleMetadata, RuleParams};
    use crate::schema::{FieldDefinition, RuleInvocation};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn engine_with(register: impl FnOnce(&mut RuleRegistry)) -> ValidationEngine {
        let mut registry = RuleRegistry::with_builtins();
        register(&mut registry);
        ValidationEngine::new(registry.into_shared())
    }

    fn max(limit: i64, message: &str) -> RuleInvocation {
        RuleInvocation::new("numeric_comparation", message)
            .with_param("threshold", limit)
            .with_param("operator", "lte")
    }

    #[test]
    fn test_valid_payload_is_returned_unchanged() {
        let engine = ValidationEngine::with_builtins();
        let schema = ConfigSchema::new(vec![
            FieldDefinition::integer("salary", "Salary").required().with_validation(max(50000, "too high")),
        ]);
        let input = payload(json!({"salary": 40000, "extra": {"kept": true}}));
        assert_eq!(engine.validate(&input, &schema).unwrap(), input);
    }

    #[test]
    fn test_rules_skipped_for_invalid_and_absent_fields() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = engine_with(|registry| {
            registry.register(
                "counted",
                move |_: &Value, _: &RuleParams, _: &RuleContext| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                },
                RuleMetadata::new("Counted"),
            );
        });
        let schema = ConfigSchema::new(vec![
            FieldDefinition::integer("a", "A").required().with_validation(RuleInvocation::new("counted", "x")),
            FieldDefinition::integer("b", "B").with_validation(RuleInvocation::new("counted", "x")),
            FieldDefinition::integer("c", "C").with_validation(RuleInvocation::new("counted", "x")),
            FieldDefinition::integer("d", "D").with_validation(RuleInvocation::new("counted", "x")),
        ]);

        let err = engine
            .validate(&payload(json!({"b": "nope", "c": null, "d": 4})), &schema)
            .unwrap_err();
        let issues = err.issues().unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues.issues[0].kind, IssueKind::RequiredError);
        assert_eq!(issues.issues[1].kind, IssueKind::TypeError);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_issue_ordering_follows_declaration() {
        let engine = ValidationEngine::with_builtins();
        let schema = ConfigSchema::new(vec![
            FieldDefinition::integer("first", "First")
                .with_validation(max(10, "first too high"))
                .with_validation(max(5, "first way too high")),
            FieldDefinition::string("second", "Second").required(),
            FieldDefinition::integer("third", "Third").with_validation(max(1, "third too high")),
        ]);

        let err = engine
            .validate(&payload(json!({"third": 2, "first": 20})), &schema)
            .unwrap_err();
        let messages: Vec<&str> = err.issues().unwrap().iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["first too high", "first way too high", "Field required", "third too high"]
        );
    }

    #[test]
    fn test_unknown_rule_is_reported() {
        let engine = ValidationEngine::with_builtins();
        let schema = ConfigSchema::new(vec![
            FieldDefinition::string("code", "Code").with_validation(RuleInvocation::new("max_length", "too long")),
        ]);

        let err = engine.validate(&payload(json!({"code": "abc"})), &schema).unwrap_err();
        let issue = &err.issues().unwrap().issues[0];
        assert_eq!(issue.kind, IssueKind::UnknownRuleError);
        assert_eq!(issue.rule.as_deref(), Some("max_length"));
        assert!(issue.message.contains("max_length"));
    }

    #[test]
    fn test_rule_execution_failure_is_reported_with_cause() {
        let engine = engine_with(|registry| {
            registry.register(
                "broken",
                |_: &Value, _: &RuleParams, _: &RuleContext| Err(RuleExecutionError::failed("lookup table missing")),
                RuleMetadata::new("Broken"),
            );
        });
        let schema = ConfigSchema::new(vec![
            FieldDefinition::string("code", "Code").with_validation(RuleInvocation::new("broken", "unused")),
            FieldDefinition::integer("n", "N").with_validation(RuleInvocation::new("numeric_comparation", "unused")),
        ]);

        let err = engine.validate(&payload(json!({"code": "a", "n": 1})), &schema).unwrap_err();
        let issues = &err.issues().unwrap().issues;
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::BusinessRuleError);
        assert_eq!(issues[0].message, "Rule 'broken' failed: lookup table missing");
        assert_eq!(issues[0].cause.as_deref(), Some("lookup table missing"));
        assert_eq!(issues[1].cause.as_deref(), Some("missing required parameter 'threshold'"));
    }

    #[test]
    fn test_context_is_shared_across_rules() {
        let engine = ValidationEngine::with_builtins();
        let future = RuleInvocation::new("date_comparation", "must be future")
            .with_param("reference_date", "today")
            .with_param("operator", "gt");
        let schema = ConfigSchema::new(vec![
            FieldDefinition::string("start", "Start").with_validation(future.clone()),
            FieldDefinition::string("end", "End").with_validation(future),
        ]);
        let compiled = engine.compile(&schema).unwrap();
        let input = payload(json!({"start": "2024-03-02", "end": "2024-03-01"}));

        let ctx = RuleContext::at(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let err = engine.validate_at(&input, &compiled, &ctx).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.issues[0].field(), "end");

        let earlier = RuleContext::at(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!(engine.validate_at(&input, &compiled, &earlier).is_ok());
    }

    #[test]
    fn test_schema_error_is_not_a_validation_error() {
        let engine = ValidationEngine::with_builtins();
        let schema = ConfigSchema::new(vec![FieldDefinition::string("", "Nameless")]);
        let err = engine.validate(&Map::new(), &schema).unwrap_err();
        assert!(matches!(err, EngineError::Schema(SchemaError::EmptyFieldName)));
    }

    #[test]
    fn test_absent_schema_is_trivially_valid() {
        let engine = ValidationEngine::with_builtins();
        let input = payload(json!({"anything": 1}));
        assert_eq!(engine.validate_optional(&input, None).unwrap(), input);
    }

    #[test]
    fn test_custom_container_key() {
        let engine = ValidationEngine::with_builtins().with_container_key("attributes");
        let schema = ConfigSchema::new(vec![FieldDefinition::string("code", "Code").required()]);
        let err = engine.validate(&Map::new(), &schema).unwrap_err();
        assert_eq!(err.issues().unwrap().issues[0].path(), "attributes.code");
    }

    #[test]
    fn test_dry_run_report() {
        let engine = ValidationEngine::with_builtins();
        let schema = ConfigSchema::new(vec![
            FieldDefinition::integer("salary", "Salary").with_validation(max(50000, "too high")),
            FieldDefinition::boolean("active", "Active"),
        ]);

        let report = engine.dry_run(&payload(json!({"salary": 60000})), &schema).unwrap();
        assert!(!report.valid);
        assert_eq!(report.fields_checked, 2);
        assert_eq!(report.rules_applied, 1);
        assert_eq!(report.issues[0].message, "too high");

        let report = engine.dry_run(&payload(json!({"salary": 1})), &schema).unwrap();
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_cache_reuses_compilations() {
        let cache = SchemaCache::new(2);
        let a = ConfigSchema::new(vec![FieldDefinition::string("a", "A")]);
        let b = ConfigSchema::new(vec![FieldDefinition::string("b", "B")]);
        let c = ConfigSchema::new(vec![FieldDefinition::string("c", "C")]);

        let first = cache.get_or_compile(&a).unwrap();
        let again = cache.get_or_compile(&a.clone()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 1);

        cache.get_or_compile(&b).unwrap();
        assert_eq!(cache.len(), 2);
        cache.get_or_compile(&c).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_does_not_store_invalid_schemas() {
        let cache = SchemaCache::default();
        let bad = ConfigSchema::new(vec![FieldDefinition::string("a", "A").with_regex("[")]);
        assert!(cache.get_or_compile(&bad).is_err());
        assert!(cache.is_empty());
    }
}
