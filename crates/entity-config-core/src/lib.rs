//! Entity Config Core
//!
//! Dynamic per-tenant custom-field validation. A tenant declares the custom
//! fields of an entity type as a [`ConfigSchema`]; records are validated
//! against it before they are persisted.
//!
//! # Components
//!
//! - [`schema`]: declarative field definitions and the persisted [`EntityConfig`]
//! - [`compiler`]: turns a schema into reusable structural checks
//! - [`registry`]: named, parameterized business rules
//! - [`engine`]: the orchestrator producing an [`AggregatedValidationError`]
//! - [`store`]: persistence interfaces implemented by `entity-config-storage`
//!
//! # Example
//!
//! ```rust
//! use entity_config_core::{ConfigSchema, FieldDefinition, RuleInvocation, ValidationEngine};
//! use serde_json::json;
//!
//! let schema = ConfigSchema::default().with_field(
//!     FieldDefinition::integer("salary", "Salario").with_validation(
//!         RuleInvocation::new("numeric_comparation", "El salario no puede ser mayor a 50000")
//!             .with_param("threshold", 50000)
//!             .with_param("operator", "lte"),
//!     ),
//! );
//!
//! let engine = ValidationEngine::with_builtins();
//! let payload = json!({"salary": 60000}).as_object().cloned().unwrap();
//! let err = engine.validate(&payload, &schema).unwrap_err();
//! assert_eq!(err.issues().unwrap().len(), 1);
//! ```

pub mod compiler;
pub mod engine;
pub mod error;
pub mod registry;
pub mod report;
pub mod schema;
pub mod store;

pub use compiler::{CompiledField, CompiledSchema, FieldOutcome, ShapeCheck};
pub use engine::{SchemaCache, ValidationEngine, DEFAULT_CACHE_CAPACITY, DEFAULT_CONTAINER_KEY};
pub use error::{EngineError, Result, RuleError, RuleExecutionError, SchemaError, UnknownRuleError};
pub use registry::{
    ComparisonOperator, ParamSpec, RuleContext, RuleFn, RuleMetadata, RuleParams, RuleRegistry,
};
pub use report::{AggregatedValidationError, IssueKind, ValidationIssue, ValidationReport};
pub use schema::{
    ConfigSchema, EntityConfig, FieldDefinition, FieldOption, FieldType, OptionValue, RuleInvocation,
};
pub use store::{ConfigStore, Record, RecordFilter, RecordStore, StoreError, StoreResult};

#[cfg(any(test, feature = "mocks"))]
pub use store::{MockConfigStore, MockRecordStore};
