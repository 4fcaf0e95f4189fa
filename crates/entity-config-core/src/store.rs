//! Persistence interfaces
//!
//! The engine never performs I/O itself. Callers resolve the schema of a
//! `(tenant_id, entity_type)` pair through a [`ConfigStore`], validate, and
//! only then hand the record to a [`RecordStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::{ConfigSchema, EntityConfig};

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn config_not_found(tenant_id: Uuid, entity_type: &str) -> Self {
        StoreError::NotFound {
            entity: "Entity config",
            key: config_key(tenant_id, entity_type),
        }
    }

    pub fn config_exists(tenant_id: Uuid, entity_type: &str) -> Self {
        StoreError::Conflict {
            entity: "Entity config",
            key: config_key(tenant_id, entity_type),
        }
    }

    pub fn record_not_found(id: Uuid) -> Self {
        StoreError::NotFound {
            entity: "Record",
            key: id.to_string(),
        }
    }

    pub fn record_exists(id: Uuid) -> Self {
        StoreError::Conflict {
            entity: "Record",
            key: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage key of an entity config
pub fn config_key(tenant_id: Uuid, entity_type: &str) -> String {
    format!("{}/{}", tenant_id, entity_type)
}

/// A record of some entity type carrying validated custom fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_type: String,
    #[serde(default)]
    pub custom_data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(tenant_id: Uuid, entity_type: impl Into<String>, custom_data: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            entity_type: entity_type.into(),
            custom_data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn replace_data(&mut self, custom_data: Map<String, Value>) {
        self.custom_data = custom_data;
        self.updated_at = Utc::now();
    }
}

/// Filter and page for record listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            tenant_id: None,
            entity_type: None,
            skip: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl RecordFilter {
    pub fn tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.tenant_id.map_or(true, |t| t == record.tenant_id)
            && self.entity_type.as_deref().map_or(true, |e| e == record.entity_type)
    }

    /// Filter, order by creation time and page `records`
    pub fn apply(&self, records: impl IntoIterator<Item = Record>) -> Vec<Record> {
        let mut matching: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        matching.into_iter().skip(self.skip).take(self.limit).collect()
    }
}

/// Source of entity configurations, keyed by `(tenant_id, entity_type)`
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, tenant_id: Uuid, entity_type: &str) -> StoreResult<Option<EntityConfig>>;

    /// Fails with [`StoreError::Conflict`] when the pair already has a config
    async fn create_config(&self, config: EntityConfig) -> StoreResult<EntityConfig>;

    /// Fails with [`StoreError::NotFound`] when the pair has no config
    async fn update_config(&self, config: EntityConfig) -> StoreResult<EntityConfig>;

    /// Configs of one tenant ordered by entity type
    async fn list_configs(&self, tenant_id: Uuid) -> StoreResult<Vec<EntityConfig>>;
}

/// Storage of validated records
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_record(&self, record: Record) -> StoreResult<Record>;

    async fn get_record(&self, id: Uuid) -> StoreResult<Option<Record>>;

    async fn update_record(&self, record: Record) -> StoreResult<Record>;

    async fn list_records(&self, filter: RecordFilter) -> StoreResult<Vec<Record>>;
}

/// Schema of `(tenant_id, entity_type)`, if one is configured
pub async fn resolve_schema<S>(store: &S, tenant_id: Uuid, entity_type: &str) -> StoreResult<Option<ConfigSchema>>
where
    S: ConfigStore + ?Sized,
{
    Ok(store
        .get_config(tenant_id, entity_type)
        .await?
        .map(|config| config.config))
}
