//! Entity configuration management

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use entity_config_core::{ConfigSchema, ConfigStore, EntityConfig, StoreError, ValidationEngine};

use super::check_entity_type;
use crate::error::ServiceResult;
use crate::telemetry::ValidationMetricsRegistry;

/// Creates, reads and replaces the schema of each `(tenant_id, entity_type)`
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    engine: ValidationEngine,
    metrics: Option<Arc<ValidationMetricsRegistry>>,
}

impl ConfigService {
    pub fn new(store: Arc<dyn ConfigStore>, engine: ValidationEngine) -> Self {
        Self {
            store,
            engine,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ValidationMetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Store a new schema; fails if the pair already has one
    pub async fn create(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        name: Option<String>,
        config: ConfigSchema,
    ) -> ServiceResult<EntityConfig> {
        check_entity_type(entity_type)?;
        // Compiling checks the schema invariants and warms the cache
        self.engine.compile(&config)?;

        let mut entity_config = EntityConfig::new(tenant_id, entity_type, config);
        if let Some(name) = name {
            entity_config = entity_config.with_name(name);
        }

        let created = self.store.create_config(entity_config).await?;
        info!(
            tenant_id = %tenant_id,
            entity_type = %entity_type,
            fields = created.config.fields.len(),
            "Entity config created"
        );
        self.record_write("create");
        Ok(created)
    }

    pub async fn get(&self, tenant_id: Uuid, entity_type: &str) -> ServiceResult<Option<EntityConfig>> {
        Ok(self.store.get_config(tenant_id, entity_type).await?)
    }

    /// Replace the whole field list, and the name when one is given
    pub async fn update(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        name: Option<String>,
        config: ConfigSchema,
    ) -> ServiceResult<EntityConfig> {
        self.engine.compile(&config)?;

        let mut existing = self
            .store
            .get_config(tenant_id, entity_type)
            .await?
            .ok_or_else(|| StoreError::config_not_found(tenant_id, entity_type))?;
        existing.replace_config(config);
        if name.is_some() {
            existing.name = name;
        }

        let updated = self.store.update_config(existing).await?;
        info!(
            tenant_id = %tenant_id,
            entity_type = %entity_type,
            fields = updated.config.fields.len(),
            "Entity config replaced"
        );
        self.record_write("update");
        Ok(updated)
    }

    /// Every config of a tenant, ordered by entity type
    pub async fn list(&self, tenant_id: Uuid) -> ServiceResult<Vec<EntityConfig>> {
        Ok(self.store.list_configs(tenant_id).await?)
    }

    fn record_write(&self, operation: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.validation().record_config_write(operation);
        }
    }
}
