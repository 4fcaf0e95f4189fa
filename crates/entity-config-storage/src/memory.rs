//! In-memory backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use entity_config_core::store::config_key;
use entity_config_core::{
    ConfigStore, EntityConfig, Record, RecordFilter, RecordStore, StoreError, StoreResult,
};

/// Thread-safe, cloneable store holding everything in process memory.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    configs: Arc<RwLock<HashMap<String, EntityConfig>>>,
    records: Arc<RwLock<HashMap<Uuid, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(&self, tenant_id: Uuid, entity_type: &str) -> StoreResult<Option<EntityConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.get(&config_key(tenant_id, entity_type)).cloned())
    }

    async fn create_config(&self, config: EntityConfig) -> StoreResult<EntityConfig> {
        let key = config_key(config.tenant_id, &config.entity_type);
        let mut configs = self.configs.write().await;
        if configs.contains_key(&key) {
            return Err(StoreError::config_exists(config.tenant_id, &config.entity_type));
        }
        configs.insert(key, config.clone());
        Ok(config)
    }

    async fn update_config(&self, config: EntityConfig) -> StoreResult<EntityConfig> {
        let key = config_key(config.tenant_id, &config.entity_type);
        let mut configs = self.configs.write().await;
        match configs.get_mut(&key) {
            Some(existing) => {
                *existing = config.clone();
                Ok(config)
            }
            None => Err(StoreError::config_not_found(config.tenant_id, &config.entity_type)),
        }
    }

    async fn list_configs(&self, tenant_id: Uuid) -> StoreResult<Vec<EntityConfig>> {
        let configs = self.configs.read().await;
        let mut result: Vec<EntityConfig> = configs
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.entity_type.cmp(&b.entity_type));
        Ok(result)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_record(&self, record: Record) -> StoreResult<Record> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::record_exists(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_record(&self, id: Uuid) -> StoreResult<Option<Record>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update_record(&self, record: Record) -> StoreResult<Record> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record)
            }
            None => Err(StoreError::record_not_found(record.id)),
        }
    }

    async fn list_records(&self, filter: RecordFilter) -> StoreResult<Vec<Record>> {
        let records = self.records.read().await;
        Ok(filter.apply(records.values().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_config_core::{ConfigSchema, FieldDefinition};
    use serde_json::Map;

    #[tokio::test]
    async fn test_config_lifecycle() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let config = EntityConfig::new(tenant, "usuario", ConfigSchema::default());

        store.create_config(config.clone()).await.unwrap();
        let err = store.create_config(config.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let mut updated = store.get_config(tenant, "usuario").await.unwrap().unwrap();
        updated.replace_config(ConfigSchema::default().with_field(FieldDefinition::string("code", "Code")));
        store.update_config(updated).await.unwrap();

        let fetched = store.get_config(tenant, "usuario").await.unwrap().unwrap();
        assert_eq!(fetched.config.fields.len(), 1);
        assert_eq!(fetched.id, config.id);

        assert!(store.get_config(Uuid::new_v4(), "usuario").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_config() {
        let store = MemoryStore::new();
        let config = EntityConfig::new(Uuid::new_v4(), "empresa", ConfigSchema::default());
        let err = store.update_config(config).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_configs_sorted_per_tenant() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        for entity_type in ["usuario", "empresa", "contrato"] {
            store
                .create_config(EntityConfig::new(tenant, entity_type, ConfigSchema::default()))
                .await
                .unwrap();
        }
        store
            .create_config(EntityConfig::new(Uuid::new_v4(), "usuario", ConfigSchema::default()))
            .await
            .unwrap();

        let types: Vec<String> = store
            .list_configs(tenant)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.entity_type)
            .collect();
        assert_eq!(types, vec!["contrato", "empresa", "usuario"]);
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let record = store
            .insert_record(Record::new(tenant, "usuario", Map::new()))
            .await
            .unwrap();

        let mut fetched = store.get_record(record.id).await.unwrap().unwrap();
        fetched.replace_data(serde_json::json!({"a": 1}).as_object().cloned().unwrap());
        store.update_record(fetched).await.unwrap();

        let listed = store
            .list_records(RecordFilter::default().tenant(tenant))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].custom_data["a"], 1);

        let missing = Record::new(tenant, "usuario", Map::new());
        assert!(matches!(
            store.update_record(missing).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
