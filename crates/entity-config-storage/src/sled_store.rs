//! Embedded key-value backend on top of sled
//!
//! Configs live in the `entity_configs` tree under `"{tenant_id}/{entity_type}"`
//! so a prefix scan lists one tenant in entity-type order. Records live in the
//! `records` tree under their UUID bytes. Values are JSON.

use async_trait::async_trait;
use serde_json::from_slice;
use std::fmt;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use entity_config_core::store::config_key;
use entity_config_core::{
    ConfigStore, EntityConfig, Record, RecordFilter, RecordStore, StoreError, StoreResult,
};

const CONFIG_TREE: &str = "entity_configs";
const RECORD_TREE: &str = "records";

fn backend(err: sled::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Store persisted in a sled database directory
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    configs: sled::Tree,
    records: sled::Tree,
}

impl SledStore {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening sled store");
        let db = sled::Config::new().path(path).open().map_err(backend)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> StoreResult<Self> {
        let configs = db.open_tree(CONFIG_TREE).map_err(backend)?;
        let records = db.open_tree(RECORD_TREE).map_err(backend)?;
        Ok(Self { db, configs, records })
    }

    /// Write every pending change to disk
    pub async fn flush(&self) -> StoreResult<()> {
        self.db.flush_async().await.map_err(backend)?;
        Ok(())
    }
}

impl fmt::Debug for SledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore")
            .field("configs", &self.configs.len())
            .field("records", &self.records.len())
            .finish()
    }
}

#[async_trait]
impl ConfigStore for SledStore {
    async fn get_config(&self, tenant_id: Uuid, entity_type: &str) -> StoreResult<Option<EntityConfig>> {
        match self
            .configs
            .get(config_key(tenant_id, entity_type))
            .map_err(backend)?
        {
            Some(bytes) => Ok(Some(from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn create_config(&self, config: EntityConfig) -> StoreResult<EntityConfig> {
        let key = config_key(config.tenant_id, &config.entity_type);
        let bytes = serde_json::to_vec(&config)?;
        self.configs
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(backend)?
            .map_err(|_| StoreError::config_exists(config.tenant_id, &config.entity_type))?;
        Ok(config)
    }

    async fn update_config(&self, config: EntityConfig) -> StoreResult<EntityConfig> {
        let key = config_key(config.tenant_id, &config.entity_type);
        if !self.configs.contains_key(key.as_bytes()).map_err(backend)? {
            return Err(StoreError::config_not_found(config.tenant_id, &config.entity_type));
        }
        self.configs
            .insert(key.as_bytes(), serde_json::to_vec(&config)?)
            .map_err(backend)?;
        Ok(config)
    }

    async fn list_configs(&self, tenant_id: Uuid) -> StoreResult<Vec<EntityConfig>> {
        let prefix = format!("{}/", tenant_id);
        self.configs
            .scan_prefix(prefix.as_bytes())
            .values()
            .map(|bytes| -> StoreResult<EntityConfig> { Ok(from_slice(&bytes.map_err(backend)?)?) })
            .collect()
    }
}

#[async_trait]
impl RecordStore for SledStore {
    async fn insert_record(&self, record: Record) -> StoreResult<Record> {
        let bytes = serde_json::to_vec(&record)?;
        self.records
            .compare_and_swap(record.id.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(backend)?
            .map_err(|_| StoreError::record_exists(record.id))?;
        Ok(record)
    }

    async fn get_record(&self, id: Uuid) -> StoreResult<Option<Record>> {
        match self.records.get(id.as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update_record(&self, record: Record) -> StoreResult<Record> {
        if !self.records.contains_key(record.id.as_bytes()).map_err(backend)? {
            return Err(StoreError::record_not_found(record.id));
        }
        self.records
            .insert(record.id.as_bytes(), serde_json::to_vec(&record)?)
            .map_err(backend)?;
        Ok(record)
    }

    async fn list_records(&self, filter: RecordFilter) -> StoreResult<Vec<Record>> {
        let records = self
            .records
            .iter()
            .values()
            .map(|bytes| -> StoreResult<Record> { Ok(from_slice(&bytes.map_err(backend)?)?) })
            .collect::<StoreResult<Vec<Record>>>()?;
        Ok(filter.apply(records))
    }
}
