//! Behaviour shared by every backend

use entity_config_core::{
    ConfigSchema, ConfigStore, EntityConfig, FieldDefinition, Record, RecordFilter, RecordStore, StoreError,
};
use entity_config_storage::{open, MemoryStore, SledStore, StorageKind, Stores};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use uuid::Uuid;

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn schema() -> ConfigSchema {
    ConfigSchema::default().with_field(FieldDefinition::string("codigo", "Código").required())
}

async fn exercise_configs(store: &dyn ConfigStore) {
    let tenant = Uuid::new_v4();
    let created = store
        .create_config(EntityConfig::new(tenant, "usuario", schema()).with_name("Usuarios"))
        .await
        .unwrap();

    let duplicate = EntityConfig::new(tenant, "usuario", ConfigSchema::default());
    assert!(matches!(
        store.create_config(duplicate).await,
        Err(StoreError::Conflict { .. })
    ));

    let fetched = store.get_config(tenant, "usuario").await.unwrap().unwrap();
    assert_eq!(fetched, created);

    store
        .create_config(EntityConfig::new(tenant, "empresa", ConfigSchema::default()))
        .await
        .unwrap();
    let listed: Vec<String> = store
        .list_configs(tenant)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.entity_type)
        .collect();
    assert_eq!(listed, vec!["empresa", "usuario"]);
    assert!(store.list_configs(Uuid::new_v4()).await.unwrap().is_empty());

    let missing = EntityConfig::new(tenant, "contrato", ConfigSchema::default());
    assert!(matches!(
        store.update_config(missing).await,
        Err(StoreError::NotFound { .. })
    ));
}

async fn exercise_records(store: &dyn RecordStore) {
    let tenant = Uuid::new_v4();
    let first = store
        .insert_record(Record::new(tenant, "usuario", data(json!({"codigo": "A"}))))
        .await
        .unwrap();
    store
        .insert_record(Record::new(tenant, "empresa", Map::new()))
        .await
        .unwrap();
    store
        .insert_record(Record::new(Uuid::new_v4(), "usuario", Map::new()))
        .await
        .unwrap();

    assert!(matches!(
        store.insert_record(first.clone()).await,
        Err(StoreError::Conflict { .. })
    ));

    let mut changed = store.get_record(first.id).await.unwrap().unwrap();
    changed.replace_data(data(json!({"codigo": "B"})));
    store.update_record(changed).await.unwrap();
    let fetched = store.get_record(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.custom_data["codigo"], "B");

    let usuarios = store
        .list_records(RecordFilter::default().tenant(tenant).entity_type("usuario"))
        .await
        .unwrap();
    assert_eq!(usuarios.len(), 1);

    let tenant_records = store
        .list_records(RecordFilter::default().tenant(tenant))
        .await
        .unwrap();
    assert_eq!(tenant_records.len(), 2);

    let paged = store
        .list_records(RecordFilter::default().tenant(tenant).page(1, 10))
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);

    assert!(store.get_record(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_backend() {
    let store = MemoryStore::new();
    exercise_configs(&store).await;
    exercise_records(&store).await;
}

#[tokio::test]
async fn test_sled_backend() {
    let dir = TempDir::new().unwrap();
    let store = SledStore::open(dir.path().join("db")).unwrap();
    exercise_configs(&store).await;
    exercise_records(&store).await;
}

#[tokio::test]
async fn test_sled_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let tenant = Uuid::new_v4();

    {
        let store = SledStore::open(&path).unwrap();
        store
            .create_config(EntityConfig::new(tenant, "usuario", schema()))
            .await
            .unwrap();
        store.flush().await.unwrap();
    }

    let store = SledStore::open(&path).unwrap();
    let config = store.get_config(tenant, "usuario").await.unwrap().unwrap();
    assert_eq!(config.config, schema());
}

#[tokio::test]
async fn test_open_by_kind() {
    let dir = TempDir::new().unwrap();
    for kind in [StorageKind::Memory, StorageKind::Sled] {
        let Stores { configs, records } = open(kind, dir.path().join(kind.as_str())).unwrap();
        exercise_configs(configs.as_ref()).await;
        exercise_records(records.as_ref()).await;
    }
}
