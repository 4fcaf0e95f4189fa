//! Storage backends for entity configs and records
//!
//! Both backends implement the [`ConfigStore`] and [`RecordStore`] traits of
//! `entity-config-core`. [`open`] picks one at runtime.

pub mod memory;
pub mod sled_store;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use entity_config_core::{ConfigStore, RecordStore, StoreResult};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Available backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sled,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Sled => "sled",
        }
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "sled" => Ok(StorageKind::Sled),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handles on one backend
#[derive(Clone)]
pub struct Stores {
    pub configs: Arc<dyn ConfigStore>,
    pub records: Arc<dyn RecordStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            configs: store.clone(),
            records: store,
        }
    }

    pub fn sled(path: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Arc::new(SledStore::open(path)?);
        Ok(Self {
            configs: store.clone(),
            records: store,
        })
    }
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Open the backend of the given kind; `data_dir` is only used by sled
pub fn open(kind: StorageKind, data_dir: impl AsRef<Path>) -> StoreResult<Stores> {
    match kind {
        StorageKind::Memory => Ok(Stores::memory()),
        StorageKind::Sled => Stores::sled(data_dir),
    }
}
