pub mod error;

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{StoreError, StoreErrorKind};

/// Author-declared tabular record with named string fields, backed by
/// an opaque store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentRecord {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl PersistentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }
}

/// Opaque persistence backend. `where_clause` is forwarded verbatim to
/// the backend.
#[async_trait]
pub trait PersistentStorePort: Send + Sync {
    async fn load(
        &self,
        record_name: &str,
        key_field: &str,
        key_value: &str,
        where_clause: Option<&str>,
    ) -> Result<Option<PersistentRecord>, StoreError>;

    async fn store(&self, record: &PersistentRecord) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn PersistentStorePort>;

/// Table-per-name in-memory backend for tests and the console driver.
/// `store` appends; `load` scans newest-first, so a re-stored record
/// shadows its older versions.
#[derive(Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<Vec<PersistentRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStorePort for InMemoryRecordStore {
    async fn load(
        &self,
        record_name: &str,
        key_field: &str,
        key_value: &str,
        _where_clause: Option<&str>,
    ) -> Result<Option<PersistentRecord>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| error::backend_error("record store lock poisoned"))?;
        Ok(rows
            .iter()
            .rev()
            .find(|row| row.name == record_name && row.field(key_field) == Some(key_value))
            .cloned())
    }

    async fn store(&self, record: &PersistentRecord) -> Result<(), StoreError> {
        self.rows
            .write()
            .map_err(|_| error::backend_error("record store lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
