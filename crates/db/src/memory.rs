use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entity::TableEntity;
use crate::error::StoreError;
use crate::store::TableStore;

type Key = (String, String);

/// In-process table store.
///
/// Counts data operations (everything except `ensure_table`) so callers can
/// assert whether a request reached the store, and can be switched to
/// unavailable to exercise dependency failures.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    rows: RwLock<BTreeMap<Key, TableEntity>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of data operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn key(partition: &str, row_key: &str) -> Key {
        (partition.to_string(), row_key.to_string())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list(&self, partition: &str) -> Result<Vec<TableEntity>, StoreError> {
        self.begin()?;
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|((p, _), _)| p == partition)
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<TableEntity>, StoreError> {
        self.begin()?;
        let rows = self.rows.read().await;
        Ok(rows.get(&Self::key(partition, row_key)).cloned())
    }

    async fn insert(&self, entity: &TableEntity) -> Result<(), StoreError> {
        self.begin()?;
        let mut rows = self.rows.write().await;
        let key = Self::key(&entity.partition_key, &entity.row_key);
        if rows.contains_key(&key) {
            return Err(StoreError::Conflict {
                partition: entity.partition_key.clone(),
                row_key: entity.row_key.clone(),
            });
        }
        rows.insert(key, entity.clone());
        Ok(())
    }

    async fn upsert(&self, entity: &TableEntity) -> Result<(), StoreError> {
        self.begin()?;
        let mut rows = self.rows.write().await;
        rows.insert(
            Self::key(&entity.partition_key, &entity.row_key),
            entity.clone(),
        );
        Ok(())
    }

    async fn replace(&self, entity: &TableEntity) -> Result<bool, StoreError> {
        self.begin()?;
        let mut rows = self.rows.write().await;
        match rows.get_mut(&Self::key(&entity.partition_key, &entity.row_key)) {
            Some(row) => {
                *row = entity.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, partition: &str, row_key: &str) -> Result<bool, StoreError> {
        self.begin()?;
        let mut rows = self.rows.write().await;
        Ok(rows.remove(&Self::key(partition, row_key)).is_some())
    }
}
