use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::TableRecord;
use crate::error::StoreError;
use crate::store::TableStore;

/// Typed access to one partition of a table.
///
/// The partition key is fixed for the repository; record ids are row keys.
pub struct TableRepository<T> {
    store: Arc<dyn TableStore>,
    partition: String,
    _record: PhantomData<fn() -> T>,
}

impl<T: TableRecord> TableRepository<T> {
    pub fn new(store: Arc<dyn TableStore>, partition: impl Into<String>) -> Self {
        Self {
            store,
            partition: partition.into(),
            _record: PhantomData,
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub async fn list(&self) -> Result<Vec<T>, StoreError> {
        self.store
            .list(&self.partition)
            .await?
            .into_iter()
            .map(T::from_entity)
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .get(&self.partition, id)
            .await?
            .map(T::from_entity)
            .transpose()
    }

    /// Insert a record whose id must not exist yet.
    pub async fn insert(&self, record: &T) -> Result<(), StoreError> {
        self.store.insert(&record.to_entity(&self.partition)).await
    }

    /// Insert or replace.
    pub async fn put(&self, record: &T) -> Result<(), StoreError> {
        self.store.upsert(&record.to_entity(&self.partition)).await
    }

    /// Overwrite an existing record; `false` when no record had this id.
    pub async fn replace(&self, record: &T) -> Result<bool, StoreError> {
        self.store.replace(&record.to_entity(&self.partition)).await
    }

    /// Returns `false` when no record had this id.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(&self.partition, id).await
    }
}

impl<T> Clone for TableRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            partition: self.partition.clone(),
            _record: PhantomData,
        }
    }
}
