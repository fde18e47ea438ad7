use async_trait::async_trait;

use crate::entity::TableEntity;
use crate::error::StoreError;

/// Partition/row-key CRUD against one table.
///
/// Every method is a single point operation; nothing here retries.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Short label for logs.
    fn kind(&self) -> &'static str;

    /// Create the table if it does not exist yet.
    async fn ensure_table(&self) -> Result<(), StoreError>;

    /// All entities of a partition.
    async fn list(&self, partition: &str) -> Result<Vec<TableEntity>, StoreError>;

    /// Point read; `None` when the key is absent.
    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<TableEntity>, StoreError>;

    /// Insert a new entity; `Conflict` when the key exists.
    async fn insert(&self, entity: &TableEntity) -> Result<(), StoreError>;

    /// Insert or replace.
    async fn upsert(&self, entity: &TableEntity) -> Result<(), StoreError>;

    /// Replace an entity that must already exist; `false` when the key was absent.
    async fn replace(&self, entity: &TableEntity) -> Result<bool, StoreError>;

    /// Delete by key; `false` when the key was absent.
    async fn delete(&self, partition: &str, row_key: &str) -> Result<bool, StoreError>;
}
