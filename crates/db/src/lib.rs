//! Record store adapter for key-partitioned table stores.
//!
//! [`TableStore`] is the raw partition/row-key interface, implemented against
//! the Azure Table REST API ([`AzureTableStore`], which also serves the Cosmos
//! DB Table API) and in memory ([`MemoryTableStore`]). [`TableRepository`]
//! layers a typed record over one fixed partition.

mod azure;
mod connection;
mod entity;
mod error;
mod memory;
mod repository;
mod store;

pub use azure::AzureTableStore;
pub use connection::ConnectionString;
pub use entity::{TableEntity, TableRecord};
pub use error::StoreError;
pub use memory::MemoryTableStore;
pub use repository::TableRepository;
pub use store::TableStore;
