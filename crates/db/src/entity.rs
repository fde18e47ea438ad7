use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Property the service stamps on every entity.
const TIMESTAMP_PROPERTY: &str = "Timestamp";

/// One row of a table: the two-part key plus flat properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntity {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Required string property, or a `Malformed` error naming it.
    pub fn require_str(&self, name: &str) -> Result<&str, StoreError> {
        self.get_str(name)
            .ok_or_else(|| StoreError::malformed(&self.row_key, format!("missing '{}'", name)))
    }

    /// Drop properties managed by the store (`Timestamp`, `odata.*` and type
    /// annotations) so only application data remains.
    pub fn strip_system_properties(mut self) -> Self {
        self.properties.retain(|name, _| {
            name != TIMESTAMP_PROPERTY && !name.starts_with("odata.") && !name.contains("@odata.")
        });
        self
    }
}

/// An application record stored as a [`TableEntity`].
pub trait TableRecord: Sized + Send + Sync {
    /// Row key identifying the record within its partition.
    fn row_key(&self) -> &str;

    fn to_entity(&self, partition: &str) -> TableEntity;

    fn from_entity(entity: TableEntity) -> Result<Self, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_keys_in_table_wire_format() {
        let entity = TableEntity::new("books", "b1").with_property("title", "Dune");
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            value,
            json!({"PartitionKey": "books", "RowKey": "b1", "title": "Dune"})
        );
    }

    #[test]
    fn strips_store_managed_properties() {
        let entity: TableEntity = serde_json::from_value(json!({
            "odata.etag": "W/\"datetime'2024-01-01'\"",
            "PartitionKey": "books",
            "RowKey": "b1",
            "Timestamp": "2024-01-01T00:00:00Z",
            "title": "Dune",
            "created_at@odata.type": "Edm.DateTime"
        }))
        .unwrap();

        let entity = entity.strip_system_properties();
        assert_eq!(entity.properties.len(), 1);
        assert_eq!(entity.get_str("title"), Some("Dune"));
    }

    #[test]
    fn require_str_names_missing_property() {
        let entity = TableEntity::new("books", "b1");
        let err = entity.require_str("author").unwrap_err();
        assert_eq!(err.to_string(), "malformed entity 'b1': missing 'author'");
    }
}
