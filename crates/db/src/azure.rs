//! Azure Table REST API adapter (Azure Storage tables and Cosmos DB Table API).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use crate::connection::ConnectionString;
use crate::entity::TableEntity;
use crate::error::StoreError;
use crate::store::TableStore;

const SERVICE_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const JSON_NO_METADATA: &str = "application/json;odata=nometadata";
const CONTINUATION_PARTITION: &str = "x-ms-continuation-NextPartitionKey";
const CONTINUATION_ROW: &str = "x-ms-continuation-NextRowKey";

#[derive(Deserialize)]
struct QueryPage {
    #[serde(default)]
    value: Vec<TableEntity>,
}

/// One table of an Azure Table account.
#[derive(Debug, Clone)]
pub struct AzureTableStore {
    client: Client,
    connection: ConnectionString,
    endpoint: Url,
    table: String,
}

impl AzureTableStore {
    pub fn new(
        connection: ConnectionString,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let endpoint = Url::parse(connection.table_endpoint()).map_err(|e| {
            StoreError::ConnectionString(format!(
                "invalid table endpoint '{}': {e}",
                connection.table_endpoint()
            ))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::ConnectionString(format!(
                "table endpoint '{}' is not a base url",
                connection.table_endpoint()
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            connection,
            endpoint,
            table: table.into(),
        })
    }

    /// Endpoint URL with one extra path segment appended (percent-encoded).
    fn url_for(&self, segment: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    fn entity_url(&self, partition: &str, row_key: &str) -> Url {
        self.url_for(&format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table,
            quote_key(partition),
            quote_key(row_key)
        ))
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, StoreError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.connection.authorization(&date, url.path())?;

        let mut headers = HeaderMap::new();
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(SERVICE_VERSION));
        headers.insert("dataserviceversion", HeaderValue::from_static(DATA_SERVICE_VERSION));
        headers.insert("maxdataserviceversion", HeaderValue::from_static(DATA_SERVICE_VERSION));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_NO_METADATA));
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        Ok(self.client.request(method, url).headers(headers))
    }

    fn with_body(builder: RequestBuilder, body: &impl serde::Serialize) -> Result<RequestBuilder, StoreError> {
        Ok(builder
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-no-content")
            .body(serde_json::to_vec(body)?))
    }
}

#[async_trait]
impl TableStore for AzureTableStore {
    fn kind(&self) -> &'static str {
        "azure_table"
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        let request = self.request(Method::POST, self.url_for("Tables"))?;
        let response = Self::with_body(request, &json!({ "TableName": self.table }))?
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(target: "folio-db", table = %self.table, "created table");
                Ok(())
            }
            StatusCode::CONFLICT => {
                tracing::debug!(target: "folio-db", table = %self.table, "table already exists");
                Ok(())
            }
            _ => Err(error_from(response).await),
        }
    }

    async fn list(&self, partition: &str) -> Result<Vec<TableEntity>, StoreError> {
        let filter = format!("PartitionKey eq '{}'", quote_key(partition));
        let mut continuation: Option<(String, String)> = None;
        let mut entities = Vec::new();

        loop {
            let mut url = self.url_for(&format!("{}()", self.table));
            let mut query = format!("$filter={}", encode_query_value(&filter));
            if let Some((next_partition, next_row)) = &continuation {
                query.push_str(&format!(
                    "&NextPartitionKey={}&NextRowKey={}",
                    encode_query_value(next_partition),
                    encode_query_value(next_row)
                ));
            }
            url.set_query(Some(&query));

            let response = self.request(Method::GET, url)?.send().await?;
            if !response.status().is_success() {
                return Err(error_from(response).await);
            }

            continuation = continuation_from(response.headers());
            let page: QueryPage = response.json().await?;
            entities.extend(page.value.into_iter().map(TableEntity::strip_system_properties));

            if continuation.is_none() {
                break;
            }
        }

        tracing::debug!(target: "folio-db", partition, count = entities.len(), "listed entities");
        Ok(entities)
    }

    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<TableEntity>, StoreError> {
        let url = self.entity_url(partition, row_key);
        let response = self.request(Method::GET, url)?.send().await?;

        match response.status() {
            status if status.is_success() => {
                let entity: TableEntity = response.json().await?;
                Ok(Some(entity.strip_system_properties()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(error_from(response).await),
        }
    }

    async fn insert(&self, entity: &TableEntity) -> Result<(), StoreError> {
        let request = self.request(Method::POST, self.url_for(&self.table))?;
        let response = Self::with_body(request, entity)?.send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::Conflict {
                partition: entity.partition_key.clone(),
                row_key: entity.row_key.clone(),
            }),
            _ => Err(error_from(response).await),
        }
    }

    async fn upsert(&self, entity: &TableEntity) -> Result<(), StoreError> {
        // PUT without If-Match is "insert or replace".
        let url = self.entity_url(&entity.partition_key, &entity.row_key);
        let request = self.request(Method::PUT, url)?;
        let response = Self::with_body(request, entity)?.send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }

    async fn replace(&self, entity: &TableEntity) -> Result<bool, StoreError> {
        // PUT with If-Match is "update"; the service answers 404 for a missing row.
        let url = self.entity_url(&entity.partition_key, &entity.row_key);
        let request = self.request(Method::PUT, url)?.header("If-Match", "*");
        let response = Self::with_body(request, entity)?.send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::PRECONDITION_FAILED => Ok(false),
            _ => Err(error_from(response).await),
        }
    }

    async fn delete(&self, partition: &str, row_key: &str) -> Result<bool, StoreError> {
        let url = self.entity_url(partition, row_key);
        let response = self
            .request(Method::DELETE, url)?
            .header("If-Match", "*")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from(response).await),
        }
    }
}

/// Escape a key for use inside a quoted OData literal.
fn quote_key(key: &str) -> String {
    key.replace('\'', "''")
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn header_value(value: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(value)
        .map_err(|_| StoreError::ConnectionString("value not valid in a header".to_string()))
}

fn continuation_from(headers: &HeaderMap) -> Option<(String, String)> {
    let partition = headers.get(CONTINUATION_PARTITION)?.to_str().ok()?;
    let row = headers
        .get(CONTINUATION_ROW)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Some((partition.to_string(), row.to_string()))
}

async fn error_from(response: Response) -> StoreError {
    let status = response.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => return StoreError::Throttled(status.as_u16()),
        StatusCode::SERVICE_UNAVAILABLE => {
            return StoreError::Unavailable(format!("http {}", status.as_u16()))
        }
        _ => {}
    }

    let code = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("odata.error")
                .and_then(|e| e.get("code"))
                .and_then(|c| c.as_str())
                .map(str::to_string)
        });

    tracing::warn!(target: "folio-db", status = status.as_u16(), code = ?code, "table store call failed");
    StoreError::Http {
        status: status.as_u16(),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "Zm9saW8tdGVzdC1hY2NvdW50LWtleQ==";

    fn store_for(server: &MockServer) -> AzureTableStore {
        let connection = ConnectionString::parse(&format!(
            "DefaultEndpointsProtocol=http;AccountName=devacct;AccountKey={KEY};TableEndpoint={}/devacct;",
            server.uri()
        ))
        .unwrap();
        AzureTableStore::new(connection, "books", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn quotes_and_encodes_keys() {
        assert_eq!(quote_key("o'brien"), "o''brien");
        assert_eq!(
            encode_query_value("PartitionKey eq 'books'"),
            "PartitionKey%20eq%20%27books%27"
        );
    }

    #[tokio::test]
    async fn get_reads_entity_and_strips_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='b1')"))
            .and(header_exists("authorization"))
            .and(header_exists("x-ms-date"))
            .and(header("x-ms-version", SERVICE_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "PartitionKey": "books",
                "RowKey": "b1",
                "Timestamp": "2024-01-01T00:00:00Z",
                "title": "Dune"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let entity = store.get("books", "b1").await.unwrap().unwrap();
        assert_eq!(entity.row_key, "b1");
        assert_eq!(entity.get_str("title"), Some("Dune"));
        assert!(entity.get_str("Timestamp").is_none());
    }

    #[tokio::test]
    async fn get_missing_entity_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.get("books", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_maps_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devacct/books"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let err = store
            .insert(&TableEntity::new("books", "b1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { row_key, .. } if row_key == "b1"));
    }

    #[tokio::test]
    async fn upsert_puts_entity_and_delete_uses_wildcard_etag() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='b1')"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='b1')"))
            .and(header("if-match", "*"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='gone')"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store
            .upsert(&TableEntity::new("books", "b1").with_property("title", "Dune"))
            .await
            .unwrap();
        assert!(store.delete("books", "b1").await.unwrap());
        assert!(!store.delete("books", "gone").await.unwrap());
    }

    #[tokio::test]
    async fn replace_requires_existing_entity() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='b1')"))
            .and(header("if-match", "*"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='gone')"))
            .and(header("if-match", "*"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "odata.error": {"code": "ResourceNotFound", "message": {"value": "gone"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store
            .replace(&TableEntity::new("books", "b1").with_property("title", "Dune"))
            .await
            .unwrap());
        assert!(!store.replace(&TableEntity::new("books", "gone")).await.unwrap());
    }

    #[tokio::test]
    async fn list_follows_continuation_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devacct/books()"))
            .and(query_param("NextRowKey", "b2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"PartitionKey": "books", "RowKey": "b2", "title": "Emma"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/devacct/books()"))
            .and(query_param("$filter", "PartitionKey eq 'books'"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(CONTINUATION_PARTITION, "books")
                    .insert_header(CONTINUATION_ROW, "b2")
                    .set_body_json(json!({
                        "value": [{"PartitionKey": "books", "RowKey": "b1", "title": "Dune"}]
                    })),
            )
            .mount(&server)
            .await;

        let store = store_for(&server);
        let entities = store.list("books").await.unwrap();
        let keys: Vec<_> = entities.iter().map(|e| e.row_key.as_str()).collect();
        assert_eq!(keys, vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn ensure_table_accepts_existing_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devacct/Tables"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.ensure_table().await.unwrap();
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='slow')"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/devacct/books(PartitionKey='books',RowKey='bad')"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "odata.error": {"code": "InvalidInput", "message": {"value": "bad key"}}
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(matches!(
            store.get("books", "slow").await,
            Err(StoreError::Throttled(429))
        ));
        assert!(matches!(
            store.get("books", "bad").await,
            Err(StoreError::Http { status: 400, code: Some(code) }) if code == "InvalidInput"
        ));
    }
}
