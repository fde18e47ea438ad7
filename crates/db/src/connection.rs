//! Storage connection strings and SharedKeyLite request signing.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `Key=Value;...` connection string for a table account.
#[derive(Clone)]
pub struct ConnectionString {
    account_name: String,
    account_key: Vec<u8>,
    table_endpoint: String,
}

impl ConnectionString {
    /// Parse a connection string as issued by the portal.
    ///
    /// Requires `AccountName` and a base64 `AccountKey`. The endpoint comes from
    /// `TableEndpoint`, then `EndpointSuffix`, then the Cosmos DB default
    /// `https://{account}.table.cosmos.azure.com`.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut protocol = "https".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut table_endpoint = None;
        let mut endpoint_suffix = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(StoreError::ConnectionString(format!(
                    "segment without '=' near '{}'",
                    key_hint(part)
                )));
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "defaultendpointsprotocol" => protocol = value.trim().to_string(),
                "accountname" => account_name = Some(value.trim().to_string()),
                "accountkey" => account_key = Some(value.trim().to_string()),
                "tableendpoint" => table_endpoint = Some(value.trim().to_string()),
                "endpointsuffix" => endpoint_suffix = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let account_name = account_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| StoreError::ConnectionString("missing AccountName".to_string()))?;
        let account_key = account_key
            .ok_or_else(|| StoreError::ConnectionString("missing AccountKey".to_string()))?;
        let account_key = STANDARD
            .decode(account_key.as_bytes())
            .map_err(|_| StoreError::ConnectionString("AccountKey is not base64".to_string()))?;

        let table_endpoint = match (table_endpoint, endpoint_suffix) {
            (Some(endpoint), _) => endpoint,
            (None, Some(suffix)) => format!("{}://{}.table.{}", protocol, account_name, suffix),
            (None, None) => format!("{}://{}.table.cosmos.azure.com", protocol, account_name),
        };

        Ok(Self {
            account_name,
            account_key,
            table_endpoint: table_endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn table_endpoint(&self) -> &str {
        &self.table_endpoint
    }

    /// `Authorization` header value for a request.
    ///
    /// SharedKeyLite for the table service signs the `x-ms-date` value and the
    /// canonicalized resource `/{account}{encoded path}`.
    pub fn authorization(&self, date: &str, encoded_path: &str) -> Result<String, StoreError> {
        let string_to_sign = format!("{}\n/{}{}", date, self.account_name, encoded_path);
        let mut mac = HmacSha256::new_from_slice(&self.account_key)
            .map_err(|e| StoreError::ConnectionString(format!("unusable AccountKey: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKeyLite {}:{}", self.account_name, signature))
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"**redacted**")
            .field("table_endpoint", &self.table_endpoint)
            .finish()
    }
}

// Never echo more than the start of a malformed segment; it may hold the key.
fn key_hint(part: &str) -> String {
    part.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "Zm9saW8tdGVzdC1hY2NvdW50LWtleQ==";

    #[test]
    fn parses_cosmos_connection_string() {
        let conn = ConnectionString::parse(&format!(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey={KEY};TableEndpoint=https://acct.table.cosmos.azure.com:443/;"
        ))
        .unwrap();
        assert_eq!(conn.account_name(), "acct");
        assert_eq!(conn.table_endpoint(), "https://acct.table.cosmos.azure.com:443");
    }

    #[test]
    fn derives_endpoint_from_suffix_or_default() {
        let storage = ConnectionString::parse(&format!(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey={KEY};EndpointSuffix=core.windows.net"
        ))
        .unwrap();
        assert_eq!(storage.table_endpoint(), "https://acct.table.core.windows.net");

        let cosmos = ConnectionString::parse(&format!("AccountName=acct;AccountKey={KEY}")).unwrap();
        assert_eq!(cosmos.table_endpoint(), "https://acct.table.cosmos.azure.com");
    }

    #[test]
    fn rejects_incomplete_strings() {
        assert!(matches!(
            ConnectionString::parse(&format!("AccountKey={KEY}")),
            Err(StoreError::ConnectionString(msg)) if msg == "missing AccountName"
        ));
        assert!(matches!(
            ConnectionString::parse("AccountName=acct"),
            Err(StoreError::ConnectionString(msg)) if msg == "missing AccountKey"
        ));
        assert!(matches!(
            ConnectionString::parse("AccountName=acct;AccountKey=not base64!"),
            Err(StoreError::ConnectionString(_))
        ));
        assert!(ConnectionString::parse("AccountName=acct;garbage").is_err());
    }

    #[test]
    fn debug_output_hides_key() {
        let conn = ConnectionString::parse(&format!("AccountName=acct;AccountKey={KEY}")).unwrap();
        let printed = format!("{:?}", conn);
        assert!(!printed.contains(KEY));
        assert!(printed.contains("acct"));
    }

    #[test]
    fn signs_shared_key_lite() {
        let conn = ConnectionString::parse(&format!("AccountName=acct;AccountKey={KEY}")).unwrap();
        let header = conn
            .authorization(
                "Mon, 01 Jan 2024 00:00:00 GMT",
                "/books(PartitionKey='books',RowKey='b1')",
            )
            .unwrap();
        assert_eq!(
            header,
            "SharedKeyLite acct:rcdUjLDfoOATZlxc7+yH/RnZNAsW9b9uCQAtcvikUi4="
        );
    }
}
