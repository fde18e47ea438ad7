//! HTTP client for the book API.

use std::time::Duration;

use folio_app::modules::books::models::{
    Book, BookInput, BookListResponse, BookResponse, DeleteResponse,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no access token; pass --token or set FOLIO_TOKEN")]
    MissingToken,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid request: {message}")]
    Validation {
        message: String,
        details: Vec<Value>,
    },

    #[error("could not connect to {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            let target = err
                .url()
                .map(|url| url.origin().ascii_serialization())
                .unwrap_or_else(|| "the API".to_string());
            ClientError::Connection(target)
        } else {
            ClientError::Unexpected(err.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<Value>,
}

/// Tokens returned by `POST /auth/token`.
#[derive(Debug, Deserialize)]
pub struct LoginGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }
        Err(error_from(response).await)
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.send(self.request(Method::GET, "/health")).await
    }

    pub async fn auth_url(&self, state: Option<&str>) -> Result<String, ClientError> {
        let mut request = self.request(Method::GET, "/auth/url");
        if let Some(state) = state {
            request = request.query(&[("state", state)]);
        }
        let body: Value = self.send(request).await?;
        body.get("auth_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Unexpected("response has no auth_url".to_string()))
    }

    pub async fn login(&self, code: &str) -> Result<LoginGrant, ClientError> {
        let request = self
            .request(Method::POST, "/auth/token")
            .json(&serde_json::json!({ "code": code }));
        self.send(request).await
    }

    pub async fn me(&self) -> Result<Value, ClientError> {
        let body: Value = self.send(self.authed(Method::GET, "/auth/me")?).await?;
        Ok(body.get("user").cloned().unwrap_or(Value::Null))
    }

    pub async fn list_books(&self) -> Result<Vec<Book>, ClientError> {
        let body: BookListResponse = self.send(self.authed(Method::GET, "/books")?).await?;
        Ok(body.books)
    }

    pub async fn get_book(&self, id: &str) -> Result<Book, ClientError> {
        let path = format!("/books/{}", id);
        let body: BookResponse = self.send(self.authed(Method::GET, &path)?).await?;
        Ok(body.book)
    }

    pub async fn create_book(&self, input: &BookInput) -> Result<Book, ClientError> {
        let request = self.authed(Method::POST, "/books")?.json(input);
        let body: BookResponse = self.send(request).await?;
        Ok(body.book)
    }

    pub async fn update_book(&self, id: &str, input: &BookInput) -> Result<Book, ClientError> {
        let path = format!("/books/{}", id);
        let request = self.authed(Method::PUT, &path)?.json(input);
        let body: BookResponse = self.send(request).await?;
        Ok(body.book)
    }

    pub async fn delete_book(&self, id: &str) -> Result<String, ClientError> {
        let path = format!("/books/{}", id);
        let body: DeleteResponse = self.send(self.authed(Method::DELETE, &path)?).await?;
        Ok(body.id)
    }
}

async fn error_from(response: Response) -> ClientError {
    let status = response.status();
    let (message, details) = match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => (envelope.error.message, envelope.error.details),
        Err(_) => (
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            Vec::new(),
        ),
    };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::Validation { message, details }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        status if status.is_server_error() => ClientError::Server {
            status: status.as_u16(),
            message,
        },
        status => ClientError::Unexpected(format!("status {}: {}", status.as_u16(), message)),
    }
}
