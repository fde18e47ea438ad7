//! Error envelope shared by every route.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use folio_authz::AuthError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Message returned for every 5xx; the cause only goes to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred";

/// Body of the `error` member of a failure response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub details: Vec<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

/// Request failures, rendered as the `{success: false, error}` envelope.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        message: String,
    },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("conflict: {message}")]
    Conflict {
        details: Vec<serde_json::Value>,
        message: String,
    },

    #[error("request timed out")]
    Timeout,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Conflict {
            details,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::BadRequest { .. } => "bad_request",
            AppError::Unauthorized { .. } => "unauthorized",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Timeout => "request_timeout",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_provider_failure() {
            AppError::Internal(anyhow::Error::new(err).context("token verification unavailable"))
        } else {
            AppError::unauthorized(err.public_message())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let trace_id = Uuid::new_v4();
        let status = self.status();
        let code = self.code();

        let (message, details) = match self {
            AppError::Validation { details, message } | AppError::Conflict { details, message } => {
                (message, details)
            }
            AppError::BadRequest { message }
            | AppError::Unauthorized { message }
            | AppError::NotFound { message } => (message, Vec::new()),
            AppError::Timeout => ("Request timed out".to_string(), Vec::new()),
            AppError::Internal(e) => {
                tracing::error!(
                    trace_id = %trace_id,
                    error = format!("{e:#}"),
                    "unhandled error while serving request"
                );
                (INTERNAL_ERROR_MESSAGE.to_string(), Vec::new())
            }
        };

        if status != StatusCode::INTERNAL_SERVER_ERROR {
            tracing::info!(
                trace_id = %trace_id,
                error_code = code,
                status_code = status.as_u16(),
                "request rejected"
            );
        }

        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
                trace_id: trace_id.to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };

        let mut response = (status, Json(envelope)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
