//! Error types for the API client.
//!
//! # Design
//! `Unauthorized` gets a dedicated variant because the client performs a
//! session-clear side effect for it and callers usually redirect to login.
//! `Validation` carries the field-level `errors` map untouched; this layer
//! never interprets field names. Shape drift in successful responses is not
//! an error at all: the normalizer degrades to an empty result.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::types::ErrorBody;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by the client and its sans-IO halves.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure or timeout; no structured body.
    #[error("{0}")]
    Transport(String),

    /// The server returned 401. The session has already been cleared when
    /// this comes out of `ApiClient`.
    #[error("{message}")]
    Unauthorized { message: String },

    /// A 4xx response carrying a field-level `errors` map.
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("{message}")]
    NotFound { message: String },

    /// Any other non-2xx response.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("tenant-scoped request without a tenant slug")]
    MissingTenant,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("session store error: {0}")]
    Session(String),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ApiError {
    /// Build the error for a non-2xx status from its (possibly absent) body.
    pub fn from_status(status: u16, body: Option<Value>) -> Self {
        let parsed = body
            .as_ref()
            .and_then(|value| serde_json::from_value::<ErrorBody>(value.clone()).ok());
        let message = parsed
            .as_ref()
            .and_then(ErrorBody::message)
            .unwrap_or_else(|| format!("Request failed with status code {status}"));

        match status {
            401 => ApiError::Unauthorized { message },
            400..=499 if parsed.as_ref().is_some_and(|b| !b.errors.is_empty()) => {
                ApiError::Validation {
                    status,
                    message,
                    errors: parsed.map(|b| b.errors).unwrap_or_default(),
                }
            }
            404 => ApiError::NotFound { message },
            _ => ApiError::Http {
                status,
                message,
                body,
            },
        }
    }

    /// HTTP status for errors that came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Validation { status, .. } | ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Field-level validation messages, empty for every other variant.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            ApiError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// The single message a screen shows for this failure.
    pub fn user_message(&self, fallback: &str) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}
