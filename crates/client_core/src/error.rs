use std::path::PathBuf;

use shared::{
    domain::OrderId,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

/// Failures from the remote pharmacy API.
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api rejected request: {0}")]
    Api(ApiError),
    #[error("session expired or credential rejected")]
    Unauthorized { message: Option<String> },
    #[error("failed to decode {context} response: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiClientError {
    /// Text for the error banner: the server's structured message when it sent
    /// one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let structured = match self {
            ApiClientError::Api(err) => err.message.as_deref(),
            ApiClientError::Unauthorized { message } => message.as_deref(),
            ApiClientError::Http(_) | ApiClientError::Decode { .. } => None,
        };
        structured.unwrap_or(fallback).to_string()
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiClientError::Unauthorized { .. })
    }

    /// Server-side classification; `None` when no response came back.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiClientError::Api(err) => Some(err.code),
            ApiClientError::Unauthorized { .. } => Some(ErrorCode::Unauthorized),
            ApiClientError::Http(_) | ApiClientError::Decode { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(ErrorCode::NotFound)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write session file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode session file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reported by store transitions that target something the store does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("order {0} is not in the loaded collection")]
    OrderNotFound(OrderId),
}

/// One failed form rule, reported against the field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} invalid field(s): {}", .errors.len(), render_fields(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn message_for(&self, field: &str) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|err| err.field == field)
            .map(|err| err.message)
    }
}

fn render_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid api url '{value}': {source}")]
    InvalidApiUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("api url '{0}' must use http or https")]
    UnsupportedScheme(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_structured_payload() {
        let err = ApiClientError::Api(ApiError::new(500, Some("database offline".into())));
        assert_eq!(err.user_message("Failed to fetch orders"), "database offline");
    }

    #[test]
    fn user_message_falls_back_when_unstructured() {
        let err = ApiClientError::Api(ApiError::new(502, None));
        assert_eq!(
            err.user_message("Failed to fetch orders"),
            "Failed to fetch orders"
        );
        let err = ApiClientError::Unauthorized { message: None };
        assert_eq!(err.user_message("Login failed"), "Login failed");
    }

    #[test]
    fn code_follows_response_status() {
        assert!(ApiClientError::Api(ApiError::new(404, None)).is_not_found());
        assert_eq!(
            ApiClientError::Api(ApiError::new(409, Some("taken".into()))).code(),
            Some(ErrorCode::Validation)
        );
        assert_eq!(
            ApiClientError::Unauthorized { message: None }.code(),
            Some(ErrorCode::Unauthorized)
        );
        let decode = serde_json::from_str::<u8>("x").expect_err("bad json");
        let err = ApiClientError::Decode {
            context: "orders",
            source: decode,
        };
        assert_eq!(err.code(), None);
    }
}
