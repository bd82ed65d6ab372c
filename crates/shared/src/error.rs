use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            400 | 409 | 422 => ErrorCode::Validation,
            _ => ErrorCode::Internal,
        }
    }
}

/// Body the pharmacy API sends with every non-2xx response: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?} ({status}): {}", message.as_deref().unwrap_or("<unstructured>"))]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    /// `None` when the response body was not the structured payload.
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status,
            message,
        }
    }

    /// Reads the structured `error` field out of a raw response body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .map(|parsed| parsed.error)
            .filter(|message| !message.trim().is_empty());
        Self::new(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structured_message() {
        let err = ApiError::from_body(400, r#"{"error":"summary too short"}"#);
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.message.as_deref(), Some("summary too short"));
    }

    #[test]
    fn unstructured_body_has_no_message() {
        let err = ApiError::from_body(502, "<html>bad gateway</html>");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, None);
    }
}
