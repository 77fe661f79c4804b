use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    #[error("not authenticated, please log in again")]
    Unauthorized,
    #[error("you do not have access to this resource")]
    Forbidden,
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    /// 2xx response whose envelope carried `success: false`.
    #[error("request rejected: {message}")]
    Rejected { message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Forbidden => Some(403),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when an endpoint simply is not there (yet).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApiError::Network(_)) || matches!(self.status(), Some(404) | Some(501))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err.to_string())
    }
}

/// Best-effort human message from an error body: `message`, then `error`,
/// then `title`, then the raw text.
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        for field in ["message", "error", "title"] {
            match value.get(field) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    return Some(text.trim().to_string());
                }
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(text)) = inner.get("message") {
                        return Some(text.trim().to_string());
                    }
                }
                _ => {}
            }
        }
        if let Value::String(text) = value {
            return Some(text);
        }
    }
    Some(trimmed.chars().take(300).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_prefers_message_field() {
        let body = r#"{"title":"Bad Request","error":"x","message":"Flow name is required"}"#;
        assert_eq!(extract_message(body).as_deref(), Some("Flow name is required"));
    }

    #[test]
    fn test_extract_message_falls_through_fields() {
        assert_eq!(
            extract_message(r#"{"error":"quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            extract_message(r#"{"title":"One or more validation errors occurred."}"#).as_deref(),
            Some("One or more validation errors occurred.")
        );
        assert_eq!(
            extract_message(r#"{"error":{"message":"nested"}}"#).as_deref(),
            Some("nested")
        );
    }

    #[test]
    fn test_extract_message_raw_text_and_empty() {
        assert_eq!(extract_message("gateway timeout").as_deref(), Some("gateway timeout"));
        assert_eq!(extract_message("   "), None);
        assert_eq!(extract_message(r#""quoted""#).as_deref(), Some("quoted"));
    }

    #[test]
    fn test_unavailable_statuses() {
        assert!(ApiError::Http { status: 404, message: String::new() }.is_unavailable());
        assert!(ApiError::Http { status: 501, message: String::new() }.is_unavailable());
        assert!(ApiError::Network("refused".into()).is_unavailable());
        assert!(!ApiError::Http { status: 500, message: String::new() }.is_unavailable());
        assert!(!ApiError::Forbidden.is_unavailable());
    }
}
