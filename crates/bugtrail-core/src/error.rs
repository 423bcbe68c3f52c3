//! Structured errors for machine parsing

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidConfiguration,
    AlreadyRunning,
    AlreadyStopped,
    MalformedSanitizePattern,
    UnrecognizedErrorShape,
    Storage,
    Unknown,
}

impl ErrorCode {
    /// Fatal codes abort the operation; the others are only ever logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidConfiguration | ErrorCode::Storage | ErrorCode::Unknown
        )
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn invalid_capacity(capacity: usize) -> Self {
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("History capacity must be at least 1, got {}", capacity),
        )
        .with_suggestions(vec!["Set maxActions to a positive integer (default 50)".to_string()])
    }

    pub fn already_running() -> Self {
        Self::new(ErrorCode::AlreadyRunning, "Recorder is already running")
    }

    pub fn already_stopped() -> Self {
        Self::new(ErrorCode::AlreadyStopped, "Recorder is already stopped")
    }

    pub fn malformed_pattern(pattern: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::MalformedSanitizePattern,
            format!("Ignoring sanitize pattern '{}': {}", pattern, reason),
        )
    }

    pub fn selector_invalid(selector: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::MalformedSanitizePattern,
            format!("Invalid selector '{}': {}", selector, reason),
        )
    }

    pub fn unrecognized_error_shape(value: &serde_json::Value) -> Self {
        Self::new(
            ErrorCode::UnrecognizedErrorShape,
            "Captured value is neither an error nor a string",
        )
        .with_context(value.clone())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Storage, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let e = Error::invalid_capacity(0);
        assert_eq!(
            e.to_string(),
            "[InvalidConfiguration] History capacity must be at least 1, got 0"
        );
    }

    #[test]
    fn serializes_code_in_screaming_case() {
        let json = serde_json::to_value(Error::already_running()).unwrap();
        assert_eq!(json["code"], "ALREADY_RUNNING");
        assert!(json.get("suggestions").is_none());
    }

    #[test]
    fn only_construction_and_io_codes_are_fatal() {
        assert!(ErrorCode::InvalidConfiguration.is_fatal());
        assert!(!ErrorCode::AlreadyRunning.is_fatal());
        assert!(!ErrorCode::MalformedSanitizePattern.is_fatal());
    }
}
