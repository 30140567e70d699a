//! REST error contract shared by the client and the hub.

use serde::{Deserialize, Serialize};

/// Machine-readable error codes returned in [`ErrorBody::code`].
pub mod codes {
    /// Missing or invalid bearer token.
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// Task, project or column does not exist.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Request body failed validation.
    pub const VALIDATION: &str = "VALIDATION_ERROR";
    /// Move target is not a column of the task's project.
    pub const INVALID_COLUMN: &str = "INVALID_COLUMN";
    /// Too many requests.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, see [`codes`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message, suitable for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Builds a body with both fields set.
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.to_string()),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_bodies_parse() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(body.message.as_deref(), Some("nope"));
        assert!(body.code.is_none());
        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ErrorBody::default());
    }
}
