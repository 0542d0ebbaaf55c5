// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the assistant function's response body.

use serde::Deserialize;

/// Body returned by the assistant function.
///
/// The function writes its reply to the store itself; the response only
/// reports whether it managed to. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<ErrorField>,
}

/// The `error` field appears both as a bare string and as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    Message(String),
    Detailed {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
}

impl ErrorField {
    pub fn describe(&self) -> String {
        match self {
            ErrorField::Message(message) => message.clone(),
            ErrorField::Detailed {
                message,
                code: Some(code),
            } => format!("{code}: {message}"),
            ErrorField::Detailed { message, .. } => message.clone(),
        }
    }
}

impl InvokeResponse {
    /// The failure this body reports, if any.
    ///
    /// An explicit `"success": false` without an error message still counts
    /// as a failure.
    pub fn failure(&self) -> Option<String> {
        match (&self.error, self.success) {
            (Some(err), _) => Some(err.describe()),
            (None, Some(false)) => Some("assistant reported success=false".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_success() {
        let resp: InvokeResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.failure().is_none());
    }

    #[test]
    fn string_error_is_failure() {
        let resp: InvokeResponse =
            serde_json::from_str(r#"{"error": "model overloaded"}"#).unwrap();
        assert_eq!(resp.failure().as_deref(), Some("model overloaded"));
    }

    #[test]
    fn object_error_includes_code() {
        let resp: InvokeResponse = serde_json::from_str(
            r#"{"error": {"message": "quota exceeded", "code": "429"}, "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(resp.failure().as_deref(), Some("429: quota exceeded"));
    }

    #[test]
    fn explicit_false_is_failure() {
        let resp: InvokeResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(resp.failure().is_some());
    }
}
