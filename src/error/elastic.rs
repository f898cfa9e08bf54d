use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error information extracted from an Elasticsearch error body.
///
/// Elasticsearch answers failed requests with either
/// `{"error": {"type": ..., "reason": ..., "root_cause": [...]}, "status": N}`
/// or, for a few endpoints, a bare `{"error": "message"}`.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_cause: Vec<ErrorCause>,
}

/// One entry of the `root_cause` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorCause {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
}

impl ErrorInfo {
    /// Parse a response body, falling back to the raw text as the reason.
    pub fn from_body(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => {
                return Self {
                    reason: non_empty(body.trim()),
                    ..Self::default()
                };
            }
        };

        let status = value
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());

        match value.get("error") {
            Some(Value::String(message)) => Self {
                reason: non_empty(message),
                status,
                ..Self::default()
            },
            Some(error @ Value::Object(_)) => {
                let root_cause = error
                    .get("root_cause")
                    .cloned()
                    .and_then(|causes| serde_json::from_value(causes).ok())
                    .unwrap_or_default();
                Self {
                    error_type: error
                        .get("type")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    reason: error
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    status,
                    root_cause,
                }
            }
            _ => Self {
                reason: non_empty(body.trim()),
                status,
                ..Self::default()
            },
        }
    }

    /// Whether the error (or any root cause) has the given type.
    pub fn has_type(&self, error_type: &str) -> bool {
        self.error_type.as_deref() == Some(error_type)
            || self.root_cause.iter().any(|c| c.error_type == error_type)
    }

    /// Index named by an `index_not_found_exception`, if any.
    pub fn missing_index(&self) -> Option<&str> {
        self.root_cause
            .iter()
            .find(|c| c.error_type == "index_not_found_exception")
            .and_then(|c| c.index.as_deref())
    }

    /// One-line summary: `type: reason`.
    pub fn summary(&self) -> String {
        match (&self.error_type, &self.reason) {
            (Some(t), Some(r)) => format!("{t}: {r}"),
            (Some(t), None) => t.clone(),
            (None, Some(r)) => r.clone(),
            (None, None) => "no error details".to_string(),
        }
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
