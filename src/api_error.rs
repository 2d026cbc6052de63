//! Normalization of the error bodies returned by the inventory API.
//!
//! The API is not consistent about how it reports failures. Three shapes are
//! seen in practice:
//!
//! - `{"detail": [{"loc": ["body", "vintage"], "msg": "..."}]}`
//! - `{"errors": {"vintage": ["...", "..."]}}`
//! - `{"message": "..."}` (or a bare `{"detail": "..."}`)
//!
//! Each shape has a matcher; they are tried in order and the first one that
//! recognizes the body wins. Anything else falls back to a generic message.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Normalized error body: per-field messages plus an optional general message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub fields: BTreeMap<String, String>,
    pub message: Option<String>,
}

impl ErrorDetail {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.fields.insert(field.into(), message.into());
        self
    }

    /// Message for a single form field, if the API reported one.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.message.is_none()
    }

    /// One-line rendering suitable for a flash message.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.message, self.fields.is_empty()) {
            (Some(message), true) => message.clone(),
            (message, _) => {
                let fields = self
                    .fields
                    .iter()
                    .map(|(field, msg)| format!("{field}: {msg}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                match message {
                    Some(message) => format!("{message} ({fields})"),
                    None => fields,
                }
            }
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

type Matcher = fn(&JsonValue) -> Option<ErrorDetail>;

const MATCHERS: &[Matcher] = &[match_detail_list, match_errors_map, match_message];

/// Parses an error body into an [`ErrorDetail`].
///
/// Never fails: unrecognized or non-JSON bodies produce a generic message
/// mentioning `status`.
#[must_use]
pub fn parse_error_body(status: u16, body: &str) -> ErrorDetail {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|json| normalize(&json))
        .unwrap_or_else(|| generic(status))
}

/// Runs the matchers in order over an already-decoded body.
#[must_use]
pub fn normalize(json: &JsonValue) -> Option<ErrorDetail> {
    MATCHERS.iter().find_map(|matcher| matcher(json))
}

fn generic(status: u16) -> ErrorDetail {
    ErrorDetail::message(format!("unexpected response from API (status {status})"))
}

fn match_detail_list(json: &JsonValue) -> Option<ErrorDetail> {
    let entries = json.get("detail")?.as_array()?;
    let mut detail = ErrorDetail::default();
    for entry in entries {
        let Some(msg) = entry.get("msg").and_then(JsonValue::as_str) else {
            continue;
        };
        detail.fields.insert(location_field(entry.get("loc")), msg.to_owned());
    }
    (!detail.is_empty()).then_some(detail)
}

// `loc` is `["body", "<field>", ...]`; the field is the second element.
fn location_field(loc: Option<&JsonValue>) -> String {
    let Some(parts) = loc.and_then(JsonValue::as_array) else {
        return "unknown".into();
    };
    parts
        .get(1)
        .or_else(|| parts.last())
        .and_then(scalar_to_string)
        .unwrap_or_else(|| "unknown".into())
}

fn match_errors_map(json: &JsonValue) -> Option<ErrorDetail> {
    let errors = json.get("errors")?.as_object()?;
    let mut detail = ErrorDetail::default();
    for (field, messages) in errors {
        let text = match messages {
            JsonValue::Array(items) => items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join("; "),
            other => scalar_to_string(other).unwrap_or_default(),
        };
        if !text.is_empty() {
            detail.fields.insert(field.clone(), text);
        }
    }
    (!detail.is_empty()).then_some(detail)
}

fn match_message(json: &JsonValue) -> Option<ErrorDetail> {
    json.get("message")
        .or_else(|| json.get("detail"))
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(ErrorDetail::message)
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
