//! Failure values.
//!
//! A [`Failure`] is the error half of every result produced by validation,
//! permission checks and handlers. It is returned, never thrown, so that all
//! failure sources reach the same response-construction path.
//!
//! # Structure
//!
//! A failure holds one or more codes in insertion order. Each code owns a
//! list of messages and optional associated data. The HTTP status is read
//! from the `status` field of the first code's data:
//!
//! ```text
//! rest_invalid_param  -> ["Invalid parameter(s): id"]   data: {"status": 400, ...}
//! rest_other          -> ["first", "second"]           data: none
//! ```
//!
//! Flattening with [`Failure::records`] yields one `{code, message, data}`
//! record per message.

use http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Machine-readable codes produced by the dispatcher itself.
pub mod codes {
    /// No route matched the path and method.
    pub const NO_ROUTE: &str = "rest_no_route";
    /// The namespace named by a discovery request is unknown.
    pub const INVALID_NAMESPACE: &str = "rest_invalid_namespace";
    /// One or more required arguments were absent.
    pub const MISSING_PARAM: &str = "rest_missing_callback_param";
    /// One or more arguments failed sanitization or validation.
    pub const INVALID_PARAM: &str = "rest_invalid_param";
    /// The JSON body could not be parsed.
    pub const INVALID_JSON: &str = "rest_invalid_json";
    /// The permission check denied the request.
    pub const FORBIDDEN: &str = "rest_forbidden";
    /// The matched endpoint cannot be invoked.
    pub const INVALID_HANDLER: &str = "rest_invalid_handler";
    /// The JSONP callback name is malformed.
    pub const CALLBACK_INVALID: &str = "rest_callback_invalid";
    /// JSONP was requested while disabled.
    pub const CALLBACK_DISABLED: &str = "rest_callback_disabled";
    /// The response body could not be serialized.
    pub const ENCODE_ERROR: &str = "rest_encode_error";
    /// The path matched but no endpoint serves the method.
    pub const METHOD_NOT_ALLOWED: &str = "rest_method_not_allowed";
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Entry {
    messages: Vec<String>,
    data: Option<Value>,
}

/// A structured error value with one or more `(code, message, data)` entries.
///
/// # Example
///
/// ```
/// use hermes_core::Failure;
/// use http::StatusCode;
///
/// let mut failure = Failure::with_status("my_plugin_conflict", "Already exists", StatusCode::CONFLICT);
/// failure.add("my_plugin_hint", "Try a different slug", None);
///
/// assert_eq!(failure.status(), StatusCode::CONFLICT);
/// assert_eq!(failure.records().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    entries: IndexMap<String, Entry>,
}

/// One flattened failure entry, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Associated data, `null` when the code carries none.
    pub data: Option<Value>,
}

impl Failure {
    /// Creates a failure with a single code and message and no data.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut failure = Self {
            entries: IndexMap::new(),
        };
        failure.add(code, message, None);
        failure
    }

    /// Creates a failure whose data is `{"status": status}`.
    #[must_use]
    pub fn with_status(
        code: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self::with_data(code, message, json!({ "status": status.as_u16() }))
    }

    /// Creates a failure with arbitrary associated data.
    #[must_use]
    pub fn with_data(code: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
        let mut failure = Self {
            entries: IndexMap::new(),
        };
        failure.add(code, message, Some(data));
        failure
    }

    /// Adds a message under `code`.
    ///
    /// Messages for an existing code are appended. Data replaces the code's
    /// data only when `Some`.
    pub fn add(&mut self, code: impl Into<String>, message: impl Into<String>, data: Option<Value>) {
        let entry = self.entries.entry(code.into()).or_default();
        entry.messages.push(message.into());
        if data.is_some() {
            entry.data = data;
        }
    }

    /// Appends every entry of `other` after the entries of `self`.
    pub fn merge(&mut self, other: Failure) {
        for (code, entry) in other.entries {
            let existing = self.entries.entry(code).or_default();
            existing.messages.extend(entry.messages);
            if existing.data.is_none() {
                existing.data = entry.data;
            }
        }
    }

    /// Returns the first code.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    /// Returns every code in insertion order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the first message of the first code.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.entries
            .values()
            .next()
            .and_then(|e| e.messages.first())
            .map(String::as_str)
    }

    /// Returns the messages recorded under `code`.
    #[must_use]
    pub fn messages(&self, code: &str) -> &[String] {
        self.entries
            .get(code)
            .map_or(&[][..], |e| e.messages.as_slice())
    }

    /// Returns the data recorded under `code`.
    #[must_use]
    pub fn data(&self, code: &str) -> Option<&Value> {
        self.entries.get(code).and_then(|e| e.data.as_ref())
    }

    /// Returns the HTTP status for this failure.
    ///
    /// Read from the first code's `data.status`; anything missing or out of
    /// range yields `500 Internal Server Error`.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.entries
            .values()
            .next()
            .and_then(|e| e.data.as_ref())
            .and_then(|d| d.get("status"))
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Flattens the failure into one record per message.
    #[must_use]
    pub fn records(&self) -> Vec<FailureRecord> {
        self.entries
            .iter()
            .flat_map(|(code, entry)| {
                entry.messages.iter().map(move |message| FailureRecord {
                    code: code.clone(),
                    message: message.clone(),
                    data: entry.data.clone(),
                })
            })
            .collect()
    }

    // ---- Dispatcher-produced failures ----

    /// `rest_no_route` (404).
    #[must_use]
    pub fn no_route() -> Self {
        Self::with_status(
            codes::NO_ROUTE,
            "No route was found matching the URL and request method",
            StatusCode::NOT_FOUND,
        )
    }

    /// `rest_method_not_allowed` (405), listing the methods the path serves.
    #[must_use]
    pub fn method_not_allowed(allowed: &[&str]) -> Self {
        Self::with_data(
            codes::METHOD_NOT_ALLOWED,
            "The route does not support the request method",
            json!({ "status": 405, "allow": allowed }),
        )
    }

    /// `rest_invalid_namespace` (404).
    #[must_use]
    pub fn invalid_namespace() -> Self {
        Self::with_status(
            codes::INVALID_NAMESPACE,
            "The specified namespace could not be found.",
            StatusCode::NOT_FOUND,
        )
    }

    /// `rest_missing_callback_param` (400) naming every missing argument.
    #[must_use]
    pub fn missing_params(names: &[String]) -> Self {
        Self::with_data(
            codes::MISSING_PARAM,
            format!("Missing parameter(s): {}", names.join(", ")),
            json!({ "status": 400, "params": names }),
        )
    }

    /// `rest_invalid_param` (400) with a reason per offending argument.
    #[must_use]
    pub fn invalid_params(reasons: &IndexMap<String, String>) -> Self {
        let names: Vec<&str> = reasons.keys().map(String::as_str).collect();
        Self::with_data(
            codes::INVALID_PARAM,
            format!("Invalid parameter(s): {}", names.join(", ")),
            json!({ "status": 400, "params": reasons }),
        )
    }

    /// `rest_invalid_json` (400).
    #[must_use]
    pub fn invalid_json(reason: impl fmt::Display) -> Self {
        Self::with_data(
            codes::INVALID_JSON,
            "Invalid JSON body passed.",
            json!({ "status": 400, "json_error_message": reason.to_string() }),
        )
    }

    /// `rest_forbidden` (403).
    #[must_use]
    pub fn forbidden() -> Self {
        Self::with_status(
            codes::FORBIDDEN,
            "Sorry, you are not allowed to do that.",
            StatusCode::FORBIDDEN,
        )
    }

    /// `rest_invalid_handler` (500).
    #[must_use]
    pub fn invalid_handler() -> Self {
        Self::with_status(
            codes::INVALID_HANDLER,
            "The handler for the route is invalid",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    /// `rest_callback_invalid` (400).
    #[must_use]
    pub fn callback_invalid() -> Self {
        Self::with_status(
            codes::CALLBACK_INVALID,
            "The JSONP callback function is invalid.",
            StatusCode::BAD_REQUEST,
        )
    }

    /// `rest_callback_disabled` (400).
    #[must_use]
    pub fn callback_disabled() -> Self {
        Self::with_status(
            codes::CALLBACK_DISABLED,
            "JSONP support is disabled on this site.",
            StatusCode::BAD_REQUEST,
        )
    }

    /// `rest_encode_error` (500).
    #[must_use]
    pub fn encode_error(reason: impl fmt::Display) -> Self {
        Self::with_status(
            codes::ENCODE_ERROR,
            reason.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code(), self.message()) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}")?,
            (Some(code), None) => write!(f, "{code}")?,
            _ => write!(f, "unknown failure")?,
        }
        let extra = self.records().len().saturating_sub(1);
        if extra > 0 {
            write!(f, " (+{extra} more)")?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_first_code() {
        let mut failure = Failure::with_status("a", "first", StatusCode::CONFLICT);
        failure.add("b", "second", Some(json!({ "status": 418 })));
        assert_eq!(failure.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_status_defaults_to_500() {
        assert_eq!(
            Failure::new("x", "no data").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let bogus = Failure::with_data("x", "bad", json!({ "status": "nope" }));
        assert_eq!(bogus.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let out_of_range = Failure::with_data("x", "bad", json!({ "status": 99_999 }));
        assert_eq!(out_of_range.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_records_flatten_every_message() {
        let mut failure = Failure::with_status("a", "one", StatusCode::BAD_REQUEST);
        failure.add("a", "two", None);
        failure.add("b", "three", None);

        let records = failure.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].code, "a");
        assert_eq!(records[1].message, "two");
        assert_eq!(records[1].data, Some(json!({ "status": 400 })));
        assert_eq!(records[2].code, "b");
        assert_eq!(records[2].data, None);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut left = Failure::new("a", "one");
        let mut right = Failure::with_status("b", "two", StatusCode::FORBIDDEN);
        right.add("a", "three", Some(json!({ "status": 400 })));
        left.merge(right);

        assert_eq!(left.codes().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(left.messages("a"), &["one".to_string(), "three".to_string()]);
        assert_eq!(left.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_params_lists_all_names() {
        let failure = Failure::missing_params(&["id".into(), "slug".into()]);
        assert_eq!(failure.code(), Some(codes::MISSING_PARAM));
        assert_eq!(failure.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            failure.data(codes::MISSING_PARAM).and_then(|d| d.get("params")),
            Some(&json!(["id", "slug"]))
        );
        assert_eq!(failure.message(), Some("Missing parameter(s): id, slug"));
    }

    #[test]
    fn test_display() {
        let mut failure = Failure::new("a", "one");
        assert_eq!(failure.to_string(), "a: one");
        failure.add("b", "two", None);
        assert_eq!(failure.to_string(), "a: one (+1 more)");
    }

    #[test]
    fn test_record_serialization() {
        let failure = Failure::forbidden();
        let value = serde_json::to_value(failure.records()).unwrap();
        assert_eq!(
            value,
            json!([{
                "code": "rest_forbidden",
                "message": "Sorry, you are not allowed to do that.",
                "data": { "status": 403 }
            }])
        );
    }
}
