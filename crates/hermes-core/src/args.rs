//! Argument specifications.
//!
//! Each endpoint declares its arguments by name. The pipeline uses these
//! specs to sanitize incoming values, inject defaults, check required
//! arguments and run validators, in that order.
//!
//! ```rust
//! use hermes_core::args::{sanitize, ArgSpec};
//! use serde_json::json;
//!
//! let per_page = ArgSpec::new()
//!     .with_default(json!(10))
//!     .sanitize(sanitize::integer)
//!     .description("Maximum number of items to be returned in result set.");
//! let context = ArgSpec::new().choices(["view", "embed", "edit"]).with_default(json!("view"));
//! ```

use crate::failure::{codes, Failure};
use crate::request::Request;
use http::StatusCode;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Transforms a raw argument value.
pub type Sanitizer = Arc<dyn Fn(&Value, &Request, &str) -> Result<Value, Failure> + Send + Sync>;

/// Accepts or rejects a sanitized argument value.
///
/// `Ok(false)` rejects with a generic reason; `Err` rejects with the
/// failure's message as the reason.
pub type Validator = Arc<dyn Fn(&Value, &Request, &str) -> Result<bool, Failure> + Send + Sync>;

/// Declaration of a single endpoint argument.
#[derive(Clone, Default)]
pub struct ArgSpec {
    required: bool,
    default: Option<Value>,
    description: Option<String>,
    choices: Option<Vec<Value>>,
    sanitizer: Option<Sanitizer>,
    validator: Option<Validator>,
}

impl ArgSpec {
    /// Creates an optional argument with no default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the argument as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default injected when the argument is absent.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the human-readable description shown in discovery.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts the argument to a fixed set of values.
    #[must_use]
    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the sanitizer.
    #[must_use]
    pub fn sanitize<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Request, &str) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        self.sanitizer = Some(Arc::new(f));
        self
    }

    /// Sets the validator.
    #[must_use]
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Request, &str) -> Result<bool, Failure> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Returns true if the argument is required.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the allowed values, if restricted.
    #[must_use]
    pub fn allowed_values(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    /// Returns true if a sanitizer is attached.
    #[must_use]
    pub fn has_sanitizer(&self) -> bool {
        self.sanitizer.is_some()
    }

    /// Runs the sanitizer. Without one the value passes through unchanged.
    pub fn apply_sanitizer(
        &self,
        value: &Value,
        request: &Request,
        name: &str,
    ) -> Result<Value, Failure> {
        match &self.sanitizer {
            Some(sanitizer) => sanitizer(value, request, name),
            None => Ok(value.clone()),
        }
    }

    /// Checks the choices and the validator, returning a reason on rejection.
    pub fn check(&self, value: &Value, request: &Request, name: &str) -> Result<(), String> {
        if let Some(choices) = &self.choices {
            if !choices.contains(value) {
                let listed: Vec<String> = choices
                    .iter()
                    .map(|c| c.as_str().map_or_else(|| c.to_string(), str::to_string))
                    .collect();
                return Err(format!("{name} is not one of {}.", listed.join(", ")));
            }
        }
        match &self.validator {
            None => Ok(()),
            Some(validator) => match validator(value, request, name) {
                Ok(true) => Ok(()),
                Ok(false) => Err("Invalid parameter.".to_string()),
                Err(failure) => Err(failure
                    .message()
                    .unwrap_or("Invalid parameter.")
                    .to_string()),
            },
        }
    }

    /// Returns the discovery description of this argument.
    #[must_use]
    pub fn describe(&self) -> Value {
        let mut data = Map::new();
        data.insert("required".to_string(), Value::Bool(self.required));
        if let Some(default) = &self.default {
            data.insert("default".to_string(), default.clone());
        }
        if let Some(choices) = &self.choices {
            data.insert("enum".to_string(), Value::Array(choices.clone()));
        }
        if let Some(description) = &self.description {
            data.insert("description".to_string(), Value::String(description.clone()));
        }
        Value::Object(data)
    }
}

impl fmt::Debug for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgSpec")
            .field("required", &self.required)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("sanitizer", &self.sanitizer.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Built-in sanitizers.
pub mod sanitize {
    use super::{bad_type, Failure, Request, Value};

    /// Coerces numbers and numeric strings to an integer.
    pub fn integer(value: &Value, _request: &Request, name: &str) -> Result<Value, Failure> {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| bad_type(name, "integer")),
            _ => Err(bad_type(name, "integer")),
        }
    }

    /// Coerces `true`/`false`, `1`/`0` and their string forms to a boolean.
    pub fn boolean(value: &Value, _request: &Request, name: &str) -> Result<Value, Failure> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) if n.as_u64() == Some(1) => Ok(Value::Bool(true)),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(Value::Bool(false)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" | "" => Ok(Value::Bool(false)),
                _ => Err(bad_type(name, "boolean")),
            },
            _ => Err(bad_type(name, "boolean")),
        }
    }

    /// Converts scalars to a trimmed string without control characters.
    pub fn text(value: &Value, _request: &Request, name: &str) -> Result<Value, Failure> {
        let raw = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(bad_type(name, "string")),
        };
        let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
        Ok(Value::String(cleaned.trim().to_string()))
    }
}

fn bad_type(name: &str, kind: &str) -> Failure {
    Failure::with_status(
        codes::INVALID_PARAM,
        format!("{name} is not of type {kind}."),
        StatusCode::BAD_REQUEST,
    )
}
