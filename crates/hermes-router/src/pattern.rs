//! Route patterns.
//!
//! A pattern is a regular expression over the route path. It is always
//! matched case-insensitively against the whole path, and named capture
//! groups become path parameters:
//!
//! ```text
//! /wp/v2/posts/(?P<id>[\d]+)      matches  /wp/v2/posts/42       id=42
//!                                 display  /wp/v2/posts/{id}
//! ```

use crate::params::PathParams;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A compiled, anchored route pattern.
///
/// Compilation never fails: a malformed expression is logged and yields a
/// pattern that matches nothing.
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Option<Regex>,
}

impl RoutePattern {
    /// Compiles `source` as a case-insensitive whole-path expression.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let regex = match Regex::new(&format!("(?i)^(?:{source})$")) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern = %source, error = %e, "route pattern is not a valid regular expression");
                None
            }
        };
        Self { source, regex }
    }

    /// Returns the pattern as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern compiled.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// Returns true if the pattern matches the whole path.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(path))
    }

    /// Matches the whole path and returns the named groups that participated.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let regex = self.regex.as_ref()?;
        let caps = regex.captures(path)?;
        Some(
            regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    /// Returns the pattern with named groups rewritten to `{name}`.
    #[must_use]
    pub fn display(&self) -> String {
        match placeholder_regex() {
            Some(regex) => regex.replace_all(&self.source, "{$name}").into_owned(),
            None => self.source.clone(),
        }
    }

    /// Returns true if the display form contains placeholders.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.display().contains('{')
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\(\?P?<(?P<name>\w+?)>.*?\)").ok())
        .as_ref()
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePattern")
            .field("source", &self.source)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
