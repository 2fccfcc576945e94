//! HTTP method sets.
//!
//! An [`Endpoint`](crate::Endpoint) serves a set of verbs stored as a
//! bitmask. Sets are usually written as a comma-separated string the way
//! routes are declared by hand:
//!
//! ```rust
//! use hermes_core::MethodSet;
//! use http::Method;
//!
//! let methods = MethodSet::parse("GET, post");
//! assert!(methods.contains(&Method::GET));
//! assert!(methods.contains(&Method::POST));
//! assert!(!methods.contains(&Method::DELETE));
//! ```

use http::Method;
use std::fmt;

const GET: u8 = 1;
const POST: u8 = 1 << 1;
const PUT: u8 = 1 << 2;
const PATCH: u8 = 1 << 3;
const DELETE: u8 = 1 << 4;
const HEAD: u8 = 1 << 5;
const OPTIONS: u8 = 1 << 6;

/// Display and iteration order.
static ORDER: [(u8, Method); 7] = [
    (GET, Method::GET),
    (POST, Method::POST),
    (PUT, Method::PUT),
    (PATCH, Method::PATCH),
    (DELETE, Method::DELETE),
    (HEAD, Method::HEAD),
    (OPTIONS, Method::OPTIONS),
];

/// A set of HTTP verbs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodSet(u8);

impl MethodSet {
    /// `GET`
    pub const READABLE: Self = Self(GET);
    /// `POST`
    pub const CREATABLE: Self = Self(POST);
    /// `POST, PUT, PATCH`
    pub const EDITABLE: Self = Self(POST | PUT | PATCH);
    /// `DELETE`
    pub const DELETABLE: Self = Self(DELETE);
    /// Every supported verb.
    pub const ALL_METHODS: Self = Self(GET | POST | PUT | PATCH | DELETE | HEAD | OPTIONS);

    /// Creates an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Parses a comma-separated list of verbs.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unsupported verbs are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .fold(Self::empty(), |set, name| match Self::bit_for_name(name) {
                Some(bit) => Self(set.0 | bit),
                None => {
                    tracing::warn!(method = name, "ignoring unsupported HTTP method");
                    set
                }
            })
    }

    /// Parses a single verb name, returning `None` for unsupported verbs.
    #[must_use]
    pub fn parse_method(name: &str) -> Option<Method> {
        let bit = Self::bit_for_name(name.trim())?;
        ORDER
            .iter()
            .find(|(b, _)| *b == bit)
            .map(|(_, m)| m.clone())
    }

    /// Returns true if `method` is in the set.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        Self::bit_for(method).is_some_and(|bit| self.0 & bit != 0)
    }

    /// Adds `method` to the set. Unsupported verbs are ignored.
    pub fn insert(&mut self, method: &Method) {
        if let Some(bit) = Self::bit_for(method) {
            self.0 |= bit;
        }
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if no verb is in the set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the verbs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Method> + '_ {
        ORDER
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, m)| m.clone())
    }

    /// Returns the verb names in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        ORDER
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, m)| Self::static_name(m))
            .collect()
    }

    fn static_name(method: &Method) -> &'static str {
        match *method {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            _ => "OPTIONS",
        }
    }

    fn bit_for(method: &Method) -> Option<u8> {
        match *method {
            Method::GET => Some(GET),
            Method::POST => Some(POST),
            Method::PUT => Some(PUT),
            Method::PATCH => Some(PATCH),
            Method::DELETE => Some(DELETE),
            Method::HEAD => Some(HEAD),
            Method::OPTIONS => Some(OPTIONS),
            _ => None,
        }
    }

    fn bit_for_name(name: &str) -> Option<u8> {
        ORDER
            .iter()
            .find(|(_, m)| m.as_str().eq_ignore_ascii_case(name))
            .map(|(bit, _)| *bit)
    }
}

impl From<&str> for MethodSet {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Method> for MethodSet {
    fn from(method: Method) -> Self {
        let mut set = Self::empty();
        set.insert(&method);
        set
    }
}

impl<const N: usize> From<[Method; N]> for MethodSet {
    fn from(methods: [Method; N]) -> Self {
        methods.into_iter().collect()
    }
}

impl From<Vec<Method>> for MethodSet {
    fn from(methods: Vec<Method>) -> Self {
        methods.into_iter().collect()
    }
}

impl FromIterator<Method> for MethodSet {
    fn from_iter<I: IntoIterator<Item = Method>>(iter: I) -> Self {
        let mut set = Self::empty();
        for method in iter {
            set.insert(&method);
        }
        set
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl fmt::Debug for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
