//! Responses and relation links.
//!
//! Links are kept as metadata on the [`Response`] and only merged into the
//! body as `_links` when the response is shaped for output.

use crate::endpoint::Endpoint;
use crate::failure::Failure;
use crate::request::ParamMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Relation name to ordered link items.
pub type LinkMap = IndexMap<String, Vec<Link>>;

/// A single relation link.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Target reference.
    pub href: String,
    /// Extra attributes such as `embeddable` or `title`.
    pub attributes: ParamMap,
}

impl Link {
    /// Creates a link with no attributes.
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            attributes: ParamMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Marks the link as embeddable.
    #[must_use]
    pub fn embeddable(self) -> Self {
        self.with_attribute("embeddable", true)
    }

    /// Returns true if the `embeddable` attribute is `true`.
    #[must_use]
    pub fn is_embeddable(&self) -> bool {
        self.attributes
            .get("embeddable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns the attribute set with `href` merged in.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut item = self.attributes.clone();
        item.insert("href".to_string(), Value::String(self.href.clone()));
        Value::Object(item)
    }
}

/// A REST response.
#[derive(Debug, Clone)]
pub struct Response {
    data: Value,
    status: StatusCode,
    headers: HeaderMap,
    links: LinkMap,
    matched_route: Option<String>,
    matched_endpoint: Option<Arc<Endpoint>>,
}

impl Response {
    /// Creates a `200 OK` response carrying `data`.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            links: LinkMap::new(),
            matched_route: None,
            matched_endpoint: None,
        }
    }

    /// Creates a `200 OK` response from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Failure> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(Failure::encode_error)
    }

    /// Builds a collection response from item responses.
    ///
    /// Each item contributes its data with its links compacted into `_links`.
    #[must_use]
    pub fn from_items(items: Vec<Response>) -> Self {
        Self::new(Value::Array(
            items.iter().map(Response::data_with_links).collect(),
        ))
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a link.
    #[must_use]
    pub fn with_link(mut self, rel: impl Into<String>, link: Link) -> Self {
        self.add_link(rel, link);
        self
    }

    /// Returns the body data.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the body data, mutably.
    pub fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    /// Replaces the body data.
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Replaces the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns true for 4xx and 5xx statuses.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers, mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replaces the headers.
    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    /// Appends a link under `rel`.
    pub fn add_link(&mut self, rel: impl Into<String>, link: Link) {
        self.links.entry(rel.into()).or_default().push(link);
    }

    /// Removes links under `rel`, either all of them or those with `href`.
    pub fn remove_link(&mut self, rel: &str, href: Option<&str>) {
        match href {
            None => {
                self.links.shift_remove(rel);
            }
            Some(href) => {
                if let Some(items) = self.links.get_mut(rel) {
                    items.retain(|l| l.href != href);
                    if items.is_empty() {
                        self.links.shift_remove(rel);
                    }
                }
            }
        }
    }

    /// Returns the links.
    #[must_use]
    pub fn links(&self) -> &LinkMap {
        &self.links
    }

    /// Returns the links in their `_links` wire form.
    #[must_use]
    pub fn links_value(&self) -> Value {
        Value::Object(
            self.links
                .iter()
                .map(|(rel, items)| {
                    (
                        rel.clone(),
                        Value::Array(items.iter().map(Link::to_value).collect()),
                    )
                })
                .collect(),
        )
    }

    /// Returns the data with `_links` attached when the data is an object.
    ///
    /// Any other data has nowhere to carry links, so response-level links
    /// are left out. Collections carry links per item instead, see
    /// [`Response::from_items`].
    #[must_use]
    pub fn data_with_links(&self) -> Value {
        let mut data = self.data.clone();
        if !self.links.is_empty() {
            match &mut data {
                Value::Object(map) => {
                    map.insert("_links".to_string(), self.links_value());
                }
                _ => tracing::debug!(
                    relations = self.links.len(),
                    "links dropped from non-object response data"
                ),
            }
        }
        data
    }

    /// Returns the pattern of the route that produced this response.
    #[must_use]
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    /// Returns the endpoint that produced this response.
    #[must_use]
    pub fn matched_endpoint(&self) -> Option<&Arc<Endpoint>> {
        self.matched_endpoint.as_ref()
    }

    /// Records which route and endpoint produced this response.
    pub fn set_matched(&mut self, route: impl Into<String>, endpoint: Option<Arc<Endpoint>>) {
        self.matched_route = Some(route.into());
        self.matched_endpoint = endpoint;
    }
}

impl From<Value> for Response {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_value_merges_href() {
        let link = Link::new("https://example.org/wp-json/wp/v2/users/1").embeddable();
        assert!(link.is_embeddable());
        assert_eq!(
            link.to_value(),
            json!({ "embeddable": true, "href": "https://example.org/wp-json/wp/v2/users/1" })
        );
    }

    #[test]
    fn test_link_href_wins_over_attribute() {
        let link = Link::new("/real").with_attribute("href", "/fake");
        assert_eq!(link.to_value()["href"], json!("/real"));
    }

    #[test]
    fn test_links_stay_out_of_data() {
        let response = Response::new(json!({ "id": 1 })).with_link("self", Link::new("/posts/1"));
        assert_eq!(response.data(), &json!({ "id": 1 }));
        assert_eq!(
            response.data_with_links(),
            json!({ "id": 1, "_links": { "self": [{ "href": "/posts/1" }] } })
        );
    }

    #[test]
    fn test_links_left_out_of_non_object_data() {
        let listed = Response::new(json!([{ "id": 1 }])).with_link("next", Link::new("/posts?page=2"));
        assert_eq!(listed.data_with_links(), json!([{ "id": 1 }]));
        let scalar = Response::new(json!("ok")).with_link("self", Link::new("/ping"));
        assert_eq!(scalar.data_with_links(), json!("ok"));
        assert_eq!(scalar.links()["self"].len(), 1);
    }

    #[test]
    fn test_remove_link() {
        let mut response = Response::new(json!({}))
            .with_link("item", Link::new("/a"))
            .with_link("item", Link::new("/b"))
            .with_link("self", Link::new("/s"));

        response.remove_link("item", Some("/a"));
        assert_eq!(response.links()["item"].len(), 1);
        response.remove_link("item", Some("/b"));
        assert!(!response.links().contains_key("item"));
        response.remove_link("self", None);
        assert!(response.links().is_empty());
    }

    #[test]
    fn test_from_items() {
        let items = vec![
            Response::new(json!({ "id": 1 })).with_link("self", Link::new("/posts/1")),
            Response::new(json!({ "id": 2 })),
        ];
        let collection = Response::from_items(items);
        assert_eq!(collection.data()[0]["_links"]["self"][0]["href"], json!("/posts/1"));
        assert!(collection.data()[1].get("_links").is_none());
    }

    #[test]
    fn test_is_error() {
        assert!(!Response::new(json!(null)).is_error());
        assert!(Response::new(json!(null))
            .with_status(StatusCode::NOT_FOUND)
            .is_error());
    }
}
