//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// A buffered response with assertion helpers.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Buffers an HTTP response.
    pub async fn from_http<B>(response: http::Response<B>) -> Result<Self, TestError>
    where
        B: http_body_util::BodyExt,
        B::Error: fmt::Display,
    {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Creates a response from raw parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// The first failure code in the body, looking inside an envelope.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        let json = self.json_value().ok()?;
        let records = match json.get("body") {
            Some(body) if json.get("status").is_some() => body.clone(),
            _ => json,
        };
        records
            .get(0)
            .and_then(|record| record.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// The hrefs listed under `_links.{rel}`.
    #[must_use]
    pub fn link_hrefs(&self, rel: &str) -> Vec<String> {
        let Ok(json) = self.json_value() else {
            return Vec::new();
        };
        json.pointer(&format!("/_links/{rel}"))
            .and_then(Value::as_array)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| link.get("href").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found"));
        assert_eq!(actual, expected, "header '{name}'");
        self
    }

    /// Asserts that a header is absent.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    pub fn assert_no_header(&self, name: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        assert!(
            self.header(name).is_none(),
            "header '{name}' should be absent, got {:?}",
            self.header(name)
        );
        self
    }

    /// Asserts the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or differs.
    pub fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual = self.json_value().expect("body should be valid JSON");
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts a JSON field addressed by a dotted path such as `items.0.id`.
    ///
    /// # Panics
    ///
    /// Panics if the field is missing or differs.
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &Value) -> &Self {
        let path = path.as_ref();
        let json = self.json_value().expect("body should be valid JSON");
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{path}' not found in {json}"));
        assert_eq!(actual, expected, "JSON field '{path}'");
        self
    }

    /// Asserts the first failure code of an error body.
    ///
    /// # Panics
    ///
    /// Panics if the body carries a different code or none.
    pub fn assert_error_code(&self, expected: &str) -> &Self {
        assert_eq!(
            self.error_code().as_deref(),
            Some(expected),
            "error code mismatch in {}",
            String::from_utf8_lossy(&self.body)
        );
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Dotted path accessor. Numeric segments index arrays.
fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match segment.parse::<usize>() {
            Ok(index) if current.is_array() => current.get(index)?,
            _ => current.get(segment)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        TestResponse::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            Bytes::from(body.to_string()),
        )
    }

    #[tokio::test]
    async fn test_from_http() {
        let http = http::Response::builder()
            .status(201)
            .header("x-wp-total", "3")
            .body(http_body_util::Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        let response = TestResponse::from_http(http).await.unwrap();
        assert_eq!(response.status_code(), 201);
        assert_eq!(response.header_str("X-WP-Total"), Some("3"));
        assert_eq!(response.text().unwrap(), "{}");
    }

    #[test]
    fn test_error_code_plain_and_enveloped() {
        let plain = response(404, r#"[{"code":"rest_no_route","message":"x","data":{"status":404}}]"#);
        assert_eq!(plain.error_code().as_deref(), Some("rest_no_route"));

        let enveloped = response(
            200,
            r#"{"body":[{"code":"rest_forbidden","message":"x"}],"status":403,"headers":{}}"#,
        );
        enveloped.assert_error_code("rest_forbidden");

        let ok = response(200, r#"{"id":1}"#);
        assert_eq!(ok.error_code(), None);
    }

    #[test]
    fn test_link_hrefs() {
        let response = response(
            200,
            r#"{"id":1,"_links":{"author":[{"href":"http://a/1"},{"href":"http://a/2"}]}}"#,
        );
        assert_eq!(response.link_hrefs("author"), vec!["http://a/1", "http://a/2"]);
        assert!(response.link_hrefs("self").is_empty());
    }

    #[test]
    fn test_json_field_paths() {
        let response = response(200, r#"{"items":[{"id":7}],"0":"zero"}"#);
        response
            .assert_json_field("items.0.id", &json!(7))
            .assert_json_field("0", &json!("zero"));
    }

    #[test]
    fn test_header_assertions() {
        let response = response(200, "{}");
        response
            .assert_status(StatusCode::OK)
            .assert_header("Content-Type", "application/json")
            .assert_no_header("Allow");
    }

    #[test]
    #[should_panic(expected = "expected status 404")]
    fn test_assert_status_panics() {
        response(200, "{}").assert_status(StatusCode::NOT_FOUND);
    }
}
