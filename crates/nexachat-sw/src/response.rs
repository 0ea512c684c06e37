//! Move-only responses.
//!
//! A [`Response`] owns its body and is deliberately not `Clone`: a response
//! that must be both stored and handed back has to go through
//! [`Response::duplicate`] first, so every consumer gets its own instance.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

/// Response type, following the Fetch API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Cross-origin response with CORS.
    Cors,
    /// Constructed locally.
    #[default]
    Default,
    /// Cross-origin `no-cors` response; status and body are hidden.
    Opaque,
    /// Network error.
    Error,
}

/// Single-use response body.
#[derive(Debug)]
struct Body(Bytes);

/// A response.
#[derive(Debug)]
pub struct Response {
    pub url: Option<Url>,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub response_type: ResponseType,
    body: Body,
}

impl Response {
    /// Create a response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            url: None,
            status,
            status_text,
            headers: HeaderMap::new(),
            response_type: ResponseType::Default,
            body: Body(body.into()),
        }
    }

    /// Create an opaque response (status 0, no headers, no body).
    pub fn opaque(url: Url) -> Self {
        Self {
            url: Some(url),
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            response_type: ResponseType::Opaque,
            body: Body(Bytes::new()),
        }
    }

    /// Response synthesized when neither cache nor network can answer.
    pub fn offline() -> Self {
        Self::new(503, "Offline").status_text("Service Unavailable")
    }

    /// Set the response type.
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Set the URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override the reason phrase.
    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Check if the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.response_type == ResponseType::Opaque
    }

    /// Body length without consuming the body.
    pub fn body_len(&self) -> usize {
        self.body.0.len()
    }

    /// Split into two independently consumable responses.
    pub fn duplicate(self) -> (Self, Self) {
        let copy = Self {
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            response_type: self.response_type,
            body: Body(self.body.0.clone()),
        };
        (self, copy)
    }

    /// Consume the response and return its body.
    pub fn into_bytes(self) -> Bytes {
        self.body.0
    }

    /// Consume the response and return its body as text.
    pub fn text(self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_range() {
        assert!(Response::new(200, "").ok());
        assert!(Response::new(204, "").ok());
        assert!(!Response::new(304, "").ok());
        assert!(!Response::new(404, "").ok());
        assert!(!Response::opaque(Url::parse("https://cdn.example/x").unwrap()).ok());
    }

    #[test]
    fn test_offline_response() {
        let response = Response::offline();
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert!(!response.ok());
        assert_eq!(response.text().unwrap(), "Offline");
    }

    #[test]
    fn test_duplicate_gives_independent_bodies() {
        let original = Response::new(200, "hello")
            .header(
                HeaderName::from_static("content-type"),
                HeaderValue::from_static("text/plain"),
            )
            .with_type(ResponseType::Basic);

        let (a, b) = original.duplicate();
        assert_eq!(a.headers, b.headers);
        assert_eq!(a.response_type, b.response_type);
        assert_eq!(a.text().unwrap(), "hello");
        assert_eq!(b.text().unwrap(), "hello");
    }

    #[test]
    fn test_canonical_status_text() {
        assert_eq!(Response::new(404, "").status_text, "Not Found");
        assert_eq!(Response::new(299, "").status_text, "");
    }
}
