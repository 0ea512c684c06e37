//! Intercepted requests.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// Request mode, as seen by the interception layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Same-origin only.
    SameOrigin,
    /// Cross-origin without CORS; the response is opaque.
    NoCors,
    /// Cross-origin with CORS.
    #[default]
    Cors,
}

/// A request observed at interception time.
///
/// The router never mutates a request; it only reads it while deciding how to
/// answer, and clones it when a background refresh outlives the event.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub headers: HeaderMap,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            mode: RequestMode::default(),
            headers: HeaderMap::new(),
        }
    }

    /// Create a navigation request.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).mode(RequestMode::Navigate)
    }

    /// Parse `url` and create a GET request.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::get(Url::parse(url)?))
    }

    /// Set the request mode.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Key under which the request is stored. Fragments never reach the
    /// network, so they are not part of the key.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }
}
