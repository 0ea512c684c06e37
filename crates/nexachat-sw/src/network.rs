//! Network capability and the reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, trace};
use url::{Origin, Url};

use crate::request::{Request, RequestMode};
use crate::response::{Response, ResponseType};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Something that can answer a request from the network.
///
/// A returned `Err` means the fetch rejected. Error statuses are not
/// failures: they come back as a non-ok [`Response`].
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("NexaChat-SW/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
            max_redirects: 10,
        }
    }
}

/// HTTP transport backed by reqwest.
pub struct HttpNetwork {
    client: Client,
    origin: Origin,
}

impl HttpNetwork {
    /// Create a transport for a worker running at `origin`.
    pub fn new(origin: Origin, config: LoaderConfig) -> Result<Self, NetworkError> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::RequestFailed(e.to_string()))?;

        info!(origin = %origin.ascii_serialization(), "HttpNetwork initialized");

        Ok(Self { client, origin })
    }

    fn response_type(&self, request: &Request, final_url: &Url) -> ResponseType {
        if final_url.origin() == self.origin {
            ResponseType::Basic
        } else if request.mode == RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl(request.url.to_string()));
        }

        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await?;

        let final_url = response.url().clone();
        let response_type = self.response_type(request, &final_url);
        if response_type == ResponseType::Opaque {
            trace!(url = %final_url, "Cross-origin no-cors response is opaque");
            return Ok(Response::opaque(final_url));
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        trace!(
            url = %final_url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        let mut out = Response::new(status.as_u16(), body)
            .with_type(response_type)
            .with_url(final_url);
        out.headers = headers;
        Ok(out)
    }
}
