//! Request classification.

use nexachat_core::WorkerConfig;
use url::{Origin, Url};

use crate::error::Result;
use crate::request::Request;

/// How an intercepted request is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// API traffic. Never intercepted.
    ExternalApi,
    /// Font provider traffic. Stale-while-revalidate.
    ExternalFont,
    /// The app's own assets and every navigation. Cache-first.
    SameOriginOrNavigation,
    /// Anything else. Network-first.
    Other,
}

/// Assigns a [`RouteClass`] to each request.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_host: String,
    font_hosts: Vec<String>,
    origin: Origin,
}

impl Classifier {
    pub fn new(api_host: impl Into<String>, font_hosts: Vec<String>, scope: &Url) -> Self {
        Self {
            api_host: api_host.into().to_ascii_lowercase(),
            font_hosts: font_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            origin: scope.origin(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let scope = config.scope_url()?;
        Ok(Self::new(
            config.api_host.clone(),
            config.font_hosts.clone(),
            &scope,
        ))
    }

    /// The worker's own origin.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Classify a request. Rules are checked in order and the first match wins.
    pub fn classify(&self, request: &Request) -> RouteClass {
        // `Url` lowercases hosts while parsing.
        let host = request.url.host_str().unwrap_or_default();

        if !host.is_empty() && host == self.api_host {
            return RouteClass::ExternalApi;
        }
        if !host.is_empty() && self.font_hosts.iter().any(|f| host.contains(f.as_str())) {
            return RouteClass::ExternalFont;
        }
        if request.url.origin() == self.origin || request.is_navigation() {
            return RouteClass::SameOriginOrNavigation;
        }
        RouteClass::Other
    }
}
