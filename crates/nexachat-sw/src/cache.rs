//! Cache storage capability and its in-memory implementation.
//!
//! The router only talks to [`CacheStorage`] and [`Cache`]; the storage
//! guarantees behind them belong to the host. [`MemoryCacheStorage`] keeps
//! everything in process and is what tests and simple embedders use.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::trace;
use url::Url;

use crate::error::{Result, ServiceWorkerError};
use crate::request::Request;
use crate::response::{Response, ResponseType};

// ==================== Capabilities ====================

/// A single named cache generation.
#[async_trait]
pub trait Cache: Send + Sync + fmt::Debug {
    /// Cache name.
    fn name(&self) -> &str;

    /// Look up a stored response. Every hit is a fresh response instance.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>>;

    /// Store `response` under `request`, replacing any previous entry.
    async fn put(&self, request: &Request, response: Response) -> Result<()>;

    /// Remove an entry.
    async fn delete(&self, request: &Request) -> Result<bool>;

    /// Keys of all stored entries.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// The set of cache generations (the `caches` global).
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>>;

    /// Check if a cache exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Delete a cache. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Names of all caches, in creation order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Look a request up across all caches, in creation order.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>>;
}

// ==================== Entries ====================

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response status text.
    pub status_text: String,

    /// Response headers.
    pub headers: Vec<(String, String)>,

    /// Response body.
    pub body: Vec<u8>,

    /// Response type at the time it was stored.
    pub response_type: ResponseType,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Capture a response for storage.
    pub fn capture(request: &Request, response: Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let status = response.status;
        let status_text = response.status_text.clone();
        let response_type = response.response_type;
        let url = response
            .url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_else(|| request.cache_key());

        Self {
            url,
            method: request.method.to_string(),
            status,
            status_text,
            headers,
            body: response.into_bytes().to_vec(),
            response_type,
            cached_at: now_millis(),
        }
    }

    /// Rebuild a response from this entry.
    pub fn to_response(&self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(n), Ok(v)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                headers.append(n, v);
            }
        }

        let mut response = Response::new(self.status, self.body.clone())
            .status_text(self.status_text.clone())
            .with_type(self.response_type);
        response.headers = headers;
        response.url = Url::parse(&self.url).ok();
        response
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ==================== Memory Cache ====================

/// An in-memory cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Stored entry for `request`, if any.
    pub async fn entry(&self, request: &Request) -> Option<CacheEntry> {
        self.entries.read().await.get(&request.cache_key()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        // Only GET entries are ever stored.
        if request.method != Method::GET {
            return Ok(None);
        }
        let entries = self.entries.read().await;
        Ok(entries.get(&request.cache_key()).map(CacheEntry::to_response))
    }

    async fn put(&self, request: &Request, response: Response) -> Result<()> {
        if request.method != Method::GET {
            return Err(ServiceWorkerError::cache(format!(
                "Request method '{}' is unsupported",
                request.method
            )));
        }
        if response.status == 206 {
            return Err(ServiceWorkerError::cache(
                "Partial response (status code 206) is unsupported",
            ));
        }

        let key = request.cache_key();
        trace!(cache = %self.name, key = %key, status = response.status, "Storing response");
        let entry = CacheEntry::capture(request, response);
        self.entries.write().await.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, request: &Request) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .await
            .remove(&request.cache_key())
            .is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

// ==================== Memory Cache Storage ====================

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<Vec<Arc<MemoryCache>>>,
}

impl MemoryCacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed handle to an existing cache, without creating it.
    pub async fn get(&self, name: &str) -> Option<Arc<MemoryCache>> {
        self.caches
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        let mut caches = self.caches.write().await;
        if let Some(existing) = caches.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let cache = Arc::new(MemoryCache::new(name));
        caches.push(cache.clone());
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.caches.read().await.iter().any(|c| c.name == name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|c| c.name != name);
        Ok(caches.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        let caches = self.caches.read().await.clone();
        for cache in caches {
            if let Some(response) = cache.match_request(request).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
