//! State shared by the lifecycle and the fetch strategies.

use std::sync::Arc;

use nexachat_core::WorkerConfig;
use url::Url;

use crate::cache::CacheStorage;
use crate::error::Result;
use crate::network::Network;

/// Configuration plus the cache and network capabilities.
///
/// Cheap to clone; background refresh tasks carry their own copy.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub scope: Url,
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
}

impl WorkerContext {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        config.validate()?;
        let scope = config.scope_url()?;
        Ok(Self {
            config: Arc::new(config),
            scope,
            caches,
            network,
        })
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    /// Resolve a path against the worker scope.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.scope.join(path)?)
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("cache_name", &self.config.cache_name)
            .field("scope", &self.scope.as_str())
            .finish_non_exhaustive()
    }
}
