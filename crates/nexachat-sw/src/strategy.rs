//! Caching strategies.
//!
//! Each strategy answers exactly once. Work that outlives the answer (the
//! background refresh of a cache hit) runs in a detached task whose failures
//! are logged and dropped inside the task itself.

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::classify::RouteClass;
use crate::context::WorkerContext;
use crate::network::NetworkError;
use crate::request::Request;
use crate::response::Response;

/// What the host should do with an intercepted request.
#[derive(Debug)]
pub enum Reply {
    /// Not handled; the host performs its default network handling.
    PassThrough,
    /// Answer with this response.
    Respond(Response),
    /// Handled, but nothing to answer with.
    Miss,
    /// Handled, and the network failure is the answer.
    NetworkError(NetworkError),
}

impl Reply {
    /// The response, if there is one.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Reply::Respond(response) => Some(response),
            _ => None,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Reply::PassThrough)
    }
}

/// A detached cache refresh.
///
/// Dropping it leaves the task running. Awaiting [`settled`](Self::settled)
/// waits for it to finish; it never reports an error.
#[derive(Debug)]
pub struct BackgroundRefresh(JoinHandle<()>);

impl BackgroundRefresh {
    /// Wait for the refresh to finish, whatever its outcome.
    pub async fn settled(self) {
        let _ = self.0.await;
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

/// Outcome of routing one fetch.
#[derive(Debug)]
pub struct FetchResult {
    pub reply: Reply,
    pub refresh: Option<BackgroundRefresh>,
}

impl FetchResult {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            refresh: None,
        }
    }

    fn with_refresh(reply: Reply, refresh: BackgroundRefresh) -> Self {
        Self {
            reply,
            refresh: Some(refresh),
        }
    }
}

/// Runs the caching strategy for a routing class.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    ctx: WorkerContext,
}

impl StrategyExecutor {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Answer `request` with the strategy for `class`.
    pub async fn execute(&self, class: RouteClass, request: &Request) -> FetchResult {
        match class {
            RouteClass::ExternalApi => FetchResult::reply(Reply::PassThrough),
            RouteClass::ExternalFont => self.stale_while_revalidate(request).await,
            RouteClass::SameOriginOrNavigation => self.cache_first(request).await,
            RouteClass::Other => self.network_first(request).await,
        }
    }

    /// Serve from the current generation, refreshing it in the background.
    pub async fn stale_while_revalidate(&self, request: &Request) -> FetchResult {
        if let Some(cached) = self.lookup_current(request).await {
            trace!(url = %request.url, "Stale-while-revalidate hit");
            let refresh = spawn_refresh(self.ctx.clone(), request.clone(), false);
            return FetchResult::with_refresh(Reply::Respond(cached), refresh);
        }

        match self.ctx.network.fetch(request).await {
            Ok(response) => FetchResult::reply(Reply::Respond(
                self.store_if_ok(request, response).await,
            )),
            Err(e) => {
                debug!(url = %request.url, error = %e, "Font fetch failed with nothing cached");
                FetchResult::reply(Reply::NetworkError(e))
            }
        }
    }

    /// Serve from any generation, refreshing in the background. On a miss go
    /// to the network, then to the offline shell or a 503.
    pub async fn cache_first(&self, request: &Request) -> FetchResult {
        if let Some(cached) = self.lookup_any(request).await {
            trace!(url = %request.url, "Cache-first hit");
            let refresh = spawn_refresh(self.ctx.clone(), request.clone(), true);
            return FetchResult::with_refresh(Reply::Respond(cached), refresh);
        }

        match self.ctx.network.fetch(request).await {
            Ok(response) => FetchResult::reply(Reply::Respond(
                self.store_if_ok(request, response).await,
            )),
            Err(e) if request.is_navigation() => {
                debug!(url = %request.url, error = %e, "Navigation offline, serving shell");
                FetchResult::reply(match self.offline_shell().await {
                    Some(shell) => Reply::Respond(shell),
                    None => Reply::Miss,
                })
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Subresource offline");
                FetchResult::reply(Reply::Respond(Response::offline()))
            }
        }
    }

    /// Go to the network; fall back to any generation on failure.
    pub async fn network_first(&self, request: &Request) -> FetchResult {
        match self.ctx.network.fetch(request).await {
            Ok(response) => FetchResult::reply(Reply::Respond(
                self.store_if_ok(request, response).await,
            )),
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                FetchResult::reply(match self.lookup_any(request).await {
                    Some(cached) => Reply::Respond(cached),
                    None => Reply::Miss,
                })
            }
        }
    }

    async fn lookup_current(&self, request: &Request) -> Option<Response> {
        let cache = match self.ctx.caches.open(self.ctx.cache_name()).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(cache = %self.ctx.cache_name(), error = %e, "Failed to open cache");
                return None;
            }
        };
        cache.match_request(request).await.unwrap_or_else(|e| {
            warn!(url = %request.url, error = %e, "Cache lookup failed");
            None
        })
    }

    async fn lookup_any(&self, request: &Request) -> Option<Response> {
        self.ctx
            .caches
            .match_request(request)
            .await
            .unwrap_or_else(|e| {
                warn!(url = %request.url, error = %e, "Cache lookup failed");
                None
            })
    }

    async fn offline_shell(&self) -> Option<Response> {
        let url = match self.ctx.resolve(&self.ctx.config.offline_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Offline URL does not resolve");
                return None;
            }
        };
        self.lookup_any(&Request::get(url)).await
    }

    /// Store a copy of an ok response and hand back the other.
    async fn store_if_ok(&self, request: &Request, response: Response) -> Response {
        if !response.ok() {
            return response;
        }
        let (response, copy) = response.duplicate();
        store(&self.ctx, request, copy).await;
        response
    }
}

/// Put `response` into the current generation. Failures are logged only.
async fn store(ctx: &WorkerContext, request: &Request, response: Response) {
    let result = match ctx.caches.open(ctx.cache_name()).await {
        Ok(cache) => cache.put(request, response).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(url = %request.url, error = %e, "Failed to store response");
    }
}

/// Fetch `request` again and overwrite the cached copy if the answer is ok.
/// With `skip_opaque`, opaque answers are not stored either.
fn spawn_refresh(ctx: WorkerContext, request: Request, skip_opaque: bool) -> BackgroundRefresh {
    BackgroundRefresh(tokio::spawn(async move {
        match ctx.network.fetch(&request).await {
            Ok(response) if response.ok() && !(skip_opaque && response.is_opaque()) => {
                store(&ctx, &request, response).await;
                trace!(url = %request.url, "Background refresh stored");
            }
            Ok(response) => {
                trace!(url = %request.url, status = response.status, "Background refresh not stored");
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Background refresh failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use http::Method;
    use nexachat_core::WorkerConfig;

    use crate::cache::{Cache, CacheStorage, MemoryCacheStorage};
    use crate::request::RequestMode;
    use crate::response::ResponseType;
    use crate::testing::FakeNetwork;

    const CURRENT: &str = "nexachat-v1.0.0";

    struct Fixture {
        caches: Arc<MemoryCacheStorage>,
        network: Arc<FakeNetwork>,
        executor: StrategyExecutor,
    }

    fn fixture() -> Fixture {
        let caches = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(FakeNetwork::new());
        let ctx = WorkerContext::new(WorkerConfig::default(), caches.clone(), network.clone())
            .unwrap();
        Fixture {
            caches,
            network,
            executor: StrategyExecutor::new(ctx),
        }
    }

    impl Fixture {
        async fn seed(&self, cache: &str, url: &str, body: &str) {
            self.caches
                .open(cache)
                .await
                .unwrap()
                .put(&Request::parse(url).unwrap(), Response::new(200, body.to_string()))
                .await
                .unwrap();
        }

        async fn stored(&self, url: &str) -> Option<String> {
            let cache = self.caches.get(CURRENT).await?;
            let response = cache.match_request(&Request::parse(url).unwrap()).await.unwrap()?;
            Some(response.text().unwrap())
        }
    }

    fn body(result: FetchResult) -> String {
        result.reply.into_response().unwrap().text().unwrap()
    }

    // ---- Pass-through ----

    #[tokio::test]
    async fn test_api_passes_through_untouched() {
        let f = fixture();
        let request = Request::parse("https://api.anthropic.com/v1/messages").unwrap();

        let result = f.executor.execute(RouteClass::ExternalApi, &request).await;

        assert!(result.reply.is_pass_through());
        assert!(result.refresh.is_none());
        assert_eq!(f.network.calls(), 0);
        assert!(f.caches.keys().await.unwrap().is_empty());
    }

    // ---- Stale-while-revalidate ----

    #[tokio::test]
    async fn test_swr_hit_returns_without_waiting_for_network() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/inter.woff2";
        f.seed(CURRENT, url, "cached-font").await;
        f.network.hang(url);

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            f.executor.stale_while_revalidate(&Request::parse(url).unwrap()),
        )
        .await
        .expect("cache hit must not wait on the network");

        assert!(result.refresh.is_some());
        assert_eq!(body(result), "cached-font");
    }

    #[tokio::test]
    async fn test_swr_hit_refreshes_in_background() {
        let f = fixture();
        let url = "https://fonts.googleapis.com/css2?family=Inter";
        f.seed(CURRENT, url, "old").await;
        f.network.respond(url, 200, "new");

        let result = f
            .executor
            .stale_while_revalidate(&Request::parse(url).unwrap())
            .await;
        let refresh = result.refresh.unwrap();
        assert_eq!(result.reply.into_response().unwrap().text().unwrap(), "old");

        refresh.settled().await;
        assert_eq!(f.stored(url).await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_swr_background_failure_is_swallowed() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/a.woff2";
        f.seed(CURRENT, url, "old").await;
        f.network.fail(url);

        let result = f
            .executor
            .stale_while_revalidate(&Request::parse(url).unwrap())
            .await;
        result.refresh.unwrap().settled().await;

        assert_eq!(f.stored(url).await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_swr_background_ignores_error_status() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/b.woff2";
        f.seed(CURRENT, url, "old").await;
        f.network.respond(url, 500, "boom");

        let result = f
            .executor
            .stale_while_revalidate(&Request::parse(url).unwrap())
            .await;
        result.refresh.unwrap().settled().await;

        assert_eq!(f.stored(url).await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_swr_only_reads_current_generation() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/c.woff2";
        f.seed("nexachat-v0.9.0", url, "stale-generation").await;
        f.network.respond(url, 200, "fresh");

        let result = f
            .executor
            .stale_while_revalidate(&Request::parse(url).unwrap())
            .await;

        assert!(result.refresh.is_none());
        assert_eq!(body(result), "fresh");
    }

    #[tokio::test]
    async fn test_swr_miss_stores_and_returns() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/d.woff2";
        f.network.respond(url, 200, "font");

        let result = f
            .executor
            .stale_while_revalidate(&Request::parse(url).unwrap())
            .await;

        assert_eq!(body(result), "font");
        assert_eq!(f.stored(url).await.as_deref(), Some("font"));
    }

    #[tokio::test]
    async fn test_swr_miss_offline_is_network_error() {
        let f = fixture();
        let url = "https://fonts.gstatic.com/e.woff2";
        f.network.fail(url);

        let result = f
            .executor
            .stale_while_revalidate(&Request::parse(url).unwrap())
            .await;

        assert!(matches!(result.reply, Reply::NetworkError(_)));
        assert!(f.stored(url).await.is_none());
    }

    // ---- Cache-first ----

    #[tokio::test]
    async fn test_cache_first_miss_stores_copy() {
        let f = fixture();
        let url = "https://nexachat.app/app.js";
        f.network.respond(url, 200, "console.log(1)");

        let result = f.executor.cache_first(&Request::parse(url).unwrap()).await;

        assert!(result.refresh.is_none());
        let response = result.reply.into_response().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text().unwrap(), "console.log(1)");
        assert_eq!(f.stored(url).await.as_deref(), Some("console.log(1)"));
    }

    #[tokio::test]
    async fn test_cache_first_repeat_is_served_from_cache() {
        let f = fixture();
        let url = "https://nexachat.app/style.css";
        f.network.respond(url, 200, "body{}");
        let request = Request::parse(url).unwrap();

        let first = f.executor.cache_first(&request).await;
        assert_eq!(body(first), "body{}");

        f.network.hang(url);
        let second = tokio::time::timeout(Duration::from_secs(1), f.executor.cache_first(&request))
            .await
            .unwrap();
        let response = second.reply.into_response().unwrap();
        assert_eq!(response.status, 200);
        assert!(response.ok());
        assert_eq!(response.text().unwrap(), "body{}");
    }

    #[tokio::test]
    async fn test_cache_first_miss_error_status_not_stored() {
        let f = fixture();
        let url = "https://nexachat.app/missing.js";
        f.network.respond(url, 404, "nope");

        let result = f.executor.cache_first(&Request::parse(url).unwrap()).await;

        assert_eq!(result.reply.into_response().unwrap().status, 404);
        assert!(f.stored(url).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_first_hit_refresh_skips_opaque() {
        let f = fixture();
        let url = "https://nexachat.app/logo.png";
        f.seed(CURRENT, url, "old").await;
        f.network
            .respond_with_type(url, 200, "opaque", ResponseType::Opaque);

        let result = f.executor.cache_first(&Request::parse(url).unwrap()).await;
        result.refresh.unwrap().settled().await;

        assert_eq!(f.stored(url).await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_cache_first_hit_refresh_overwrites() {
        let f = fixture();
        let url = "https://nexachat.app/";
        f.seed(CURRENT, url, "v1").await;
        f.network.respond(url, 200, "v2");

        let result = f.executor.cache_first(&Request::parse(url).unwrap()).await;
        result.refresh.unwrap().settled().await;

        assert_eq!(f.stored(url).await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_cache_first_reads_any_generation() {
        let f = fixture();
        let url = "https://nexachat.app/old.js";
        f.seed("nexachat-v0.9.0", url, "from-old").await;
        f.network.fail(url);

        let result = f.executor.cache_first(&Request::parse(url).unwrap()).await;
        assert_eq!(body(result), "from-old");
    }

    #[tokio::test]
    async fn test_cache_first_navigation_offline_serves_shell() {
        let f = fixture();
        f.seed(CURRENT, "https://nexachat.app/index.html", "<shell>").await;
        let url = "https://nexachat.app/chat/42";
        f.network.fail(url);

        let request = Request::parse(url).unwrap().mode(RequestMode::Navigate);
        let result = f.executor.cache_first(&request).await;

        assert_eq!(body(result), "<shell>");
    }

    #[tokio::test]
    async fn test_cache_first_navigation_offline_without_shell_is_miss() {
        let f = fixture();
        let url = "https://nexachat.app/chat/42";
        f.network.fail(url);

        let request = Request::parse(url).unwrap().mode(RequestMode::Navigate);
        let result = f.executor.cache_first(&request).await;

        assert!(matches!(result.reply, Reply::Miss));
    }

    #[tokio::test]
    async fn test_cache_first_subresource_offline_is_503() {
        let f = fixture();
        let url = "https://nexachat.app/app.js";
        f.network.fail(url);

        let result = f.executor.cache_first(&Request::parse(url).unwrap()).await;
        let response = result.reply.into_response().unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.text().unwrap(), "Offline");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_change_response() {
        let f = fixture();
        let url = "https://nexachat.app/api/submit";
        f.network.respond(url, 200, "accepted");

        let request = Request::parse(url).unwrap().method(Method::POST);
        let result = f.executor.cache_first(&request).await;

        assert_eq!(body(result), "accepted");
        assert!(f.stored(url).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_first_post_goes_to_network() {
        let f = fixture();
        let url = "https://nexachat.app/api/submit";
        f.seed(CURRENT, url, "cached-get").await;
        f.network.respond(url, 200, "server-accepted-post");

        let request = Request::parse(url).unwrap().method(Method::POST);
        let result = f.executor.cache_first(&request).await;

        assert!(result.refresh.is_none());
        assert_eq!(body(result), "server-accepted-post");
        assert_eq!(f.network.calls(), 1);
        assert_eq!(f.stored(url).await.as_deref(), Some("cached-get"));
    }

    // ---- Network-first ----

    #[tokio::test]
    async fn test_network_first_stores_ok_response() {
        let f = fixture();
        let url = "https://cdn.example.com/lib.js";
        f.network.respond(url, 200, "lib");

        let result = f.executor.network_first(&Request::parse(url).unwrap()).await;

        assert_eq!(body(result), "lib");
        assert_eq!(f.stored(url).await.as_deref(), Some("lib"));
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_over_cache() {
        let f = fixture();
        let url = "https://cdn.example.com/lib.js";
        f.seed(CURRENT, url, "cached").await;
        f.network.respond(url, 200, "fresh");

        let result = f.executor.network_first(&Request::parse(url).unwrap()).await;
        assert_eq!(body(result), "fresh");
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let f = fixture();
        let url = "https://cdn.example.com/lib.js";
        f.seed(CURRENT, url, "cached").await;
        f.network.fail(url);

        let result = f.executor.network_first(&Request::parse(url).unwrap()).await;
        assert_eq!(body(result), "cached");
    }

    #[tokio::test]
    async fn test_network_first_offline_miss_is_not_synthesized() {
        let f = fixture();
        let url = "https://cdn.example.com/lib.js";
        f.network.fail(url);

        let result = f.executor.network_first(&Request::parse(url).unwrap()).await;

        assert!(matches!(result.reply, Reply::Miss));
        assert!(result.refresh.is_none());
    }

    #[tokio::test]
    async fn test_network_first_error_status_returned_unstored() {
        let f = fixture();
        let url = "https://cdn.example.com/down";
        f.network.respond(url, 502, "bad gateway");

        let result = f.executor.network_first(&Request::parse(url).unwrap()).await;

        assert_eq!(result.reply.into_response().unwrap().status, 502);
        assert!(f.stored(url).await.is_none());
    }

    #[tokio::test]
    async fn test_network_first_offline_post_ignores_cached_get() {
        let f = fixture();
        let url = "https://nexachat.app/api/submit";
        f.seed(CURRENT, url, "cached-get").await;
        f.network.fail(url);

        let request = Request::parse(url).unwrap().method(Method::POST);
        let result = f.executor.network_first(&request).await;

        assert!(matches!(result.reply, Reply::Miss));
    }
}
