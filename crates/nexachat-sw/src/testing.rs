//! Scripted network for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use hashbrown::HashMap;

use crate::network::{Network, NetworkError};
use crate::request::Request;
use crate::response::{Response, ResponseType};

#[derive(Debug, Clone)]
enum Route {
    Respond {
        status: u16,
        body: String,
        response_type: ResponseType,
    },
    Fail,
    Hang,
}

/// Answers by URL. Unknown URLs fail like an unreachable host.
#[derive(Debug, Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn set(&self, url: &str, route: Route) {
        self.routes.lock().unwrap().insert(url.to_string(), route);
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.respond_with_type(url, status, body, ResponseType::Basic);
    }

    pub(crate) fn respond_with_type(
        &self,
        url: &str,
        status: u16,
        body: &str,
        response_type: ResponseType,
    ) {
        self.set(
            url,
            Route::Respond {
                status,
                body: body.to_string(),
                response_type,
            },
        );
    }

    pub(crate) fn fail(&self, url: &str) {
        self.set(url, Route::Fail);
    }

    pub(crate) fn hang(&self, url: &str) {
        self.set(url, Route::Hang);
    }

    /// Number of fetches seen so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let route = self
            .routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or(Route::Fail);

        match route {
            Route::Respond {
                status,
                body,
                response_type,
            } => Ok(Response::new(status, body)
                .with_type(response_type)
                .with_url(request.url.clone())),
            Route::Fail => Err(NetworkError::RequestFailed(format!(
                "connection refused: {}",
                request.url
            ))),
            Route::Hang => futures::future::pending().await,
        }
    }
}
