//! Host event dispatch.

use std::sync::Arc;

use bytes::Bytes;
use nexachat_core::WorkerConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, Instrument};

use crate::cache::CacheStorage;
use crate::classify::{Classifier, RouteClass};
use crate::clients::ClientHost;
use crate::context::WorkerContext;
use crate::error::Result;
use crate::lifecycle::{ActivationReport, Lifecycle, ServiceWorkerState, WorkerEvent};
use crate::network::Network;
use crate::notify::{ClickOutcome, Notification, NotificationBridge};
use crate::registration::Registration;
use crate::request::Request;
use crate::strategy::{FetchResult, StrategyExecutor};

/// Events delivered by the host.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
    Push { payload: Option<Bytes> },
    NotificationClick(Notification),
}

/// Result of handling a [`HostEvent`].
#[derive(Debug)]
pub enum EventOutcome {
    Installed,
    Activated(ActivationReport),
    Fetch(FetchResult),
    Sync { handled: bool },
    Push(Option<Notification>),
    NotificationClick(ClickOutcome),
}

/// The interception router: one worker version.
pub struct Router {
    ctx: WorkerContext,
    classifier: Classifier,
    strategies: StrategyExecutor,
    lifecycle: Lifecycle,
    notifications: NotificationBridge,
}

impl Router {
    /// Create a router. Lifecycle events are published on the returned receiver.
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientHost>,
        registration: Arc<dyn Registration>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        let ctx = WorkerContext::new(config, caches, network)?;
        let classifier = Classifier::from_config(&ctx.config)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let router = Self {
            strategies: StrategyExecutor::new(ctx.clone()),
            lifecycle: Lifecycle::new(ctx.clone(), clients.clone(), registration.clone(), event_tx),
            notifications: NotificationBridge::new(
                ctx.config.notifications.clone(),
                ctx.scope.clone(),
                registration,
                clients,
            ),
            classifier,
            ctx,
        };
        info!(cache = %router.ctx.cache_name(), scope = %router.ctx.scope, "Router created");
        Ok((router, event_rx))
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> &str {
        self.ctx.cache_name()
    }

    /// Lifecycle state.
    pub async fn state(&self) -> ServiceWorkerState {
        self.lifecycle.state().await
    }

    /// Handle one host event.
    pub async fn dispatch(&self, event: HostEvent) -> Result<EventOutcome> {
        match event {
            HostEvent::Install => {
                self.install().await?;
                Ok(EventOutcome::Installed)
            }
            HostEvent::Activate => Ok(EventOutcome::Activated(self.activate().await?)),
            HostEvent::Fetch(request) => Ok(EventOutcome::Fetch(self.fetch(&request).await)),
            HostEvent::Sync { tag } => Ok(EventOutcome::Sync {
                handled: self.sync(&tag),
            }),
            HostEvent::Push { payload } => {
                Ok(EventOutcome::Push(self.push(payload.as_deref()).await?))
            }
            HostEvent::NotificationClick(notification) => Ok(EventOutcome::NotificationClick(
                self.notification_click(&notification).await?,
            )),
        }
    }

    pub async fn install(&self) -> Result<()> {
        self.lifecycle.install().await
    }

    pub async fn activate(&self) -> Result<ActivationReport> {
        self.lifecycle.activate().await
    }

    /// Classify `request` and run its strategy.
    pub async fn fetch(&self, request: &Request) -> FetchResult {
        let class = self.classify(request);
        let span = info_span!("fetch", url = %request.url, class = ?class);
        async {
            if class == RouteClass::ExternalApi {
                debug!("Bypassed");
            }
            self.strategies.execute(class, request).await
        }
        .instrument(span)
        .await
    }

    pub fn classify(&self, request: &Request) -> RouteClass {
        self.classifier.classify(request)
    }

    /// Background sync hook. Returns whether the tag is ours.
    pub fn sync(&self, tag: &str) -> bool {
        let handled = tag == self.ctx.config.sync_tag;
        if handled {
            info!(tag, "Background sync triggered");
        }
        handled
    }

    pub async fn push(&self, payload: Option<&[u8]>) -> Result<Option<Notification>> {
        self.notifications.on_push(payload).await
    }

    pub async fn notification_click(&self, notification: &Notification) -> Result<ClickOutcome> {
        self.notifications.on_notification_click(notification).await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("ctx", &self.ctx)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}
