//! Install and activate.
//!
//! Install fetches the whole precache list before it touches the cache, so a
//! failed install leaves no generation behind. Activate deletes every other
//! generation and claims the open clients.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::clients::ClientHost;
use crate::context::WorkerContext;
use crate::error::{Result, ServiceWorkerError};
use crate::registration::Registration;
use crate::request::Request;
use crate::response::Response;

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Created, not installed yet.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed, precache complete.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Install failed; the previous version stays live.
    Redundant,
}

/// Notifications about lifecycle progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// State changed.
    StateChange { state: ServiceWorkerState },
    /// A stale cache generation was deleted.
    CacheDeleted { name: String },
    /// Clients were claimed during activation.
    ClientsClaimed { count: usize },
}

/// What activation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Generations deleted.
    pub deleted: Vec<String>,
    /// Generations whose deletion failed.
    pub failed: Vec<String>,
    /// Clients newly claimed.
    pub claimed: usize,
}

/// Drives install and activate for one worker version.
pub struct Lifecycle {
    ctx: WorkerContext,
    clients: Arc<dyn ClientHost>,
    registration: Arc<dyn Registration>,
    state: RwLock<ServiceWorkerState>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Lifecycle {
    pub fn new(
        ctx: WorkerContext,
        clients: Arc<dyn ClientHost>,
        registration: Arc<dyn Registration>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            ctx,
            clients,
            registration,
            state: RwLock::new(ServiceWorkerState::Parsed),
            events,
        }
    }

    /// Current state.
    pub async fn state(&self) -> ServiceWorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: ServiceWorkerState) {
        *self.state.write().await = state;
        let _ = self.events.send(WorkerEvent::StateChange { state });
    }

    /// Precache every asset, then ask to be activated right away.
    ///
    /// Allowed from `Parsed`, and from `Redundant` so the host can retry.
    pub async fn install(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !matches!(
                *state,
                ServiceWorkerState::Parsed | ServiceWorkerState::Redundant
            ) {
                return Err(ServiceWorkerError::state(format!(
                    "Cannot install from state {:?}",
                    *state
                )));
            }
            *state = ServiceWorkerState::Installing;
        }
        let _ = self.events.send(WorkerEvent::StateChange {
            state: ServiceWorkerState::Installing,
        });
        info!(cache = %self.ctx.cache_name(), "Installing worker");

        if let Err(e) = self.precache().await {
            error!(error = %e, "Precache failed");
            self.set_state(ServiceWorkerState::Redundant).await;
            return Err(e);
        }

        self.set_state(ServiceWorkerState::Installed).await;
        if let Err(e) = self.registration.skip_waiting().await {
            warn!(error = %e, "skip_waiting failed");
        }
        info!(cache = %self.ctx.cache_name(), "Install complete");
        Ok(())
    }

    async fn precache(&self) -> Result<()> {
        let fetches = self.ctx.config.precache.iter().map(|path| self.fetch_asset(path));
        let assets = try_join_all(fetches).await?;

        let name = self.ctx.cache_name();
        let existed = self.ctx.caches.has(name).await?;
        let cache = self.ctx.caches.open(name).await?;
        for (request, response) in assets {
            if let Err(e) = cache.put(&request, response).await {
                if !existed {
                    let _ = self.ctx.caches.delete(name).await;
                }
                return Err(e);
            }
        }
        debug!(cache = %name, count = self.ctx.config.precache.len(), "Precache stored");
        Ok(())
    }

    async fn fetch_asset(&self, path: &str) -> Result<(Request, Response)> {
        let url = self.ctx.resolve(path)?;
        let request = Request::get(url);
        let response = self
            .ctx
            .network
            .fetch(&request)
            .await
            .map_err(|e| ServiceWorkerError::PrecacheFetch {
                url: request.url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.ok() {
            return Err(ServiceWorkerError::PrecacheFetch {
                url: request.url.to_string(),
                reason: format!("status {}", response.status),
            });
        }
        Ok((request, response))
    }

    /// Delete stale generations and claim clients, concurrently.
    ///
    /// Allowed from `Installed`, and again from `Activated`.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let current = self.state().await;
        match current {
            ServiceWorkerState::Installed => {
                self.set_state(ServiceWorkerState::Activating).await;
            }
            ServiceWorkerState::Activated => {}
            other => {
                return Err(ServiceWorkerError::state(format!(
                    "Cannot activate from state {other:?}"
                )));
            }
        }
        info!(cache = %self.ctx.cache_name(), "Activating worker");

        let (mut report, claimed) =
            tokio::join!(self.remove_stale_generations(), self.clients.claim());

        match claimed {
            Ok(count) => {
                report.claimed = count;
                let _ = self.events.send(WorkerEvent::ClientsClaimed { count });
            }
            Err(e) => warn!(error = %e, "Failed to claim clients"),
        }

        if current != ServiceWorkerState::Activated {
            self.set_state(ServiceWorkerState::Activated).await;
        }
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            claimed = report.claimed,
            "Activation complete"
        );
        Ok(report)
    }

    async fn remove_stale_generations(&self) -> ActivationReport {
        let mut report = ActivationReport::default();
        let names = match self.ctx.caches.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list caches");
                return report;
            }
        };

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| name != self.ctx.cache_name())
            .collect();
        let results = join_all(stale.iter().map(|name| {
            debug!(cache = %name, "Deleting old cache");
            self.ctx.caches.delete(name)
        }))
        .await;

        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    let _ = self.events.send(WorkerEvent::CacheDeleted { name: name.clone() });
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to delete old cache");
                    report.failed.push(name);
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}
