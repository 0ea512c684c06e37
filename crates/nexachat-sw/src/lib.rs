//! # NexaChat Service Worker
//!
//! Request interception and offline support for the NexaChat web app.
//!
//! ## Features
//!
//! - **Lifecycle**: install (precache), activate (drop stale generations, claim clients)
//! - **Routing**: API bypass, stale-while-revalidate for fonts, cache-first for
//!   the app and navigations, network-first for everything else
//! - **Offline**: app shell for navigations, `503 Offline` for subresources
//! - **Notifications**: push → notification, click → focus or open a window
//!
//! ## Architecture
//!
//! ```text
//! Router (HostEvent dispatch)
//!     ├── Lifecycle ─────────── install / activate
//!     ├── Classifier ────────── RouteClass
//!     ├── StrategyExecutor ──── CacheStorage + Network
//!     └── NotificationBridge ── Registration + ClientHost
//! ```
//!
//! Caches, network, clients and the registration are capabilities supplied
//! by the host; in-memory versions are included.

pub mod cache;
pub mod classify;
pub mod clients;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod notify;
pub mod registration;
pub mod request;
pub mod response;
pub mod router;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use cache::{Cache, CacheEntry, CacheStorage, MemoryCache, MemoryCacheStorage};
pub use classify::{Classifier, RouteClass};
pub use clients::{Client, ClientHost, ClientType, Clients};
pub use context::WorkerContext;
pub use error::{Result, ServiceWorkerError};
pub use lifecycle::{ActivationReport, Lifecycle, ServiceWorkerState, WorkerEvent};
pub use network::{HttpNetwork, LoaderConfig, Network, NetworkError};
pub use notify::{
    ClickOutcome, Notification, NotificationBridge, NotificationData, NotificationOptions,
};
pub use registration::{MemoryRegistration, Registration};
pub use request::{Request, RequestMode};
pub use response::{Response, ResponseType};
pub use router::{EventOutcome, HostEvent, Router};
pub use strategy::{BackgroundRefresh, FetchResult, Reply, StrategyExecutor};
