//! Clients API: the pages a worker controls.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{Result, ServiceWorkerError};

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// A client (controlled page).
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Client type.
    pub client_type: ClientType,

    /// Whether focused.
    pub focused: bool,

    /// Whether this worker controls the client.
    pub controlled: bool,
}

impl Client {
    /// Create an uncontrolled window client.
    pub fn window(id: impl Into<String>, url: Url) -> Self {
        Self {
            id: id.into(),
            url,
            client_type: ClientType::Window,
            focused: false,
            controlled: false,
        }
    }
}

/// Host side of the Clients API.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// All clients of the given type (`All` matches everything).
    async fn match_all(&self, client_type: ClientType) -> Result<Vec<Client>>;

    /// Focus a window client.
    async fn focus(&self, id: &str) -> Result<Client>;

    /// Whether `open_window` is available on this host.
    fn supports_open_window(&self) -> bool;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &Url) -> Result<Client>;

    /// Take control of every open client.
    async fn claim(&self) -> Result<usize>;
}

// ==================== In-memory Clients ====================

/// In-memory clients registry.
#[derive(Debug)]
pub struct Clients {
    clients: RwLock<HashMap<String, Client>>,
    can_open_windows: bool,
}

impl Default for Clients {
    fn default() -> Self {
        Self::new()
    }
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            can_open_windows: true,
        }
    }

    /// Create a manager whose host cannot open windows.
    pub fn without_open_window() -> Self {
        Self {
            can_open_windows: false,
            ..Self::new()
        }
    }

    /// Get a client by ID.
    pub async fn get(&self, id: &str) -> Option<Client> {
        self.clients.read().await.get(id).cloned()
    }

    /// Add a client.
    pub async fn add(&self, client: Client) {
        self.clients.write().await.insert(client.id.clone(), client);
    }

    /// Remove a client.
    pub async fn remove(&self, id: &str) -> Option<Client> {
        self.clients.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[async_trait]
impl ClientHost for Clients {
    async fn match_all(&self, client_type: ClientType) -> Result<Vec<Client>> {
        let clients = self.clients.read().await;
        let mut matched: Vec<Client> = clients
            .values()
            .filter(|c| match client_type {
                ClientType::All => true,
                t => c.client_type == t,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn focus(&self, id: &str) -> Result<Client> {
        let mut clients = self.clients.write().await;
        let target = clients
            .get(id)
            .ok_or_else(|| ServiceWorkerError::client(format!("No client with id {id}")))?;
        if target.client_type != ClientType::Window {
            return Err(ServiceWorkerError::client("Can only focus window clients"));
        }

        for client in clients.values_mut() {
            client.focused = client.id == id;
        }
        clients
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceWorkerError::client(format!("No client with id {id}")))
    }

    fn supports_open_window(&self) -> bool {
        self.can_open_windows
    }

    async fn open_window(&self, url: &Url) -> Result<Client> {
        if !self.can_open_windows {
            return Err(ServiceWorkerError::client("openWindow is not supported"));
        }

        let mut client = Client::window(format!("client-{}", next_client_id()), url.clone());
        client.focused = true;
        client.controlled = true;

        let mut clients = self.clients.write().await;
        for other in clients.values_mut() {
            other.focused = false;
        }
        clients.insert(client.id.clone(), client.clone());
        debug!(client = %client.id, url = %url, "Opened window");
        Ok(client)
    }

    async fn claim(&self) -> Result<usize> {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for client in clients.values_mut().filter(|c| !c.controlled) {
            client.controlled = true;
            claimed += 1;
        }
        Ok(claimed)
    }
}

fn next_client_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
