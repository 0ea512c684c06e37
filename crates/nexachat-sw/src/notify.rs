//! Push messages and notification clicks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nexachat_core::NotificationSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use url::Url;

use crate::clients::{Client, ClientHost, ClientType};
use crate::error::Result;
use crate::registration::Registration;

/// Data attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Page to bring up when the notification is clicked.
    pub url: String,
}

/// Presentation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub options: NotificationOptions,
}

impl Notification {
    pub fn new(title: impl Into<String>, options: NotificationOptions) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            title: title.into(),
            options,
        }
    }
}

/// Result of handling a notification click.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// An open window already showed the URL and was focused.
    Focused(Client),
    /// A new window was opened.
    Opened(Client),
    /// No matching window and the host cannot open one.
    Unsupported,
}

/// Turns push messages into notifications and clicks into windows.
pub struct NotificationBridge {
    settings: NotificationSettings,
    scope: Url,
    registration: Arc<dyn Registration>,
    clients: Arc<dyn ClientHost>,
}

impl NotificationBridge {
    pub fn new(
        settings: NotificationSettings,
        scope: Url,
        registration: Arc<dyn Registration>,
        clients: Arc<dyn ClientHost>,
    ) -> Self {
        Self {
            settings,
            scope,
            registration,
            clients,
        }
    }

    /// Show a notification for a push message.
    ///
    /// Returns `Ok(None)` when the push carried no payload. Missing, empty or
    /// non-string `title`, `body` and `url` fields take the configured
    /// defaults.
    pub async fn on_push(&self, payload: Option<&[u8]>) -> Result<Option<Notification>> {
        let Some(payload) = payload else {
            debug!("Push without payload ignored");
            return Ok(None);
        };
        let data: JsonValue = serde_json::from_slice(payload)?;

        let title = field(&data, "title").unwrap_or(&self.settings.default_title);
        let body = field(&data, "body").unwrap_or(&self.settings.default_body);
        let url = field(&data, "url").unwrap_or(&self.settings.default_url);

        let notification = Notification::new(
            title,
            NotificationOptions {
                body: body.to_string(),
                icon: self.settings.icon.clone(),
                badge: self.settings.badge.clone(),
                vibrate: self.settings.vibrate.clone(),
                data: NotificationData {
                    url: url.to_string(),
                },
            },
        );
        self.registration.show_notification(&notification).await?;
        info!(title = %notification.title, url = %notification.options.data.url, "Notification shown");
        Ok(Some(notification))
    }

    /// Close the notification, then focus a window already at its URL or
    /// open a new one.
    pub async fn on_notification_click(&self, notification: &Notification) -> Result<ClickOutcome> {
        self.registration.close_notification(notification).await?;

        let target = self.scope.join(&notification.options.data.url)?;
        let windows = self.clients.match_all(ClientType::Window).await?;
        if let Some(existing) = windows.into_iter().find(|c| c.url == target) {
            let focused = self.clients.focus(&existing.id).await?;
            debug!(client = %focused.id, url = %target, "Focused existing window");
            return Ok(ClickOutcome::Focused(focused));
        }

        if !self.clients.supports_open_window() {
            debug!(url = %target, "Host cannot open windows");
            return Ok(ClickOutcome::Unsupported);
        }
        let opened = self.clients.open_window(&target).await?;
        Ok(ClickOutcome::Opened(opened))
    }
}

impl std::fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("settings", &self.settings)
            .field("scope", &self.scope.as_str())
            .finish_non_exhaustive()
    }
}

/// A non-empty string field.
fn field<'a>(data: &'a JsonValue, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}
