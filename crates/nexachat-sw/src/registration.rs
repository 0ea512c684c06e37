//! Registration capability: skip-waiting and the notification surface.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::notify::Notification;

/// Host side of `self.registration` and `self.skipWaiting()`.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Activate the installed worker without waiting for old pages to close.
    async fn skip_waiting(&self) -> Result<()>;

    /// Display a notification.
    async fn show_notification(&self, notification: &Notification) -> Result<()>;

    /// Dismiss a displayed notification.
    async fn close_notification(&self, notification: &Notification) -> Result<()>;
}

/// Registration that records what it was asked to do.
#[derive(Debug, Default)]
pub struct MemoryRegistration {
    skip_waiting: AtomicBool,
    shown: RwLock<Vec<Notification>>,
}

impl MemoryRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `skip_waiting` was called.
    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Notifications currently displayed.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.shown.read().await.clone()
    }
}

#[async_trait]
impl Registration for MemoryRegistration {
    async fn skip_waiting(&self) -> Result<()> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        self.shown.write().await.push(notification.clone());
        Ok(())
    }

    async fn close_notification(&self, notification: &Notification) -> Result<()> {
        self.shown.write().await.retain(|n| n.id != notification.id);
        Ok(())
    }
}
