//! Worker configuration

use std::path::Path;

use anyhow::Context;
use nexachat_common::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, CoreResult};

/// Service worker configuration.
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name of the current cache generation
    pub cache_name: String,

    /// Worker scope; its origin is the worker's own origin
    pub scope: String,

    /// Offline shell served to failed navigations, relative to the scope
    pub offline_url: String,

    /// Assets stored at install time, relative to the scope
    pub precache: Vec<String>,

    /// Host whose requests are never intercepted
    pub api_host: String,

    /// Font provider host markers (exactly two)
    pub font_hosts: Vec<String>,

    /// Background sync tag the worker listens for
    pub sync_tag: String,

    /// Push notification presentation
    pub notifications: NotificationSettings,

    /// Log output
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Title used when a push payload has none
    pub default_title: String,

    /// Body used when a push payload has none
    pub default_body: String,

    /// URL attached when a push payload has none
    pub default_url: String,

    /// Notification icon path
    pub icon: String,

    /// Notification badge path
    pub badge: String,

    /// Vibration pattern in milliseconds
    pub vibrate: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level used when no filter is given
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Full `EnvFilter` directive, overrides `level`
    pub filter: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "nexachat-v1.0.0".to_string(),
            scope: "https://nexachat.app/".to_string(),
            offline_url: "./index.html".to_string(),
            precache: vec![
                "./index.html".to_string(),
                "./manifest.json".to_string(),
                "./icons/icon-192x192.png".to_string(),
                "./icons/icon-512x512.png".to_string(),
                "./icons/apple-touch-icon.png".to_string(),
                "./icons/favicon-32x32.png".to_string(),
            ],
            api_host: "api.anthropic.com".to_string(),
            font_hosts: vec![
                "fonts.googleapis.com".to_string(),
                "fonts.gstatic.com".to_string(),
            ],
            sync_tag: "nexachat-sync".to_string(),
            notifications: NotificationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            default_title: "NexaChat".to_string(),
            default_body: "You have a new message".to_string(),
            default_url: "./".to_string(),
            icon: "./icons/icon-192x192.png".to_string(),
            badge: "./icons/icon-72x72.png".to_string(),
            vibrate: vec![100, 50, 100],
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            filter: None,
        }
    }
}

impl LoggingSettings {
    /// Build the subscriber configuration for these settings.
    pub fn to_log_config(&self) -> LogConfig {
        let directive = self.filter.clone().unwrap_or_else(|| self.level.clone());
        LogConfig::default()
            .with_format(self.format)
            .with_filter(directive)
    }
}

impl WorkerConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, then apply `NEXACHAT_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading worker config {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        log::info!("Loaded worker config from {} ({})", path.display(), config.cache_name);
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NEXACHAT_CACHE_NAME") {
            log::debug!("Cache name overridden: {v}");
            self.cache_name = v;
        }
        if let Some(v) = lookup("NEXACHAT_SCOPE") {
            self.scope = v;
        }
        if let Some(v) = lookup("NEXACHAT_OFFLINE_URL") {
            self.offline_url = v;
        }
        if let Some(v) = lookup("NEXACHAT_API_HOST") {
            self.api_host = v;
        }
        if let Some(v) = lookup("NEXACHAT_LOG") {
            self.logging.filter = Some(v);
        }
    }

    /// Check that the configuration can drive a worker.
    pub fn validate(&self) -> CoreResult<()> {
        if self.cache_name.trim().is_empty() {
            return Err(CoreError::config("cache_name must not be empty"));
        }
        if self.api_host.trim().is_empty() {
            return Err(CoreError::config("api_host must not be empty"));
        }
        if self.font_hosts.len() != 2 || self.font_hosts[0] == self.font_hosts[1] {
            return Err(CoreError::config(
                "font_hosts must name exactly two distinct hosts",
            ));
        }
        if self.font_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(CoreError::config("font_hosts must not contain empty entries"));
        }
        self.resolve(&self.offline_url)?;
        for path in &self.precache {
            self.resolve(path)?;
        }
        Ok(())
    }

    /// Parsed worker scope.
    pub fn scope_url(&self) -> CoreResult<Url> {
        let scope = Url::parse(&self.scope)?;
        if scope.cannot_be_a_base() {
            return Err(CoreError::config(format!(
                "scope '{}' cannot be used as a base URL",
                self.scope
            )));
        }
        Ok(scope)
    }

    /// Resolve a path relative to the scope.
    pub fn resolve(&self, path: &str) -> CoreResult<Url> {
        Ok(self.scope_url()?.join(path)?)
    }
}
