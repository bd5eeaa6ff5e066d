//! Worker configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::notification::NotificationPayload;
use crate::ServiceWorkerError;

/// Cache generation used by the shipped worker.
pub const DEFAULT_CACHE_NAME: &str = "splitfriend-v1";

/// Assets precached at install time, in order.
pub const STATIC_ASSETS: [&str; 5] = [
    "/css/style.css",
    "/js/app.js",
    "/manifest.json",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

/// Page served to failed navigations when nothing better is cached.
pub const OFFLINE_PAGE: &str = "/offline.html";

/// Icon and badge shown on push notifications.
pub const NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";

/// Configuration of one worker version.
///
/// Two configs that compare equal describe the same worker code; registering
/// an equal config again is not an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin the worker serves. Requests to other origins pass through.
    pub origin: Url,

    /// Version tag of the current cache generation.
    pub cache_name: String,

    /// Manifest populated at install time, all or nothing.
    pub static_assets: Vec<String>,

    /// Fallback for failed navigations.
    ///
    /// Not part of `static_assets`, so it is only served if something else
    /// put it in a cache.
    pub offline_page: String,

    /// Notification icon.
    pub icon: String,

    /// Notification badge.
    pub badge: String,

    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,

    /// Payload used when a push carries no usable data.
    pub default_notification: NotificationPayload,
}

impl WorkerConfig {
    /// Shipped configuration for `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            static_assets: STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            offline_page: OFFLINE_PAGE.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_ICON.to_string(),
            vibrate: vec![100, 50, 100],
            default_notification: NotificationPayload::default(),
        }
    }

    /// Use a different cache generation.
    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = cache_name.into();
        self
    }

    /// Replace the install manifest.
    pub fn with_static_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve a path (or absolute URL) against the worker origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ServiceWorkerError> {
        self.origin
            .join(path)
            .map_err(|e| ServiceWorkerError::NotFound(format!("{}: {}", path, e)))
    }

    /// Whether `url` belongs to the worker's origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}
