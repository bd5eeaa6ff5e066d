//! Push payloads and notification display.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::WorkerConfig;
use crate::ServiceWorkerError;

pub const DEFAULT_TITLE: &str = "SplitFriend";
pub const DEFAULT_BODY: &str = "You have a new notification";
pub const DEFAULT_URL: &str = "/dashboard";

/// Action id that only clears the notification.
pub const ACTION_DISMISS: &str = "dismiss";
/// Action id that opens the target URL.
pub const ACTION_OPEN: &str = "open";

/// Decoded push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_body() -> String {
    DEFAULT_BODY.to_string()
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

impl Default for NotificationPayload {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            url: default_url(),
        }
    }
}

impl NotificationPayload {
    /// Decode a push body, substituting `fallback` when there is no body or it
    /// is not a JSON payload. Never fails.
    pub fn decode(data: Option<&[u8]>, fallback: &NotificationPayload) -> Self {
        let Some(data) = data else {
            return fallback.clone();
        };
        match serde_json::from_slice::<NotificationPayload>(data) {
            Ok(mut payload) => {
                if payload.url.is_empty() {
                    payload.url = fallback.url.clone();
                }
                payload
            }
            Err(e) => {
                warn!(error = %e, "Error parsing push data");
                fallback.clone()
            }
        }
    }
}

/// Button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Data carried with a notification, read back on click.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// Display options for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl NotificationOptions {
    /// Options for `payload` with the worker's fixed icon, badge, vibration
    /// and open/dismiss actions.
    pub fn for_payload(payload: &NotificationPayload, config: &WorkerConfig) -> Self {
        Self {
            body: payload.body.clone(),
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            vibrate: config.vibrate.clone(),
            data: NotificationData {
                url: payload.url.clone(),
            },
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: "Open".to_string(),
                },
                NotificationAction {
                    action: ACTION_DISMISS.to_string(),
                    title: "Dismiss".to_string(),
                },
            ],
        }
    }
}

/// Unique identifier for a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub options: NotificationOptions,
}

/// System notification surface (`registration.showNotification`).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Display a notification.
    async fn show(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<Notification, ServiceWorkerError>;

    /// Remove a notification. Closing one that is already gone is a no-op.
    async fn close(&self, id: NotificationId);
}

/// In-process notification surface.
#[derive(Debug, Default)]
pub struct NotificationTray {
    shown: RwLock<Vec<Notification>>,
}

impl NotificationTray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently displayed, oldest first.
    pub async fn displayed(&self) -> Vec<Notification> {
        self.shown.read().await.clone()
    }
}

#[async_trait]
impl Notifier for NotificationTray {
    async fn show(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<Notification, ServiceWorkerError> {
        let notification = Notification {
            id: NotificationId::new(),
            title: title.to_string(),
            options,
        };
        self.shown.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn close(&self, id: NotificationId) {
        self.shown.write().await.retain(|n| n.id != id);
    }
}
