//! Push subscription: server API client and the subscribe/unsubscribe flow.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use splitfriend_common::SplitFriendError;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::session::ClientSession;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Push notifications are not supported")]
    NotSupported,

    #[error("Push notifications are disabled on the server")]
    ServerDisabled,

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Invalid application server key: {0}")]
    InvalidKey(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Server returned HTTP {status}")]
    Server { status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl PushError {
    /// Text for the toast shown when a flow aborts.
    pub fn user_message(&self) -> String {
        match self {
            PushError::NotSupported => "Push notifications are not supported in this browser".into(),
            PushError::ServerDisabled => "Push notifications are not enabled on the server".into(),
            PushError::PermissionDenied => "Notification permission denied".into(),
            other => format!("Failed to update push notifications: {}", other),
        }
    }
}

impl From<PushError> for SplitFriendError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::Http(e) => SplitFriendError::network_with_source("push API", e),
            other => SplitFriendError::InvalidArgument(other.to_string()),
        }
    }
}

// ==================== Wire types ====================

/// `GET /api/push/status`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub push_enabled: bool,
    pub is_subscribed: bool,
}

/// `GET /api/push/vapid-public-key`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKey {
    pub enabled: bool,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// `POST /api/push/subscribe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// `POST /api/push/unsubscribe`. Without an endpoint the server drops every
/// subscription of the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

// ==================== Server API ====================

/// Client for the server's push endpoints.
#[derive(Debug, Clone)]
pub struct PushApi {
    client: reqwest::Client,
    base_url: Url,
}

impl PushApi {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub async fn status(&self) -> Result<ServerStatus, PushError> {
        let response = self.client.get(self.url("/api/push/status")?).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn vapid_public_key(&self) -> Result<VapidKey, PushError> {
        let response = self
            .client
            .get(self.url("/api/push/vapid-public-key")?)
            .send()
            .await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn subscribe(&self, request: &SubscribeRequest) -> Result<(), PushError> {
        let response = self
            .client
            .post(self.url("/api/push/subscribe")?)
            .json(request)
            .send()
            .await?;
        check(response)?;
        Ok(())
    }

    pub async fn unsubscribe(&self, endpoint: Option<&str>) -> Result<(), PushError> {
        let body = UnsubscribeRequest {
            endpoint: endpoint.map(str::to_string),
        };
        let response = self
            .client
            .post(self.url("/api/push/unsubscribe")?)
            .json(&body)
            .send()
            .await?;
        check(response)?;
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url, PushError> {
        Ok(self.base_url.join(path)?)
    }
}

fn check(response: reqwest::Response) -> Result<reqwest::Response, PushError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PushError::Server {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

// ==================== Platform ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Default,
}

/// A browser push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    pub p256dh: Vec<u8>,
    pub auth: Vec<u8>,
}

impl PushSubscription {
    /// Subscribe body, with key bytes in standard base64.
    pub fn to_request(&self) -> SubscribeRequest {
        SubscribeRequest {
            endpoint: self.endpoint.clone(),
            keys: SubscriptionKeys {
                p256dh: STANDARD.encode(&self.p256dh),
                auth: STANDARD.encode(&self.auth),
            },
        }
    }
}

/// Browser push facilities: permission prompt and the push manager of the
/// active worker registration.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Whether service workers and push are available at all.
    fn supports_push(&self) -> bool;

    async fn request_permission(&self) -> Permission;

    async fn subscribe(&self, application_server_key: &[u8]) -> Result<PushSubscription, PushError>;

    /// Current subscription, if any.
    async fn subscription(&self) -> Option<PushSubscription>;

    /// Drop the current subscription. Returns whether there was one.
    async fn unsubscribe(&self) -> Result<bool, PushError>;
}

/// Decode a VAPID public key from URL-safe base64, padding optional.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, PushError> {
    URL_SAFE_NO_PAD
        .decode(key.trim().trim_end_matches('='))
        .map_err(|e| PushError::InvalidKey(e.to_string()))
}

// ==================== Status ====================

/// What the push settings panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    NotSupported,
    ServerDisabled,
    Subscribed,
    NotSubscribed,
    Error(String),
}

impl PushStatus {
    pub fn label(&self) -> &str {
        match self {
            PushStatus::NotSupported => "Push notifications are not supported in this browser",
            PushStatus::ServerDisabled => "Push notifications are disabled by the server",
            PushStatus::Subscribed => "Push notifications are enabled",
            PushStatus::NotSubscribed => "Push notifications are disabled",
            PushStatus::Error(_) => "Error checking push notification status",
        }
    }
}

// ==================== Manager ====================

/// Drives subscribe and unsubscribe, reporting every outcome as a toast.
pub struct PushSubscriptionManager {
    api: PushApi,
    platform: Arc<dyn PushPlatform>,
}

impl PushSubscriptionManager {
    pub fn new(api: PushApi, platform: Arc<dyn PushPlatform>) -> Self {
        Self { api, platform }
    }

    pub async fn status(&self) -> PushStatus {
        if !self.platform.supports_push() {
            return PushStatus::NotSupported;
        }
        match self.api.status().await {
            Ok(status) if !status.push_enabled => PushStatus::ServerDisabled,
            Ok(status) if status.is_subscribed => PushStatus::Subscribed,
            Ok(_) => PushStatus::NotSubscribed,
            Err(e) => {
                warn!(error = %e, "Error checking push status");
                PushStatus::Error(e.to_string())
            }
        }
    }

    /// Subscribe this browser. Each step gates the next; the first failing
    /// step aborts with a toast.
    pub async fn subscribe(&self, session: &mut ClientSession) -> Result<PushSubscription, PushError> {
        match self.try_subscribe(session).await {
            Ok(subscription) => {
                info!(endpoint = %subscription.endpoint, "Subscribed to push notifications");
                session.toaster.show("Push notifications enabled!");
                Ok(subscription)
            }
            Err(e) => {
                warn!(error = %e, "Push subscription aborted");
                session.toaster.show(e.user_message());
                Err(e)
            }
        }
    }

    async fn try_subscribe(&self, session: &mut ClientSession) -> Result<PushSubscription, PushError> {
        if !self.platform.supports_push() {
            return Err(PushError::NotSupported);
        }

        let key = match session.vapid_public_key() {
            Some(key) => key.to_string(),
            None => {
                let vapid = self.api.vapid_public_key().await?;
                if !vapid.enabled || vapid.public_key.is_empty() {
                    return Err(PushError::ServerDisabled);
                }
                session.set_vapid_public_key(vapid.public_key.clone());
                vapid.public_key
            }
        };

        if self.platform.request_permission().await != Permission::Granted {
            return Err(PushError::PermissionDenied);
        }

        let key = decode_application_server_key(&key)?;
        let subscription = self.platform.subscribe(&key).await?;
        debug!(endpoint = %subscription.endpoint, "Browser subscription created");

        self.api.subscribe(&subscription.to_request()).await?;
        Ok(subscription)
    }

    /// Unsubscribe locally, then tell the server to prune.
    pub async fn unsubscribe(&self, session: &mut ClientSession) -> Result<(), PushError> {
        match self.try_unsubscribe().await {
            Ok(()) => {
                info!("Unsubscribed from push notifications");
                session.toaster.show("Push notifications disabled");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Push unsubscribe failed");
                session.toaster.show(e.user_message());
                Err(e)
            }
        }
    }

    async fn try_unsubscribe(&self) -> Result<(), PushError> {
        let endpoint = match self.platform.subscription().await {
            Some(subscription) => {
                self.platform.unsubscribe().await?;
                Some(subscription.endpoint)
            }
            None => None,
        };
        self.api.unsubscribe(endpoint.as_deref()).await
    }
}
