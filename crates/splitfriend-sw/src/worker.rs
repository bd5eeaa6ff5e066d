//! The offline cache worker: event handlers for one worker version.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use splitfriend_net::{Fetcher, Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, info, trace};

use crate::cache::CacheStorage;
use crate::clients::{ClientMatchOptions, ClientType, Clients};
use crate::config::WorkerConfig;
use crate::lifecycle::ServiceWorkerId;
use crate::notification::{
    Notification, NotificationOptions, NotificationPayload, Notifier, ACTION_DISMISS,
};
use crate::routing::{Bypass, Route};
use crate::tasks::ExtendableTasks;
use crate::{Client, ServiceWorkerError};

/// Host facilities shared by every worker version of an origin.
#[derive(Clone)]
pub struct WorkerHost {
    pub caches: Arc<RwLock<CacheStorage>>,
    pub clients: Arc<RwLock<Clients>>,
    pub fetcher: Arc<dyn Fetcher>,
    pub notifier: Arc<dyn Notifier>,
}

impl WorkerHost {
    /// Host with empty cache storage and no clients.
    pub fn new(fetcher: Arc<dyn Fetcher>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            caches: Arc::new(RwLock::new(CacheStorage::new())),
            clients: Arc::new(RwLock::new(Clients::new())),
            fetcher,
            notifier,
        }
    }
}

/// Where a response handed to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    OfflinePage,
}

/// Result of a fetch event.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the page goes to the network itself.
    Passthrough(Bypass),
    /// The worker answered.
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl FetchOutcome {
    fn network(response: Response) -> Self {
        FetchOutcome::Respond {
            response,
            source: ResponseSource::Network,
        }
    }

    fn cache(response: Response) -> Self {
        FetchOutcome::Respond {
            response,
            source: ResponseSource::Cache,
        }
    }
}

/// Result of a notification click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Dismiss action: closed, nothing else.
    Dismissed,
    /// An existing window was navigated and focused.
    Focused(Client),
    /// No window was open; a new one was opened.
    Opened(Client),
}

/// One version of the offline cache worker.
pub struct OfflineWorker {
    id: ServiceWorkerId,
    config: Arc<WorkerConfig>,
    host: WorkerHost,
    tasks: ExtendableTasks,
    skip_waiting: AtomicBool,
}

impl OfflineWorker {
    /// Create a worker version.
    pub fn new(config: WorkerConfig, host: WorkerHost) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            config: Arc::new(config),
            host,
            tasks: ExtendableTasks::new(),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Whether install asked to skip the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }

    /// Wait for all background work (cache writes, refreshes) to finish.
    pub async fn settle(&self) -> usize {
        self.tasks.settle().await
    }

    // ==================== Lifecycle ====================

    /// Install event: precache the whole manifest or nothing.
    pub async fn install(&self) -> Result<(), ServiceWorkerError> {
        info!(cache = %self.config.cache_name, "Installing service worker");

        self.host.caches.write().await.open(&self.config.cache_name);

        let fetches = self.config.static_assets.iter().map(|path| async move {
            let request = Request::get(self.config.resolve(path)?);
            let response = self
                .host
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| ServiceWorkerError::InstallFailed(format!("{}: {}", path, e)))?;
            if !response.ok() {
                return Err(ServiceWorkerError::InstallFailed(format!(
                    "{}: HTTP {}",
                    path, response.status
                )));
            }
            Ok((request, response))
        });
        let entries = try_join_all(fetches).await?;

        debug!(count = entries.len(), "Caching static assets");
        self.host
            .caches
            .write()
            .await
            .open(&self.config.cache_name)
            .put_all(entries)
            .map_err(|e| ServiceWorkerError::InstallFailed(e.to_string()))?;

        self.skip_waiting.store(true, Ordering::Release);
        Ok(())
    }

    /// Activate event: drop stale cache generations, then claim open pages.
    /// Returns the IDs of clients that changed controller.
    pub async fn activate(&self) -> Vec<String> {
        info!(cache = %self.config.cache_name, "Activating service worker");

        {
            let mut caches = self.host.caches.write().await;
            for name in caches.keys() {
                if name != self.config.cache_name {
                    info!(cache = %name, "Deleting old cache");
                    caches.delete(&name);
                }
            }
        }

        let claimed = self.host.clients.write().await.claim(self.id);
        debug!(claimed = claimed.len(), "Claimed clients");
        claimed
    }

    // ==================== Fetch ====================

    /// Fetch event.
    ///
    /// `Err` means the worker tried to answer and had nothing to answer with;
    /// the page sees a network error.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, ServiceWorkerError> {
        let route = Route::classify(request, &self.config);
        trace!(url = %request.url, route = route.name(), "Routing request");

        match route {
            Route::Passthrough(reason) => Ok(FetchOutcome::Passthrough(reason)),
            Route::Navigation => self.network_first_navigation(request).await,
            Route::StaticAsset => self.stale_while_revalidate(request).await,
            Route::Api => self.network_first_api(request).await,
        }
    }

    async fn network_first_navigation(
        &self,
        request: &Request,
    ) -> Result<FetchOutcome, ServiceWorkerError> {
        let error = match self.host.fetcher.fetch(request).await {
            Ok(response) => {
                self.cache_in_background(request.clone(), response.clone()).await;
                return Ok(FetchOutcome::network(response));
            }
            Err(e) => e,
        };
        debug!(url = %request.url, error = %error, "Navigation failed, trying cache");

        let caches = self.host.caches.read().await;
        if let Some(cached) = caches.match_request(request) {
            return Ok(FetchOutcome::cache(cached));
        }
        let offline_url = self.config.resolve(&self.config.offline_page)?;
        match caches.match_url(&offline_url) {
            Some(offline) => Ok(FetchOutcome::Respond {
                response: offline,
                source: ResponseSource::OfflinePage,
            }),
            None => Err(ServiceWorkerError::NetworkError(format!(
                "{} (offline, nothing cached)",
                request.url
            ))),
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: &Request,
    ) -> Result<FetchOutcome, ServiceWorkerError> {
        let cached = self.host.caches.read().await.match_request(request);
        if let Some(cached) = cached {
            self.refresh_in_background(request.clone()).await;
            return Ok(FetchOutcome::cache(cached));
        }

        let response = self
            .host
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| ServiceWorkerError::NetworkError(e.to_string()))?;
        self.cache_in_background(request.clone(), response.clone()).await;
        Ok(FetchOutcome::network(response))
    }

    async fn network_first_api(&self, request: &Request) -> Result<FetchOutcome, ServiceWorkerError> {
        let error = match self.host.fetcher.fetch(request).await {
            Ok(response) => return Ok(FetchOutcome::network(response)),
            Err(e) => e,
        };
        debug!(url = %request.url, error = %error, "API request failed, trying cache");

        self.host
            .caches
            .read()
            .await
            .match_request(request)
            .map(FetchOutcome::cache)
            .ok_or_else(|| ServiceWorkerError::NetworkError(error.to_string()))
    }

    async fn cache_in_background(&self, request: Request, response: Response) {
        let caches = Arc::clone(&self.host.caches);
        let cache_name = self.config.cache_name.clone();
        self.tasks
            .extend(async move {
                store(&caches, &cache_name, &request, response).await;
            })
            .await;
    }

    async fn refresh_in_background(&self, request: Request) {
        let caches = Arc::clone(&self.host.caches);
        let fetcher = Arc::clone(&self.host.fetcher);
        let cache_name = self.config.cache_name.clone();
        self.tasks
            .extend(async move {
                match fetcher.fetch(&request).await {
                    Ok(response) => store(&caches, &cache_name, &request, response).await,
                    Err(e) => trace!(url = %request.url, error = %e, "Background refresh failed"),
                }
            })
            .await;
    }

    // ==================== Push ====================

    /// Push event: always shows a notification, defaulting bad payloads.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<Notification, ServiceWorkerError> {
        info!("Push received");
        let payload = NotificationPayload::decode(data, &self.config.default_notification);
        let options = NotificationOptions::for_payload(&payload, &self.config);
        self.host.notifier.show(&payload.title, options).await
    }

    /// Notification click: close it, then focus or open a window unless the
    /// click was the dismiss action.
    pub async fn handle_notification_click(
        &self,
        notification: &Notification,
        action: Option<&str>,
    ) -> Result<ClickOutcome, ServiceWorkerError> {
        debug!(action = ?action, "Notification click received");
        self.host.notifier.close(notification.id).await;

        if action == Some(ACTION_DISMISS) {
            return Ok(ClickOutcome::Dismissed);
        }

        let target = match notification.options.data.url.as_str() {
            "" => self.config.default_notification.url.as_str(),
            url => url,
        };
        let target = self.config.resolve(target)?;

        let mut clients = self.host.clients.write().await;
        let options = ClientMatchOptions {
            include_uncontrolled: true,
            client_type: ClientType::Window,
        };
        let existing = clients
            .match_all(&options, self.id)
            .into_iter()
            .find(|c| self.config.is_same_origin(&c.url));

        match existing {
            Some(client) => {
                clients.navigate(&client.id, target)?;
                let focused = clients.focus(&client.id)?;
                Ok(ClickOutcome::Focused(focused))
            }
            None => Ok(ClickOutcome::Opened(clients.open_window(target))),
        }
    }
}

impl std::fmt::Debug for OfflineWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineWorker")
            .field("id", &self.id)
            .field("cache_name", &self.config.cache_name)
            .finish_non_exhaustive()
    }
}

/// Best-effort cache write. A generation deleted by a newer worker's
/// activation stays deleted.
async fn store(
    caches: &RwLock<CacheStorage>,
    cache_name: &str,
    request: &Request,
    response: Response,
) {
    let mut caches = caches.write().await;
    let Some(cache) = caches.get_mut(cache_name) else {
        debug!(url = %request.url, cache = cache_name, "Cache gone, write dropped");
        return;
    };
    if let Err(e) = cache.put(request, response) {
        debug!(url = %request.url, error = %e, "Cache write skipped");
    }
}
