//! Page-side registration (`navigator.serviceWorker`).

use std::sync::Arc;

use hashbrown::HashMap;
use splitfriend_net::{Request, Response};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::WorkerConfig;
use crate::lifecycle::{ServiceWorker, ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState};
use crate::worker::{FetchOutcome, OfflineWorker, ResponseSource, WorkerHost};
use crate::ServiceWorkerError;

/// Path the worker script is served from.
pub const WORKER_SCRIPT_PATH: &str = "/sw.js";

/// Service worker events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerEvent {
    /// State changed.
    StateChange {
        registration_scope: String,
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
    /// A new worker version started installing.
    UpdateFound { registration_scope: String },
    /// A client is now controlled by a different worker.
    ControllerChange { client_id: String },
}

/// Service worker container for one origin.
pub struct ServiceWorkerContainer {
    host: WorkerHost,

    /// Registrations by scope.
    registrations: RwLock<HashMap<String, ServiceWorkerRegistration>>,

    /// Worker instances by ID, for every non-redundant worker.
    workers: RwLock<HashMap<ServiceWorkerId, Arc<OfflineWorker>>>,

    /// Event sender for state changes.
    event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
}

impl ServiceWorkerContainer {
    /// Create a new container.
    pub fn new(host: WorkerHost) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                host,
                registrations: RwLock::new(HashMap::new()),
                workers: RwLock::new(HashMap::new()),
                event_tx,
            },
            event_rx,
        )
    }

    /// Shared host facilities.
    pub fn host(&self) -> &WorkerHost {
        &self.host
    }

    /// Register (or update) the worker at `script_url`.
    ///
    /// Runs install and, when the worker asks to skip waiting, activation.
    /// Registering a config equal to the active one is a no-op that returns
    /// the active worker's ID. If install fails the previous version stays
    /// active.
    pub async fn register(
        &self,
        script_url: &str,
        config: WorkerConfig,
    ) -> Result<ServiceWorkerId, ServiceWorkerError> {
        let script_url = config
            .resolve(script_url)
            .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?;
        if !config.is_same_origin(&script_url) {
            return Err(ServiceWorkerError::SecurityError(format!(
                "script {} is not on origin {}",
                script_url,
                config.origin.origin().ascii_serialization()
            )));
        }
        let scope = script_scope(&script_url);
        let scope_str = scope.to_string();

        if let Some(active) = self.active_worker(&scope_str).await {
            if *active.config() == config {
                debug!(scope = %scope_str, "Worker unchanged, skipping update");
                return Ok(active.id());
            }
        }

        let worker = Arc::new(OfflineWorker::new(config, self.host.clone()));
        let id = worker.id();

        {
            let mut registrations = self.registrations.write().await;
            let registration = registrations
                .entry(scope_str.clone())
                .or_insert_with(|| ServiceWorkerRegistration::new(scope));
            if let Some(superseded) = registration.start_install(id, script_url)? {
                self.retire(&scope_str, &superseded).await;
            }
        }
        self.workers.write().await.insert(id, Arc::clone(&worker));
        self.emit(ServiceWorkerEvent::UpdateFound {
            registration_scope: scope_str.clone(),
        });
        self.emit_state(&scope_str, id, ServiceWorkerState::Installing);

        if let Err(e) = worker.install().await {
            warn!(scope = %scope_str, error = %e, "ServiceWorker registration failed");
            let failed = self
                .registrations
                .write()
                .await
                .get_mut(&scope_str)
                .and_then(|r| r.install_failed(id, e.to_string()));
            if let Some(failed) = failed {
                self.retire(&scope_str, &failed).await;
            }
            return Err(e);
        }

        let replaced = self
            .registrations
            .write()
            .await
            .get_mut(&scope_str)
            .ok_or_else(|| ServiceWorkerError::NotFound(scope_str.clone()))?
            .install_complete(id)?;
        if let Some(replaced) = replaced {
            self.retire(&scope_str, &replaced).await;
        }
        self.emit_state(&scope_str, id, ServiceWorkerState::Installed);

        if worker.skip_waiting_requested() {
            self.activate(&scope_str).await?;
        }

        info!(scope = %scope_str, "ServiceWorker registered");
        Ok(id)
    }

    /// Activate the waiting worker of `scope`.
    pub async fn activate(&self, scope: &str) -> Result<(), ServiceWorkerError> {
        let id = self
            .registrations
            .write()
            .await
            .get_mut(scope)
            .ok_or_else(|| ServiceWorkerError::NotFound(scope.to_string()))?
            .begin_activation()?;
        self.emit_state(scope, id, ServiceWorkerState::Activating);

        let worker = self
            .workers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceWorkerError::NotFound(format!("worker {}", id.raw())))?;
        let claimed = worker.activate().await;

        let old = self
            .registrations
            .write()
            .await
            .get_mut(scope)
            .ok_or_else(|| ServiceWorkerError::NotFound(scope.to_string()))?
            .finish_activation()?;
        self.emit_state(scope, id, ServiceWorkerState::Activated);
        if let Some(old) = old {
            self.retire(scope, &old).await;
        }
        for client_id in claimed {
            self.emit(ServiceWorkerEvent::ControllerChange { client_id });
        }
        Ok(())
    }

    /// Get the registration scope covering a URL.
    pub async fn get_registration(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let registrations = self.registrations.read().await;

        // Longest matching scope wins.
        registrations
            .keys()
            .filter(|scope| url.as_str().starts_with(scope.as_str()))
            .max_by_key(|scope| scope.len())
            .cloned()
    }

    /// Get all registration scopes.
    pub async fn get_registrations(&self) -> Vec<String> {
        self.registrations.read().await.keys().cloned().collect()
    }

    /// State of a worker, if it is still tracked by a registration.
    pub async fn worker_state(&self, scope: &str, id: ServiceWorkerId) -> Option<ServiceWorkerState> {
        let registrations = self.registrations.read().await;
        let registration = registrations.get(scope)?;
        let state = [&registration.installing, &registration.waiting, &registration.active]
            .into_iter()
            .flatten()
            .find(|w| w.id == id)
            .map(|w| w.state);
        state
    }

    /// The active worker for `scope`.
    pub async fn active_worker(&self, scope: &str) -> Option<Arc<OfflineWorker>> {
        let id = self
            .registrations
            .read()
            .await
            .get(scope)?
            .get_active()
            .map(|w| w.id)?;
        self.workers.read().await.get(&id).cloned()
    }

    /// Load a resource the way a controlled page would: through the active
    /// worker when one covers the URL, straight from the network otherwise.
    pub async fn fetch(&self, request: &Request) -> Result<(Response, ResponseSource), ServiceWorkerError> {
        let controller = match self.get_registration(request.url.as_str()).await {
            Some(scope) => self.active_worker(&scope).await,
            None => None,
        };

        if let Some(worker) = controller {
            if let FetchOutcome::Respond { response, source } = worker.handle_fetch(request).await? {
                return Ok((response, source));
            }
        }

        let response = self
            .host
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| ServiceWorkerError::NetworkError(e.to_string()))?;
        Ok((response, ResponseSource::Network))
    }

    /// Unregister a scope.
    pub async fn unregister(&self, scope: &str) -> Result<bool, ServiceWorkerError> {
        let removed = self.registrations.write().await.remove(scope);
        match removed {
            Some(mut registration) => {
                for worker in registration.unregister() {
                    self.retire(scope, &worker).await;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn retire(&self, scope: &str, worker: &ServiceWorker) {
        self.workers.write().await.remove(&worker.id);
        self.emit_state(scope, worker.id, ServiceWorkerState::Redundant);
    }

    fn emit_state(&self, scope: &str, worker_id: ServiceWorkerId, new_state: ServiceWorkerState) {
        self.emit(ServiceWorkerEvent::StateChange {
            registration_scope: scope.to_string(),
            worker_id,
            new_state,
        });
    }

    fn emit(&self, event: ServiceWorkerEvent) {
        // Nobody listening is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Default scope of a script: the directory it lives in.
fn script_scope(script_url: &Url) -> Url {
    let mut scope = script_url.clone();
    let dir = match script_url.path().rsplit_once('/') {
        Some((dir, _)) => format!("{}/", dir),
        None => "/".to_string(),
    };
    scope.set_path(&dir);
    scope.set_query(None);
    scope.set_fragment(None);
    scope
}
