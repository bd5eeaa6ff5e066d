//! Worker lifecycle: states and the registration that holds each version.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ServiceWorkerError;

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Registered, install not started.
    #[default]
    Parsed,
    /// Install event running.
    Installing,
    /// Installed and waiting for activation.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and handling events.
    Activated,
    /// Replaced or failed to install.
    Redundant,
}

impl ServiceWorkerState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: ServiceWorkerState) -> bool {
        use ServiceWorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Parsed | Installing | Installed | Activating | Activated, Redundant)
        )
    }
}

/// A service worker instance as seen by its registration.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    /// Unique ID.
    pub id: ServiceWorkerId,

    /// Script URL.
    pub script_url: Url,

    /// Current state.
    pub state: ServiceWorkerState,

    /// Error message if install failed.
    pub error: Option<String>,

    /// Time of last state change.
    pub state_changed_at: Instant,
}

impl ServiceWorker {
    /// Create a new service worker.
    pub fn new(id: ServiceWorkerId, script_url: Url) -> Self {
        Self {
            id,
            script_url,
            state: ServiceWorkerState::Parsed,
            error: None,
            state_changed_at: Instant::now(),
        }
    }

    /// Move to `state`, rejecting transitions the lifecycle does not allow.
    pub fn set_state(&mut self, state: ServiceWorkerState) -> Result<(), ServiceWorkerError> {
        if !self.state.can_transition_to(state) {
            return Err(ServiceWorkerError::StateError(format!(
                "worker {} cannot go from {:?} to {:?}",
                self.id.raw(),
                self.state,
                state
            )));
        }
        self.state = state;
        self.state_changed_at = Instant::now();
        Ok(())
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }

    /// Check if redundant.
    pub fn is_redundant(&self) -> bool {
        self.state == ServiceWorkerState::Redundant
    }
}

/// A service worker registration.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    pub installing: Option<ServiceWorker>,

    /// Waiting worker (installed but not active).
    pub waiting: Option<ServiceWorker>,

    /// Active worker.
    pub active: Option<ServiceWorker>,

    /// Last update check time.
    pub last_update_check: Option<Instant>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
            last_update_check: None,
        }
    }

    /// Get the active worker.
    pub fn get_active(&self) -> Option<&ServiceWorker> {
        self.active.as_ref()
    }

    /// Start installing a new worker version.
    ///
    /// An install already in flight is superseded and becomes redundant.
    pub fn start_install(
        &mut self,
        id: ServiceWorkerId,
        script_url: Url,
    ) -> Result<Option<ServiceWorker>, ServiceWorkerError> {
        let superseded = self.installing.take().map(retire);
        let mut worker = ServiceWorker::new(id, script_url);
        worker.set_state(ServiceWorkerState::Installing)?;
        self.installing = Some(worker);
        self.last_update_check = Some(Instant::now());
        Ok(superseded)
    }

    /// Installing worker failed: it becomes redundant and never activates.
    pub fn install_failed(&mut self, id: ServiceWorkerId, error: String) -> Option<ServiceWorker> {
        let mut worker = self.take_installing(id)?;
        worker.error = Some(error);
        Some(retire(worker))
    }

    /// Transition installing to waiting. Returns any waiting worker it replaced.
    pub fn install_complete(
        &mut self,
        id: ServiceWorkerId,
    ) -> Result<Option<ServiceWorker>, ServiceWorkerError> {
        let mut worker = self
            .take_installing(id)
            .ok_or_else(|| ServiceWorkerError::StateError("no matching installing worker".into()))?;
        worker.set_state(ServiceWorkerState::Installed)?;
        let replaced = self.waiting.replace(worker).map(retire);
        Ok(replaced)
    }

    /// Move the waiting worker into the activating state.
    pub fn begin_activation(&mut self) -> Result<ServiceWorkerId, ServiceWorkerError> {
        let worker = self
            .waiting
            .as_mut()
            .ok_or_else(|| ServiceWorkerError::StateError("no waiting worker".into()))?;
        worker.set_state(ServiceWorkerState::Activating)?;
        Ok(worker.id)
    }

    /// Finish activation: the waiting worker becomes active and the previous
    /// active worker, if any, is returned as redundant.
    pub fn finish_activation(&mut self) -> Result<Option<ServiceWorker>, ServiceWorkerError> {
        let mut worker = self
            .waiting
            .take()
            .ok_or_else(|| ServiceWorkerError::StateError("no activating worker".into()))?;
        worker.set_state(ServiceWorkerState::Activated)?;
        let old = self.active.replace(worker).map(retire);
        Ok(old)
    }

    /// Unregister: every worker becomes redundant.
    pub fn unregister(&mut self) -> Vec<ServiceWorker> {
        [self.active.take(), self.waiting.take(), self.installing.take()]
            .into_iter()
            .flatten()
            .map(retire)
            .collect()
    }

    fn take_installing(&mut self, id: ServiceWorkerId) -> Option<ServiceWorker> {
        match self.installing {
            Some(ref worker) if worker.id == id => self.installing.take(),
            _ => None,
        }
    }
}

fn retire(mut worker: ServiceWorker) -> ServiceWorker {
    // Every live state may go redundant.
    let _ = worker.set_state(ServiceWorkerState::Redundant);
    worker
}
