//! # SplitFriend Offline Worker
//!
//! The background worker that keeps the SplitFriend client usable offline
//! and turns push messages into notifications.
//!
//! ## Features
//!
//! - **Install**: precache the static asset manifest, all or nothing
//! - **Activate**: drop stale cache generations, claim open pages
//! - **Fetch**: network-first pages and API calls, stale-while-revalidate
//!   for static files, offline page fallback
//! - **Push**: decode payloads (with defaults) into notifications
//! - **Notification clicks**: focus an open window or open a new one
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerContainer (navigator.serviceWorker)
//!     │
//!     ├── ServiceWorkerRegistration
//!     │       ├── installing / waiting / active (ServiceWorker)
//!     │       └── scope
//!     │
//!     └── OfflineWorker (one per version)
//!             └── WorkerHost
//!                     ├── CacheStorage → Cache → Request → Response
//!                     ├── Clients
//!                     ├── Fetcher (network)
//!                     └── Notifier
//! ```

pub mod cache;
pub mod clients;
pub mod config;
pub mod container;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod routing;
pub mod tasks;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheStorage};
pub use clients::{Client, ClientMatchOptions, ClientType, Clients};
pub use config::{WorkerConfig, DEFAULT_CACHE_NAME, OFFLINE_PAGE, STATIC_ASSETS};
pub use container::{ServiceWorkerContainer, ServiceWorkerEvent, WORKER_SCRIPT_PATH};
pub use error::ServiceWorkerError;
pub use lifecycle::{ServiceWorker, ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState};
pub use notification::{
    Notification, NotificationAction, NotificationData, NotificationId, NotificationOptions,
    NotificationPayload, NotificationTray, Notifier,
};
pub use routing::{Bypass, Route};
pub use tasks::ExtendableTasks;
pub use worker::{ClickOutcome, FetchOutcome, OfflineWorker, ResponseSource, WorkerHost};
