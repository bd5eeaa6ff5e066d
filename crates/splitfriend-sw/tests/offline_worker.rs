//! End-to-end behaviour of the offline worker against a scripted network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use splitfriend_net::{Fetcher, NetError, Request, Response};
use splitfriend_sw::{
    Bypass, ClickOutcome, Client, FetchOutcome, NotificationTray, OfflineWorker, ResponseSource,
    ServiceWorkerContainer, ServiceWorkerError, ServiceWorkerEvent, ServiceWorkerState,
    WorkerConfig, WorkerHost, STATIC_ASSETS, WORKER_SCRIPT_PATH,
};
use url::Url;

const ORIGIN: &str = "https://splitfriend.example";
const SCOPE: &str = "https://splitfriend.example/";

fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

fn config() -> WorkerConfig {
    WorkerConfig::new(Url::parse(ORIGIN).unwrap())
}

/// Network that answers from a table of paths and can be switched off.
#[derive(Default)]
struct ScriptedNetwork {
    offline: AtomicBool,
    routes: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    fn with_assets() -> Arc<Self> {
        let network = Arc::new(Self::default());
        for path in STATIC_ASSETS {
            network.serve(path, StatusCode::OK, format!("asset {}", path));
        }
        network
    }

    fn serve(&self, path: &str, status: StatusCode, body: impl Into<Bytes>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.into()));
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline(request.url.to_string()));
        }
        let routes = self.routes.lock().unwrap();
        let response = match routes.get(request.url.path()) {
            Some((status, body)) => Response::new(request.url.clone(), *status, body.clone()),
            None => Response::new(request.url.clone(), StatusCode::NOT_FOUND, "not found"),
        };
        Ok(response)
    }
}

struct Harness {
    network: Arc<ScriptedNetwork>,
    tray: Arc<NotificationTray>,
    host: WorkerHost,
}

fn harness() -> Harness {
    let network = ScriptedNetwork::with_assets();
    let tray = Arc::new(NotificationTray::new());
    let host = WorkerHost::new(network.clone(), tray.clone());
    Harness { network, tray, host }
}

async fn active_worker(h: &Harness) -> OfflineWorker {
    let worker = OfflineWorker::new(config(), h.host.clone());
    worker.install().await.unwrap();
    worker.activate().await;
    worker
}

fn respond(outcome: FetchOutcome) -> (Response, ResponseSource) {
    match outcome {
        FetchOutcome::Respond { response, source } => (response, source),
        FetchOutcome::Passthrough(reason) => panic!("expected a response, got passthrough {:?}", reason),
    }
}

async fn cache_len(h: &Harness, name: &str) -> Option<usize> {
    h.host.caches.read().await.get(name).map(|c| c.len())
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ServiceWorkerEvent>) -> Vec<ServiceWorkerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn states(events: &[ServiceWorkerEvent]) -> Vec<ServiceWorkerState> {
    events
        .iter()
        .filter_map(|e| match e {
            ServiceWorkerEvent::StateChange { new_state, .. } => Some(*new_state),
            _ => None,
        })
        .collect()
}

// ==================== Install / Activate ====================

#[tokio::test]
async fn test_install_precaches_manifest() {
    let h = harness();
    let worker = OfflineWorker::new(config(), h.host.clone());

    worker.install().await.unwrap();

    assert!(worker.skip_waiting_requested());
    assert_eq!(cache_len(&h, "splitfriend-v1").await, Some(STATIC_ASSETS.len()));
    let caches = h.host.caches.read().await;
    let cached = caches.match_url(&url("/js/app.js")).unwrap();
    assert_eq!(cached.text().unwrap(), "asset /js/app.js");
    assert!(caches.match_url(&url("/offline.html")).is_none());
}

#[tokio::test]
async fn test_install_is_all_or_nothing() {
    let h = harness();
    h.network
        .serve("/icons/icon-512x512.png", StatusCode::INTERNAL_SERVER_ERROR, "");
    let worker = OfflineWorker::new(config(), h.host.clone());

    let err = worker.install().await.unwrap_err();

    assert!(matches!(err, ServiceWorkerError::InstallFailed(_)));
    assert!(!worker.skip_waiting_requested());
    assert_eq!(cache_len(&h, "splitfriend-v1").await.unwrap_or(0), 0);
}

#[tokio::test]
async fn test_failed_install_never_becomes_active() {
    let h = harness();
    h.network.set_offline(true);
    let (container, mut rx) = ServiceWorkerContainer::new(h.host.clone());

    let result = container.register(WORKER_SCRIPT_PATH, config()).await;

    assert!(matches!(result, Err(ServiceWorkerError::InstallFailed(_))));
    assert!(container.active_worker(SCOPE).await.is_none());
    let events = drain(&mut rx);
    assert_eq!(
        states(&events),
        vec![ServiceWorkerState::Installing, ServiceWorkerState::Redundant]
    );
}

#[tokio::test]
async fn test_register_installs_and_activates() {
    let h = harness();
    let window = Client::window(url("/dashboard"));
    let window_id = window.id.clone();
    h.host.clients.write().await.add(window);
    let (container, mut rx) = ServiceWorkerContainer::new(h.host.clone());

    let id = container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();

    assert_eq!(container.get_registrations().await, vec![SCOPE.to_string()]);
    assert_eq!(
        container.worker_state(SCOPE, id).await,
        Some(ServiceWorkerState::Activated)
    );
    assert_eq!(
        h.host.clients.read().await.get(&window_id).unwrap().controller,
        Some(id)
    );

    let events = drain(&mut rx);
    assert_eq!(
        events[0],
        ServiceWorkerEvent::UpdateFound {
            registration_scope: SCOPE.to_string()
        }
    );
    assert_eq!(
        states(&events),
        vec![
            ServiceWorkerState::Installing,
            ServiceWorkerState::Installed,
            ServiceWorkerState::Activating,
            ServiceWorkerState::Activated,
        ]
    );
    assert!(events.contains(&ServiceWorkerEvent::ControllerChange {
        client_id: window_id
    }));
}

#[tokio::test]
async fn test_register_same_version_is_not_an_update() {
    let h = harness();
    let (container, mut rx) = ServiceWorkerContainer::new(h.host.clone());

    let first = container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();
    drain(&mut rx);
    let calls = h.network.calls();
    let second = container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.network.calls(), calls);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_register_rejects_cross_origin_script() {
    let h = harness();
    let (container, _rx) = ServiceWorkerContainer::new(h.host.clone());

    let result = container
        .register("https://cdn.example/sw.js", config())
        .await;

    assert!(matches!(result, Err(ServiceWorkerError::SecurityError(_))));
    assert!(container.get_registrations().await.is_empty());
}

#[tokio::test]
async fn test_activation_purges_stale_generations() {
    let h = harness();
    let (container, mut rx) = ServiceWorkerContainer::new(h.host.clone());
    let v1 = container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();
    h.host.caches.write().await.open("leftover");
    drain(&mut rx);

    let v2 = container
        .register(WORKER_SCRIPT_PATH, config().with_cache_name("splitfriend-v2"))
        .await
        .unwrap();

    assert_ne!(v1, v2);
    assert_eq!(h.host.caches.read().await.keys(), vec!["splitfriend-v2"]);
    assert_eq!(container.active_worker(SCOPE).await.unwrap().id(), v2);
    assert_eq!(container.worker_state(SCOPE, v1).await, None);

    let events = drain(&mut rx);
    assert!(events.contains(&ServiceWorkerEvent::StateChange {
        registration_scope: SCOPE.to_string(),
        worker_id: v1,
        new_state: ServiceWorkerState::Redundant,
    }));
}

#[tokio::test]
async fn test_late_write_does_not_restore_purged_generation() {
    let h = harness();
    h.network.serve("/dashboard", StatusCode::OK, "<h1>Dashboard</h1>");
    let v1 = active_worker(&h).await;
    v1.handle_fetch(&Request::navigate(url("/dashboard")))
        .await
        .unwrap();

    let v2 = OfflineWorker::new(config().with_cache_name("splitfriend-v2"), h.host.clone());
    v2.install().await.unwrap();
    v2.activate().await;
    assert_eq!(h.host.caches.read().await.keys(), vec!["splitfriend-v2"]);

    v1.settle().await;
    assert_eq!(h.host.caches.read().await.keys(), vec!["splitfriend-v2"]);
    assert!(h
        .host
        .caches
        .read()
        .await
        .match_url(&url("/dashboard"))
        .is_none());
}

#[tokio::test]
async fn test_failed_update_keeps_previous_version() {
    let h = harness();
    let (container, _rx) = ServiceWorkerContainer::new(h.host.clone());
    let v1 = container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();

    h.network.serve("/css/style.css", StatusCode::NOT_FOUND, "");
    let result = container
        .register(WORKER_SCRIPT_PATH, config().with_cache_name("splitfriend-v2"))
        .await;

    assert!(result.is_err());
    assert_eq!(container.active_worker(SCOPE).await.unwrap().id(), v1);
    assert_eq!(cache_len(&h, "splitfriend-v1").await, Some(STATIC_ASSETS.len()));
}

#[tokio::test]
async fn test_unregister() {
    let h = harness();
    let (container, _rx) = ServiceWorkerContainer::new(h.host.clone());
    container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();

    assert!(container.unregister(SCOPE).await.unwrap());
    assert!(!container.unregister(SCOPE).await.unwrap());
    assert!(container.active_worker(SCOPE).await.is_none());
}

// ==================== Fetch routing ====================

#[tokio::test]
async fn test_non_get_is_never_intercepted() {
    let h = harness();
    let worker = active_worker(&h).await;
    let calls = h.network.calls();
    let before = h.host.caches.read().await.keys();

    let request = Request::post(url("/api/expenses"), Bytes::from_static(b"{}"));
    let outcome = worker.handle_fetch(&request).await.unwrap();
    worker.settle().await;

    assert!(matches!(outcome, FetchOutcome::Passthrough(Bypass::Method)));
    assert_eq!(h.network.calls(), calls);
    assert_eq!(h.host.caches.read().await.keys(), before);
    assert_eq!(cache_len(&h, "splitfriend-v1").await, Some(STATIC_ASSETS.len()));
}

#[tokio::test]
async fn test_cross_origin_is_never_intercepted() {
    let h = harness();
    let worker = active_worker(&h).await;
    let calls = h.network.calls();

    let request = Request::get(Url::parse("https://cdn.jsdelivr.net/npm/bootstrap.min.css").unwrap());
    let outcome = worker.handle_fetch(&request).await.unwrap();

    assert!(matches!(outcome, FetchOutcome::Passthrough(Bypass::CrossOrigin)));
    assert_eq!(h.network.calls(), calls);
}

#[tokio::test]
async fn test_navigation_served_live_and_cached() {
    let h = harness();
    h.network.serve("/dashboard", StatusCode::OK, "<h1>Dashboard</h1>");
    let worker = active_worker(&h).await;

    let request = Request::navigate(url("/dashboard"));
    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());
    worker.settle().await;

    assert_eq!(source, ResponseSource::Network);
    assert_eq!(response.text().unwrap(), "<h1>Dashboard</h1>");
    let cached = h.host.caches.read().await.match_request(&request).unwrap();
    assert_eq!(cached.body(), response.body());
}

#[tokio::test]
async fn test_navigation_falls_back_to_cached_page() {
    let h = harness();
    h.network.serve("/groups/3", StatusCode::OK, "<h1>Trip</h1>");
    let worker = active_worker(&h).await;
    let request = Request::navigate(url("/groups/3"));
    worker.handle_fetch(&request).await.unwrap();
    worker.settle().await;

    h.network.set_offline(true);
    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());

    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(response.text().unwrap(), "<h1>Trip</h1>");
}

#[tokio::test]
async fn test_navigation_falls_back_to_offline_page() {
    let h = harness();
    let worker = active_worker(&h).await;
    h.host
        .caches
        .write()
        .await
        .open("splitfriend-v1")
        .put(
            &Request::get(url("/offline.html")),
            Response::new(url("/offline.html"), StatusCode::OK, "You are offline"),
        )
        .unwrap();

    h.network.set_offline(true);
    let request = Request::navigate(url("/groups/99"));
    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());

    assert_eq!(source, ResponseSource::OfflinePage);
    assert_eq!(response.text().unwrap(), "You are offline");
}

#[tokio::test]
async fn test_navigation_fails_when_nothing_cached() {
    let h = harness();
    let worker = active_worker(&h).await;
    h.network.set_offline(true);

    let result = worker.handle_fetch(&Request::navigate(url("/groups/99"))).await;

    assert!(matches!(result, Err(ServiceWorkerError::NetworkError(_))));
}

#[tokio::test]
async fn test_static_asset_served_from_cache_then_refreshed() {
    let h = harness();
    let worker = active_worker(&h).await;
    let request = Request::get(url("/css/style.css"));
    let cached = h.host.caches.read().await.match_request(&request).unwrap();

    h.network.serve("/css/style.css", StatusCode::OK, "body { color: teal }");
    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());
    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(response.body(), cached.body());

    assert_eq!(worker.settle().await, 1);
    let refreshed = h.host.caches.read().await.match_request(&request).unwrap();
    assert_eq!(refreshed.text().unwrap(), "body { color: teal }");
}

#[tokio::test]
async fn test_static_asset_ignores_failed_refresh() {
    let h = harness();
    let worker = active_worker(&h).await;
    let request = Request::get(url("/js/app.js"));
    let cached = h.host.caches.read().await.match_request(&request).unwrap();

    h.network.set_offline(true);
    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());
    worker.settle().await;

    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(response.body(), cached.body());
    let after = h.host.caches.read().await.match_request(&request).unwrap();
    assert_eq!(after.body(), cached.body());
}

#[tokio::test]
async fn test_static_asset_miss_is_fetched_and_stored() {
    let h = harness();
    h.network.serve("/img/logo.svg", StatusCode::OK, "<svg/>");
    let worker = active_worker(&h).await;
    let request = Request::get(url("/img/logo.svg"));

    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());
    worker.settle().await;

    assert_eq!(source, ResponseSource::Network);
    assert_eq!(response.text().unwrap(), "<svg/>");
    assert!(h.host.caches.read().await.match_request(&request).is_some());
}

#[tokio::test]
async fn test_api_is_network_first_without_caching() {
    let h = harness();
    h.network
        .serve("/api/push/status", StatusCode::OK, r#"{"pushEnabled":true}"#);
    let worker = active_worker(&h).await;
    let request = Request::get(url("/api/push/status"));

    let (_, source) = respond(worker.handle_fetch(&request).await.unwrap());
    worker.settle().await;

    assert_eq!(source, ResponseSource::Network);
    assert!(h.host.caches.read().await.match_request(&request).is_none());

    h.network.set_offline(true);
    let result = worker.handle_fetch(&request).await;
    assert!(matches!(result, Err(ServiceWorkerError::NetworkError(_))));
}

#[tokio::test]
async fn test_api_falls_back_to_cached_response() {
    let h = harness();
    let worker = active_worker(&h).await;
    let request = Request::get(url("/api/groups"));
    h.host
        .caches
        .write()
        .await
        .open("splitfriend-v1")
        .put(&request, Response::new(url("/api/groups"), StatusCode::OK, "[]"))
        .unwrap();

    h.network.set_offline(true);
    let (response, source) = respond(worker.handle_fetch(&request).await.unwrap());

    assert_eq!(source, ResponseSource::Cache);
    assert_eq!(response.text().unwrap(), "[]");
}

#[tokio::test]
async fn test_container_fetch_goes_through_controller() {
    let h = harness();
    h.network.serve("/dashboard", StatusCode::OK, "live");
    let (container, _rx) = ServiceWorkerContainer::new(h.host.clone());

    let (_, source) = container
        .fetch(&Request::navigate(url("/dashboard")))
        .await
        .unwrap();
    assert_eq!(source, ResponseSource::Network);

    container.register(WORKER_SCRIPT_PATH, config()).await.unwrap();
    let (_, source) = container
        .fetch(&Request::get(url("/css/style.css")))
        .await
        .unwrap();
    assert_eq!(source, ResponseSource::Cache);
    container.active_worker(SCOPE).await.unwrap().settle().await;

    h.network.set_offline(true);
    let post = Request::post(url("/api/expenses"), Bytes::new());
    assert!(container.fetch(&post).await.is_err());
}

// ==================== Push / Notification click ====================

#[tokio::test]
async fn test_push_payload_shown() {
    let h = harness();
    let worker = active_worker(&h).await;

    let notification = worker
        .handle_push(Some(br#"{"title":"T","body":"B","url":"/x"}"#))
        .await
        .unwrap();

    assert_eq!(notification.title, "T");
    assert_eq!(notification.options.body, "B");
    assert_eq!(notification.options.data.url, "/x");
    assert_eq!(h.tray.displayed().await, vec![notification]);
}

#[tokio::test]
async fn test_push_garbage_uses_defaults() {
    let h = harness();
    let worker = active_worker(&h).await;

    for data in [Some(&b"{not json"[..]), None] {
        let notification = worker.handle_push(data).await.unwrap();
        assert_eq!(notification.title, "SplitFriend");
        assert_eq!(notification.options.body, "You have a new notification");
        assert_eq!(notification.options.data.url, "/dashboard");
        assert_eq!(notification.options.vibrate, vec![100, 50, 100]);
    }
    assert_eq!(h.tray.displayed().await.len(), 2);
}

#[tokio::test]
async fn test_click_dismiss_only_closes() {
    let h = harness();
    let worker = active_worker(&h).await;
    let notification = worker.handle_push(None).await.unwrap();

    let outcome = worker
        .handle_notification_click(&notification, Some("dismiss"))
        .await
        .unwrap();

    assert_eq!(outcome, ClickOutcome::Dismissed);
    assert!(h.tray.displayed().await.is_empty());
    assert!(h
        .host
        .clients
        .read()
        .await
        .match_all(&Default::default(), worker.id())
        .is_empty());
}

#[tokio::test]
async fn test_click_focuses_existing_window() {
    let h = harness();
    let window = Client::window(url("/groups/1"));
    let window_id = window.id.clone();
    h.host.clients.write().await.add(window);
    let worker = OfflineWorker::new(config(), h.host.clone());
    worker.install().await.unwrap();

    let notification = worker
        .handle_push(Some(br#"{"title":"New Expense","body":"Dinner","url":"/groups/7"}"#))
        .await
        .unwrap();
    let outcome = worker
        .handle_notification_click(&notification, None)
        .await
        .unwrap();

    match outcome {
        ClickOutcome::Focused(client) => {
            assert_eq!(client.id, window_id);
            assert_eq!(client.url, url("/groups/7"));
            assert!(client.focused);
        }
        other => panic!("expected focus, got {:?}", other),
    }
    assert!(h.tray.displayed().await.is_empty());
}

#[tokio::test]
async fn test_click_opens_window_when_none_on_origin() {
    let h = harness();
    h.host
        .clients
        .write()
        .await
        .add(Client::window(Url::parse("https://other.example/").unwrap()));
    let worker = active_worker(&h).await;
    let notification = worker.handle_push(None).await.unwrap();

    let outcome = worker
        .handle_notification_click(&notification, Some("open"))
        .await
        .unwrap();

    match outcome {
        ClickOutcome::Opened(client) => assert_eq!(client.url, url("/dashboard")),
        other => panic!("expected a new window, got {:?}", other),
    }
}
