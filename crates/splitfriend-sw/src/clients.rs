//! Clients API: the pages a worker can see, focus, and navigate.

use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

use crate::lifecycle::ServiceWorkerId;
use crate::ServiceWorkerError;

/// A client (open page or worker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Client type.
    pub client_type: ClientType,

    /// Whether focused.
    pub focused: bool,

    /// Worker controlling this client, if any.
    pub controller: Option<ServiceWorkerId>,
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

impl Client {
    /// A window client showing `url`.
    pub fn window(url: Url) -> Self {
        Self {
            id: next_client_id(),
            url,
            client_type: ClientType::Window,
            focused: false,
            controller: None,
        }
    }

    fn ensure_window(&self, what: &str) -> Result<(), ServiceWorkerError> {
        if self.client_type != ClientType::Window {
            return Err(ServiceWorkerError::StateError(format!(
                "Can only {} window clients",
                what
            )));
        }
        Ok(())
    }
}

/// Options for `Clients::match_all`.
#[derive(Debug, Clone, Default)]
pub struct ClientMatchOptions {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

/// Clients API, in the order clients were added.
#[derive(Debug, Default)]
pub struct Clients {
    clients: Vec<Client>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// Add a client.
    pub fn add(&mut self, client: Client) {
        self.clients.push(client);
    }

    /// Remove a client.
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        let index = self.clients.iter().position(|c| c.id == id)?;
        Some(self.clients.remove(index))
    }

    /// Match clients visible to worker `controller`.
    pub fn match_all(&self, options: &ClientMatchOptions, controller: ServiceWorkerId) -> Vec<Client> {
        self.clients
            .iter()
            .filter(|c| options.include_uncontrolled || c.controller == Some(controller))
            .filter(|c| match options.client_type {
                ClientType::All => true,
                t => c.client_type == t,
            })
            .cloned()
            .collect()
    }

    /// Open a new focused window at `url`.
    pub fn open_window(&mut self, url: Url) -> Client {
        for client in &mut self.clients {
            client.focused = false;
        }
        let mut client = Client::window(url);
        client.focused = true;
        self.clients.push(client.clone());
        client
    }

    /// Take control of every window client. Returns the IDs whose controller
    /// changed.
    pub fn claim(&mut self, controller: ServiceWorkerId) -> Vec<String> {
        self.clients
            .iter_mut()
            .filter(|c| c.client_type == ClientType::Window)
            .filter(|c| c.controller != Some(controller))
            .map(|c| {
                c.controller = Some(controller);
                c.id.clone()
            })
            .collect()
    }

    /// Navigate a window client to `url`.
    pub fn navigate(&mut self, id: &str, url: Url) -> Result<Client, ServiceWorkerError> {
        let client = self.get_mut(id)?;
        client.ensure_window("navigate")?;
        client.url = url;
        Ok(client.clone())
    }

    /// Focus a window client, unfocusing the others.
    pub fn focus(&mut self, id: &str) -> Result<Client, ServiceWorkerError> {
        self.get_mut(id)?.ensure_window("focus")?;
        for client in &mut self.clients {
            client.focused = client.id == id;
        }
        self.get_mut(id).map(|c| c.clone())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Client, ServiceWorkerError> {
        self.clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ServiceWorkerError::NotFound(format!("client {}", id)))
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://example.com").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_open_window() {
        let mut clients = Clients::new();
        let client = clients.open_window(url("/dashboard"));
        assert_eq!(client.client_type, ClientType::Window);
        assert!(client.focused);
        assert!(clients.get(&client.id).is_some());
    }

    #[test]
    fn test_match_all_respects_control() {
        let mut clients = Clients::new();
        let worker = ServiceWorkerId::new();
        clients.add(Client::window(url("/a")));
        let options = ClientMatchOptions::default();

        assert!(clients.match_all(&options, worker).is_empty());
        let uncontrolled = ClientMatchOptions {
            include_uncontrolled: true,
            ..Default::default()
        };
        assert_eq!(clients.match_all(&uncontrolled, worker).len(), 1);

        assert_eq!(clients.claim(worker).len(), 1);
        assert_eq!(clients.match_all(&options, worker).len(), 1);
        assert!(clients.claim(worker).is_empty());
    }

    #[test]
    fn test_navigate_and_focus() {
        let mut clients = Clients::new();
        let a = Client::window(url("/a"));
        let b = Client::window(url("/b"));
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        clients.add(a);
        clients.add(b);

        let navigated = clients.navigate(&a_id, url("/groups/7")).unwrap();
        assert_eq!(navigated.url.path(), "/groups/7");

        clients.focus(&b_id).unwrap();
        clients.focus(&a_id).unwrap();
        assert!(clients.get(&a_id).unwrap().focused);
        assert!(!clients.get(&b_id).unwrap().focused);
    }

    #[test]
    fn test_only_windows_navigate() {
        let mut clients = Clients::new();
        let mut worker_client = Client::window(url("/worker.js"));
        worker_client.client_type = ClientType::Worker;
        let id = worker_client.id.clone();
        clients.add(worker_client);

        assert!(clients.navigate(&id, url("/x")).is_err());
        assert!(clients.focus(&id).is_err());
        assert!(clients.navigate("missing", url("/x")).is_err());
    }
}
