//! Cache API: named cache generations of request → response entries.

use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use http::{Method, StatusCode};
use splitfriend_net::{cache_key, Request, Response};
use url::Url;

use crate::ServiceWorkerError;

/// A cached request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request key (absolute URL).
    pub key: String,

    /// Stored response.
    pub response: Response,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

/// One cache generation.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name (version tag).
    pub name: String,

    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request.
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        if request.method != Method::GET {
            return None;
        }
        self.entries.get(&request.cache_key())
    }

    /// Match a URL.
    pub fn match_url(&self, url: &Url) -> Option<&CacheEntry> {
        self.entries.get(&cache_key(url))
    }

    /// Store a response, overwriting any entry for the same request.
    pub fn put(&mut self, request: &Request, response: Response) -> Result<(), ServiceWorkerError> {
        check_cacheable(request, &response)?;
        self.insert(request.cache_key(), response);
        Ok(())
    }

    /// Store a batch of responses. Either every entry is stored or none is.
    pub fn put_all(&mut self, entries: Vec<(Request, Response)>) -> Result<(), ServiceWorkerError> {
        for (request, response) in &entries {
            check_cacheable(request, response)?;
        }
        for (request, response) in entries {
            self.insert(request.cache_key(), response);
        }
        Ok(())
    }

    /// Delete entry.
    pub fn delete(&mut self, url: &Url) -> bool {
        self.entries.remove(&cache_key(url)).is_some()
    }

    /// Get all keys (URLs).
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, response: Response) {
        let entry = CacheEntry {
            key: key.clone(),
            response,
            cached_at: now_millis(),
        };
        self.entries.insert(key, entry);
    }
}

fn check_cacheable(request: &Request, response: &Response) -> Result<(), ServiceWorkerError> {
    if request.method != Method::GET {
        return Err(ServiceWorkerError::CacheError(format!(
            "cannot cache {} request for {}",
            request.method, request.url
        )));
    }
    if response.status == StatusCode::PARTIAL_CONTENT {
        return Err(ServiceWorkerError::CacheError(format!(
            "partial response for {}",
            request.url
        )));
    }
    let varies_on_everything = response
        .headers
        .get_all(http::header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|field| field.trim() == "*");
    if varies_on_everything {
        return Err(ServiceWorkerError::CacheError(format!(
            "Vary: * on {}",
            request.url
        )));
    }
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cache storage (the `caches` global), shared by every worker version of an
/// origin. Caches are kept in creation order, which is also match order.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: Vec<Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        let index = match self.caches.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.caches.push(Cache::new(name));
                self.caches.len() - 1
            }
        };
        &mut self.caches[index]
    }

    /// Look up a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.iter().find(|c| c.name == name)
    }

    /// Mutable lookup without creating the cache.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Cache> {
        self.caches.iter_mut().find(|c| c.name == name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.caches.len();
        self.caches.retain(|c| c.name != name);
        self.caches.len() != before
    }

    /// Get all cache names.
    pub fn keys(&self) -> Vec<String> {
        self.caches.iter().map(|c| c.name.clone()).collect()
    }

    /// Match a request across all caches.
    pub fn match_request(&self, request: &Request) -> Option<Response> {
        self.caches
            .iter()
            .find_map(|cache| cache.match_request(request))
            .map(|entry| entry.response.clone())
    }

    /// Match a URL across all caches.
    pub fn match_url(&self, url: &Url) -> Option<Response> {
        self.caches
            .iter()
            .find_map(|cache| cache.match_url(url))
            .map(|entry| entry.response.clone())
    }
}
