//! Request routing policy.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. non-GET requests are not intercepted
//! 2. cross-origin requests are not intercepted
//! 3. navigations go network-first, falling back to cache then the offline page
//! 4. static assets go cache-first with a background refresh
//! 5. everything else is an API call: network-first, cache only on failure

use http::Method;
use splitfriend_net::Request;

use crate::config::WorkerConfig;

/// Extensions served cache-first.
pub const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "woff", "woff2",
];

/// Why a request was left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    Method,
    CrossOrigin,
}

/// Caching strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted.
    Passthrough(Bypass),
    /// Network-first, cache and offline-page fallback, caches on success.
    Navigation,
    /// Cache-first, stale-while-revalidate.
    StaticAsset,
    /// Network-first, cache fallback only.
    Api,
}

impl Route {
    /// Pick the route for `request`.
    pub fn classify(request: &Request, config: &WorkerConfig) -> Self {
        if request.method != Method::GET {
            return Route::Passthrough(Bypass::Method);
        }
        if !config.is_same_origin(&request.url) {
            return Route::Passthrough(Bypass::CrossOrigin);
        }
        if request.is_navigation() {
            return Route::Navigation;
        }
        if is_static_asset(request.url.path()) {
            return Route::StaticAsset;
        }
        Route::Api
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Passthrough(_) => "passthrough",
            Route::Navigation => "navigation",
            Route::StaticAsset => "static",
            Route::Api => "api",
        }
    }
}

/// Whether a URL path names a static asset. Case-sensitive, query excluded.
pub fn is_static_asset(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((_, ext)) => STATIC_EXTENSIONS.contains(&ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn config() -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://splitfriend.example").unwrap())
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_non_get_passes_through() {
        let url = Url::parse("https://splitfriend.example/expenses").unwrap();
        let request = Request::post(url, Default::default());
        assert_eq!(
            Route::classify(&request, &config()),
            Route::Passthrough(Bypass::Method)
        );
    }

    #[test]
    fn test_method_checked_before_origin() {
        let url = Url::parse("https://cdn.example/upload").unwrap();
        let request = Request::post(url, Default::default());
        assert_eq!(
            Route::classify(&request, &config()),
            Route::Passthrough(Bypass::Method)
        );
    }

    #[test]
    fn test_cross_origin_passes_through() {
        let request = get("https://cdn.jsdelivr.net/npm/bootstrap.min.css");
        assert_eq!(
            Route::classify(&request, &config()),
            Route::Passthrough(Bypass::CrossOrigin)
        );
    }

    #[test]
    fn test_navigation_wins_over_extension() {
        let url = Url::parse("https://splitfriend.example/js/app.js").unwrap();
        let request = Request::navigate(url);
        assert_eq!(Route::classify(&request, &config()), Route::Navigation);
    }

    #[test]
    fn test_static_and_api() {
        let cfg = config();
        assert_eq!(
            Route::classify(&get("https://splitfriend.example/css/style.css"), &cfg),
            Route::StaticAsset
        );
        assert_eq!(
            Route::classify(&get("https://splitfriend.example/fonts/x.woff2?v=3"), &cfg),
            Route::StaticAsset
        );
        assert_eq!(
            Route::classify(&get("https://splitfriend.example/api/push/status"), &cfg),
            Route::Api
        );
        assert_eq!(
            Route::classify(&get("https://splitfriend.example/manifest.json"), &cfg),
            Route::Api
        );
    }

    #[test]
    fn test_is_static_asset() {
        assert!(is_static_asset("/icons/icon-192x192.png"));
        assert!(is_static_asset("/favicon.ico"));
        assert!(!is_static_asset("/groups/12"));
        assert!(!is_static_asset("/v1.2/groups"));
        assert!(!is_static_asset("/img/photo.PNG"));
        assert!(!is_static_asset("/export.csv"));
    }
}
