//! SplitFriend probe
//!
//! Installs the offline worker against a running SplitFriend server, then
//! loads each requested path through it and prints where the response came
//! from. With `--offline` the network is cut after install so the cache
//! fallbacks can be checked by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::json;
use splitfriend_common::{init_logging, LogConfig, LogFormat};
use splitfriend_net::{Fetcher, HttpFetcher, LoaderConfig, NetError, Request, Response};
use splitfriend_sw::{
    NotificationTray, ServiceWorkerContainer, WorkerConfig, WorkerHost, WORKER_SCRIPT_PATH,
};
use tracing::info;
use url::Url;

/// Parse command line arguments
struct Args {
    origin: Option<String>,
    pages: Vec<String>,
    paths: Vec<String>,
    offline: bool,
    log_format: LogFormat,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut origin = None;
        let mut pages = Vec::new();
        let mut paths = Vec::new();
        let mut offline = false;
        let mut log_format = LogFormat::Compact;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--origin" => {
                    origin = args.next();
                }
                "--page" => {
                    pages.extend(args.next());
                }
                "--path" => {
                    paths.extend(args.next());
                }
                "--offline" => {
                    offline = true;
                }
                "--log-format" => {
                    if let Some(val) = args.next() {
                        log_format = val.parse().unwrap_or(LogFormat::Compact);
                    }
                }
                _ => {}
            }
        }

        Self {
            origin,
            pages,
            paths,
            offline,
            log_format,
        }
    }
}

/// Real network with a switch to cut it.
struct SwitchableFetcher {
    inner: HttpFetcher,
    offline: AtomicBool,
}

#[async_trait]
impl Fetcher for SwitchableFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(NetError::Offline(request.url.to_string()));
        }
        self.inner.fetch(request).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LogConfig::default().with_format(args.log_format));

    let Some(origin) = args.origin.as_deref() else {
        bail!("usage: splitfriend-probe --origin <url> [--page <path>]... [--path <path>]... [--offline]");
    };
    let origin = Url::parse(origin).with_context(|| format!("invalid origin {}", origin))?;

    let fetcher = Arc::new(SwitchableFetcher {
        inner: HttpFetcher::new(LoaderConfig::default())?,
        offline: AtomicBool::new(false),
    });
    let host = WorkerHost::new(fetcher.clone(), Arc::new(NotificationTray::new()));
    let (container, _events) = ServiceWorkerContainer::new(host);

    let config = WorkerConfig::new(origin.clone());
    container
        .register(WORKER_SCRIPT_PATH, config.clone())
        .await
        .context("worker install failed")?;
    info!(origin = %origin, "Worker active");

    if args.offline {
        fetcher.offline.store(true, Ordering::Release);
        info!("Network cut");
    }

    let pages = if args.pages.is_empty() && args.paths.is_empty() {
        vec!["/".to_string()]
    } else {
        args.pages
    };
    let requests = pages
        .iter()
        .map(|p| config.resolve(p).map(Request::navigate))
        .chain(args.paths.iter().map(|p| config.resolve(p).map(Request::get)))
        .collect::<Result<Vec<_>, _>>()?;

    for request in &requests {
        let line = match container.fetch(request).await {
            Ok((response, source)) => json!({
                "url": request.url.as_str(),
                "status": response.status.as_u16(),
                "source": format!("{:?}", source),
                "bytes": response.body().len(),
            }),
            Err(e) => json!({
                "url": request.url.as_str(),
                "error": e.to_string(),
            }),
        };
        println!("{}", line);
    }

    if let Some(scope) = container.get_registration(origin.as_str()).await {
        if let Some(worker) = container.active_worker(&scope).await {
            let settled = worker.settle().await;
            info!(settled, "Background work finished");
        }
    }

    Ok(())
}
