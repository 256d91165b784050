//! HTTP fetch proxy.
//!
//! One process-wide fetcher with an in-memory TTL response cache,
//! conditional revalidation when the server supplied validators, a global
//! outbound semaphore plus per-host politeness semaphores, and bounded
//! retries with exponential backoff for transient failures.
//!
//! The `Fetcher` trait is the seam the processors and the orchestrator
//! see; tests substitute an in-memory implementation.

use crate::caches::TtlCache;
use crate::config::{self, HttpConfig};
use crate::error::{Error, Result};
use crate::urls;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Backoff schedule for transient failures (connect errors, 5xx).
const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(250),
    Duration::from_secs(1),
    Duration::from_secs(4),
];

/// A fetched response body with redirect and header context.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// URL after following redirects.
    pub final_url: String,
    /// Response headers relevant to callers (content-type, validators).
    pub headers: HashMap<String, String>,
}

impl Fetched {
    /// Decodes the body as UTF-8 text, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Retrieval seam for everything that talks to the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves a URL's bytes, serving from the TTL cache when fresh.
    ///
    /// Fails with [`Error::ContentInaccessibility`] for transport
    /// failures and 4xx/5xx statuses. The cause string for HTTP statuses
    /// is `HTTP <code> <reason>`.
    async fn fetch(&self, url: &str, ttl: Duration) -> Result<Fetched>;
}

/// Whether a fetch error is an HTTP 404.
///
/// robots.txt handling needs to distinguish "absent" (allow all) from
/// "unreachable" (warn).
#[must_use]
pub fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::ContentInaccessibility { cause, .. } if cause.starts_with("HTTP 404"))
}

/// Production fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
    cache: TtlCache<Arc<Fetched>>,
    global: Arc<Semaphore>,
    per_host: RwLock<HashMap<String, Arc<Semaphore>>>,
    per_host_limit: usize,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config::user_agent())
            .timeout(Duration::from_secs(config.timeout_s))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache: TtlCache::new(),
            global: Arc::new(Semaphore::new(config.max_concurrency)),
            per_host: RwLock::new(HashMap::new()),
            per_host_limit: config.per_host_concurrency,
        })
    }

    fn host_semaphore(&self, url: &str) -> Arc<Semaphore> {
        let host = urls::host_of(url).unwrap_or_default();
        {
            let hosts = self.per_host.read().unwrap_or_else(|e| e.into_inner());
            if let Some(semaphore) = hosts.get(&host) {
                return Arc::clone(semaphore);
            }
        }
        let mut hosts = self.per_host.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            hosts
                .entry(host)
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit))),
        )
    }

    /// Performs one GET, applying conditional headers from a stale cache
    /// entry when its validators are present.
    async fn get_once(&self, url: &str, stale: Option<&Fetched>) -> Result<GetOutcome> {
        let mut request = self.client.get(url);
        if let Some(stale) = stale {
            if let Some(etag) = stale.headers.get("etag") {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(modified) = stale.headers.get("last-modified") {
                request = request.header(reqwest::header::IF_MODIFIED_SINCE, modified);
            }
        }

        let response = request.send().await.map_err(|e| {
            Error::ContentInaccessibility {
                reference: url.to_string(),
                cause: if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    format!("connect error: {e}")
                } else {
                    e.to_string()
                },
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(GetOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(Error::ContentInaccessibility {
                reference: url.to_string(),
                cause: format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                ),
            });
        }

        let final_url = response.url().to_string();
        let mut headers = HashMap::new();
        for key in ["content-type", "etag", "last-modified"] {
            if let Some(value) = response.headers().get(key) {
                if let Ok(value) = value.to_str() {
                    headers.insert(key.to_string(), value.to_string());
                }
            }
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::ContentInaccessibility {
                reference: url.to_string(),
                cause: format!("body read failed: {e}"),
            })?;

        Ok(GetOutcome::Fresh(Fetched {
            bytes: bytes.to_vec(),
            final_url,
            headers,
        }))
    }

    fn is_transient(err: &Error) -> bool {
        match err {
            Error::ContentInaccessibility { cause, .. } => {
                cause.starts_with("connect error")
                    || cause.starts_with("request timed out")
                    || cause
                        .strip_prefix("HTTP 5")
                        .is_some_and(|rest| rest.len() >= 2)
            }
            _ => false,
        }
    }
}

enum GetOutcome {
    Fresh(Fetched),
    NotModified,
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, ttl: Duration) -> Result<Fetched> {
        if let Some(hit) = self.cache.get(url) {
            return Ok((*hit).clone());
        }
        let stale = self.cache.peek_stale(url);

        let _global = self
            .global
            .acquire()
            .await
            .map_err(|_| Error::Cancelled)?;
        let host = self.host_semaphore(url);
        let _host = host.acquire().await.map_err(|_| Error::Cancelled)?;

        let mut last_err = None;
        for (attempt, backoff) in std::iter::once(None)
            .chain(RETRY_BACKOFF.iter().copied().map(Some))
            .enumerate()
        {
            if let Some(backoff) = backoff {
                tracing::debug!(url, attempt, "retrying after transient failure");
                tokio::time::sleep(backoff).await;
            }
            match self.get_once(url, stale.as_deref()).await {
                Ok(GetOutcome::Fresh(fetched)) => {
                    self.cache.insert(url, Arc::new(fetched.clone()), ttl);
                    return Ok(fetched);
                }
                Ok(GetOutcome::NotModified) => match stale.as_ref() {
                    // Validators confirmed the stale body; refresh its clock.
                    Some(revalidated) => {
                        self.cache.insert(url, Arc::clone(revalidated), ttl);
                        return Ok((**revalidated).clone());
                    }
                    None => {
                        return Err(Error::ContentInaccessibility {
                            reference: url.to_string(),
                            cause: "server returned 304 without a prior cached response".into(),
                        })
                    }
                },
                Err(err) if Self::is_transient(&err) => {
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::ContentInaccessibility {
            reference: url.to_string(),
            cause: "retries exhausted".to_string(),
        }))
    }
}
