//! robots.txt evaluation for the extraction pipeline.
//!
//! Robots are advisory here: failure to retrieve the file never fails
//! the enclosing operation, a 404 allows everything, and a disallow is a
//! warning unless strict mode is on. Crawl-Delay is not enforced (the
//! per-host semaphore already bounds politeness).

use crate::caches::TtlCache;
use crate::error::{Error, Result};
use crate::http::{self, Fetcher};
use crate::urls;
use robotstxt::DefaultMatcher;
use std::sync::Arc;
use std::time::Duration;

/// How long a fetched robots.txt (or its absence) stays valid.
const ROBOTS_TTL: Duration = Duration::from_secs(3600);

/// User-agent token matched against robots rules.
const ROBOTS_AGENT: &str = "librovore";

#[derive(Debug, Clone)]
enum RobotsState {
    /// robots.txt absent (404) — everything allowed, no warning.
    AllowAll,
    /// robots.txt retrieved; rules evaluated per URL.
    Rules(String),
    /// robots.txt unreachable — allow, but surface a warning.
    Unavailable(String),
}

/// Per-origin robots.txt cache and evaluator.
#[derive(Default)]
pub struct RobotsGate {
    states: TtlCache<Arc<RobotsState>>,
}

/// Verdict for one page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsVerdict {
    Allowed,
    /// Allowed, but with a user-visible warning.
    AllowedWithWarning(String),
}

impl RobotsGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates whether `page_url` may be fetched.
    ///
    /// In strict mode a disallow fails with
    /// [`Error::ContentInaccessibility`]; otherwise disallows and
    /// retrieval failures degrade to warnings.
    pub async fn check(
        &self,
        fetcher: &dyn Fetcher,
        page_url: &str,
        strict: bool,
    ) -> Result<RobotsVerdict> {
        let robots_url = urls::robots_url(page_url)?;
        let state = match self.states.get(&robots_url) {
            Some(state) => state,
            None => {
                let state = Arc::new(self.load(fetcher, &robots_url).await);
                self.states.insert(&robots_url, Arc::clone(&state), ROBOTS_TTL);
                state
            }
        };

        match state.as_ref() {
            RobotsState::AllowAll => Ok(RobotsVerdict::Allowed),
            RobotsState::Unavailable(cause) => {
                let warning = Error::RobotsInaccessibility {
                    url: robots_url,
                    cause: cause.clone(),
                }
                .to_string();
                tracing::warn!("{warning}");
                Ok(RobotsVerdict::AllowedWithWarning(warning))
            }
            RobotsState::Rules(body) => {
                let mut matcher = DefaultMatcher::default();
                if matcher.one_agent_allowed_by_robots(body, ROBOTS_AGENT, page_url) {
                    Ok(RobotsVerdict::Allowed)
                } else if strict {
                    Err(Error::ContentInaccessibility {
                        reference: page_url.to_string(),
                        cause: "disallowed by robots.txt".to_string(),
                    })
                } else {
                    Ok(RobotsVerdict::AllowedWithWarning(format!(
                        "robots.txt disallows {page_url}; fetched anyway (advisory mode)"
                    )))
                }
            }
        }
    }

    async fn load(&self, fetcher: &dyn Fetcher, robots_url: &str) -> RobotsState {
        match fetcher.fetch(robots_url, ROBOTS_TTL).await {
            Ok(fetched) => RobotsState::Rules(fetched.text()),
            Err(err) if http::is_not_found(&err) => RobotsState::AllowAll,
            Err(err) => RobotsState::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies; counts fetches to verify caching.
    struct CannedFetcher {
        responses: HashMap<String, std::result::Result<String, Error>>,
        fetches: Mutex<usize>,
    }

    impl CannedFetcher {
        fn new(responses: Vec<(&str, std::result::Result<String, Error>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                fetches: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn fetch(&self, url: &str, _ttl: Duration) -> Result<crate::http::Fetched> {
            *self.fetches.lock().unwrap() += 1;
            match self.responses.get(url) {
                Some(Ok(body)) => Ok(crate::http::Fetched {
                    bytes: body.as_bytes().to_vec(),
                    final_url: url.to_string(),
                    headers: HashMap::new(),
                }),
                Some(Err(err)) => Err(err.clone()),
                None => Err(Error::ContentInaccessibility {
                    reference: url.to_string(),
                    cause: "HTTP 404 Not Found".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let fetcher = CannedFetcher::new(vec![]);
        let gate = RobotsGate::new();
        let verdict = gate
            .check(&fetcher, "https://ex.io/docs/page.html", false)
            .await
            .unwrap();
        assert_eq!(verdict, RobotsVerdict::Allowed);
    }

    #[tokio::test]
    async fn test_unreachable_robots_warns_but_allows() {
        let fetcher = CannedFetcher::new(vec![(
            "https://ex.io/robots.txt",
            Err(Error::ContentInaccessibility {
                reference: "https://ex.io/robots.txt".into(),
                cause: "connect error: refused".into(),
            }),
        )]);
        let gate = RobotsGate::new();
        match gate
            .check(&fetcher, "https://ex.io/docs/page.html", false)
            .await
            .unwrap()
        {
            RobotsVerdict::AllowedWithWarning(warning) => {
                assert!(warning.contains("robots.txt"));
            }
            RobotsVerdict::Allowed => panic!("expected a warning"),
        }
    }

    #[tokio::test]
    async fn test_disallow_warns_in_advisory_mode() {
        let fetcher = CannedFetcher::new(vec![(
            "https://ex.io/robots.txt",
            Ok("User-agent: *\nDisallow: /docs/".to_string()),
        )]);
        let gate = RobotsGate::new();
        match gate
            .check(&fetcher, "https://ex.io/docs/page.html", false)
            .await
            .unwrap()
        {
            RobotsVerdict::AllowedWithWarning(warning) => {
                assert!(warning.contains("disallows"));
            }
            RobotsVerdict::Allowed => panic!("expected a warning"),
        }
    }

    #[tokio::test]
    async fn test_disallow_fails_in_strict_mode() {
        let fetcher = CannedFetcher::new(vec![(
            "https://ex.io/robots.txt",
            Ok("User-agent: *\nDisallow: /docs/".to_string()),
        )]);
        let gate = RobotsGate::new();
        let result = gate
            .check(&fetcher, "https://ex.io/docs/page.html", true)
            .await;
        assert!(matches!(
            result,
            Err(Error::ContentInaccessibility { .. })
        ));
    }

    #[tokio::test]
    async fn test_robots_body_cached_per_origin() {
        let fetcher = CannedFetcher::new(vec![(
            "https://ex.io/robots.txt",
            Ok("User-agent: *\nAllow: /".to_string()),
        )]);
        let gate = RobotsGate::new();
        gate.check(&fetcher, "https://ex.io/a.html", false)
            .await
            .unwrap();
        gate.check(&fetcher, "https://ex.io/b.html", false)
            .await
            .unwrap();
        assert_eq!(*fetcher.fetches.lock().unwrap(), 1);
    }
}
