//! URL utilities: normalization, candidate derivation, joining, and the
//! process-wide redirect table.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use url::Url;

/// Memoization of successfully extended URLs.
///
/// After the orchestrator resolves `original` to a working candidate,
/// every later call with `original` goes straight to the working URL.
#[derive(Debug, Default)]
pub struct RedirectCache {
    entries: RwLock<HashMap<String, String>>,
}

impl RedirectCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the working URL for `url`, or `url` itself when no
    /// redirect is recorded.
    #[must_use]
    pub fn resolve(&self, url: &str) -> String {
        self.read()
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string())
    }

    /// Records that `original` resolves to `working`. Last writer wins.
    pub fn record(&self, original: &str, working: &str) {
        if original == working {
            return;
        }
        self.write()
            .insert(original.to_string(), working.to_string());
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.read().contains_key(url)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Returns the working URL for `location` via the redirect table when
/// present, else `location` unchanged.
#[must_use]
pub fn normalize_location(location: &str, redirects: &RedirectCache) -> String {
    redirects.resolve(location.trim_end_matches('/'))
}

/// Yields the URL-pattern extension candidates for `base`, lazily, in
/// registration order. The first candidate is always `base` itself.
///
/// Candidates come out in the canonical no-trailing-slash form so they
/// can serve directly as redirect-table values and cache keys.
pub fn derive_candidates<'a>(
    base: &'a str,
    suffixes: &'a [String],
) -> impl Iterator<Item = String> + 'a {
    let trimmed = base.trim_end_matches('/');
    suffixes
        .iter()
        .map(move |suffix| format!("{trimmed}{}", suffix.trim_end_matches('/')))
}

/// Joins a relative URI against a base URL per RFC 3986.
///
/// The base is treated as a directory: a missing trailing slash is added
/// before joining so `https://ex.io/docs` + `api/foo.html` lands under
/// `/docs/`, not beside it.
pub fn join_url(base: &str, relative: &str) -> Result<String> {
    let base_dir = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    let parsed = Url::parse(&base_dir).map_err(|e| Error::ContentInaccessibility {
        reference: base.to_string(),
        cause: format!("invalid base URL: {e}"),
    })?;
    let joined = parsed
        .join(relative)
        .map_err(|e| Error::ContentInaccessibility {
            reference: relative.to_string(),
            cause: format!("invalid relative URI: {e}"),
        })?;
    Ok(joined.to_string())
}

/// Extracts the host component, used for per-host politeness limits.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

/// The `/robots.txt` URL for the origin serving `url`.
pub fn robots_url(url: &str) -> Result<String> {
    let mut robots = Url::parse(url).map_err(|e| Error::ContentInaccessibility {
        reference: url.to_string(),
        cause: format!("invalid URL: {e}"),
    })?;
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Ok(robots.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_cache_resolution() {
        let cache = RedirectCache::new();
        assert_eq!(cache.resolve("https://ex.io/pkg"), "https://ex.io/pkg");

        cache.record("https://ex.io/pkg", "https://ex.io/pkg/en/latest/");
        assert_eq!(
            cache.resolve("https://ex.io/pkg"),
            "https://ex.io/pkg/en/latest/"
        );
    }

    #[test]
    fn test_redirect_cache_skips_identity() {
        let cache = RedirectCache::new();
        cache.record("https://ex.io/pkg", "https://ex.io/pkg");
        assert!(!cache.contains("https://ex.io/pkg"));
    }

    #[test]
    fn test_derive_candidates_order() {
        let suffixes = vec![
            String::new(),
            "/en/latest/".to_string(),
            "/latest/".to_string(),
        ];
        let candidates: Vec<_> = derive_candidates("https://ex.io/pkg/", &suffixes).collect();
        assert_eq!(
            candidates,
            vec![
                "https://ex.io/pkg",
                "https://ex.io/pkg/en/latest",
                "https://ex.io/pkg/latest",
            ]
        );
    }

    #[test]
    fn test_join_url_treats_base_as_directory() {
        assert_eq!(
            join_url("https://ex.io/docs", "api/foo.html#foo").unwrap(),
            "https://ex.io/docs/api/foo.html#foo"
        );
        assert_eq!(
            join_url("https://ex.io/docs/", "api/foo.html").unwrap(),
            "https://ex.io/docs/api/foo.html"
        );
    }

    #[test]
    fn test_join_url_absolute_relative() {
        assert_eq!(
            join_url("https://ex.io/docs/", "https://other.io/x").unwrap(),
            "https://other.io/x"
        );
    }

    #[test]
    fn test_robots_url() {
        assert_eq!(
            robots_url("https://ex.io/docs/api/foo.html?q=1").unwrap(),
            "https://ex.io/robots.txt"
        );
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://ex.io/docs/"), Some("ex.io".to_string()));
        assert_eq!(host_of("not a url"), None);
    }
}
