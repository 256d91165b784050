//! Configuration for the engine.
//!
//! One immutable record threaded explicitly through `Core`; no global
//! mutable state lives outside the caches a `Core` owns.

use serde::{Deserialize, Serialize};

/// Engine configuration with the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub http: HttpConfig,
    pub search: SearchConfig,
    pub url_patterns: UrlPatternsConfig,
    pub robots: RobotsConfig,
    /// Per-operation deadline in seconds.
    pub operation_timeout_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// TTL for detection cache entries, in seconds.
    pub ttl_s: u64,
    /// Bound on concurrent processor probes per URL candidate.
    pub probe_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_s: u64,
    /// Global outbound request bound.
    pub max_concurrency: usize,
    /// Per-host politeness bound.
    pub per_host_concurrency: usize,
    /// Redirect hop limit.
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Similarity cutoff for fuzzy matching, in [0, 100].
    pub fuzzy_threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPatternsConfig {
    /// Whether URL-pattern extension probing is enabled.
    pub enabled: bool,
    /// Path suffixes probed in order; "" is the bare base URL.
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    /// When true, a robots.txt disallow fails the operation instead of
    /// producing a warning.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            http: HttpConfig::default(),
            search: SearchConfig::default(),
            url_patterns: UrlPatternsConfig::default(),
            robots: RobotsConfig::default(),
            operation_timeout_s: 120,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ttl_s: 3600,
            probe_concurrency: 8,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_s: 30,
            max_concurrency: 16,
            per_host_concurrency: 4,
            max_redirects: 10,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 50 }
    }
}

impl Default for UrlPatternsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            candidates: vec![
                String::new(),
                "/en/latest/".to_string(),
                "/latest/".to_string(),
                "/main/".to_string(),
                "/stable/".to_string(),
            ],
        }
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self { strict: false }
    }
}

/// User-Agent sent on every outbound request.
#[must_use]
pub fn user_agent() -> String {
    format!("librovore/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.detection.ttl_s, 3600);
        assert_eq!(config.http.timeout_s, 30);
        assert_eq!(config.http.max_concurrency, 16);
        assert_eq!(config.http.per_host_concurrency, 4);
        assert_eq!(config.search.fuzzy_threshold, 50);
        assert!(config.url_patterns.enabled);
        assert_eq!(config.url_patterns.candidates.len(), 5);
        assert!(!config.robots.strict);
        assert_eq!(config.operation_timeout_s, 120);
    }

    #[test]
    fn test_user_agent_names_the_crate() {
        assert!(user_agent().starts_with("librovore/"));
    }
}
