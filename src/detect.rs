//! Detection orchestrator.
//!
//! Selects the optimal processor for a source per genus: candidate URLs
//! are probed in derivation order, every registered processor probes one
//! candidate concurrently (bounded), the first candidate with a
//! supra-threshold detection wins, and the whole round is cached with a
//! TTL. Successful URL-pattern extensions land in the redirect table so
//! later calls skip straight to the working URL.

use crate::caches::DetectionsCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::processors::{ProcessorRegistry, INVENTORY_TYPE_PRECEDENCE};
use crate::results::Detection;
use crate::types::Genus;
use crate::urls::{self, RedirectCache};
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// One completed detection round for a source.
#[derive(Debug, Clone)]
pub struct DetectionRound {
    /// The working, normalized source the round settled on.
    pub source: String,
    /// Every detection produced, including sub-threshold ones.
    pub detections: Vec<Detection>,
    /// The selected detection, when one cleared the threshold.
    pub optimal: Option<Detection>,
}

/// Per-genus detection caches plus the probing algorithm.
pub struct DetectionOrchestrator {
    inventory_cache: DetectionsCache,
    structure_cache: DetectionsCache,
    probe_concurrency: usize,
    url_patterns_enabled: bool,
    url_pattern_candidates: Vec<String>,
}

impl DetectionOrchestrator {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let ttl = Duration::from_secs(config.detection.ttl_s);
        Self {
            inventory_cache: DetectionsCache::new(ttl),
            structure_cache: DetectionsCache::new(ttl),
            probe_concurrency: config.detection.probe_concurrency.max(1),
            url_patterns_enabled: config.url_patterns.enabled,
            url_pattern_candidates: config.url_patterns.candidates.clone(),
        }
    }

    fn cache(&self, genus: Genus) -> &DetectionsCache {
        match genus {
            Genus::Inventory => &self.inventory_cache,
            Genus::Structure => &self.structure_cache,
        }
    }

    /// Runs (or replays from cache) a full detection round.
    pub async fn detect_all(
        &self,
        registry: &ProcessorRegistry,
        redirects: &RedirectCache,
        fetcher: &dyn Fetcher,
        location: &str,
        genus: Genus,
    ) -> DetectionRound {
        let source = urls::normalize_location(location, redirects);

        if let Some(entry) = self.cache(genus).lookup(&source) {
            return DetectionRound {
                source,
                detections: entry.detections,
                optimal: entry.optimal,
            };
        }

        let candidates: Vec<String> = if self.url_patterns_enabled {
            urls::derive_candidates(&source, &self.url_pattern_candidates).collect()
        } else {
            vec![source.clone()]
        };

        let mut collected = Vec::new();
        let mut working = source.clone();
        for candidate in &candidates {
            let detections = self.probe_candidate(registry, fetcher, candidate, genus).await;
            let any_passes = detections.iter().any(|d| d.confidence.passes_threshold());
            collected.extend(detections);
            if any_passes {
                working = candidate.clone();
                break;
            }
        }

        let optimal = select_optimal(&collected, genus);
        if optimal.is_some() && working != source {
            redirects.record(&source, &working);
        }
        // Cache under the working URL: normalization routes every later
        // lookup for the original source here.
        let cache_key = if optimal.is_some() { &working } else { &source };
        self.cache(genus)
            .record(cache_key, collected.clone(), optimal.clone());

        DetectionRound {
            source: working,
            detections: collected,
            optimal,
        }
    }

    /// The optimal processor for a source, or `ProcessorInavailability`.
    pub async fn detect_optimal(
        &self,
        registry: &ProcessorRegistry,
        redirects: &RedirectCache,
        fetcher: &dyn Fetcher,
        location: &str,
        genus: Genus,
    ) -> Result<(String, Detection)> {
        let round = self
            .detect_all(registry, redirects, fetcher, location, genus)
            .await;
        match round.optimal {
            Some(detection) => Ok((round.source, detection)),
            None => Err(Error::ProcessorInavailability {
                origin: round.source,
                genus,
                attempted_processors: registry.names(genus),
                url_patterns_attempted: self.url_patterns_enabled,
            }),
        }
    }

    /// Explicit-name override path: runs exactly one processor on the
    /// normalized location, bypassing candidates and selection but still
    /// subject to the threshold.
    pub async fn detect_named(
        &self,
        registry: &ProcessorRegistry,
        redirects: &RedirectCache,
        fetcher: &dyn Fetcher,
        location: &str,
        genus: Genus,
        processor_name: &str,
    ) -> Result<(String, Detection)> {
        let source = urls::normalize_location(location, redirects);
        let detection = match genus {
            Genus::Inventory => {
                let processor = registry.inventory_by_name(processor_name).ok_or_else(|| {
                    Error::Usage(format!("unknown inventory processor '{processor_name}'"))
                })?;
                processor.detect(&source, fetcher).await
            }
            Genus::Structure => {
                let processor = registry.structure_by_name(processor_name).ok_or_else(|| {
                    Error::Usage(format!("unknown structure processor '{processor_name}'"))
                })?;
                processor.detect(&source, fetcher).await
            }
        };
        match detection {
            Some(detection) if detection.confidence.passes_threshold() => Ok((source, detection)),
            _ => Err(Error::ProcessorInavailability {
                origin: source,
                genus,
                attempted_processors: vec![processor_name.to_string()],
                url_patterns_attempted: false,
            }),
        }
    }

    /// Probes every registered processor of a genus against one
    /// candidate URL, concurrently but awaited as a group.
    async fn probe_candidate(
        &self,
        registry: &ProcessorRegistry,
        fetcher: &dyn Fetcher,
        candidate: &str,
        genus: Genus,
    ) -> Vec<Detection> {
        match genus {
            Genus::Inventory => {
                let processors: Vec<_> = registry.inventory_processors().to_vec();
                futures::stream::iter(processors)
                    .map(|processor| async move { processor.detect(candidate, fetcher).await })
                    .buffered(self.probe_concurrency)
                    .collect::<Vec<_>>()
                    .await
            }
            Genus::Structure => {
                let processors: Vec<_> = registry.structure_processors().to_vec();
                futures::stream::iter(processors)
                    .map(|processor| async move { processor.detect(candidate, fetcher).await })
                    .buffered(self.probe_concurrency)
                    .collect::<Vec<_>>()
                    .await
            }
        }
        .into_iter()
        .flatten()
        .collect()
    }

    /// Drops all cached detection rounds (both genera).
    pub fn clear_caches(&self) {
        self.inventory_cache.clear();
        self.structure_cache.clear();
    }
}

/// Selection: highest confidence wins; registration order breaks exact
/// ties; within the equality margin the inventory-type precedence table
/// overrides for the inventory genus.
fn select_optimal(detections: &[Detection], genus: Genus) -> Option<Detection> {
    let mut above: Vec<(usize, &Detection)> = detections
        .iter()
        .enumerate()
        .filter(|(_, d)| d.confidence.passes_threshold())
        .collect();
    above.sort_by(|(index_a, a), (index_b, b)| {
        b.confidence
            .as_f64()
            .total_cmp(&a.confidence.as_f64())
            .then_with(|| index_a.cmp(index_b))
    });

    let mut best = *above.first()?;
    if genus == Genus::Inventory {
        for candidate in above.iter().skip(1) {
            if candidate.1.confidence.roughly_equals(best.1.confidence)
                && precedence_rank(&candidate.1.processor_name) < precedence_rank(&best.1.processor_name)
            {
                best = *candidate;
            }
        }
    }
    Some(best.1.clone())
}

fn precedence_rank(processor_name: &str) -> usize {
    INVENTORY_TYPE_PRECEDENCE
        .iter()
        .position(|name| *name == processor_name)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;
    use std::collections::BTreeMap;

    fn detection(name: &str, confidence: f64) -> Detection {
        Detection {
            processor_name: name.to_string(),
            confidence: Confidence::new(confidence),
            processor_type: Genus::Inventory,
            detection_metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_selection_picks_highest_confidence() {
        let detections = vec![
            detection("mkdocs_search_index", 0.7),
            detection("sphinx_objects_inv", 0.95),
        ];
        let optimal = select_optimal(&detections, Genus::Inventory).unwrap();
        assert_eq!(optimal.processor_name, "sphinx_objects_inv");
    }

    #[test]
    fn test_selection_ignores_sub_threshold() {
        let detections = vec![detection("sphinx_objects_inv", 0.3)];
        assert!(select_optimal(&detections, Genus::Inventory).is_none());
    }

    #[test]
    fn test_sphinx_precedence_within_margin() {
        // mkdocs first in the list and numerically equal confidence:
        // precedence must still pick sphinx.
        let detections = vec![
            detection("mkdocs_search_index", 0.9),
            detection("sphinx_objects_inv", 0.9),
        ];
        let optimal = select_optimal(&detections, Genus::Inventory).unwrap();
        assert_eq!(optimal.processor_name, "sphinx_objects_inv");
    }

    #[test]
    fn test_precedence_not_applied_outside_margin() {
        let detections = vec![
            detection("mkdocs_search_index", 0.9),
            detection("sphinx_objects_inv", 0.7),
        ];
        let optimal = select_optimal(&detections, Genus::Inventory).unwrap();
        assert_eq!(optimal.processor_name, "mkdocs_search_index");
    }

    #[test]
    fn test_registration_order_breaks_exact_ties() {
        let detections = vec![detection("alpha", 0.8), detection("beta", 0.8)];
        // Neither is in the precedence table; the earlier registrant wins.
        let optimal = select_optimal(&detections, Genus::Inventory).unwrap();
        assert_eq!(optimal.processor_name, "alpha");
    }

    #[test]
    fn test_structure_genus_skips_inventory_precedence() {
        let detections = vec![
            detection("mkdocs_search_index", 0.9),
            detection("sphinx_objects_inv", 0.9),
        ];
        let optimal = select_optimal(&detections, Genus::Structure).unwrap();
        assert_eq!(optimal.processor_name, "mkdocs_search_index");
    }
}
