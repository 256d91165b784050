//! MkDocs `search_index.json` inventory processor.

use crate::caches::TtlCache;
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::processors::{Inventory, InventoryProcessor};
use crate::results::{Detection, InventoryObject, ProcessorCapabilities};
use crate::types::{Confidence, Genus};
use crate::urls;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const INVENTORY_TYPE: &str = "mkdocs_search_index";

/// Probe paths relative to the site base, in order.
const PROBE_PATHS: [&str; 3] = [
    "search/search_index.json",
    "search_index.json",
    "assets/search/search_index.json",
];

/// Indexes larger than this are rejected rather than parsed.
const MAX_INDEX_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Deserialize)]
struct SearchIndex {
    docs: Vec<SearchIndexDoc>,
}

#[derive(Deserialize)]
struct SearchIndexDoc {
    location: String,
    title: String,
}

/// Detects and acquires MkDocs search indexes.
pub struct MkDocsInventoryProcessor {
    cache: TtlCache<Arc<Inventory>>,
    ttl: Duration,
}

impl MkDocsInventoryProcessor {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(),
            ttl,
        }
    }

    async fn fetch_and_parse(
        &self,
        location: &str,
        fetcher: &dyn Fetcher,
    ) -> Result<Arc<Inventory>> {
        let mut last_err = None;
        for path in PROBE_PATHS {
            let url = urls::join_url(location, path)?;
            match fetcher.fetch(&url, self.ttl).await {
                Ok(fetched) => {
                    if fetched.bytes.len() as u64 > MAX_INDEX_BYTES {
                        return Err(Error::InventoryInvalidity {
                            location: fetched.final_url,
                            reason: format!(
                                "search index exceeds {MAX_INDEX_BYTES} bytes"
                            ),
                        });
                    }
                    let inventory_url = fetched.final_url.clone();
                    return Ok(Arc::new(parse_search_index(
                        &fetched.bytes,
                        &inventory_url,
                    )?));
                }
                Err(err) => {
                    tracing::debug!(url, %err, "search index probe missed");
                    last_err = Some(err);
                }
            }
        }
        let cause = last_err.map_or_else(|| "no probe paths".to_string(), |e| e.to_string());
        Err(Error::InventoryInaccessibility {
            url: location.to_string(),
            cause,
        })
    }
}

#[async_trait]
impl InventoryProcessor for MkDocsInventoryProcessor {
    fn name(&self) -> &'static str {
        INVENTORY_TYPE
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities {
            supported_inventory_types: BTreeSet::from([INVENTORY_TYPE.to_string()]),
            supported_filters: ["domain", "role", "priority", "uri_prefix", "name_regex"]
                .into_iter()
                .map(String::from)
                .collect(),
            mean_detection_ms: None,
            max_payload_bytes: Some(MAX_INDEX_BYTES),
        }
    }

    async fn detect(&self, location: &str, fetcher: &dyn Fetcher) -> Option<Detection> {
        match self.acquire(location, fetcher).await {
            Ok(inventory) => {
                let confidence = match inventory.objects.len() {
                    0 => return None,
                    1..=9 => Confidence::new(0.7),
                    _ => Confidence::new(0.9),
                };
                let mut metadata = BTreeMap::new();
                metadata.insert(
                    "inventory_url".to_string(),
                    inventory.location_url.clone(),
                );
                metadata.insert(
                    "object_count".to_string(),
                    inventory.objects.len().to_string(),
                );
                Some(Detection {
                    processor_name: self.name().to_string(),
                    confidence,
                    processor_type: Genus::Inventory,
                    detection_metadata: metadata,
                })
            }
            Err(err) => {
                tracing::debug!(location, %err, "mkdocs search index not detected");
                None
            }
        }
    }

    async fn acquire(&self, location: &str, fetcher: &dyn Fetcher) -> Result<Arc<Inventory>> {
        if let Some(hit) = self.cache.get(location) {
            return Ok(hit);
        }
        let inventory = self.fetch_and_parse(location, fetcher).await?;
        self.cache.insert(location, Arc::clone(&inventory), self.ttl);
        Ok(inventory)
    }
}

/// Parses and validates the bytes of a `search_index.json` file.
pub fn parse_search_index(bytes: &[u8], inventory_url: &str) -> Result<Inventory> {
    let invalid = |reason: String| Error::InventoryInvalidity {
        location: inventory_url.to_string(),
        reason,
    };

    let index: SearchIndex = serde_json::from_slice(bytes)
        .map_err(|e| invalid(format!("search index is not valid JSON: {e}")))?;
    if index.docs.is_empty() {
        return Err(invalid("search index has no docs".to_string()));
    }

    let objects = index
        .docs
        .into_iter()
        .map(|doc| {
            let mut specifics = BTreeMap::new();
            specifics.insert("object_type".to_string(), "page".to_string());
            specifics.insert("domain".to_string(), "page".to_string());
            specifics.insert("role".to_string(), "doc".to_string());
            specifics.insert("priority".to_string(), "1".to_string());
            InventoryObject::new(
                doc.title,
                doc.location,
                INVENTORY_TYPE,
                inventory_url,
                None,
                specifics,
            )
        })
        .collect();

    Ok(Inventory {
        location_url: inventory_url.to_string(),
        inventory_type: INVENTORY_TYPE.to_string(),
        objects,
    })
}
