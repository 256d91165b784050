//! MkDocs structure processor: theme-aware page extraction.

use crate::error::Result;
use crate::http::Fetcher;
use crate::processors::extract::{self, ExtractOptions};
use crate::processors::sphinx_structure::generator_meta;
use crate::processors::themes::{self, MKDOCS_THEMES};
use crate::processors::{mkdocs_inventory, StructureProcessor};
use crate::results::{ContentDocument, Detection, InventoryObject, ProcessorCapabilities};
use crate::robots::RobotsGate;
use crate::types::{Confidence, Genus};
use async_trait::async_trait;
use scraper::Html;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const DETECT_PAGE_TTL: Duration = Duration::from_secs(3600);

/// Extracts content from MkDocs-generated sites.
pub struct MkDocsStructureProcessor {
    robots: RobotsGate,
}

impl MkDocsStructureProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            robots: RobotsGate::new(),
        }
    }
}

impl Default for MkDocsStructureProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructureProcessor for MkDocsStructureProcessor {
    fn name(&self) -> &'static str {
        "mkdocs_structure"
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities {
            supported_inventory_types: BTreeSet::from([
                mkdocs_inventory::INVENTORY_TYPE.to_string()
            ]),
            supported_filters: BTreeSet::new(),
            mean_detection_ms: None,
            max_payload_bytes: None,
        }
    }

    async fn detect(&self, location: &str, fetcher: &dyn Fetcher) -> Option<Detection> {
        let fetched = match fetcher.fetch(location, DETECT_PAGE_TTL).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::debug!(location, %err, "mkdocs structure probe failed");
                return None;
            }
        };
        let document = Html::parse_document(&fetched.text());

        let generator = generator_meta(&document);
        // The default profile has no markers; only a positive marker hit
        // counts as theme evidence here.
        let theme = themes::detect_theme(&document, &MKDOCS_THEMES);

        let confidence = if generator
            .as_deref()
            .is_some_and(|g| g.to_lowercase().contains("mkdocs"))
        {
            Confidence::new(0.9)
        } else if theme.is_some() {
            Confidence::new(0.8)
        } else {
            return None;
        };

        let mut metadata = BTreeMap::new();
        if let Some(theme) = theme {
            metadata.insert("theme".to_string(), theme.name.to_string());
        }
        if let Some(generator) = generator {
            metadata.insert("generator".to_string(), generator);
        }
        Some(Detection {
            processor_name: self.name().to_string(),
            confidence,
            processor_type: Genus::Structure,
            detection_metadata: metadata,
        })
    }

    async fn extract(
        &self,
        objects: &[InventoryObject],
        base_url: &str,
        fetcher: &dyn Fetcher,
        options: &ExtractOptions,
    ) -> Result<Vec<ContentDocument>> {
        extract::extract_documents(objects, base_url, fetcher, options, &MKDOCS_THEMES, &self.robots)
            .await
    }
}
