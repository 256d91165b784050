//! Sphinx structure processor: theme-aware page extraction.

use crate::error::Result;
use crate::http::Fetcher;
use crate::processors::extract::{self, ExtractOptions};
use crate::processors::themes::{self, SPHINX_THEMES};
use crate::processors::{sphinx_inventory, StructureProcessor};
use crate::results::{ContentDocument, Detection, InventoryObject, ProcessorCapabilities};
use crate::robots::RobotsGate;
use crate::types::{Confidence, Genus};
use async_trait::async_trait;
use scraper::Html;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const DETECT_PAGE_TTL: Duration = Duration::from_secs(3600);

/// Extracts content from Sphinx-generated sites.
pub struct SphinxStructureProcessor {
    robots: RobotsGate,
}

impl SphinxStructureProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            robots: RobotsGate::new(),
        }
    }
}

impl Default for SphinxStructureProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructureProcessor for SphinxStructureProcessor {
    fn name(&self) -> &'static str {
        "sphinx_structure"
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities {
            supported_inventory_types: BTreeSet::from([
                sphinx_inventory::INVENTORY_TYPE.to_string()
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
                tracing::debug!(location, %err, "sphinx structure probe failed");
                return None;
            }
        };
        let document = Html::parse_document(&fetched.text());

        let generator = generator_meta(&document);
        let theme = themes::detect_theme(&document, &SPHINX_THEMES);

        let confidence = if generator
            .as_deref()
            .is_some_and(|g| g.to_lowercase().contains("sphinx"))
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
        extract::extract_documents(objects, base_url, fetcher, options, &SPHINX_THEMES, &self.robots)
            .await
    }
}

/// Content of `<meta name="generator">`, when present.
pub(crate) fn generator_meta(document: &Html) -> Option<String> {
    document
        .select(&themes::selector("meta[name=generator]"))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_meta_extraction() {
        let document = Html::parse_document(
            r#"<html><head><meta name="generator" content="Sphinx 7.2.6"></head><body></body></html>"#,
        );
        assert_eq!(generator_meta(&document).as_deref(), Some("Sphinx 7.2.6"));
    }
}
