//! Format-specific processors.
//!
//! Two genera share one registry type: inventory processors detect and
//! acquire machine-readable object catalogs; structure processors turn
//! the pages those objects point at into Markdown. Built-ins cover
//! Sphinx and MkDocs; externally provided processors register through
//! the same entry points.

mod extract;
mod filters;
mod markdown;
mod mkdocs_inventory;
mod mkdocs_structure;
mod sphinx_inventory;
mod sphinx_structure;
mod themes;

pub use extract::ExtractOptions;
pub use filters::{FilterMap, FilterValue};
pub use mkdocs_inventory::{parse_search_index, MkDocsInventoryProcessor};
pub use mkdocs_structure::MkDocsStructureProcessor;
pub use sphinx_inventory::{
    build_objects_inv, parse_objects_inv, serialize_records, SphinxInventoryProcessor,
};
pub use sphinx_structure::SphinxStructureProcessor;

use crate::error::Result;
use crate::http::Fetcher;
use crate::results::{
    ContentDocument, Detection, InventoryObject, ProcessorCapabilities, ProcessorSurveyEntry,
    ProcessorsSurveyResult,
};
use crate::types::Genus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Inventory type precedence applied when detection confidences are
/// equal within the margin: Sphinx wins over MkDocs, everything else
/// falls back to registration order.
pub const INVENTORY_TYPE_PRECEDENCE: [&str; 2] = ["sphinx_objects_inv", "mkdocs_search_index"];

/// An acquired, normalized inventory.
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Absolute URL of the inventory file actually used.
    pub location_url: String,
    /// Format tag shared by every object in this inventory.
    pub inventory_type: String,
    /// Objects in source order. Duplicate names are retained.
    pub objects: Vec<InventoryObject>,
}

impl Inventory {
    /// All objects whose `name` equals `name`, in source order.
    #[must_use]
    pub fn objects_named(&self, name: &str) -> Vec<&InventoryObject> {
        self.objects.iter().filter(|o| o.name == name).collect()
    }
}

/// A processor that detects and acquires one inventory format.
#[async_trait]
pub trait InventoryProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> ProcessorCapabilities;

    /// Probes `location` and reports a confidence-scored detection.
    ///
    /// Non-throwing: failures are logged and mean "not detected".
    async fn detect(&self, location: &str, fetcher: &dyn Fetcher) -> Option<Detection>;

    /// Acquires and normalizes the inventory at `location`. Idempotent;
    /// implementations cache by location.
    async fn acquire(&self, location: &str, fetcher: &dyn Fetcher) -> Result<Arc<Inventory>>;

    /// Applies the format-agnostic filter map to an acquired inventory.
    ///
    /// Returns the surviving objects plus user-visible warnings for
    /// unknown filter keys.
    fn filter(
        &self,
        inventory: &Inventory,
        filter_map: &FilterMap,
    ) -> Result<(Vec<InventoryObject>, Vec<String>)> {
        filters::apply(
            &inventory.objects,
            filter_map,
            &self.capabilities().supported_filters,
        )
    }
}

/// A processor that extracts page content for one inventory format.
#[async_trait]
pub trait StructureProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> ProcessorCapabilities;

    /// Whether this processor can route objects of `inventory_type`.
    fn supports_inventory_type(&self, inventory_type: &str) -> bool {
        self.capabilities()
            .supported_inventory_types
            .contains(inventory_type)
    }

    /// Probes the page at `location` for this format's theme markers.
    async fn detect(&self, location: &str, fetcher: &dyn Fetcher) -> Option<Detection>;

    /// Extracts content documents for `objects` resolved against
    /// `base_url`. Per-object failures become documents carrying the
    /// failure in their extraction warnings; only strict-robots refusals
    /// fail the whole call.
    async fn extract(
        &self,
        objects: &[InventoryObject],
        base_url: &str,
        fetcher: &dyn Fetcher,
        options: &ExtractOptions,
    ) -> Result<Vec<ContentDocument>>;
}

/// Name-keyed, insertion-ordered processor registries.
pub struct ProcessorRegistry {
    inventory: Vec<Arc<dyn InventoryProcessor>>,
    structure: Vec<Arc<dyn StructureProcessor>>,
}

impl ProcessorRegistry {
    /// An empty registry; callers register processors explicitly.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inventory: Vec::new(),
            structure: Vec::new(),
        }
    }

    /// A registry with the built-in Sphinx and MkDocs processors, in
    /// precedence order.
    #[must_use]
    pub fn with_builtins(inventory_ttl: Duration) -> Self {
        let mut registry = Self::empty();
        registry.register_inventory(Arc::new(SphinxInventoryProcessor::new(inventory_ttl)));
        registry.register_inventory(Arc::new(MkDocsInventoryProcessor::new(inventory_ttl)));
        registry.register_structure(Arc::new(SphinxStructureProcessor::new()));
        registry.register_structure(Arc::new(MkDocsStructureProcessor::new()));
        registry
    }

    /// Registration entry point for inventory processors (built-in or
    /// externally provided).
    pub fn register_inventory(&mut self, processor: Arc<dyn InventoryProcessor>) {
        self.inventory.push(processor);
    }

    /// Registration entry point for structure processors.
    pub fn register_structure(&mut self, processor: Arc<dyn StructureProcessor>) {
        self.structure.push(processor);
    }

    #[must_use]
    pub fn inventory_processors(&self) -> &[Arc<dyn InventoryProcessor>] {
        &self.inventory
    }

    #[must_use]
    pub fn structure_processors(&self) -> &[Arc<dyn StructureProcessor>] {
        &self.structure
    }

    #[must_use]
    pub fn inventory_by_name(&self, name: &str) -> Option<Arc<dyn InventoryProcessor>> {
        self.inventory
            .iter()
            .find(|p| p.name() == name)
            .map(Arc::clone)
    }

    #[must_use]
    pub fn structure_by_name(&self, name: &str) -> Option<Arc<dyn StructureProcessor>> {
        self.structure
            .iter()
            .find(|p| p.name() == name)
            .map(Arc::clone)
    }

    /// Registered processor names for a genus, in registration order.
    #[must_use]
    pub fn names(&self, genus: Genus) -> Vec<String> {
        match genus {
            Genus::Inventory => self.inventory.iter().map(|p| p.name().to_string()).collect(),
            Genus::Structure => self.structure.iter().map(|p| p.name().to_string()).collect(),
        }
    }

    /// Capability survey over one genus, optionally narrowed to a name.
    #[must_use]
    pub fn survey(&self, genus: Genus, name: Option<&str>) -> ProcessorsSurveyResult {
        let entries: Vec<ProcessorSurveyEntry> = match genus {
            Genus::Inventory => self
                .inventory
                .iter()
                .map(|p| ProcessorSurveyEntry {
                    name: p.name().to_string(),
                    genus,
                    capabilities: p.capabilities(),
                })
                .collect(),
            Genus::Structure => self
                .structure
                .iter()
                .map(|p| ProcessorSurveyEntry {
                    name: p.name().to_string(),
                    genus,
                    capabilities: p.capabilities(),
                })
                .collect(),
        };
        ProcessorsSurveyResult {
            genus,
            processors: entries
                .into_iter()
                .filter(|e| name.is_none_or(|n| e.name == n))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registration_order() {
        let registry = ProcessorRegistry::with_builtins(Duration::from_secs(60));
        assert_eq!(
            registry.names(Genus::Inventory),
            vec!["sphinx_objects_inv", "mkdocs_search_index"]
        );
        assert_eq!(
            registry.names(Genus::Structure),
            vec!["sphinx_structure", "mkdocs_structure"]
        );
    }

    #[test]
    fn test_survey_narrows_by_name() {
        let registry = ProcessorRegistry::with_builtins(Duration::from_secs(60));
        let survey = registry.survey(Genus::Inventory, Some("sphinx_objects_inv"));
        assert_eq!(survey.processors.len(), 1);
        assert_eq!(survey.processors[0].name, "sphinx_objects_inv");

        let all = registry.survey(Genus::Inventory, None);
        assert_eq!(all.processors.len(), 2);
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = ProcessorRegistry::with_builtins(Duration::from_secs(60));
        assert!(registry.inventory_by_name("sphinx_objects_inv").is_some());
        assert!(registry.inventory_by_name("nope").is_none());
        assert!(registry.structure_by_name("mkdocs_structure").is_some());
    }
}
