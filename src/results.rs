//! Universal object model and result types.
//!
//! Every result type renders itself both as nested JSON and as Markdown
//! lines. Rendering is pure; knowledge of format-specific `specifics`
//! fields comes from a renderer tag attached when the originating
//! processor constructs the object, not from a back-pointer to the
//! processor itself.

use crate::types::{Confidence, ContentId, Genus, Score};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Strategy tag deciding how an object's `specifics` are summarized.
///
/// Determined by `inventory_type` at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificsRenderer {
    /// Sphinx objects carry `domain`, `role`, `priority`, `project`, `version`.
    Sphinx,
    /// MkDocs pages carry `object_type`.
    MkDocs,
    /// Unknown formats render nothing beyond the raw map.
    Generic,
}

impl SpecificsRenderer {
    #[must_use]
    pub fn for_inventory_type(inventory_type: &str) -> Self {
        match inventory_type {
            "sphinx_objects_inv" => Self::Sphinx,
            "mkdocs_search_index" => Self::MkDocs,
            _ => Self::Generic,
        }
    }

    /// Ordered `(label, key)` pairs worth surfacing in Markdown output.
    fn summary_keys(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Sphinx => &[
                ("domain", "domain"),
                ("role", "role"),
                ("priority", "priority"),
            ],
            Self::MkDocs => &[("type", "object_type")],
            Self::Generic => &[],
        }
    }
}

/// A documentation object drawn from a site inventory. Immutable once
/// produced by a processor.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryObject {
    /// Stable identifier from the source inventory.
    pub name: String,
    /// Relative URI to the object's content.
    pub uri: String,
    /// Format tag, e.g. `sphinx_objects_inv`.
    pub inventory_type: String,
    /// Absolute URL of the inventory file this object came from.
    pub location_url: String,
    /// Optional human display name differing from `name`.
    pub display_name: Option<String>,
    /// Format-specific metadata.
    pub specifics: BTreeMap<String, String>,
    renderer: SpecificsRenderer,
}

impl InventoryObject {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        uri: impl Into<String>,
        inventory_type: impl Into<String>,
        location_url: impl Into<String>,
        display_name: Option<String>,
        specifics: BTreeMap<String, String>,
    ) -> Self {
        let inventory_type = inventory_type.into();
        let renderer = SpecificsRenderer::for_inventory_type(&inventory_type);
        Self {
            name: name.into(),
            uri: uri.into(),
            inventory_type,
            location_url: location_url.into(),
            display_name,
            specifics,
            renderer,
        }
    }

    /// The name shown to humans: `display_name` when present, else `name`.
    #[must_use]
    pub fn effective_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Deterministic content id for the browse-then-extract protocol.
    #[must_use]
    pub fn content_id(&self) -> ContentId {
        ContentId::mint(&self.location_url, &self.name)
    }

    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "name": self.name,
            "uri": self.uri,
            "inventory_type": self.inventory_type,
            "location_url": self.location_url,
            "specifics": self.specifics,
        });
        if let Some(display_name) = &self.display_name {
            obj["display_name"] = Value::String(display_name.clone());
        }
        obj
    }

    #[must_use]
    pub fn render_as_markdown(&self, reveal_internals: bool) -> Vec<String> {
        let mut lines = vec![format!(
            "- **{}** (`{}`)",
            self.effective_display_name(),
            self.uri
        )];
        let summary: Vec<String> = self
            .renderer
            .summary_keys()
            .iter()
            .filter_map(|(label, key)| {
                self.specifics.get(*key).map(|v| format!("{label}: {v}"))
            })
            .collect();
        if !summary.is_empty() {
            lines.push(format!("  {}", summary.join(" · ")));
        }
        if reveal_internals {
            lines.push(format!(
                "  {} @ {}",
                self.inventory_type, self.location_url
            ));
        }
        lines
    }
}

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub object: InventoryObject,
    pub score: Score,
    pub match_reasons: Vec<String>,
}

impl SearchResult {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        self.object.render_as_json()
    }

    #[must_use]
    pub fn render_as_markdown(&self, reveal_internals: bool) -> Vec<String> {
        let mut lines = self.object.render_as_markdown(reveal_internals);
        if reveal_internals {
            lines.push(format!(
                "  score: {} ({})",
                self.score,
                self.match_reasons.join("; ")
            ));
        }
        lines
    }
}

/// Counts and timing for one search pass.
#[derive(Debug, Clone, Default)]
pub struct SearchMetadata {
    pub results_count: usize,
    pub results_max: usize,
    pub matches_total: usize,
    pub search_time_ms: u64,
    /// User-visible warnings (e.g. unknown filter keys). Serialized only
    /// when non-empty.
    pub warnings: Vec<String>,
}

impl SearchMetadata {
    /// Whether matches were dropped to honor `results_max`.
    #[must_use]
    pub fn results_truncated(&self) -> bool {
        self.matches_total > self.results_count
    }

    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "results_count": self.results_count,
            "results_max": self.results_max,
            "matches_total": self.matches_total,
            "search_time_ms": self.search_time_ms,
            "results_truncated": self.results_truncated(),
        });
        if !self.warnings.is_empty() {
            obj["warnings"] = json!(self.warnings);
        }
        obj
    }
}

/// Where an inventory was found and by whom.
#[derive(Debug, Clone)]
pub struct InventoryLocationInfo {
    pub inventory_type: String,
    pub location_url: String,
    pub processor_name: String,
    pub confidence: Confidence,
    pub object_count: usize,
}

impl InventoryLocationInfo {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        json!({
            "inventory_type": self.inventory_type,
            "location_url": self.location_url,
            "processor_name": self.processor_name,
            "confidence": self.confidence.as_f64(),
            "object_count": self.object_count,
        })
    }
}

/// One processor's verdict on a source.
#[derive(Debug, Clone)]
pub struct Detection {
    pub processor_name: String,
    pub confidence: Confidence,
    pub processor_type: Genus,
    pub detection_metadata: BTreeMap<String, String>,
}

impl Detection {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        json!({
            "processor_name": self.processor_name,
            "confidence": self.confidence.as_f64(),
            "processor_type": self.processor_type,
            "detection_metadata": self.detection_metadata,
        })
    }
}

/// Outcome of probing a source across all registered processors.
#[derive(Debug, Clone)]
pub struct DetectionsResult {
    pub source: String,
    pub detections: Vec<Detection>,
    pub detection_optimal: Option<Detection>,
    pub time_detection_ms: u64,
}

impl DetectionsResult {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "source": self.source,
            "detections": self.detections.iter().map(Detection::render_as_json).collect::<Vec<_>>(),
            "time_detection_ms": self.time_detection_ms,
        });
        if let Some(optimal) = &self.detection_optimal {
            obj["detection_optimal"] = optimal.render_as_json();
        }
        obj
    }

    #[must_use]
    pub fn render_as_markdown(&self, reveal_internals: bool) -> Vec<String> {
        let mut lines = vec![format!("# Detections for {}", self.source), String::new()];
        for detection in &self.detections {
            let marker = match &self.detection_optimal {
                Some(optimal) if optimal.processor_name == detection.processor_name => " (optimal)",
                _ => "",
            };
            lines.push(format!(
                "- **{}** [{}] confidence {}{}",
                detection.processor_name,
                detection.processor_type,
                detection.confidence,
                marker
            ));
        }
        if self.detections.is_empty() {
            lines.push("No processors produced a detection.".to_string());
        }
        if reveal_internals {
            lines.push(String::new());
            lines.push(format!("Detection time: {}ms", self.time_detection_ms));
        }
        lines
    }
}

/// Extraction quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Provenance and health of one structure extraction.
#[derive(Debug, Clone)]
pub struct ExtractionMetadata {
    /// Detected theme, when one was identified.
    pub theme: Option<String>,
    pub quality: Quality,
    pub warnings: Vec<String>,
}

impl ExtractionMetadata {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "quality": self.quality,
            "warnings": self.warnings,
        });
        if let Some(theme) = &self.theme {
            obj["theme"] = Value::String(theme.clone());
        }
        obj
    }
}

/// Extracted Markdown content for one inventory object.
#[derive(Debug, Clone)]
pub struct ContentDocument {
    pub object: InventoryObject,
    pub content_id: ContentId,
    /// First-paragraph summary of the content.
    pub description: String,
    /// Absolute URL of the page the content came from.
    pub documentation_url: String,
    /// Markdown body.
    pub content: String,
    pub extraction_metadata: ExtractionMetadata,
}

impl ContentDocument {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        json!({
            "object": self.object.render_as_json(),
            "content_id": self.content_id,
            "description": self.description,
            "documentation_url": self.documentation_url,
            "content": self.content,
            "extraction_metadata": self.extraction_metadata.render_as_json(),
        })
    }

    #[must_use]
    pub fn render_as_markdown(&self, reveal_internals: bool) -> Vec<String> {
        let mut lines = vec![
            format!("## {}", self.object.effective_display_name()),
            format!("<{}>", self.documentation_url),
            String::new(),
        ];
        lines.extend(self.content.lines().map(str::to_string));
        for warning in &self.extraction_metadata.warnings {
            lines.push(format!("> warning: {warning}"));
        }
        if reveal_internals {
            lines.push(String::new());
            lines.push(format!(
                "content_id: {} · quality: {}{}",
                self.content_id,
                self.extraction_metadata.quality,
                self.extraction_metadata
                    .theme
                    .as_deref()
                    .map(|t| format!(" · theme: {t}"))
                    .unwrap_or_default()
            ));
        }
        lines
    }
}

/// Result of `query_inventory` (and `summarize`).
#[derive(Debug, Clone)]
pub struct InventoryQueryResult {
    pub location: String,
    pub query: String,
    pub objects: Vec<SearchResult>,
    pub search_metadata: SearchMetadata,
    pub inventory_locations: Vec<InventoryLocationInfo>,
    /// Aggregated group counts, present only for `summarize`.
    pub summary: Option<BTreeMap<String, usize>>,
}

impl InventoryQueryResult {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "location": self.location,
            "query": self.query,
            "objects": self.objects.iter().map(SearchResult::render_as_json).collect::<Vec<_>>(),
            "search_metadata": self.search_metadata.render_as_json(),
            "inventory_locations": self.inventory_locations.iter().map(InventoryLocationInfo::render_as_json).collect::<Vec<_>>(),
        });
        if let Some(summary) = &self.summary {
            obj["summary"] = json!(summary);
        }
        obj
    }

    #[must_use]
    pub fn render_as_markdown(&self, reveal_internals: bool) -> Vec<String> {
        let mut lines = vec![format!("# Inventory query: {}", self.location), String::new()];
        if !self.query.is_empty() {
            lines.push(format!("Query: `{}`", self.query));
            lines.push(String::new());
        }
        if let Some(summary) = &self.summary {
            for (group, count) in summary {
                lines.push(format!("- {group}: {count}"));
            }
        }
        for result in &self.objects {
            lines.extend(result.render_as_markdown(reveal_internals));
        }
        lines.push(String::new());
        lines.push(format!(
            "{} of {} matches shown ({}ms)",
            self.search_metadata.results_count,
            self.search_metadata.matches_total,
            self.search_metadata.search_time_ms
        ));
        for warning in &self.search_metadata.warnings {
            lines.push(format!("> warning: {warning}"));
        }
        lines
    }
}

/// Result of `query_content`.
#[derive(Debug, Clone)]
pub struct ContentQueryResult {
    pub location: String,
    pub query: String,
    pub documents: Vec<ContentDocument>,
    pub search_metadata: SearchMetadata,
    pub inventory_locations: Vec<InventoryLocationInfo>,
}

impl ContentQueryResult {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        json!({
            "location": self.location,
            "query": self.query,
            "documents": self.documents.iter().map(ContentDocument::render_as_json).collect::<Vec<_>>(),
            "search_metadata": self.search_metadata.render_as_json(),
            "inventory_locations": self.inventory_locations.iter().map(InventoryLocationInfo::render_as_json).collect::<Vec<_>>(),
        })
    }

    #[must_use]
    pub fn render_as_markdown(&self, reveal_internals: bool) -> Vec<String> {
        let mut lines = vec![format!("# Content query: {}", self.location), String::new()];
        for document in &self.documents {
            lines.extend(document.render_as_markdown(reveal_internals));
            lines.push(String::new());
        }
        lines.push(format!(
            "{} documents ({}ms)",
            self.documents.len(),
            self.search_metadata.search_time_ms
        ));
        lines
    }
}

/// Static capability advertisement for a processor.
#[derive(Debug, Clone, Default)]
pub struct ProcessorCapabilities {
    pub supported_inventory_types: BTreeSet<String>,
    pub supported_filters: BTreeSet<String>,
    /// Expected detection latency, when the processor knows it.
    pub mean_detection_ms: Option<u64>,
    /// Largest payload the processor will accept.
    pub max_payload_bytes: Option<u64>,
}

impl ProcessorCapabilities {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "supported_inventory_types": self.supported_inventory_types,
            "supported_filters": self.supported_filters,
        });
        if let Some(ms) = self.mean_detection_ms {
            obj["mean_detection_ms"] = json!(ms);
        }
        if let Some(bytes) = self.max_payload_bytes {
            obj["max_payload_bytes"] = json!(bytes);
        }
        obj
    }
}

/// One registry entry in a processor survey.
#[derive(Debug, Clone)]
pub struct ProcessorSurveyEntry {
    pub name: String,
    pub genus: Genus,
    pub capabilities: ProcessorCapabilities,
}

/// Result of `survey_processors`.
#[derive(Debug, Clone)]
pub struct ProcessorsSurveyResult {
    pub genus: Genus,
    pub processors: Vec<ProcessorSurveyEntry>,
}

impl ProcessorsSurveyResult {
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        json!({
            "genus": self.genus,
            "processors": self.processors.iter().map(|p| {
                json!({
                    "name": p.name,
                    "genus": p.genus,
                    "capabilities": p.capabilities.render_as_json(),
                })
            }).collect::<Vec<_>>(),
        })
    }

    #[must_use]
    pub fn render_as_markdown(&self, _reveal_internals: bool) -> Vec<String> {
        let mut lines = vec![format!("# {} processors", self.genus), String::new()];
        for processor in &self.processors {
            lines.push(format!("- **{}**", processor.name));
            if !processor.capabilities.supported_inventory_types.is_empty() {
                lines.push(format!(
                    "  inventory types: {}",
                    processor
                        .capabilities
                        .supported_inventory_types
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            if !processor.capabilities.supported_filters.is_empty() {
                lines.push(format!(
                    "  filters: {}",
                    processor
                        .capabilities
                        .supported_filters
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphinx_object() -> InventoryObject {
        let mut specifics = BTreeMap::new();
        specifics.insert("domain".to_string(), "py".to_string());
        specifics.insert("role".to_string(), "function".to_string());
        specifics.insert("priority".to_string(), "1".to_string());
        InventoryObject::new(
            "pkg.mod.frobnicate",
            "api/mod.html#pkg.mod.frobnicate",
            "sphinx_objects_inv",
            "https://ex.io/docs/objects.inv",
            None,
            specifics,
        )
    }

    #[test]
    fn test_object_json_shape() {
        let rendered = sphinx_object().render_as_json();
        assert_eq!(rendered["name"], "pkg.mod.frobnicate");
        assert_eq!(rendered["inventory_type"], "sphinx_objects_inv");
        assert_eq!(rendered["specifics"]["domain"], "py");
        // display_name omitted when absent
        assert!(rendered.get("display_name").is_none());
    }

    #[test]
    fn test_sphinx_markdown_shows_domain_and_role() {
        let lines = sphinx_object().render_as_markdown(false);
        assert!(lines[0].contains("pkg.mod.frobnicate"));
        assert!(lines[1].contains("domain: py"));
        assert!(lines[1].contains("role: function"));
    }

    #[test]
    fn test_mkdocs_markdown_omits_sphinx_fields() {
        let mut specifics = BTreeMap::new();
        specifics.insert("object_type".to_string(), "page".to_string());
        specifics.insert("domain".to_string(), "page".to_string());
        let object = InventoryObject::new(
            "Getting Started",
            "getting-started/",
            "mkdocs_search_index",
            "https://ex.io/search/search_index.json",
            None,
            specifics,
        );
        let lines = object.render_as_markdown(false);
        assert!(lines[1].contains("type: page"));
        assert!(!lines[1].contains("domain"));
    }

    #[test]
    fn test_metadata_truncation_derived() {
        let metadata = SearchMetadata {
            results_count: 5,
            results_max: 5,
            matches_total: 12,
            search_time_ms: 3,
            warnings: vec![],
        };
        assert!(metadata.results_truncated());
        assert_eq!(metadata.render_as_json()["results_truncated"], true);
        assert!(metadata.render_as_json().get("warnings").is_none());
    }

    #[test]
    fn test_detections_result_marks_optimal() {
        let detection = Detection {
            processor_name: "sphinx".to_string(),
            confidence: Confidence::new(0.95),
            processor_type: Genus::Inventory,
            detection_metadata: BTreeMap::new(),
        };
        let result = DetectionsResult {
            source: "https://ex.io/docs".to_string(),
            detections: vec![detection.clone()],
            detection_optimal: Some(detection),
            time_detection_ms: 12,
        };
        let lines = result.render_as_markdown(false);
        assert!(lines.iter().any(|l| l.contains("(optimal)")));
        let rendered = result.render_as_json();
        assert_eq!(rendered["detection_optimal"]["processor_name"], "sphinx");
    }

    #[test]
    fn test_content_document_json_carries_body() {
        let document = ContentDocument {
            object: sphinx_object(),
            content_id: ContentId::mint("https://ex.io/docs/objects.inv", "pkg.mod.frobnicate"),
            description: "Frobnicates things.".to_string(),
            documentation_url: "https://ex.io/docs/api/mod.html".to_string(),
            content: "# frobnicate\n\nFrobnicates things.".to_string(),
            extraction_metadata: ExtractionMetadata {
                theme: Some("furo".to_string()),
                quality: Quality::High,
                warnings: vec![],
            },
        };
        let rendered = document.render_as_json();
        assert!(rendered["content"].as_str().unwrap().starts_with("# frobnicate"));
        assert_eq!(rendered["extraction_metadata"]["theme"], "furo");
        assert_eq!(rendered["extraction_metadata"]["quality"], "high");
    }
}
