//! Inventory and content query tools.

use crate::core::{ContentQueryOptions, Core, InventoryQueryOptions};
use crate::error::{Error, Result};
use crate::processors::FilterMap;
use crate::results::{ContentQueryResult, InventoryQueryResult};
use crate::search::{MatchMode, SearchBehaviors};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const RESULTS_MAX_CEILING: usize = 100;

fn validate_fuzzy_threshold(threshold: Option<u8>) -> Result<Option<u8>> {
    match threshold {
        Some(value) if value > 100 => Err(Error::Usage(format!(
            "fuzzy_threshold must be in [0, 100], got {value}"
        ))),
        other => Ok(other),
    }
}

/// Input for the inventory query tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryInventoryInput {
    /// Base URL of the documentation site
    pub location: String,
    /// Search term matched against object names
    pub term: String,
    /// Run only this inventory processor
    #[serde(default)]
    pub processor_name: Option<String>,
    /// Match mode: exact, regex, or fuzzy (default: fuzzy)
    #[serde(default)]
    pub mode: Option<MatchMode>,
    /// Similarity cutoff for fuzzy mode, 0-100 (default: 50)
    #[serde(default)]
    pub fuzzy_threshold: Option<u8>,
    /// Inventory filters: domain, role, priority, uri_prefix, name_regex
    #[serde(default)]
    pub filters: Option<FilterMap>,
    /// Maximum results (default: 5)
    #[serde(default)]
    pub results_max: Option<usize>,
}

/// Executes the inventory query tool.
pub async fn execute_query_inventory(
    core: &Core,
    input: QueryInventoryInput,
    cancel: &CancellationToken,
) -> Result<InventoryQueryResult> {
    let options = InventoryQueryOptions {
        processor_name: input.processor_name,
        search: SearchBehaviors {
            mode: input.mode.unwrap_or_default(),
            fuzzy_threshold: validate_fuzzy_threshold(input.fuzzy_threshold)?,
        },
        filters: input.filters.unwrap_or_default(),
        results_max: input.results_max.unwrap_or(5).min(RESULTS_MAX_CEILING),
    };
    core.query_inventory(&input.location, &input.term, options, cancel)
        .await
}

/// Input for the content query tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryContentInput {
    /// Base URL of the documentation site
    pub location: String,
    /// Search term matched against object names (ignored with content_id)
    #[serde(default)]
    pub term: String,
    /// Run only this inventory processor
    #[serde(default)]
    pub processor_name: Option<String>,
    /// Match mode: exact, regex, or fuzzy (default: fuzzy)
    #[serde(default)]
    pub mode: Option<MatchMode>,
    /// Similarity cutoff for fuzzy mode, 0-100 (default: 50)
    #[serde(default)]
    pub fuzzy_threshold: Option<u8>,
    /// Inventory filters: domain, role, priority, uri_prefix, name_regex
    #[serde(default)]
    pub filters: Option<FilterMap>,
    /// Content id from a previous query, for exact re-extraction
    #[serde(default)]
    pub content_id: Option<String>,
    /// Maximum documents (default: 10)
    #[serde(default)]
    pub results_max: Option<usize>,
    /// Truncate each document body to this many lines
    #[serde(default)]
    pub lines_max: Option<usize>,
}

/// Executes the content query tool.
pub async fn execute_query_content(
    core: &Core,
    input: QueryContentInput,
    cancel: &CancellationToken,
) -> Result<ContentQueryResult> {
    let options = ContentQueryOptions {
        processor_name: input.processor_name,
        search: SearchBehaviors {
            mode: input.mode.unwrap_or_default(),
            fuzzy_threshold: validate_fuzzy_threshold(input.fuzzy_threshold)?,
        },
        filters: input.filters.unwrap_or_default(),
        content_id: input.content_id,
        results_max: input.results_max.unwrap_or(10).min(RESULTS_MAX_CEILING),
        lines_max: input.lines_max,
    };
    core.query_content(&input.location, &input.term, options, cancel)
        .await
}
