//! Inventory summary tool.

use crate::core::Core;
use crate::error::Result;
use crate::results::InventoryQueryResult;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Input for the summarize tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SummarizeInput {
    /// Base URL of the documentation site
    pub location: String,
    /// Field to group counts by: inventory_type or a specifics key like
    /// domain or role (default: domain)
    #[serde(default)]
    pub group_by: Option<String>,
}

/// Executes the summarize tool.
pub async fn execute_summarize(
    core: &Core,
    input: SummarizeInput,
    cancel: &CancellationToken,
) -> Result<InventoryQueryResult> {
    core.summarize(&input.location, input.group_by.as_deref(), cancel)
        .await
}
