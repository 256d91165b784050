//! Detection and processor-survey tools.

use crate::core::{Core, DetectOptions};
use crate::error::{Error, Result};
use crate::results::{DetectionsResult, ProcessorsSurveyResult};
use crate::types::Genus;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Input for the detect tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectInput {
    /// Base URL of the documentation site
    pub location: String,
    /// Run only this processor instead of probing all of them
    #[serde(default)]
    pub processor_name: Option<String>,
    /// Processor genera to probe: "inventory", "structure" (default: both)
    #[serde(default)]
    pub processor_types: Option<Vec<String>>,
}

/// Executes the detect tool.
pub async fn execute_detect(
    core: &Core,
    input: DetectInput,
    cancel: &CancellationToken,
) -> Result<DetectionsResult> {
    let processor_types = match input.processor_types {
        None => vec![Genus::Inventory, Genus::Structure],
        Some(raw) => {
            let mut types = Vec::with_capacity(raw.len());
            for value in raw {
                types.push(value.parse::<Genus>().map_err(Error::Usage)?);
            }
            if types.is_empty() {
                return Err(Error::Usage(
                    "processor_types must name at least one genus".to_string(),
                ));
            }
            types
        }
    };
    core.detect(
        &input.location,
        DetectOptions {
            processor_name: input.processor_name,
            processor_types,
        },
        cancel,
    )
    .await
}

/// Input for the processor survey tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SurveyInput {
    /// Processor genus: "inventory" or "structure"
    pub genus: String,
    /// Narrow the survey to one processor name
    #[serde(default)]
    pub name: Option<String>,
}

/// Executes the processor survey tool.
pub fn execute_survey(core: &Core, input: SurveyInput) -> Result<ProcessorsSurveyResult> {
    let genus = input.genus.parse::<Genus>().map_err(Error::Usage)?;
    Ok(core.survey_processors(genus, input.name.as_deref()))
}
