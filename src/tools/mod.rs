//! Tool executors shared by the CLI and the MCP server.
//!
//! Each operation has an Input struct (doc comments become the JSON
//! schema descriptions LLMs see) and an `execute_*` function over a
//! [`crate::core::Core`].

mod detect;
mod query;
mod summarize;

pub use detect::{execute_detect, execute_survey, DetectInput, SurveyInput};
pub use query::{
    execute_query_content, execute_query_inventory, QueryContentInput, QueryInventoryInput,
};
pub use summarize::{execute_summarize, SummarizeInput};
