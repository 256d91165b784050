//! Error types for librovore.
//!
//! A closed domain taxonomy with self-rendering: every error knows how to
//! present itself as structured JSON and as Markdown lines, so the CLI and
//! MCP boundary adapters never pattern-match on kinds to build output.

use crate::types::Genus;
use serde_json::{json, Value};
use thiserror::Error;

/// Top-level domain error.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("No processor cleared the detection threshold for {origin} ({genus})")]
    ProcessorInavailability {
        origin: String,
        genus: Genus,
        attempted_processors: Vec<String>,
        url_patterns_attempted: bool,
    },

    #[error("Failed to retrieve inventory from {url}: {cause}")]
    InventoryInaccessibility { url: String, cause: String },

    #[error("Invalid inventory data: {reason}")]
    InventoryInvalidity { location: String, reason: String },

    #[error("Content unreachable at {reference}: {cause}")]
    ContentInaccessibility { reference: String, cause: String },

    #[error("Content at {url} could not be parsed: {reason}")]
    ContentInvalidity { url: String, reason: String },

    #[error("robots.txt unavailable for {url}: {cause}")]
    RobotsInaccessibility { url: String, cause: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for domain operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProcessorInavailability { .. } => "PROCESSOR_INAVAILABILITY",
            Self::InventoryInaccessibility { .. } => "INVENTORY_INACCESSIBILITY",
            Self::InventoryInvalidity { .. } => "INVENTORY_INVALIDITY",
            Self::ContentInaccessibility { .. } => "CONTENT_INACCESSIBILITY",
            Self::ContentInvalidity { .. } => "CONTENT_INVALIDITY",
            Self::RobotsInaccessibility { .. } => "ROBOTS_INACCESSIBILITY",
            Self::Cancelled => "CANCELLED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Usage(_) => "USAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short human title for rendered output.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::ProcessorInavailability { .. } => "No suitable processor",
            Self::InventoryInaccessibility { .. } => "Inventory unreachable",
            Self::InventoryInvalidity { .. } => "Inventory malformed",
            Self::ContentInaccessibility { .. } => "Content unreachable",
            Self::ContentInvalidity { .. } => "Content unparseable",
            Self::RobotsInaccessibility { .. } => "robots.txt unavailable",
            Self::Cancelled => "Cancelled",
            Self::Timeout { .. } => "Timed out",
            Self::Usage(_) => "Usage error",
            Self::Internal(_) => "Internal error",
        }
    }

    /// Actionable follow-up for the caller, when one exists.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ProcessorInavailability { .. } => Some(
                "Check that the URL points at a documentation site with a \
                 Sphinx objects.inv or MkDocs search index, or pass an \
                 explicit processor name.",
            ),
            Self::InventoryInaccessibility { .. } | Self::ContentInaccessibility { .. } => {
                Some("Verify the URL is reachable and retry.")
            }
            Self::InventoryInvalidity { .. } => {
                Some("Only Sphinx v2 inventories and MkDocs search indexes are supported.")
            }
            Self::Timeout { .. } => Some("Raise the operation timeout or retry later."),
            _ => None,
        }
    }

    /// Structured context for the JSON rendering.
    #[must_use]
    pub fn context(&self) -> Value {
        match self {
            Self::ProcessorInavailability {
                origin,
                genus,
                attempted_processors,
                url_patterns_attempted,
            } => json!({
                "source": origin,
                "genus": genus,
                "attempted_processors": attempted_processors,
                "url_patterns_attempted": url_patterns_attempted,
            }),
            Self::InventoryInaccessibility { url, cause } => {
                json!({ "url": url, "cause": cause })
            }
            Self::InventoryInvalidity { location, reason } => {
                json!({ "location": location, "reason": reason })
            }
            Self::ContentInaccessibility { reference, cause } => {
                json!({ "reference": reference, "cause": cause })
            }
            Self::ContentInvalidity { url, reason } => {
                json!({ "url": url, "reason": reason })
            }
            Self::RobotsInaccessibility { url, cause } => {
                json!({ "url": url, "cause": cause })
            }
            Self::Timeout { seconds } => json!({ "seconds": seconds }),
            Self::Cancelled | Self::Usage(_) | Self::Internal(_) => json!({}),
        }
    }

    /// Renders as the structured JSON error shape.
    #[must_use]
    pub fn render_as_json(&self) -> Value {
        let mut obj = json!({
            "type": self.code(),
            "title": self.title(),
            "message": self.to_string(),
            "context": self.context(),
        });
        if let Some(suggestion) = self.suggestion() {
            obj["suggestion"] = Value::String(suggestion.to_string());
        }
        obj
    }

    /// Renders as Markdown lines for terminal display.
    #[must_use]
    pub fn render_as_markdown(&self) -> Vec<String> {
        let mut lines = vec![format!("## {}", self.title()), String::new(), self.to_string()];
        if let Some(suggestion) = self.suggestion() {
            lines.push(String::new());
            lines.push(format!("*{suggestion}*"));
        }
        lines
    }

    /// CLI process exit code for this error kind.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::ProcessorInavailability { .. } => 3,
            Self::InventoryInaccessibility { .. }
            | Self::ContentInaccessibility { .. }
            | Self::RobotsInaccessibility { .. } => 4,
            Self::InventoryInvalidity { .. } | Self::ContentInvalidity { .. } => 5,
            Self::Cancelled | Self::Timeout { .. } | Self::Internal(_) => 64,
        }
    }

    /// Whether the caller can fix this by adjusting input.
    ///
    /// Client-fixable errors stay on the MCP tool-result channel (visible
    /// to the LLM); server faults go to the protocol error channel.
    #[must_use]
    pub fn is_client_fixable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

// Conversion to rmcp protocol errors
impl From<Error> for rmcp::ErrorData {
    fn from(err: Error) -> Self {
        rmcp::ErrorData::internal_error(err.to_string(), Some(err.render_as_json()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rendering_shape() {
        let err = Error::InventoryInvalidity {
            location: "https://ex.io/objects.inv".into(),
            reason: "unsupported inventory version 1".into(),
        };
        let rendered = err.render_as_json();
        assert_eq!(rendered["type"], "INVENTORY_INVALIDITY");
        assert_eq!(rendered["title"], "Inventory malformed");
        assert_eq!(rendered["context"]["location"], "https://ex.io/objects.inv");
        assert!(rendered["suggestion"].is_string());
    }

    #[test]
    fn test_markdown_rendering_has_title_and_message() {
        let err = Error::ContentInaccessibility {
            reference: "https://ex.io/api/foo.html".into(),
            cause: "404 Not Found".into(),
        };
        let lines = err.render_as_markdown();
        assert!(lines[0].starts_with("## "));
        assert!(lines.iter().any(|l| l.contains("404 Not Found")));
    }

    #[test]
    fn test_exit_codes() {
        let unavailable = Error::ProcessorInavailability {
            source: "https://ex.io".into(),
            genus: Genus::Inventory,
            attempted_processors: vec!["sphinx".into()],
            url_patterns_attempted: true,
        };
        assert_eq!(unavailable.exit_code(), 3);
        assert_eq!(
            Error::InventoryInaccessibility {
                url: "u".into(),
                cause: "c".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            Error::ContentInvalidity {
                url: "u".into(),
                reason: "r".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(Error::Usage("bad".into()).exit_code(), 2);
        assert_eq!(Error::Internal("boom".into()).exit_code(), 64);
    }

    #[test]
    fn test_client_fixable_split() {
        assert!(Error::Cancelled.is_client_fixable());
        assert!(!Error::Internal("fault".into()).is_client_fixable());
    }
}
