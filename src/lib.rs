//! librovore: documentation search and extraction engine.
//!
//! Given the URL of a hosted documentation site, this library detects
//! which generator produced it, loads its object inventory, answers
//! ranked fuzzy/exact/regex queries against that inventory, and extracts
//! clean Markdown for matching objects. Two surfaces share one core: a
//! human CLI and an MCP server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          MCP Server (rmcp) / CLI            │
//! │       JSON-RPC over stdin/stdout            │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │                Tool Executors                │
//! │  detect, query_inventory, query_content...  │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │                   Core                       │
//! │   detection orchestrator · search engine    │
//! └───────┬─────────────┬───────────┬───────────┘
//!         │             │           │
//!    ┌────▼────┐  ┌─────▼─────┐ ┌───▼────────┐
//!    │ Sphinx  │  │  MkDocs   │ │  Structure │
//!    │objects. │  │ search_   │ │ extraction │
//!    │  inv    │  │index.json │ │ (HTML→MD)  │
//!    └────┬────┘  └─────┬─────┘ └───┬────────┘
//!         │             │           │
//!    ┌────▼─────────────▼───────────▼────┐
//!    │        HTTP Fetch Proxy            │
//!    │  TTL cache · semaphores · retries  │
//!    └────────────────────────────────────┘
//! ```

pub mod caches;
pub mod config;
pub mod core;
pub mod detect;
pub mod error;
pub mod fmt;
pub mod http;
pub mod processors;
pub mod results;
pub mod robots;
pub mod search;
pub mod server;
pub mod tools;
pub mod types;
pub mod urls;

pub use self::config::Config;
pub use self::core::Core;
pub use self::error::{Error, Result};
pub use self::types::{Confidence, ContentId, Genus, Score};
