//! librovore: documentation search and extraction engine.
//!
//! Usage:
//!   librovore --mcp                          # Start MCP server
//!   librovore search <url> <term>            # Search a site's inventory
//!   librovore content <url> <term>           # Extract matching docs
//!   librovore detect <url>                   # Probe a site
//!   librovore processors <genus>             # List processors
//!   librovore summarize <url>                # Inventory overview

use clap::{Parser, Subcommand};
use librovore::search::MatchMode;
use librovore::server::LibrovoreServer;
use librovore::{Config, Core, Error};
use rmcp::ServiceExt;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "librovore")]
#[command(about = "Documentation search and extraction engine")]
#[command(version)]
struct Cli {
    /// Run as MCP server (stdin/stdout JSON-RPC)
    #[arg(long)]
    mcp: bool,

    /// Emit results as JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Show internals (scores, cache provenance) in human output
    #[arg(long, global = true)]
    verbose: bool,

    /// Per-request HTTP timeout in seconds
    #[arg(long)]
    http_timeout_s: Option<u64>,

    /// Detection cache TTL in seconds
    #[arg(long)]
    detection_ttl_s: Option<u64>,

    /// Fail on robots.txt disallow instead of warning
    #[arg(long)]
    strict_robots: bool,

    /// Disable URL-pattern extension probing
    #[arg(long)]
    no_url_patterns: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a documentation site's object inventory
    Search {
        /// Base URL of the documentation site
        location: String,
        /// Search term
        term: String,
        /// Match mode: exact, regex, or fuzzy
        #[arg(short, long, default_value = "fuzzy")]
        mode: MatchMode,
        /// Similarity cutoff for fuzzy mode (0-100)
        #[arg(long)]
        fuzzy_threshold: Option<u8>,
        /// Maximum results
        #[arg(short, long, default_value = "5")]
        results_max: usize,
        /// Run only this inventory processor
        #[arg(long)]
        processor: Option<String>,
    },

    /// Extract matching documentation pages as Markdown
    Content {
        /// Base URL of the documentation site
        location: String,
        /// Search term (may be empty when using --content-id)
        #[arg(default_value = "")]
        term: String,
        /// Match mode: exact, regex, or fuzzy
        #[arg(short, long, default_value = "fuzzy")]
        mode: MatchMode,
        /// Maximum documents
        #[arg(short, long, default_value = "10")]
        results_max: usize,
        /// Truncate each document to this many lines
        #[arg(long)]
        lines_max: Option<usize>,
        /// Content id from a previous query
        #[arg(long)]
        content_id: Option<String>,
        /// Run only this inventory processor
        #[arg(long)]
        processor: Option<String>,
    },

    /// Probe a site and report processor confidences
    Detect {
        /// Base URL of the documentation site
        location: String,
        /// Run only this processor
        #[arg(long)]
        processor: Option<String>,
    },

    /// List registered processors and capabilities
    Processors {
        /// Processor genus: inventory or structure
        genus: String,
        /// Narrow to one processor name
        #[arg(long)]
        name: Option<String>,
    },

    /// Summarize an inventory as grouped counts
    Summarize {
        /// Base URL of the documentation site
        location: String,
        /// Group by: inventory_type or a specifics key (domain, role, ...)
        #[arg(short, long)]
        group_by: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // CRITICAL: Log to stderr only (stdout is JSON-RPC for MCP)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("librovore=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::default();
    if let Some(timeout) = cli.http_timeout_s {
        config.http.timeout_s = timeout;
    }
    if let Some(ttl) = cli.detection_ttl_s {
        config.detection.ttl_s = ttl;
    }
    config.robots.strict = cli.strict_robots;
    if cli.no_url_patterns {
        config.url_patterns.enabled = false;
    }

    let core = Arc::new(Core::new(config).map_err(|e| anyhow::anyhow!(e.to_string()))?);

    if cli.mcp {
        return run_mcp_server(core).await;
    }
    let Some(command) = cli.command else {
        eprintln!("Use --mcp to start the MCP server, or a subcommand for CLI mode.");
        eprintln!("Run with --help for more information.");
        std::process::exit(2);
    };

    let color = !cli.no_color && std::io::stdout().is_terminal();
    match run_cli(&core, command, cli.json, color, cli.verbose).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let mut stderr = std::io::stderr();
            if cli.json {
                eprintln!("{}", serde_json::to_string_pretty(&err.render_as_json())?);
            } else {
                librovore::fmt::fmt_error(&mut stderr, &err, color)?;
            }
            std::process::exit(err.exit_code());
        }
    }
}

async fn run_mcp_server(core: Arc<Core>) -> anyhow::Result<()> {
    tracing::info!("Starting MCP server");
    let server = LibrovoreServer::new(core);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Cancellation token wired to Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });
    token
}

async fn run_cli(
    core: &Core,
    command: Commands,
    json: bool,
    color: bool,
    verbose: bool,
) -> Result<(), Error> {
    use librovore::tools;

    let cancel = interrupt_token();
    let mut stdout = std::io::stdout();
    let io_err = |e: std::io::Error| Error::Internal(e.to_string());

    match command {
        Commands::Search {
            location,
            term,
            mode,
            fuzzy_threshold,
            results_max,
            processor,
        } => {
            let input = tools::QueryInventoryInput {
                location,
                term,
                processor_name: processor,
                mode: Some(mode),
                fuzzy_threshold,
                filters: None,
                results_max: Some(results_max),
            };
            let result = tools::execute_query_inventory(core, input, &cancel).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.render_as_json())?);
            } else {
                librovore::fmt::fmt_inventory(&mut stdout, &result, color, verbose)
                    .map_err(io_err)?;
            }
        }

        Commands::Content {
            location,
            term,
            mode,
            results_max,
            lines_max,
            content_id,
            processor,
        } => {
            let input = tools::QueryContentInput {
                location,
                term,
                processor_name: processor,
                mode: Some(mode),
                fuzzy_threshold: None,
                filters: None,
                content_id,
                results_max: Some(results_max),
                lines_max,
            };
            let result = tools::execute_query_content(core, input, &cancel).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.render_as_json())?);
            } else {
                librovore::fmt::fmt_content(&mut stdout, &result, color, verbose)
                    .map_err(io_err)?;
            }
        }

        Commands::Detect {
            location,
            processor,
        } => {
            let input = tools::DetectInput {
                location,
                processor_name: processor,
                processor_types: None,
            };
            let result = tools::execute_detect(core, input, &cancel).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.render_as_json())?);
            } else {
                librovore::fmt::fmt_detections(&mut stdout, &result, color, verbose)
                    .map_err(io_err)?;
            }
        }

        Commands::Processors { genus, name } => {
            let input = tools::SurveyInput { genus, name };
            let result = tools::execute_survey(core, input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.render_as_json())?);
            } else {
                librovore::fmt::fmt_survey(&mut stdout, &result, color).map_err(io_err)?;
            }
        }

        Commands::Summarize { location, group_by } => {
            let input = tools::SummarizeInput { location, group_by };
            let result = tools::execute_summarize(core, input, &cancel).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.render_as_json())?);
            } else {
                librovore::fmt::fmt_inventory(&mut stdout, &result, color, verbose)
                    .map_err(io_err)?;
            }
        }
    }

    Ok(())
}
