//! Shared structure-extraction pipeline.
//!
//! For each inventory object: resolve the page URL, consult robots,
//! fetch the HTML, isolate the primary content region (theme tables
//! first, generic fallback chain otherwise), strip chrome, convert to
//! Markdown, and mint the content id. Per-object failures produce a
//! document whose extraction warnings carry the failure; only a
//! strict-robots refusal aborts the whole call.

use crate::error::Result;
use crate::http::Fetcher;
use crate::processors::markdown;
use crate::processors::themes::{
    self, ThemeProfile, FALLBACK_MAIN, FALLBACK_SECTION, FALLBACK_STRIP,
};
use crate::results::{ContentDocument, ExtractionMetadata, InventoryObject, Quality};
use crate::robots::{RobotsGate, RobotsVerdict};
use crate::urls;
use scraper::{ElementRef, Html};
use std::time::Duration;

/// Marker appended when `lines_max` cuts a document short.
const TRUNCATION_MARKER: &str = "[…truncated…]";

/// Longest description pulled from a document's first paragraph.
const DESCRIPTION_MAX_CHARS: usize = 300;

/// Knobs for one extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Truncate Markdown bodies to this many lines.
    pub lines_max: Option<usize>,
    /// Fail on robots.txt disallow instead of warning.
    pub robots_strict: bool,
    /// TTL for fetched pages in the HTTP response cache.
    pub page_ttl: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            lines_max: None,
            robots_strict: false,
            page_ttl: Duration::from_secs(3600),
        }
    }
}

/// Runs the pipeline over `objects` with a format's theme table.
pub async fn extract_documents(
    objects: &[InventoryObject],
    base_url: &str,
    fetcher: &dyn Fetcher,
    options: &ExtractOptions,
    profiles: &[ThemeProfile],
    robots: &RobotsGate,
) -> Result<Vec<ContentDocument>> {
    let mut documents = Vec::with_capacity(objects.len());
    for object in objects {
        documents.push(extract_one(object, base_url, fetcher, options, profiles, robots).await?);
    }
    Ok(documents)
}

async fn extract_one(
    object: &InventoryObject,
    base_url: &str,
    fetcher: &dyn Fetcher,
    options: &ExtractOptions,
    profiles: &[ThemeProfile],
    robots: &RobotsGate,
) -> Result<ContentDocument> {
    let page_url = match urls::join_url(base_url, &object.uri) {
        Ok(url) => url,
        Err(err) => return Ok(failed_document(object, String::new(), err.to_string())),
    };

    let mut warnings = Vec::new();
    match robots.check(fetcher, &page_url, options.robots_strict).await {
        Ok(RobotsVerdict::Allowed) => {}
        Ok(RobotsVerdict::AllowedWithWarning(warning)) => warnings.push(warning),
        // Strict-mode refusal is the caller's error, not a stub document.
        Err(err) => return Err(err),
    }

    // Fragments are client-side; the server never sees them.
    let (fetch_url, fragment) = match page_url.split_once('#') {
        Some((url, fragment)) => (url.to_string(), Some(fragment.to_string())),
        None => (page_url.clone(), None),
    };
    let fetched = match fetcher.fetch(&fetch_url, options.page_ttl).await {
        Ok(fetched) => fetched,
        Err(err) => {
            warnings.push(format!("page fetch failed: {err}"));
            return Ok(failed_document_with(object, page_url, warnings));
        }
    };
    let mut final_url = fetched.final_url.clone();
    if let Some(fragment) = &fragment {
        final_url.push('#');
        final_url.push_str(fragment);
    }

    let mut document = Html::parse_document(&fetched.text());
    let theme = themes::detect_theme(&document, profiles);
    strip_chrome(&mut document, theme);

    let Some((region, quality)) = select_region(&document, theme) else {
        warnings.push("no content region found in page".to_string());
        return Ok(failed_document_with(object, final_url, warnings));
    };

    let mut content = markdown::convert(region, &final_url);
    if content.is_empty() {
        warnings.push("content region produced no Markdown".to_string());
    }
    let description = derive_description(&content);
    if let Some(lines_max) = options.lines_max {
        content = truncate_lines(&content, lines_max);
    }

    Ok(ContentDocument {
        object: object.clone(),
        content_id: object.content_id(),
        description,
        documentation_url: final_url,
        content,
        extraction_metadata: ExtractionMetadata {
            theme: theme.map(|t| t.name.to_string()),
            quality: if content_is_empty_quality(&warnings) {
                Quality::Low
            } else {
                quality
            },
            warnings,
        },
    })
}

fn content_is_empty_quality(warnings: &[String]) -> bool {
    warnings
        .iter()
        .any(|w| w.contains("produced no Markdown"))
}

/// Detaches chrome nodes before region selection.
fn strip_chrome(document: &mut Html, theme: Option<&ThemeProfile>) {
    let strip_selectors: Vec<&str> = match theme {
        Some(theme) => theme.strip_selectors.to_vec(),
        None => FALLBACK_STRIP.to_vec(),
    };
    for source in strip_selectors {
        let selector = themes::selector(source);
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

/// Picks the primary content region and grades the pick.
fn select_region<'a>(
    document: &'a Html,
    theme: Option<&ThemeProfile>,
) -> Option<(ElementRef<'a>, Quality)> {
    if let Some(theme) = theme {
        for (rank, source) in theme.main_selectors.iter().enumerate() {
            if let Some(region) = document.select(&themes::selector(source)).next() {
                let quality = if rank == 0 { Quality::High } else { Quality::Medium };
                return Some((region, quality));
            }
        }
    }
    for source in FALLBACK_MAIN {
        if let Some(region) = document.select(&themes::selector(source)).next() {
            return Some((region, Quality::Medium));
        }
    }
    if let Some(region) = document.select(&themes::selector(FALLBACK_SECTION)).next() {
        return Some((region, Quality::Low));
    }
    document
        .select(&themes::selector("body"))
        .next()
        .map(|body| (body, Quality::Low))
}

/// First paragraph of the Markdown, capped for result payloads.
fn derive_description(content: &str) -> String {
    let mut paragraph = Vec::new();
    let mut in_fence = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.is_empty() || trimmed.starts_with('#') {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        paragraph.push(trimmed);
    }
    let mut description = paragraph.join(" ");
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        description = description
            .chars()
            .take(DESCRIPTION_MAX_CHARS)
            .collect::<String>()
            + "…";
    }
    description
}

/// Cuts `content` to `lines_max` lines, appending the truncation marker.
fn truncate_lines(content: &str, lines_max: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= lines_max {
        return content.to_string();
    }
    let mut truncated = lines[..lines_max].join("\n");
    truncated.push('\n');
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

fn failed_document(object: &InventoryObject, url: String, warning: String) -> ContentDocument {
    failed_document_with(object, url, vec![warning])
}

fn failed_document_with(
    object: &InventoryObject,
    url: String,
    warnings: Vec<String>,
) -> ContentDocument {
    ContentDocument {
        object: object.clone(),
        content_id: object.content_id(),
        description: String::new(),
        documentation_url: url,
        content: String::new(),
        extraction_metadata: ExtractionMetadata {
            theme: None,
            quality: Quality::Low,
            warnings,
        },
    }
}
