//! Universal search engine over inventory objects.
//!
//! Pure over its inputs: no I/O, no clocks. Output order depends only on
//! `(objects, term, mode, threshold)` — descending score, ties broken by
//! ascending object name.

use crate::error::{Error, Result};
use crate::results::{InventoryObject, SearchResult};
use crate::types::Score;
use rapidfuzz::fuzz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Matching mode for inventory queries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-sensitive substring matching with equality/prefix bonuses
    Exact,
    /// `term` compiled as a regular expression against object names
    Regex,
    /// Partial-ratio similarity (best for typos and partial recall)
    #[default]
    Fuzzy,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Regex => write!(f, "regex"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "regex" => Ok(Self::Regex),
            "fuzzy" => Ok(Self::Fuzzy),
            other => Err(format!(
                "Invalid search mode: '{other}'. Valid modes: exact, regex, fuzzy"
            )),
        }
    }
}

/// Caller-facing search knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBehaviors {
    pub mode: MatchMode,
    /// Similarity cutoff override for fuzzy mode, in [0, 100].
    pub fuzzy_threshold: Option<u8>,
}

/// Ranks `objects` against `term`.
///
/// # Errors
///
/// Fails with [`Error::InventoryInvalidity`] when `mode` is `Regex` and
/// `term` does not compile.
pub fn filter_by_name(
    objects: &[InventoryObject],
    term: &str,
    mode: MatchMode,
    fuzzy_threshold: u8,
) -> Result<Vec<SearchResult>> {
    let mut results = match mode {
        MatchMode::Exact => match_exact(objects, term),
        MatchMode::Regex => match_regex(objects, term)?,
        MatchMode::Fuzzy => match_fuzzy(objects, term, fuzzy_threshold),
    };

    results.sort_by(|a, b| {
        b.score
            .as_f64()
            .total_cmp(&a.score.as_f64())
            .then_with(|| a.object.name.cmp(&b.object.name))
    });
    disambiguate_duplicates(&mut results);
    Ok(results)
}

fn match_exact(objects: &[InventoryObject], term: &str) -> Vec<SearchResult> {
    objects
        .iter()
        .filter_map(|object| {
            let (score, reason) = if object.name == term {
                (1.0, "name equals term".to_string())
            } else if object.name.starts_with(term) {
                (0.9, "name starts with term".to_string())
            } else if object.name.contains(term) {
                (0.8, "name contains term".to_string())
            } else if object
                .display_name
                .as_deref()
                .is_some_and(|d| d.contains(term))
            {
                (0.8, "display name contains term".to_string())
            } else {
                return None;
            };
            Some(SearchResult {
                object: object.clone(),
                score: Score::new(score),
                match_reasons: vec![reason],
            })
        })
        .collect()
}

fn match_regex(objects: &[InventoryObject], term: &str) -> Result<Vec<SearchResult>> {
    let pattern = regex::Regex::new(term).map_err(|e| Error::InventoryInvalidity {
        location: term.to_string(),
        reason: format!("regex pattern `{term}` failed to compile: {e}"),
    })?;

    Ok(objects
        .iter()
        .filter_map(|object| {
            let matched = pattern.find(&object.name)?;
            let full = matched.start() == 0 && matched.end() == object.name.len();
            let (score, reason) = if full {
                (0.9, "regex matches full name".to_string())
            } else {
                (0.75, "regex matches part of name".to_string())
            };
            Some(SearchResult {
                object: object.clone(),
                score: Score::new(score),
                match_reasons: vec![reason],
            })
        })
        .collect())
}

fn match_fuzzy(objects: &[InventoryObject], term: &str, threshold: u8) -> Vec<SearchResult> {
    let term = term.to_lowercase();
    objects
        .iter()
        .filter_map(|object| {
            let name = object.name.to_lowercase();
            let similarity = fuzz::partial_ratio(term.chars(), name.chars());
            if similarity < f64::from(threshold) {
                return None;
            }
            Some(SearchResult {
                object: object.clone(),
                score: Score::new(similarity / 100.0),
                match_reasons: vec![format!("fuzzy similarity {similarity:.0} against name")],
            })
        })
        .collect()
}

/// Appends `(role)` to the display name of results whose object names
/// collide, so duplicate inventory entries stay tellable apart.
fn disambiguate_duplicates(results: &mut [SearchResult]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for result in results.iter() {
        *counts.entry(result.object.name.as_str()).or_insert(0) += 1;
    }
    let duplicated: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();
    for result in results.iter_mut() {
        if duplicated.contains(&result.object.name) {
            if let Some(role) = result.object.specifics.get("role").cloned() {
                let base = result.object.effective_display_name().to_string();
                result.object.display_name = Some(format!("{base} ({role})"));
            }
        }
    }
}
