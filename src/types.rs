//! Type-safe newtypes for librovore.
//!
//! These newtypes provide compile-time safety and semantic clarity
//! for core domain concepts.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relevance score in range [0.0, 1.0].
///
/// Saturating constructor ensures scores never exceed bounds,
/// making rank merging operations safe.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    /// Zero relevance score.
    pub const ZERO: Self = Self(0.0);

    /// Maximum relevance score.
    pub const MAX: Self = Self(1.0);

    /// Creates a new score, saturating to [0.0, 1.0] bounds.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A processor's self-reported probability in [0.0, 1.0] that it can
/// serve a given source. 0.5 is the universal selection cutoff.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// The universal detection threshold.
    pub const THRESHOLD: Self = Self(0.5);

    /// Two confidences within this margin are treated as equal for
    /// precedence tiebreaking.
    pub const EQUALITY_MARGIN: f64 = 0.05;

    /// Creates a new confidence, saturating to [0.0, 1.0] bounds.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Whether this confidence clears the selection threshold.
    #[must_use]
    pub fn passes_threshold(self) -> bool {
        self.0 >= Self::THRESHOLD.0
    }

    /// Whether two confidences are equal within the precedence margin.
    #[must_use]
    pub fn roughly_equals(self, other: Self) -> bool {
        (self.0 - other.0).abs() <= Self::EQUALITY_MARGIN
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Broad processor category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genus {
    /// Detects and acquires machine-readable object inventories.
    Inventory,
    /// Extracts page content into Markdown.
    Structure,
}

impl fmt::Display for Genus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inventory => write!(f, "inventory"),
            Self::Structure => write!(f, "structure"),
        }
    }
}

impl std::str::FromStr for Genus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inventory" => Ok(Self::Inventory),
            "structure" => Ok(Self::Structure),
            other => Err(format!(
                "Invalid processor genus: '{other}'. Valid values: inventory, structure"
            )),
        }
    }
}

/// Deterministic opaque identifier for an inventory object, used in the
/// browse-then-extract protocol.
///
/// Minted as `base64url(location_url ++ NUL ++ name)` with the unpadded
/// URL-safe alphabet. The same `(location, name)` pair always yields the
/// same id; distinct pairs never collide because NUL cannot appear in
/// either component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    #[must_use]
    pub fn mint(location_url: &str, name: &str) -> Self {
        let mut raw = Vec::with_capacity(location_url.len() + name.len() + 1);
        raw.extend_from_slice(location_url.as_bytes());
        raw.push(0);
        raw.extend_from_slice(name.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Wraps an identifier received from a caller, without validation.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Decodes back to `(location_url, name)`.
    ///
    /// Returns `None` when the id is not valid base64url, not UTF-8, or
    /// lacks the NUL separator.
    #[must_use]
    pub fn decode(&self) -> Option<(String, String)> {
        let raw = URL_SAFE_NO_PAD.decode(&self.0).ok()?;
        let decoded = String::from_utf8(raw).ok()?;
        let (location, name) = decoded.split_once('\0')?;
        Some((location.to_string(), name.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<Score>();
    assert_send_sync::<Confidence>();
    assert_send_sync::<Genus>();
    assert_send_sync::<ContentId>();
};
