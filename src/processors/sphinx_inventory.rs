//! Sphinx `objects.inv` inventory processor.
//!
//! The v2 format is four ASCII header lines followed by a zlib stream of
//! `name domain:role priority uri dispname` records. v2 is the only
//! supported version.

use crate::caches::TtlCache;
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::processors::{Inventory, InventoryProcessor};
use crate::results::{Detection, InventoryObject, ProcessorCapabilities};
use crate::types::{Confidence, Genus};
use crate::urls;
use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const INVENTORY_TYPE: &str = "sphinx_objects_inv";

const MAGIC_V2: &str = "# Sphinx inventory version 2";
const MAGIC_V1: &str = "# Sphinx inventory version 1";

/// Detects, acquires, and normalizes Sphinx v2 inventories.
pub struct SphinxInventoryProcessor {
    cache: TtlCache<Arc<Inventory>>,
    ttl: Duration,
}

impl SphinxInventoryProcessor {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(),
            ttl,
        }
    }

    /// The inventory URL probed for `location`.
    fn inventory_url(location: &str) -> Result<String> {
        if location.ends_with("objects.inv") {
            Ok(location.to_string())
        } else {
            urls::join_url(location, "objects.inv")
        }
    }

    async fn fetch_and_parse(
        &self,
        location: &str,
        fetcher: &dyn Fetcher,
    ) -> Result<Arc<Inventory>> {
        let url = Self::inventory_url(location)?;
        let fetched = fetcher.fetch(&url, self.ttl).await.map_err(|e| {
            Error::InventoryInaccessibility {
                url: url.clone(),
                cause: e.to_string(),
            }
        })?;
        let inventory_url = fetched.final_url.clone();
        let parsed = parse_objects_inv(&fetched.bytes, &inventory_url)?;
        Ok(Arc::new(parsed))
    }
}

#[async_trait]
impl InventoryProcessor for SphinxInventoryProcessor {
    fn name(&self) -> &'static str {
        INVENTORY_TYPE
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        ProcessorCapabilities {
            supported_inventory_types: BTreeSet::from([INVENTORY_TYPE.to_string()]),
            supported_filters: ["domain", "role", "priority", "uri_prefix", "name_regex"]
                .into_iter()
                .map(String::from)
                .collect(),
            mean_detection_ms: None,
            max_payload_bytes: None,
        }
    }

    async fn detect(&self, location: &str, fetcher: &dyn Fetcher) -> Option<Detection> {
        match self.acquire(location, fetcher).await {
            Ok(inventory) => {
                let confidence = match inventory.objects.len() {
                    0 => return None,
                    1..=9 => Confidence::new(0.7),
                    _ => Confidence::new(0.95),
                };
                let mut metadata = BTreeMap::new();
                metadata.insert(
                    "inventory_url".to_string(),
                    inventory.location_url.clone(),
                );
                metadata.insert(
                    "object_count".to_string(),
                    inventory.objects.len().to_string(),
                );
                if let Some(first) = inventory.objects.first() {
                    for key in ["project", "version"] {
                        if let Some(value) = first.specifics.get(key) {
                            metadata.insert(key.to_string(), value.clone());
                        }
                    }
                }
                Some(Detection {
                    processor_name: self.name().to_string(),
                    confidence,
                    processor_type: Genus::Inventory,
                    detection_metadata: metadata,
                })
            }
            Err(err) => {
                tracing::debug!(location, %err, "sphinx inventory not detected");
                None
            }
        }
    }

    async fn acquire(&self, location: &str, fetcher: &dyn Fetcher) -> Result<Arc<Inventory>> {
        if let Some(hit) = self.cache.get(location) {
            return Ok(hit);
        }
        let inventory = self.fetch_and_parse(location, fetcher).await?;
        self.cache.insert(location, Arc::clone(&inventory), self.ttl);
        Ok(inventory)
    }
}

/// Parses the bytes of an `objects.inv` file.
pub fn parse_objects_inv(bytes: &[u8], inventory_url: &str) -> Result<Inventory> {
    let invalid = |reason: String| Error::InventoryInvalidity {
        location: inventory_url.to_string(),
        reason,
    };

    let mut offset = 0;
    let mut header_lines = Vec::with_capacity(4);
    for _ in 0..4 {
        let end = bytes[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| invalid("truncated header".to_string()))?;
        let line = std::str::from_utf8(&bytes[offset..offset + end])
            .map_err(|_| invalid("header is not ASCII".to_string()))?;
        header_lines.push(line.trim_end_matches('\r').to_string());
        offset += end + 1;
    }

    if header_lines[0] == MAGIC_V1 {
        return Err(invalid(
            "unsupported inventory version 1 (only version 2 is supported)".to_string(),
        ));
    }
    if header_lines[0] != MAGIC_V2 {
        return Err(invalid(format!(
            "header missing magic '{MAGIC_V2}' (got '{}')",
            header_lines[0]
        )));
    }
    let project = header_lines[1]
        .strip_prefix("# Project: ")
        .unwrap_or("")
        .to_string();
    let version = header_lines[2]
        .strip_prefix("# Version: ")
        .unwrap_or("")
        .to_string();
    if !header_lines[3].contains("zlib") {
        return Err(invalid(
            "header does not announce zlib compression".to_string(),
        ));
    }

    let mut decoder = ZlibDecoder::new(&bytes[offset..]);
    let mut decompressed = String::new();
    decoder
        .read_to_string(&mut decompressed)
        .map_err(|e| invalid(format!("zlib decompression failed: {e}")))?;

    let mut objects = Vec::new();
    for line in decompressed.split('\n') {
        if line.is_empty() {
            continue;
        }
        let Some(record) = parse_record(line, inventory_url, &project, &version) else {
            tracing::debug!(line, "skipping malformed inventory record");
            continue;
        };
        objects.push(record);
    }

    Ok(Inventory {
        location_url: inventory_url.to_string(),
        inventory_type: INVENTORY_TYPE.to_string(),
        objects,
    })
}

/// Parses one `name domain:role priority uri dispname` record.
fn parse_record(
    line: &str,
    inventory_url: &str,
    project: &str,
    version: &str,
) -> Option<InventoryObject> {
    let mut fields = line.splitn(5, ' ');
    let name = fields.next()?;
    let domain_role = fields.next()?;
    let priority = fields.next()?;
    let uri = fields.next()?;
    let dispname = fields.next()?;

    let (domain, role) = domain_role.split_once(':')?;

    // A trailing `$` abbreviates "uri + name".
    let uri = match uri.strip_suffix('$') {
        Some(prefix) => format!("{prefix}{name}"),
        None => uri.to_string(),
    };
    // `-` means "display name same as name".
    let display_name = (dispname != "-").then(|| dispname.to_string());

    let mut specifics = BTreeMap::new();
    specifics.insert("domain".to_string(), domain.to_string());
    specifics.insert("role".to_string(), role.to_string());
    specifics.insert("priority".to_string(), priority.to_string());
    specifics.insert("project".to_string(), project.to_string());
    specifics.insert("version".to_string(), version.to_string());

    Some(InventoryObject::new(
        name,
        uri,
        INVENTORY_TYPE,
        inventory_url,
        display_name,
        specifics,
    ))
}

/// Serializes objects back to the record form, for round-trip checks.
#[must_use]
pub fn serialize_records(objects: &[InventoryObject]) -> String {
    objects
        .iter()
        .map(|o| {
            let domain = o.specifics.get("domain").map_or("std", String::as_str);
            let role = o.specifics.get("role").map_or("doc", String::as_str);
            let priority = o.specifics.get("priority").map_or("1", String::as_str);
            let dispname = o.display_name.as_deref().unwrap_or("-");
            format!("{} {domain}:{role} {priority} {} {dispname}\n", o.name, o.uri)
        })
        .collect()
}

/// Builds a complete v2 inventory byte stream, for tests and fixtures.
#[must_use]
pub fn build_objects_inv(project: &str, version: &str, records: &str) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(
        format!(
            "{MAGIC_V2}\n# Project: {project}\n# Version: {version}\n\
             # The remainder of this file is compressed using zlib.\n"
        )
        .as_bytes(),
    );
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(records.as_bytes())
        .expect("in-memory zlib write cannot fail");
    bytes.extend_from_slice(&encoder.finish().expect("in-memory zlib finish cannot fail"));
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://ex.io/docs/objects.inv";

    #[test]
    fn test_parse_basic_records() {
        let bytes = build_objects_inv(
            "demo",
            "1.0",
            "foo py:function 1 api/foo.html#foo -\nBar py:class 1 api/bar.html#Bar -\n",
        );
        let inventory = parse_objects_inv(&bytes, URL).unwrap();
        assert_eq!(inventory.objects.len(), 2);

        let foo = &inventory.objects[0];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.uri, "api/foo.html#foo");
        assert_eq!(foo.specifics["domain"], "py");
        assert_eq!(foo.specifics["role"], "function");
        assert_eq!(foo.specifics["project"], "demo");
        assert_eq!(foo.specifics["version"], "1.0");
        assert!(foo.display_name.is_none());
    }

    #[test]
    fn test_dollar_suffix_expands_to_name() {
        let bytes = build_objects_inv("demo", "1.0", "foo py:function 1 api/foo.html#$ -\n");
        let inventory = parse_objects_inv(&bytes, URL).unwrap();
        assert_eq!(inventory.objects[0].uri, "api/foo.html#foo");
    }

    #[test]
    fn test_dispname_preserved_when_not_dash() {
        let bytes = build_objects_inv(
            "demo",
            "1.0",
            "foo py:function 1 api/foo.html The foo function\n",
        );
        let inventory = parse_objects_inv(&bytes, URL).unwrap();
        assert_eq!(
            inventory.objects[0].display_name.as_deref(),
            Some("The foo function")
        );
    }

    #[test]
    fn test_version_1_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"# Sphinx inventory version 1\n# Project: demo\n# Version: 1.0\n# ignored\n",
        );
        let err = parse_objects_inv(&bytes, URL).unwrap_err();
        match err {
            Error::InventoryInvalidity { reason, .. } => {
                assert!(reason.contains("version 1"));
            }
            other => panic!("expected InventoryInvalidity, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_header_rejected() {
        let err = parse_objects_inv(b"# Sphinx inventory version 2\n", URL).unwrap_err();
        assert!(matches!(err, Error::InventoryInvalidity { .. }));
    }

    #[test]
    fn test_corrupt_zlib_rejected() {
        let mut bytes = build_objects_inv("demo", "1.0", "foo py:function 1 api/foo.html -\n");
        let len = bytes.len();
        bytes.truncate(len - 4);
        bytes.extend_from_slice(b"????");
        assert!(matches!(
            parse_objects_inv(&bytes, URL),
            Err(Error::InventoryInvalidity { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_all_retained() {
        let bytes = build_objects_inv(
            "demo",
            "1.0",
            "Widget py:class 1 api/widget.html -\nWidget py:function 1 api/widget_fn.html -\n",
        );
        let inventory = parse_objects_inv(&bytes, URL).unwrap();
        assert_eq!(inventory.objects.len(), 2);
        assert_eq!(inventory.objects_named("Widget").len(), 2);
    }

    #[test]
    fn test_round_trip_record_set() {
        let records = "foo py:function 1 api/foo.html#foo -\n\
                       Bar py:class 1 api/bar.html#Bar -\n\
                       baz std:doc 0 guide/baz.html The Baz Guide\n";
        let inventory = parse_objects_inv(&build_objects_inv("demo", "1.0", records), URL).unwrap();
        let serialized = serialize_records(&inventory.objects);
        let reparsed =
            parse_objects_inv(&build_objects_inv("demo", "1.0", &serialized), URL).unwrap();

        let mut original: Vec<String> = inventory.objects.iter().map(|o| o.name.clone()).collect();
        let mut round_tripped: Vec<String> =
            reparsed.objects.iter().map(|o| o.name.clone()).collect();
        original.sort();
        round_tripped.sort();
        assert_eq!(original, round_tripped);
        assert_eq!(inventory.objects.len(), reparsed.objects.len());
        for (a, b) in inventory.objects.iter().zip(reparsed.objects.iter()) {
            assert_eq!(a.uri, b.uri);
            assert_eq!(a.specifics["domain"], b.specifics["domain"]);
            assert_eq!(a.display_name, b.display_name);
        }
    }

    #[test]
    fn test_inventory_url_derivation() {
        assert_eq!(
            SphinxInventoryProcessor::inventory_url("https://ex.io/docs").unwrap(),
            "https://ex.io/docs/objects.inv"
        );
        assert_eq!(
            SphinxInventoryProcessor::inventory_url("https://ex.io/docs/objects.inv").unwrap(),
            "https://ex.io/docs/objects.inv"
        );
    }
}
