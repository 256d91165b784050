//! Format-agnostic inventory filter semantics.
//!
//! The recognized keys are a closed set. Unknown keys produce a
//! user-visible warning and are ignored, never silently dropped.

use crate::error::{Error, Result};
use crate::results::InventoryObject;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A filter value: one string or a set of alternatives.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn as_set(&self) -> Vec<&str> {
        match self {
            Self::One(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Caller-supplied filter map.
pub type FilterMap = BTreeMap<String, FilterValue>;

/// Applies `filter_map` to `objects`.
///
/// `supported` is the processor's advertised filter set; recognized keys
/// outside it and keys no processor knows both warn.
pub fn apply(
    objects: &[InventoryObject],
    filter_map: &FilterMap,
    supported: &BTreeSet<String>,
) -> Result<(Vec<InventoryObject>, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut survivors: Vec<InventoryObject> = objects.to_vec();

    for (key, value) in filter_map {
        if !supported.contains(key.as_str()) {
            warnings.push(format!("unknown filter key '{key}' ignored"));
            continue;
        }
        match key.as_str() {
            "domain" => {
                let wanted = value.as_set();
                survivors.retain(|o| {
                    o.specifics
                        .get("domain")
                        .is_some_and(|d| wanted.contains(&d.as_str()))
                });
            }
            "role" => {
                let wanted = value.as_set();
                survivors.retain(|o| {
                    o.specifics
                        .get("role")
                        .is_some_and(|r| wanted.contains(&r.as_str()))
                });
            }
            "priority" => {
                let wanted = value.as_set();
                survivors.retain(|o| {
                    o.specifics
                        .get("priority")
                        .is_some_and(|p| wanted.contains(&p.as_str()))
                });
            }
            "uri_prefix" => {
                let prefixes = value.as_set();
                survivors.retain(|o| prefixes.iter().any(|p| o.uri.starts_with(p)));
            }
            "name_regex" => {
                let patterns = value.as_set();
                let mut compiled = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let anchored = format!("^(?:{pattern})$");
                    compiled.push(regex::Regex::new(&anchored).map_err(|e| {
                        Error::InventoryInvalidity {
                            location: pattern.to_string(),
                            reason: format!("name_regex `{pattern}` failed to compile: {e}"),
                        }
                    })?);
                }
                survivors.retain(|o| compiled.iter().any(|re| re.is_match(&o.name)));
            }
            other => {
                // Advertised by a processor but not understood here;
                // treat as unknown rather than guessing semantics.
                warnings.push(format!("unsupported filter key '{other}' ignored"));
            }
        }
    }

    Ok((survivors, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, uri: &str, domain: &str, role: &str) -> InventoryObject {
        let mut specifics = BTreeMap::new();
        specifics.insert("domain".to_string(), domain.to_string());
        specifics.insert("role".to_string(), role.to_string());
        specifics.insert("priority".to_string(), "1".to_string());
        InventoryObject::new(
            name,
            uri,
            "sphinx_objects_inv",
            "https://ex.io/objects.inv",
            None,
            specifics,
        )
    }

    fn supported() -> BTreeSet<String> {
        ["domain", "role", "priority", "uri_prefix", "name_regex"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_domain_filter_single_and_set() {
        let objects = vec![
            object("f", "api/f.html", "py", "function"),
            object("g", "api/g.html", "js", "function"),
        ];
        let mut filter_map = FilterMap::new();
        filter_map.insert("domain".into(), FilterValue::One("py".into()));
        let (survivors, warnings) = apply(&objects, &filter_map, &supported()).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].name, "f");
        assert!(warnings.is_empty());

        let mut filter_map = FilterMap::new();
        filter_map.insert(
            "domain".into(),
            FilterValue::Many(vec!["py".into(), "js".into()]),
        );
        let (survivors, _) = apply(&objects, &filter_map, &supported()).unwrap();
        assert_eq!(survivors.len(), 2);
    }

    #[test]
    fn test_uri_prefix_filter() {
        let objects = vec![
            object("f", "api/f.html", "py", "function"),
            object("guide", "guide/index.html", "std", "doc"),
        ];
        let mut filter_map = FilterMap::new();
        filter_map.insert("uri_prefix".into(), FilterValue::One("api/".into()));
        let (survivors, _) = apply(&objects, &filter_map, &supported()).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].name, "f");
    }

    #[test]
    fn test_name_regex_is_anchored() {
        let objects = vec![
            object("client", "a", "py", "class"),
            object("http_client_pool", "b", "py", "class"),
        ];
        let mut filter_map = FilterMap::new();
        filter_map.insert("name_regex".into(), FilterValue::One("client".into()));
        let (survivors, _) = apply(&objects, &filter_map, &supported()).unwrap();
        assert_eq!(survivors.len(), 1, "anchored regex must not match substrings");
        assert_eq!(survivors[0].name, "client");
    }

    #[test]
    fn test_bad_name_regex_errors() {
        let objects = vec![object("f", "a", "py", "function")];
        let mut filter_map = FilterMap::new();
        filter_map.insert("name_regex".into(), FilterValue::One("fo(o".into()));
        assert!(matches!(
            apply(&objects, &filter_map, &supported()),
            Err(Error::InventoryInvalidity { .. })
        ));
    }

    #[test]
    fn test_unknown_key_warns_and_is_ignored() {
        let objects = vec![object("f", "a", "py", "function")];
        let mut filter_map = FilterMap::new();
        filter_map.insert("flavor".into(), FilterValue::One("spicy".into()));
        let (survivors, warnings) = apply(&objects, &filter_map, &supported()).unwrap();
        assert_eq!(survivors.len(), 1, "unknown filters must not drop objects");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("flavor"));
    }

    #[test]
    fn test_filters_compose() {
        let objects = vec![
            object("f", "api/f.html", "py", "function"),
            object("C", "api/c.html", "py", "class"),
            object("g", "other/g.html", "py", "function"),
        ];
        let mut filter_map = FilterMap::new();
        filter_map.insert("role".into(), FilterValue::One("function".into()));
        filter_map.insert("uri_prefix".into(), FilterValue::One("api/".into()));
        let (survivors, _) = apply(&objects, &filter_map, &supported()).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].name, "f");
    }
}
