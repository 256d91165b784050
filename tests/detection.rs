//! Detection orchestration tests: redirect convergence, explicit
//! overrides, and cache behavior observable through the public API.

mod common;

use common::*;
use librovore::search::MatchMode;
use librovore::tools::*;
use librovore::{Config, Error};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn input(location: &str, term: &str) -> QueryInventoryInput {
    QueryInventoryInput {
        location: location.to_string(),
        term: term.to_string(),
        processor_name: None,
        mode: Some(MatchMode::Exact),
        fuzzy_threshold: None,
        filters: None,
        results_max: Some(5),
    }
}

#[tokio::test]
async fn redirect_convergence_between_original_and_working_url() {
    let fetcher = Arc::new(StubFetcher::new());
    let base = "https://ex.io/pkg";
    let working = "https://ex.io/pkg/en/latest";
    seed_sphinx_site(&fetcher, working);
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let via_original = execute_query_inventory(&core, input(base, "foo"), &cancel)
        .await
        .unwrap();

    // After resolution, the same call through the working URL behaves
    // identically and hits engine caches (no new network I/O).
    fetcher.clear_log();
    let via_working = execute_query_inventory(&core, input(working, "foo"), &cancel)
        .await
        .unwrap();

    assert_eq!(fetcher.fetch_count(), 0, "fetched: {:?}", fetcher.fetched_urls());
    assert_eq!(via_original.objects.len(), via_working.objects.len());
    assert_eq!(
        via_original.objects[0].object.name,
        via_working.objects[0].object.name
    );
    assert_eq!(
        via_original.inventory_locations[0].location_url,
        via_working.inventory_locations[0].location_url
    );
}

#[tokio::test]
async fn repeated_query_reuses_inventory_cache() {
    let fetcher = Arc::new(StubFetcher::new());
    let base = "https://docs.cached-demo.io/latest";
    seed_sphinx_site(&fetcher, base);
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    execute_query_inventory(&core, input(base, "foo"), &cancel)
        .await
        .unwrap();
    fetcher.clear_log();

    execute_query_inventory(&core, input(base, "Bar"), &cancel)
        .await
        .unwrap();
    assert_eq!(
        fetcher.fetch_count(),
        0,
        "second query should be served from caches, fetched: {:?}",
        fetcher.fetched_urls()
    );
}

#[tokio::test]
async fn explicit_processor_name_bypasses_selection() {
    let fetcher = Arc::new(StubFetcher::new());
    let base = "https://docs.both-demo.io/latest";
    seed_sphinx_site(&fetcher, base);
    fetcher.route(format!("{base}/search/search_index.json"), mkdocs_index_json());
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let mut query = input(base, "API");
    query.processor_name = Some("mkdocs_search_index".to_string());
    let result = execute_query_inventory(&core, query, &cancel).await.unwrap();

    assert_eq!(
        result.inventory_locations[0].inventory_type,
        "mkdocs_search_index"
    );
    assert_eq!(result.objects[0].object.name, "API");
}

#[tokio::test]
async fn unknown_processor_name_is_a_usage_error() {
    let fetcher = Arc::new(StubFetcher::new());
    seed_sphinx_site(&fetcher, "https://docs.sphinx-demo.io/latest");
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let mut query = input("https://docs.sphinx-demo.io/latest", "foo");
    query.processor_name = Some("asciidoc".to_string());
    let err = execute_query_inventory(&core, query, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn named_processor_that_detects_nothing_is_unavailable() {
    let fetcher = Arc::new(StubFetcher::new());
    let base = "https://docs.mkdocs-demo.io/stable";
    seed_mkdocs_site(&fetcher, base);
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let mut query = input(base, "API");
    query.processor_name = Some("sphinx_objects_inv".to_string());
    let err = execute_query_inventory(&core, query, &cancel)
        .await
        .unwrap_err();
    match err {
        Error::ProcessorInavailability {
            attempted_processors,
            url_patterns_attempted,
            ..
        } => {
            assert_eq!(attempted_processors, vec!["sphinx_objects_inv"]);
            assert!(!url_patterns_attempted);
        }
        other => panic!("expected ProcessorInavailability, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_url_patterns_skip_extension_probing() {
    let fetcher = Arc::new(StubFetcher::new());
    // Site only exists under the extension path.
    seed_sphinx_site(&fetcher, "https://ex.io/pkg/en/latest");
    let mut config = Config::default();
    config.url_patterns.enabled = false;
    let core = core_with_config(&fetcher, config);
    let cancel = CancellationToken::new();

    let err = execute_query_inventory(&core, input("https://ex.io/pkg", "foo"), &cancel)
        .await
        .unwrap_err();
    match err {
        Error::ProcessorInavailability {
            url_patterns_attempted,
            ..
        } => assert!(!url_patterns_attempted),
        other => panic!("expected ProcessorInavailability, got {other:?}"),
    }
}

#[tokio::test]
async fn detect_reports_both_genera_without_failing() {
    let fetcher = Arc::new(StubFetcher::new());
    let base = "https://docs.sphinx-demo.io/latest";
    seed_sphinx_site(&fetcher, base);
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let result = execute_detect(
        &core,
        DetectInput {
            location: base.to_string(),
            processor_name: None,
            processor_types: None,
        },
        &cancel,
    )
    .await
    .unwrap();

    let genera: Vec<librovore::Genus> =
        result.detections.iter().map(|d| d.processor_type).collect();
    assert!(genera.contains(&librovore::Genus::Inventory));
    assert!(genera.contains(&librovore::Genus::Structure));
    assert!(result.detection_optimal.is_some());
}

#[tokio::test]
async fn detect_on_unsupported_site_returns_empty_result() {
    let fetcher = Arc::new(StubFetcher::new());
    // A page exists but carries no inventory and no recognizable theme.
    fetcher.route(
        "https://blog.ex.io",
        "<html><body><p>a plain blog</p></body></html>",
    );
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let result = execute_detect(
        &core,
        DetectInput {
            location: "https://blog.ex.io".to_string(),
            processor_name: None,
            processor_types: None,
        },
        &cancel,
    )
    .await
    .unwrap();

    assert!(result.detections.is_empty());
    assert!(result.detection_optimal.is_none());
}

#[tokio::test]
async fn query_on_unsupported_site_is_unavailable_with_context() {
    let fetcher = Arc::new(StubFetcher::new());
    let core = core_with(&fetcher);
    let cancel = CancellationToken::new();

    let err = execute_query_inventory(&core, input("https://nothing.ex.io", "x"), &cancel)
        .await
        .unwrap_err();
    match &err {
        Error::ProcessorInavailability {
            attempted_processors,
            url_patterns_attempted,
            ..
        } => {
            assert_eq!(
                attempted_processors,
                &vec![
                    "sphinx_objects_inv".to_string(),
                    "mkdocs_search_index".to_string()
                ]
            );
            assert!(url_patterns_attempted);
        }
        other => panic!("expected ProcessorInavailability, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 3);
}
