//! The engine core: owned state plus the five public query operations.
//!
//! A `Core` owns the configuration, the fetcher, the processor
//! registries, the redirect table, and the detection caches. Tests
//! construct a fresh `Core` (with a stub fetcher) per scenario; the CLI
//! and MCP adapters construct exactly one.

use crate::config::Config;
use crate::detect::DetectionOrchestrator;
use crate::error::{Error, Result};
use crate::http::{Fetcher, HttpFetcher};
use crate::processors::{
    ExtractOptions, FilterMap, InventoryProcessor, ProcessorRegistry, StructureProcessor,
};
use crate::results::{
    ContentQueryResult, Detection, DetectionsResult, InventoryLocationInfo, InventoryQueryResult,
    ProcessorsSurveyResult, SearchMetadata, SearchResult,
};
use crate::search::{self, SearchBehaviors};
use crate::types::{ContentId, Genus, Score};
use crate::urls::RedirectCache;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Options for the `detect` operation.
#[derive(Debug, Clone)]
pub struct DetectOptions {
    pub processor_name: Option<String>,
    pub processor_types: Vec<Genus>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            processor_name: None,
            processor_types: vec![Genus::Inventory, Genus::Structure],
        }
    }
}

/// Options for `query_inventory`.
#[derive(Debug, Clone)]
pub struct InventoryQueryOptions {
    pub processor_name: Option<String>,
    pub search: SearchBehaviors,
    pub filters: FilterMap,
    pub results_max: usize,
}

impl Default for InventoryQueryOptions {
    fn default() -> Self {
        Self {
            processor_name: None,
            search: SearchBehaviors::default(),
            filters: FilterMap::new(),
            results_max: 5,
        }
    }
}

/// Options for `query_content`.
#[derive(Debug, Clone)]
pub struct ContentQueryOptions {
    pub processor_name: Option<String>,
    pub search: SearchBehaviors,
    pub filters: FilterMap,
    pub content_id: Option<String>,
    pub results_max: usize,
    pub lines_max: Option<usize>,
}

impl Default for ContentQueryOptions {
    fn default() -> Self {
        Self {
            processor_name: None,
            search: SearchBehaviors::default(),
            filters: FilterMap::new(),
            content_id: None,
            results_max: 10,
            lines_max: None,
        }
    }
}

/// Engine state with explicit construction and teardown (drop).
pub struct Core {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    registry: ProcessorRegistry,
    redirects: Arc<RedirectCache>,
    orchestrator: DetectionOrchestrator,
}

impl Core {
    /// Builds a core with the production HTTP fetcher.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.http)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Builds a core around an externally supplied fetcher.
    #[must_use]
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let inventory_ttl = Duration::from_secs(config.detection.ttl_s);
        let registry = ProcessorRegistry::with_builtins(inventory_ttl);
        let orchestrator = DetectionOrchestrator::new(&config);
        Self {
            config,
            fetcher,
            registry,
            redirects: Arc::new(RedirectCache::new()),
            orchestrator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dynamic registration hook for externally provided processors.
    pub fn registry_mut(&mut self) -> &mut ProcessorRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn redirects(&self) -> &RedirectCache {
        &self.redirects
    }

    /// Applies the operation deadline and cancellation signal to `fut`.
    async fn guard<T>(
        &self,
        cancel: &CancellationToken,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let deadline = Duration::from_secs(self.config.operation_timeout_s);
        tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(deadline, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    seconds: self.config.operation_timeout_s,
                }),
            },
        }
    }

    /// Probes `location` and reports every processor's verdict.
    pub async fn detect(
        &self,
        location: &str,
        options: DetectOptions,
        cancel: &CancellationToken,
    ) -> Result<DetectionsResult> {
        self.guard(cancel, self.detect_inner(location, options)).await
    }

    async fn detect_inner(
        &self,
        location: &str,
        options: DetectOptions,
    ) -> Result<DetectionsResult> {
        let started = Instant::now();
        let mut source = crate::urls::normalize_location(location, &self.redirects);
        let mut detections = Vec::new();
        let mut optimal: Option<Detection> = None;

        if let Some(name) = &options.processor_name {
            let known = self.registry.inventory_by_name(name).is_some()
                || self.registry.structure_by_name(name).is_some();
            if !known {
                return Err(Error::Usage(format!("unknown processor '{name}'")));
            }
        }

        for genus in &options.processor_types {
            match &options.processor_name {
                Some(name) => {
                    let detection = self.run_named_probe(&source, *genus, name).await;
                    if let Some(detection) = detection {
                        if optimal.is_none() && detection.confidence.passes_threshold() {
                            optimal = Some(detection.clone());
                        }
                        detections.push(detection);
                    }
                }
                None => {
                    let round = self
                        .orchestrator
                        .detect_all(
                            &self.registry,
                            &self.redirects,
                            self.fetcher.as_ref(),
                            location,
                            *genus,
                        )
                        .await;
                    source = round.source;
                    if optimal.is_none() {
                        optimal = round.optimal;
                    }
                    detections.extend(round.detections);
                }
            }
        }

        Ok(DetectionsResult {
            source,
            detections,
            detection_optimal: optimal,
            time_detection_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Runs one named processor's detect without threshold enforcement.
    ///
    /// `None` when the processor produced no detection, or when the name
    /// belongs to the other genus (callers validate the name exists in
    /// at least one registry).
    async fn run_named_probe(&self, source: &str, genus: Genus, name: &str) -> Option<Detection> {
        match genus {
            Genus::Inventory => {
                self.registry
                    .inventory_by_name(name)?
                    .detect(source, self.fetcher.as_ref())
                    .await
            }
            Genus::Structure => {
                self.registry
                    .structure_by_name(name)?
                    .detect(source, self.fetcher.as_ref())
                    .await
            }
        }
    }

    /// Capability survey of the registered processors.
    pub fn survey_processors(
        &self,
        genus: Genus,
        name: Option<&str>,
    ) -> ProcessorsSurveyResult {
        self.registry.survey(genus, name)
    }

    /// Ranked inventory query.
    pub async fn query_inventory(
        &self,
        location: &str,
        term: &str,
        options: InventoryQueryOptions,
        cancel: &CancellationToken,
    ) -> Result<InventoryQueryResult> {
        self.guard(cancel, self.query_inventory_inner(location, term, options))
            .await
    }

    async fn query_inventory_inner(
        &self,
        location: &str,
        term: &str,
        options: InventoryQueryOptions,
    ) -> Result<InventoryQueryResult> {
        let started = Instant::now();
        let (source, detection, processor) = self
            .resolve_inventory_processor(location, options.processor_name.as_deref())
            .await?;

        let inventory = processor.acquire(&source, self.fetcher.as_ref()).await?;
        let (filtered, warnings) = processor.filter(&inventory, &options.filters)?;

        let threshold = options
            .search
            .fuzzy_threshold
            .unwrap_or(self.config.search.fuzzy_threshold);
        let mut results =
            search::filter_by_name(&filtered, term, options.search.mode, threshold)?;
        let matches_total = results.len();
        results.truncate(options.results_max);

        Ok(InventoryQueryResult {
            location: source.clone(),
            query: term.to_string(),
            search_metadata: SearchMetadata {
                results_count: results.len(),
                results_max: options.results_max,
                matches_total,
                search_time_ms: started.elapsed().as_millis() as u64,
                warnings,
            },
            inventory_locations: vec![InventoryLocationInfo {
                inventory_type: inventory.inventory_type.clone(),
                location_url: inventory.location_url.clone(),
                processor_name: detection.processor_name.clone(),
                confidence: detection.confidence,
                object_count: inventory.objects.len(),
            }],
            objects: results,
            summary: None,
        })
    }

    /// Content query with the browse-then-extract protocol.
    pub async fn query_content(
        &self,
        location: &str,
        term: &str,
        options: ContentQueryOptions,
        cancel: &CancellationToken,
    ) -> Result<ContentQueryResult> {
        self.guard(cancel, self.query_content_inner(location, term, options))
            .await
    }

    async fn query_content_inner(
        &self,
        location: &str,
        term: &str,
        options: ContentQueryOptions,
    ) -> Result<ContentQueryResult> {
        let started = Instant::now();
        let (source, detection, processor) = self
            .resolve_inventory_processor(location, options.processor_name.as_deref())
            .await?;
        let inventory = processor.acquire(&source, self.fetcher.as_ref()).await?;

        let mut warnings = Vec::new();
        let (selected, matches_total) = match &options.content_id {
            Some(raw_id) => {
                // The encoded location is ignored: the caller's location,
                // after redirect normalization, is authoritative.
                let content_id = ContentId::from_raw(raw_id.clone());
                let (_, name) =
                    content_id
                        .decode()
                        .ok_or_else(|| Error::ContentInaccessibility {
                            reference: raw_id.clone(),
                            cause: "content id does not decode".to_string(),
                        })?;
                let matching = inventory.objects_named(&name);
                let object = matching
                    .first()
                    .copied()
                    .ok_or_else(|| Error::ContentInaccessibility {
                        reference: raw_id.clone(),
                        cause: format!("no inventory object named '{name}'"),
                    })?;
                (vec![object.clone()], 1)
            }
            None => {
                let (filtered, filter_warnings) =
                    processor.filter(&inventory, &options.filters)?;
                warnings = filter_warnings;
                let threshold = options
                    .search
                    .fuzzy_threshold
                    .unwrap_or(self.config.search.fuzzy_threshold);
                let results = if term.is_empty() {
                    all_as_results(&filtered)
                } else {
                    search::filter_by_name(&filtered, term, options.search.mode, threshold)?
                };
                let matches_total = results.len();
                let selected: Vec<_> = results
                    .into_iter()
                    .take(options.results_max)
                    .map(|r| r.object)
                    .collect();
                (selected, matches_total)
            }
        };

        let structure = self
            .resolve_structure_processor(&source, &inventory.inventory_type)
            .await?;
        let extract_options = ExtractOptions {
            lines_max: options.lines_max,
            robots_strict: self.config.robots.strict,
            page_ttl: Duration::from_secs(self.config.detection.ttl_s),
        };
        let documents = structure
            .extract(&selected, &source, self.fetcher.as_ref(), &extract_options)
            .await?;

        Ok(ContentQueryResult {
            location: source.clone(),
            query: term.to_string(),
            search_metadata: SearchMetadata {
                results_count: documents.len(),
                results_max: options.results_max,
                matches_total,
                search_time_ms: started.elapsed().as_millis() as u64,
                warnings,
            },
            inventory_locations: vec![InventoryLocationInfo {
                inventory_type: inventory.inventory_type.clone(),
                location_url: inventory.location_url.clone(),
                processor_name: detection.processor_name.clone(),
                confidence: detection.confidence,
                object_count: inventory.objects.len(),
            }],
            documents,
        })
    }

    /// Aggregated inventory overview.
    pub async fn summarize(
        &self,
        location: &str,
        group_by: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<InventoryQueryResult> {
        let group_by = group_by.map(str::to_string);
        self.guard(cancel, self.summarize_inner(location, group_by))
            .await
    }

    async fn summarize_inner(
        &self,
        location: &str,
        group_by: Option<String>,
    ) -> Result<InventoryQueryResult> {
        let started = Instant::now();
        if let Some(key) = group_by.as_deref() {
            if key.contains('.') {
                return Err(Error::Usage(format!(
                    "group_by accepts a top-level field, not a path: '{key}'"
                )));
            }
        }

        let (source, detection, processor) =
            self.resolve_inventory_processor(location, None).await?;
        let inventory = processor.acquire(&source, self.fetcher.as_ref()).await?;

        let group_key = group_by.as_deref().unwrap_or("domain");
        let mut summary: BTreeMap<String, usize> = BTreeMap::new();
        for object in &inventory.objects {
            let value = match group_key {
                "inventory_type" => object.inventory_type.clone(),
                key => object
                    .specifics
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| "(none)".to_string()),
            };
            *summary.entry(value).or_insert(0) += 1;
        }

        Ok(InventoryQueryResult {
            location: source.clone(),
            query: String::new(),
            objects: Vec::new(),
            search_metadata: SearchMetadata {
                results_count: 0,
                results_max: 0,
                matches_total: inventory.objects.len(),
                search_time_ms: started.elapsed().as_millis() as u64,
                warnings: Vec::new(),
            },
            inventory_locations: vec![InventoryLocationInfo {
                inventory_type: inventory.inventory_type.clone(),
                location_url: inventory.location_url.clone(),
                processor_name: detection.processor_name.clone(),
                confidence: detection.confidence,
                object_count: inventory.objects.len(),
            }],
            summary: Some(summary),
        })
    }

    /// Finds the optimal (or named) inventory processor for a location.
    async fn resolve_inventory_processor(
        &self,
        location: &str,
        processor_name: Option<&str>,
    ) -> Result<(String, Detection, Arc<dyn InventoryProcessor>)> {
        let (source, detection) = match processor_name {
            Some(name) => {
                self.orchestrator
                    .detect_named(
                        &self.registry,
                        &self.redirects,
                        self.fetcher.as_ref(),
                        location,
                        Genus::Inventory,
                        name,
                    )
                    .await?
            }
            None => {
                self.orchestrator
                    .detect_optimal(
                        &self.registry,
                        &self.redirects,
                        self.fetcher.as_ref(),
                        location,
                        Genus::Inventory,
                    )
                    .await?
            }
        };
        let processor = self
            .registry
            .inventory_by_name(&detection.processor_name)
            .ok_or_else(|| {
                Error::Internal(format!(
                    "selected processor '{}' vanished from the registry",
                    detection.processor_name
                ))
            })?;
        Ok((source, detection, processor))
    }

    /// Finds a structure processor compatible with `inventory_type`.
    ///
    /// The optimal structure detection wins when its processor supports
    /// the type; otherwise the best compatible supra-threshold detection
    /// is taken.
    async fn resolve_structure_processor(
        &self,
        source: &str,
        inventory_type: &str,
    ) -> Result<Arc<dyn StructureProcessor>> {
        let round = self
            .orchestrator
            .detect_all(
                &self.registry,
                &self.redirects,
                self.fetcher.as_ref(),
                source,
                Genus::Structure,
            )
            .await;

        let mut candidates: Vec<&Detection> = round
            .detections
            .iter()
            .filter(|d| d.confidence.passes_threshold())
            .collect();
        candidates.sort_by(|a, b| b.confidence.as_f64().total_cmp(&a.confidence.as_f64()));
        if let Some(optimal) = &round.optimal {
            candidates.insert(0, optimal);
        }

        for candidate in candidates {
            if let Some(processor) = self.registry.structure_by_name(&candidate.processor_name) {
                if processor.supports_inventory_type(inventory_type) {
                    return Ok(processor);
                }
            }
        }
        Err(Error::ProcessorInavailability {
            origin: source.to_string(),
            genus: Genus::Structure,
            attempted_processors: self.registry.names(Genus::Structure),
            url_patterns_attempted: self.config.url_patterns.enabled,
        })
    }
}

/// Wraps every object as a full-score result, for empty-term content
/// queries where the caller wants "everything, in inventory order".
fn all_as_results(objects: &[crate::results::InventoryObject]) -> Vec<SearchResult> {
    objects
        .iter()
        .map(|object| SearchResult {
            object: object.clone(),
            score: Score::MAX,
            match_reasons: vec!["empty term matches all objects".to_string()],
        })
        .collect()
}
