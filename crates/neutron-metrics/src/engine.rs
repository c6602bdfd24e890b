//! Engine facade and its configuration.

use std::{error, fmt, sync::Arc};

use crate::{
    api::NetworkingApi,
    catalog::{DEFAULT_PREFIX, NEUTRON_METRICS},
    collectors::CollectContext,
    descriptors::{MetricDescriptor, VersionGate},
    registry::{MetricHandle, Parallelism, Registry, RegistryError, ScrapeReport},
    sink::ScrapeSink,
};

/// Error generating a substitute resource ID.
#[derive(Debug)]
pub struct IdGenerationError(Box<dyn error::Error + Send + Sync>);

impl IdGenerationError {
    /// Wraps the specified error.
    pub fn new(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

impl fmt::Display for IdGenerationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

impl error::Error for IdGenerationError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Generator of substitute unique IDs for resources that lack them.
pub type IdGenerator = Arc<dyn Fn() -> Result<String, IdGenerationError> + Send + Sync>;

/// Default [`IdGenerator`] producing random (v4) UUIDs.
///
/// # Errors
///
/// Never fails; the signature matches [`IdGenerator`].
#[allow(clippy::unnecessary_wraps)]
pub fn default_id_generator() -> Result<String, IdGenerationError> {
    Ok(uuid::Uuid::new_v4().to_string())
}

type SlowMetricFilter = Arc<dyn Fn(&MetricDescriptor) -> bool + Send + Sync>;

/// Configuration of an [`Engine`].
///
/// # Examples
///
/// ```
/// use neutron_metrics::{EngineConfig, Parallelism, Version, VersionGate};
///
/// let config = EngineConfig::new("RegionOne")
///     .with_version_gate(VersionGate::at(Version::new(2023, 1, 0)))
///     .disable_slow_metrics()
///     .with_parallelism(Parallelism::Sequential);
/// assert_eq!(config.region(), "RegionOne");
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    region: String,
    prefix: String,
    catalog: &'static [MetricDescriptor],
    version_gate: VersionGate,
    slow_metric_filter: SlowMetricFilter,
    id_generator: IdGenerator,
    parallelism: Parallelism,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EngineConfig")
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .field("catalog_len", &self.catalog.len())
            .field("version_gate", &self.version_gate)
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    /// Creates a configuration with the specified value of the `region_name` label. All other params
    /// are set to their defaults: the built-in catalog with the `openstack_neutron` prefix, no version gating,
    /// no slow metrics filtering, UUID v4 ID generator, and running collectors in parallel.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            prefix: DEFAULT_PREFIX.to_owned(),
            catalog: NEUTRON_METRICS,
            version_gate: VersionGate::any(),
            slow_metric_filter: Arc::new(|_: &MetricDescriptor| false),
            id_generator: Arc::new(default_id_generator),
            parallelism: Parallelism::default(),
        }
    }

    /// Returns the value of the `region_name` label.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sets the common prefix of metric names.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the metric catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: &'static [MetricDescriptor]) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the version gate filtering metrics.
    #[must_use]
    pub fn with_version_gate(mut self, gate: VersionGate) -> Self {
        self.version_gate = gate;
        self
    }

    /// Sets the predicate excluding slow metrics; metrics for which it returns `true` are not registered.
    #[must_use]
    pub fn with_slow_metric_filter(
        mut self,
        filter: impl Fn(&MetricDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.slow_metric_filter = Arc::new(filter);
        self
    }

    /// Excludes all metrics marked as slow.
    #[must_use]
    pub fn disable_slow_metrics(self) -> Self {
        self.with_slow_metric_filter(|descriptor| descriptor.slow)
    }

    /// Sets the generator of substitute resource IDs.
    #[must_use]
    pub fn with_id_generator(
        mut self,
        generator: impl Fn() -> Result<String, IdGenerationError> + Send + Sync + 'static,
    ) -> Self {
        self.id_generator = Arc::new(generator);
        self
    }

    /// Sets the strategy of running collectors.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }
}

/// Metrics engine for a single region.
///
/// The engine holds an immutable registry built from the configured catalog. Each scrape recomputes
/// all metrics from scratch; no state is shared among scrapes.
///
/// # Examples
///
/// ```
/// use neutron_metrics::{api::{FixtureApi, ResourceKind}, Engine, EngineConfig, Format};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let api = FixtureApi::new(0).with_records(
///     &ResourceKind::Subnets,
///     vec![json!({ "id": "s1" }), json!({ "id": "s2" })],
/// );
/// let engine = Engine::new(Arc::new(api), EngineConfig::new("RegionOne"))?;
/// let (sink, report) = engine.scrape();
/// assert!(report.is_success());
///
/// let mut buffer = String::new();
/// sink.encode(&mut buffer, Format::Prometheus)?;
/// assert!(buffer.contains("openstack_neutron_subnets{region_name=\"RegionOne\"} 2.0"));
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct Engine {
    api: Arc<dyn NetworkingApi>,
    registry: Registry,
    region: String,
    id_generator: IdGenerator,
    parallelism: Parallelism,
}

impl fmt::Debug for Engine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Engine")
            .field("api", &self.api)
            .field("registry", &self.registry)
            .field("region", &self.region)
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured catalog or prefix is invalid.
    pub fn new(api: Arc<dyn NetworkingApi>, config: EngineConfig) -> Result<Self, RegistryError> {
        let registry = Registry::register(
            config.catalog,
            &config.prefix,
            &config.version_gate,
            config.slow_metric_filter.as_ref(),
        )?;
        tracing::info!(
            region = %config.region,
            metric_count = registry.handles().len(),
            collector_count = registry.collectors().len(),
            "Created networking metrics engine"
        );

        Ok(Self {
            api,
            registry,
            region: config.region,
            id_generator: config.id_generator,
            parallelism: config.parallelism,
        })
    }

    /// Returns the registry of active metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Iterates over handles of active metrics in the catalog order.
    pub fn describe(&self) -> impl Iterator<Item = &MetricHandle> + '_ {
        self.registry.handles().iter()
    }

    /// Runs a full scrape, writing observations into the provided sink.
    pub fn collect(&self, sink: &ScrapeSink) -> ScrapeReport {
        let ctx = CollectContext::new(self.api.as_ref(), &self.region, &self.id_generator);
        self.registry.run_all(&ctx, sink, self.parallelism)
    }

    /// Runs a full scrape into a new sink.
    pub fn scrape(&self) -> (ScrapeSink, ScrapeReport) {
        let sink = ScrapeSink::default();
        let report = self.collect(&sink);
        (sink, report)
    }
}
