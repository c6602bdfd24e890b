//! Metric descriptors and the predicates filtering them.

use std::{error, fmt, num::ParseIntError, str::FromStr};

use crate::{
    collectors::{CollectContext, CollectError},
    emit::Emitter,
};

/// Value semantics of a metric as exposed to Prometheus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Snapshot value overwritten on each scrape.
    Gauge,
    /// Counter-typed value. Note that engine counters are sampled anew on each scrape.
    Counter,
}

/// Function producing observations for one or more metrics.
pub type CollectorFn = fn(&CollectContext<'_>, &mut Emitter<'_>) -> Result<(), CollectError>;

/// Named collector function referenced by a [`MetricDescriptor`].
#[derive(Clone, Copy)]
pub struct Collector {
    name: &'static str,
    run: CollectorFn,
}

impl fmt::Debug for Collector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Collector")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Collector {
    /// Creates a collector with the specified name. Collectors are deduplicated by name,
    /// so the name must be unique within a catalog.
    pub const fn new(name: &'static str, run: CollectorFn) -> Self {
        Self { name, run }
    }

    /// Returns the name of this collector.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn run(
        &self,
        ctx: &CollectContext<'_>,
        emitter: &mut Emitter<'_>,
    ) -> Result<(), CollectError> {
        (self.run)(ctx, emitter)
    }
}

/// Static description of a single metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    /// Name of the metric **excluding** the common prefix.
    pub name: &'static str,
    /// Help for the metric exported to Prometheus.
    pub help: &'static str,
    /// Ordered label names. Label values must be supplied in the same order on emission.
    pub labels: &'static [&'static str],
    /// Value kind of the metric.
    pub kind: ValueKind,
    /// Collector emitting this metric (and possibly others). `None` if the metric is emitted
    /// by a collector owned by another descriptor.
    pub collector: Option<Collector>,
    /// Minimum service version the metric is supported on.
    pub min_version: Option<Version>,
    /// Version starting from which the metric is no longer exported.
    pub deprecated_since: Option<Version>,
    /// Whether collecting the metric is expensive.
    pub slow: bool,
}

impl MetricDescriptor {
    /// Creates a gauge descriptor without a collector.
    pub const fn gauge(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            kind: ValueKind::Gauge,
            collector: None,
            min_version: None,
            deprecated_since: None,
            slow: false,
        }
    }

    /// Creates a counter descriptor without a collector.
    pub const fn counter(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        let mut this = Self::gauge(name, help, labels);
        this.kind = ValueKind::Counter;
        this
    }

    /// Sets the collector owned by this descriptor.
    #[must_use]
    pub const fn with_collector(mut self, collector: Collector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Sets the minimum supported version.
    #[must_use]
    pub const fn since(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Sets the deprecation version.
    #[must_use]
    pub const fn deprecated_since(mut self, version: Version) -> Self {
        self.deprecated_since = Some(version);
        self
    }

    /// Marks this metric as slow to collect.
    #[must_use]
    pub const fn slow(mut self) -> Self {
        self.slow = true;
        self
    }
}

/// Service version in the `major.minor.patch` form. Missing trailing components are zeros,
/// so that OpenStack release versions like `2023.1` can be used directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error parsing a [`Version`].
#[derive(Debug)]
pub struct VersionParseError {
    input: String,
    source: Option<ParseIntError>,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "`{}` is not a version (expected up to 3 dot-separated numbers)",
            self.input
        )
    }
}

impl error::Error for VersionParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|err| err as _)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |source| VersionParseError {
            input: s.to_owned(),
            source,
        };

        let mut components = [0_u32; 3];
        let mut parts = s.trim().split('.');
        for component in &mut components {
            if let Some(part) = parts.next() {
                *component = part.parse().map_err(|e| err(Some(e)))?;
            }
        }
        if parts.next().is_some() {
            return Err(err(None));
        }
        let [major, minor, patch] = components;
        Ok(Self::new(major, minor, patch))
    }
}

/// Predicate filtering metrics by the service version they are supported on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionGate {
    active: Option<Version>,
}

impl VersionGate {
    /// Gate that allows all metrics (the active version is unknown).
    pub const fn any() -> Self {
        Self { active: None }
    }

    /// Gate for the specified active version.
    pub const fn at(active: Version) -> Self {
        Self {
            active: Some(active),
        }
    }

    /// Returns the active version, if any.
    pub const fn active(&self) -> Option<Version> {
        self.active
    }

    /// Checks whether the metric should be exported for the active version.
    pub fn allows(&self, descriptor: &MetricDescriptor) -> bool {
        let Some(active) = self.active else {
            return true;
        };
        let is_supported = descriptor.min_version.map_or(true, |min| min <= active);
        let is_deprecated = descriptor
            .deprecated_since
            .map_or(false, |deprecated| deprecated <= active);
        is_supported && !is_deprecated
    }
}
