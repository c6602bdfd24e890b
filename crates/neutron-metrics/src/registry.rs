//! Metric registry and scrape orchestration.

use std::{
    collections::{HashMap, HashSet},
    error, fmt, panic, thread,
    time::{Duration, Instant},
};

use crate::{
    collectors::{CollectContext, CollectError},
    descriptors::{Collector, MetricDescriptor, ValueKind, VersionGate},
    emit::Emitter,
    sink::ScrapeSink,
    validation::{find_duplicate_label, validate_label_name, validate_name},
};

/// Error building a [`Registry`]. Such errors are fatal: the catalog must be fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// Several descriptors have the same metric name.
    DuplicateMetric {
        /// Duplicated name.
        name: &'static str,
    },
    /// Metric name is invalid.
    InvalidMetricName {
        /// Invalid name.
        name: &'static str,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// Label name is invalid.
    InvalidLabelName {
        /// Metric declaring the label.
        metric: &'static str,
        /// Invalid label name.
        label: &'static str,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// A metric declares the same label more than once.
    DuplicateLabel {
        /// Metric declaring the label.
        metric: &'static str,
        /// Duplicated label name.
        label: &'static str,
    },
    /// Common metric prefix is invalid.
    InvalidPrefix {
        /// Invalid prefix.
        prefix: String,
        /// Human-readable reason.
        reason: &'static str,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateMetric { name } => {
                write!(formatter, "metric `{name}` is declared several times")
            }
            Self::InvalidMetricName { name, reason } => {
                write!(formatter, "invalid metric name `{name}`: {reason}")
            }
            Self::InvalidLabelName {
                metric,
                label,
                reason,
            } => write!(
                formatter,
                "invalid label name `{label}` for metric `{metric}`: {reason}"
            ),
            Self::DuplicateLabel { metric, label } => write!(
                formatter,
                "label `{label}` is declared several times for metric `{metric}`"
            ),
            Self::InvalidPrefix { prefix, reason } => {
                write!(formatter, "invalid metric prefix `{prefix}`: {reason}")
            }
        }
    }
}

impl error::Error for RegistryError {}

/// Error looking up a metric in a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LookupError {
    /// Metric is not registered, either because it's not declared in the catalog or because
    /// it was filtered out.
    NotFound {
        /// Name of the metric (excluding the prefix).
        name: String,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(formatter, "metric `{name}` is not registered"),
        }
    }
}

impl error::Error for LookupError {}

/// Registered metric.
#[derive(Debug)]
pub struct MetricHandle {
    descriptor: &'static MetricDescriptor,
    full_name: String,
    position: usize,
}

impl MetricHandle {
    /// Returns the descriptor of this metric.
    pub fn descriptor(&self) -> &'static MetricDescriptor {
        self.descriptor
    }

    /// Returns the metric name excluding the common prefix.
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Returns the metric name including the common prefix.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the help text.
    pub fn help(&self) -> &'static str {
        self.descriptor.help
    }

    /// Returns the ordered label names.
    pub fn labels(&self) -> &'static [&'static str] {
        self.descriptor.labels
    }

    /// Returns the value kind.
    pub fn kind(&self) -> ValueKind {
        self.descriptor.kind
    }

    /// Position of this metric among registered ones; used to encode metrics in the catalog order.
    pub(crate) fn position(&self) -> usize {
        self.position
    }
}

/// Strategy of running collectors during a scrape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum Parallelism {
    /// Run each distinct collector on a dedicated thread.
    #[default]
    PerCollector,
    /// Run collectors one by one on the calling thread.
    Sequential,
}

/// Outcome of running a single collector.
#[derive(Debug)]
pub struct CollectorOutcome {
    /// Name of the collector.
    pub collector: &'static str,
    /// Wall-clock time spent by the collector, including fetching resources.
    pub latency: Duration,
    /// Number of observations committed to the sink, or the error that aborted the collector.
    pub result: Result<usize, CollectError>,
}

/// Report of a single scrape, with one outcome per collector.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    outcomes: Vec<CollectorOutcome>,
}

impl ScrapeReport {
    /// Returns outcomes of all collectors in the order of their registration.
    pub fn outcomes(&self) -> &[CollectorOutcome] {
        &self.outcomes
    }

    /// Iterates over failed collectors.
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &CollectError)> + '_ {
        self.outcomes.iter().filter_map(|outcome| {
            let err = outcome.result.as_ref().err()?;
            Some((outcome.collector, err))
        })
    }

    /// Checks whether all collectors have succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Returns the total number of observations committed by successful collectors.
    pub fn observation_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .sum()
    }

    /// Converts this report into an error listing all failed collectors, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if at least one collector has failed.
    pub fn into_result(self) -> Result<(), ScrapeError> {
        let failures: Vec<_> = self
            .outcomes
            .into_iter()
            .filter_map(|outcome| Some((outcome.collector, outcome.result.err()?)))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScrapeError { failures })
        }
    }
}

/// Aggregated error for a scrape in which some collectors have failed. Observations from successful
/// collectors are not affected.
#[derive(Debug)]
pub struct ScrapeError {
    failures: Vec<(&'static str, CollectError)>,
}

impl ScrapeError {
    /// Returns failed collectors together with the corresponding errors.
    pub fn failures(&self) -> &[(&'static str, CollectError)] {
        &self.failures
    }
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} collector(s) failed: ", self.failures.len())?;
        for (i, (collector, err)) in self.failures.iter().enumerate() {
            if i > 0 {
                formatter.write_str("; ")?;
            }
            write!(formatter, "{collector}: {err}")?;
        }
        Ok(())
    }
}

impl error::Error for ScrapeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.failures.first().map(|(_, err)| err as _)
    }
}

/// Registry of active metrics built from a catalog.
///
/// The registry is immutable once built, so it can be shared among collector threads without locking.
#[derive(Debug)]
pub struct Registry {
    handles: Vec<MetricHandle>,
    by_name: HashMap<&'static str, usize>,
    declared: HashSet<&'static str>,
    collectors: Vec<Collector>,
}

impl Registry {
    /// Validates `catalog` and registers metrics that pass the version gate and are not
    /// excluded by `slow_metric_filter` (i.e., the filter returns `false` for them). Registered
    /// metric names have the form `{prefix}_{name}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix, any metric name or label name is invalid, or if names are not unique.
    /// Validation covers the entire catalog, including metrics that are filtered out.
    pub fn register(
        catalog: &'static [MetricDescriptor],
        prefix: &str,
        version_gate: &VersionGate,
        slow_metric_filter: &dyn Fn(&MetricDescriptor) -> bool,
    ) -> Result<Self, RegistryError> {
        validate_name(prefix).map_err(|reason| RegistryError::InvalidPrefix {
            prefix: prefix.to_owned(),
            reason,
        })?;
        Self::validate(catalog)?;

        let mut this = Self {
            handles: Vec::with_capacity(catalog.len()),
            by_name: HashMap::with_capacity(catalog.len()),
            declared: catalog.iter().map(|descriptor| descriptor.name).collect(),
            collectors: vec![],
        };
        for descriptor in catalog {
            if !version_gate.allows(descriptor) {
                tracing::debug!(
                    metric = descriptor.name,
                    active_version = ?version_gate.active(),
                    "Skipping metric not supported by the active version"
                );
                continue;
            }
            if slow_metric_filter(descriptor) {
                tracing::debug!(metric = descriptor.name, "Skipping slow metric");
                continue;
            }

            let position = this.handles.len();
            this.handles.push(MetricHandle {
                descriptor,
                full_name: format!("{prefix}_{}", descriptor.name),
                position,
            });
            this.by_name.insert(descriptor.name, position);

            if let Some(collector) = descriptor.collector {
                let is_new = this
                    .collectors
                    .iter()
                    .all(|existing| existing.name() != collector.name());
                if is_new {
                    this.collectors.push(collector);
                }
            }
        }

        tracing::debug!(
            metric_count = this.handles.len(),
            collector_count = this.collectors.len(),
            "Built metrics registry"
        );
        Ok(this)
    }

    fn validate(catalog: &[MetricDescriptor]) -> Result<(), RegistryError> {
        let mut names = HashSet::with_capacity(catalog.len());
        for descriptor in catalog {
            let name = descriptor.name;
            validate_name(name)
                .map_err(|reason| RegistryError::InvalidMetricName { name, reason })?;
            for &label in descriptor.labels {
                validate_label_name(label).map_err(|reason| RegistryError::InvalidLabelName {
                    metric: name,
                    label,
                    reason,
                })?;
            }
            if let Some(label) = find_duplicate_label(descriptor.labels) {
                return Err(RegistryError::DuplicateLabel {
                    metric: name,
                    label,
                });
            }
            if !names.insert(name) {
                return Err(RegistryError::DuplicateMetric { name });
            }
        }
        Ok(())
    }

    /// Returns handles of all registered metrics in the catalog order.
    pub fn handles(&self) -> &[MetricHandle] {
        &self.handles
    }

    /// Returns distinct collectors of registered metrics.
    pub fn collectors(&self) -> &[Collector] {
        &self.collectors
    }

    /// Checks whether the metric with the specified name is declared in the catalog (regardless
    /// of whether it's registered).
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Looks up a registered metric by its name (excluding the prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if the metric is not registered.
    pub fn lookup(&self, name: &str) -> Result<&MetricHandle, LookupError> {
        self.by_name
            .get(name)
            .map(|&idx| &self.handles[idx])
            .ok_or_else(|| LookupError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Runs all collectors once, committing observations of successful collectors to `sink`.
    /// A failing collector doesn't affect other collectors.
    ///
    /// # Panics
    ///
    /// Propagates panics raised by collectors.
    pub fn run_all(
        &self,
        ctx: &CollectContext<'_>,
        sink: &ScrapeSink,
        parallelism: Parallelism,
    ) -> ScrapeReport {
        let outcomes = match parallelism {
            Parallelism::Sequential => self
                .collectors
                .iter()
                .map(|collector| self.run_collector(collector, ctx, sink))
                .collect(),
            Parallelism::PerCollector => thread::scope(|scope| {
                let handles: Vec<_> = self
                    .collectors
                    .iter()
                    .map(|collector| scope.spawn(move || self.run_collector(collector, ctx, sink)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap_or_else(|err| panic::resume_unwind(err)))
                    .collect()
            }),
        };
        ScrapeReport { outcomes }
    }

    fn run_collector(
        &self,
        collector: &Collector,
        ctx: &CollectContext<'_>,
        sink: &ScrapeSink,
    ) -> CollectorOutcome {
        let started_at = Instant::now();
        let mut emitter = Emitter::new(self);
        let result = collector
            .run(ctx, &mut emitter)
            .map(|()| emitter.commit(sink));
        let latency = started_at.elapsed();

        match &result {
            Ok(observation_count) => tracing::debug!(
                collector = collector.name(),
                latency_sec = latency.as_secs_f64(),
                observation_count,
                "Collector finished in {latency:?}"
            ),
            Err(err) => tracing::debug!(
                collector = collector.name(),
                latency_sec = latency.as_secs_f64(),
                %err,
                "Collector failed in {latency:?}"
            ),
        }
        CollectorOutcome {
            collector: collector.name(),
            latency,
            result,
        }
    }
}
