//! Scrape-scoped storage of observations.

use elsa::sync::FrozenMap;
use prometheus_client::{
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry as RegistryInner,
};

use std::{
    collections::HashMap,
    fmt,
    sync::{atomic::AtomicU64, Mutex},
};

use crate::{
    descriptors::{MetricDescriptor, ValueKind},
    format::{encode_registry, Format},
    registry::MetricHandle,
};

type Labels = Vec<(String, String)>;

/// Single observation recorded in a [`ScrapeSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label names with the corresponding values, in the declared order.
    pub labels: Vec<(&'static str, String)>,
    /// Observed value.
    pub value: f64,
}

#[derive(Debug)]
struct SampleFamily {
    descriptor: &'static MetricDescriptor,
    full_name: String,
    position: usize,
    samples: Mutex<Vec<Sample>>,
}

impl SampleFamily {
    fn new(handle: &MetricHandle) -> Self {
        Self {
            descriptor: handle.descriptor(),
            full_name: handle.full_name().to_owned(),
            position: handle.position(),
            samples: Mutex::default(),
        }
    }

    fn samples(&self) -> Vec<Sample> {
        let samples = self.samples.lock().unwrap_or_else(|err| err.into_inner());
        samples.clone()
    }

    /// Returns label sets with the corresponding values. If several samples share a label set,
    /// the last one wins.
    fn deduplicated_samples(&self) -> Vec<(Labels, f64)> {
        let samples = self.samples();
        let mut indices: HashMap<Labels, usize> = HashMap::with_capacity(samples.len());
        let mut deduplicated: Vec<(Labels, f64)> = Vec::with_capacity(samples.len());
        for sample in &samples {
            let labels: Labels = sample
                .labels
                .iter()
                .map(|(name, value)| ((*name).to_owned(), escape_label_value(value)))
                .collect();
            if let Some(&idx) = indices.get(&labels) {
                deduplicated[idx].1 = sample.value;
            } else {
                indices.insert(labels.clone(), deduplicated.len());
                deduplicated.push((labels, sample.value));
            }
        }

        let duplicate_count = samples.len() - deduplicated.len();
        if duplicate_count > 0 {
            tracing::warn!(
                metric = self.full_name.as_str(),
                duplicate_count,
                "Exporting only the last observation for duplicate label values"
            );
        }
        deduplicated
    }

    fn register(&self, registry: &mut RegistryInner) {
        let samples = self.deduplicated_samples();
        if samples.is_empty() {
            return;
        }
        let help = self.descriptor.help;

        match self.descriptor.kind {
            ValueKind::Gauge => {
                let family = Family::<Labels, Gauge<f64, AtomicU64>>::default();
                for (labels, value) in &samples {
                    family.get_or_create(labels).set(*value);
                }
                registry.register(self.full_name.clone(), help, family);
            }
            ValueKind::Counter => {
                // Counters are created anew for each encoding, so the exported value is the observed one.
                let family = Family::<Labels, Counter<f64, AtomicU64>>::default();
                for (labels, value) in &samples {
                    family.get_or_create(labels).inc_by(*value);
                }
                registry.register(self.full_name.clone(), help, family);
            }
        }
    }
}

/// Escapes a label value for the text exposition formats, which `prometheus-client` doesn't do itself.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Thread-safe sink for observations produced during a single scrape.
///
/// Observations for a metric are buffered in a per-metric family created on the first write.
/// The sink can then be encoded in one of the supported text [`Format`]s; metrics are output in the catalog
/// order, and metrics without observations are omitted.
pub struct ScrapeSink {
    families: FrozenMap<&'static str, Box<SampleFamily>>,
}

impl Default for ScrapeSink {
    fn default() -> Self {
        Self {
            families: FrozenMap::new(),
        }
    }
}

impl fmt::Debug for ScrapeSink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ScrapeSink")
            .field("metrics", &self.families.keys_cloned())
            .finish_non_exhaustive()
    }
}

impl ScrapeSink {
    fn family(&self, handle: &MetricHandle) -> &SampleFamily {
        if let Some(family) = self.families.get(handle.name()) {
            return family;
        }
        self.families
            .insert_with(handle.name(), || Box::new(SampleFamily::new(handle)))
    }

    /// Records a single observation. `label_values` are zipped with the label names declared
    /// by the metric.
    pub fn observe(&self, handle: &MetricHandle, value: f64, label_values: Vec<String>) {
        let labels = handle.labels().iter().copied().zip(label_values).collect();
        let family = self.family(handle);
        let mut samples = family.samples.lock().unwrap_or_else(|err| err.into_inner());
        samples.push(Sample { labels, value });
    }

    /// Returns all samples recorded for the metric with the specified name (excluding the common prefix).
    pub fn samples(&self, name: &str) -> Vec<Sample> {
        self.families
            .get(name)
            .map(SampleFamily::samples)
            .unwrap_or_default()
    }

    /// Returns the total number of recorded samples.
    pub fn sample_count(&self) -> usize {
        self.families
            .keys_cloned()
            .into_iter()
            .filter_map(|name| Some(self.families.get(name)?.samples().len()))
            .sum()
    }

    /// Encodes recorded observations in the specified format.
    ///
    /// # Errors
    ///
    /// Proxies formatting errors of the provided `writer`.
    pub fn encode<W: fmt::Write>(&self, writer: &mut W, format: Format) -> fmt::Result {
        self.encode_with(writer, format, |_| {})
    }

    /// Same as [`Self::encode()`], but allows adding other metrics to the exposition. These metrics
    /// will be output after the recorded ones.
    ///
    /// # Errors
    ///
    /// Proxies formatting errors of the provided `writer`.
    pub fn encode_with<W: fmt::Write>(
        &self,
        writer: &mut W,
        format: Format,
        extra: impl FnOnce(&mut RegistryInner),
    ) -> fmt::Result {
        let mut families: Vec<_> = self
            .families
            .keys_cloned()
            .into_iter()
            .filter_map(|name| self.families.get(name))
            .collect();
        families.sort_unstable_by_key(|family| family.position);

        let mut registry = RegistryInner::default();
        for family in families {
            family.register(&mut registry);
        }
        extra(&mut registry);
        encode_registry(writer, &registry, format)
    }
}
