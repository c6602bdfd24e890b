//! Emission of derived values by collectors.

use crate::{
    registry::{MetricHandle, Registry},
    sink::ScrapeSink,
};

/// Value derived by a collector, together with its ordered label values.
#[derive(Debug, Clone)]
pub struct DerivedValue<'r> {
    /// Metric the value belongs to.
    pub handle: &'r MetricHandle,
    /// Observed value.
    pub value: f64,
    /// Label values in the order of label names declared by the metric.
    pub label_values: Vec<String>,
}

/// Stages observations of a single collector.
///
/// Observations are written to the sink only once the collector has succeeded (see [`Self::commit()`]),
/// so a failing collector publishes nothing for the scrape.
#[derive(Debug)]
pub struct Emitter<'r> {
    registry: &'r Registry,
    staged: Vec<DerivedValue<'r>>,
}

impl<'r> Emitter<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            staged: vec![],
        }
    }

    /// Checks whether the metric with the specified name (excluding the common prefix) is registered,
    /// i.e., declared in the catalog and not filtered out. Collectors emitting version-gated
    /// or slow metrics must guard their emission with this check.
    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.lookup(name).is_ok()
    }

    /// Stages an observation of the metric with the specified name (excluding the common prefix).
    ///
    /// # Panics
    ///
    /// - Panics if the metric is not registered (i.e., not declared in the catalog, or filtered out
    ///   by the version gate or the slow metric filter). This is a mismatch between the catalog
    ///   and the collector; see [`Self::is_registered()`].
    /// - In debug builds, panics if the number of label values doesn't match the number of label names
    ///   declared by the metric.
    pub fn emit(&mut self, name: &str, value: f64, label_values: &[&str]) {
        let handle = match self.registry.lookup(name) {
            Ok(handle) => handle,
            Err(err) if self.registry.is_declared(name) => {
                panic!("{err}: the metric is filtered out, but its collector is active")
            }
            Err(err) => panic!("{err}: the metric is not declared in the catalog"),
        };

        debug_assert_eq!(
            label_values.len(),
            handle.labels().len(),
            "Label values {label_values:?} do not match labels {:?} of metric `{name}`",
            handle.labels()
        );
        self.staged.push(DerivedValue {
            handle,
            value,
            label_values: label_values.iter().map(|&value| value.to_owned()).collect(),
        });
    }

    /// Returns staged observations.
    pub fn staged(&self) -> &[DerivedValue<'r>] {
        &self.staged
    }

    /// Writes all staged observations to the sink, returning the number of written observations.
    pub(crate) fn commit(self, sink: &ScrapeSink) -> usize {
        let count = self.staged.len();
        for derived in self.staged {
            sink.observe(derived.handle, derived.value, derived.label_values);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{MetricDescriptor, Version, VersionGate};

    static CATALOG: &[MetricDescriptor] = &[
        MetricDescriptor::gauge("count", "Number of things", &["region_name"]),
        MetricDescriptor::gauge("modern", "Modern metric", &["region_name"])
            .since(Version::new(3, 0, 0)),
    ];

    fn registry() -> Registry {
        let gate = VersionGate::at(Version::new(2, 0, 0));
        Registry::register(CATALOG, "test", &gate, &|_: &MetricDescriptor| false).unwrap()
    }

    #[test]
    fn staging_and_committing_observations() {
        let registry = registry();
        let mut emitter = Emitter::new(&registry);
        assert!(emitter.is_registered("count"));
        assert!(!emitter.is_registered("modern"));
        assert!(!emitter.is_registered("bogus"));
        emitter.emit("count", 5.0, &["RegionOne"]);
        assert_eq!(emitter.staged().len(), 1);
        assert_eq!(emitter.staged()[0].handle.full_name(), "test_count");
        assert_eq!(emitter.staged()[0].label_values, ["RegionOne"]);

        let sink = ScrapeSink::default();
        assert!(sink.samples("count").is_empty());
        assert_eq!(emitter.commit(&sink), 1);
        let samples = sink.samples("count");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 5.0);
        assert!(sink.samples("modern").is_empty());
    }

    #[test]
    #[should_panic(expected = "not declared in the catalog")]
    fn emitting_undeclared_metric() {
        let registry = registry();
        Emitter::new(&registry).emit("bogus", 1.0, &["RegionOne"]);
    }

    #[test]
    #[should_panic(expected = "filtered out")]
    fn emitting_filtered_out_metric() {
        let registry = registry();
        Emitter::new(&registry).emit("modern", 1.0, &["RegionOne"]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "do not match labels")]
    fn emitting_with_wrong_arity() {
        let registry = registry();
        Emitter::new(&registry).emit("count", 1.0, &["RegionOne", "extra"]);
    }
}
