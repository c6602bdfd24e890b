//! Internal metrics for the exporter itself.

use once_cell::sync::Lazy;
use prometheus_client::{
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};

use std::time::Duration;

use neutron_metrics::ScrapeReport;

const LATENCY_BUCKETS: [f64; 9] = [0.001, 0.005, 0.025, 0.1, 0.25, 1.0, 5.0, 30.0, 120.0];
const BYTE_BUCKETS: [f64; 6] = [
    1_024.0,
    4_096.0,
    16_384.0,
    65_536.0,
    262_144.0,
    1_048_576.0,
];

type CollectorLabels = Vec<(String, String)>;

#[derive(Debug)]
pub(crate) struct ExporterMetrics {
    /// Latency of running all collectors.
    scrape_latency: Histogram,
    /// Size of the encoded exposition.
    scraped_size: Histogram,
    collector_failures: Family<CollectorLabels, Counter>,
    scrape_timeouts: Counter,
}

impl ExporterMetrics {
    fn new() -> Self {
        Self {
            scrape_latency: Histogram::new(LATENCY_BUCKETS.into_iter()),
            scraped_size: Histogram::new(BYTE_BUCKETS.into_iter()),
            collector_failures: Family::default(),
            scrape_timeouts: Counter::default(),
        }
    }

    pub fn observe_latency(&self, latency: Duration) {
        self.scrape_latency.observe(latency.as_secs_f64());
    }

    #[allow(clippy::cast_precision_loss)] // expositions are far smaller than 2^52 bytes
    pub fn observe_size(&self, size: usize) {
        self.scraped_size.observe(size as f64);
    }

    pub fn observe_report(&self, report: &ScrapeReport) {
        for (collector, _) in report.failures() {
            let labels = vec![("collector".to_owned(), collector.to_owned())];
            self.collector_failures.get_or_create(&labels).inc();
        }
    }

    pub fn observe_timeout(&self) {
        self.scrape_timeouts.inc();
    }

    /// Adds exporter metrics to an exposition registry. Metrics are shared with the registered clones.
    pub fn register(&self, registry: &mut Registry) {
        let registry = registry.sub_registry_with_prefix("neutron_exporter");
        registry.register_with_unit(
            "scrape_latency",
            "Latency of running all networking collectors",
            Unit::Seconds,
            self.scrape_latency.clone(),
        );
        registry.register_with_unit(
            "scraped_size",
            "Size of the encoded metrics",
            Unit::Bytes,
            self.scraped_size.clone(),
        );
        registry.register(
            "collector_failures",
            "Number of failed collector runs",
            self.collector_failures.clone(),
        );
        registry.register(
            "scrape_timeouts",
            "Number of scrapes that did not complete before the deadline",
            self.scrape_timeouts.clone(),
        );
    }
}

pub(crate) static EXPORTER_METRICS: Lazy<ExporterMetrics> = Lazy::new(ExporterMetrics::new);
