//! Metrics engine for the networking service (Neutron) of an OpenStack cloud, based on
//! the `prometheus-client` crate.
//!
//! # Overview
//!
//! - Metrics are declared in a static catalog of [`MetricDescriptor`]s ([`NEUTRON_METRICS`]).
//!   Each descriptor specifies the metric name, help, ordered label names and [`ValueKind`].
//!   Some descriptors own a [`Collector`], a function that fetches resources and emits
//!   observations for one or more metrics.
//! - On startup, the catalog is validated and filtered (by [`VersionGate`] and a slow metric
//!   predicate) into a [`Registry`]. Registry errors are fatal.
//! - On each scrape, every distinct active collector is run once (by default, in parallel).
//!   Collectors fetch paginated resource collections using a [`NetworkingApi`](api::NetworkingApi) client,
//!   join base records with extension attributes, and derive per-resource and aggregate values.
//! - Observations of a collector are committed to a [`ScrapeSink`] only if the collector succeeds.
//!   A failing collector doesn't affect other collectors; failures are reported in a [`ScrapeReport`].
//! - The sink can be encoded in one of the supported text [`Format`]s.
//!
//! # Examples
//!
//! ```
//! use neutron_metrics::{
//!     api::{FixtureApi, ResourceKind},
//!     Engine, EngineConfig, Format,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let api = FixtureApi::new(2).with_records(
//!     &ResourceKind::FloatingIps,
//!     vec![
//!         json!({ "id": "fip-1", "fixed_ip_address": "10.0.0.5", "status": "DOWN" }),
//!         json!({ "id": "fip-2", "status": "ACTIVE" }),
//!         json!({ "id": "fip-3", "fixed_ip_address": "10.0.0.9", "status": "ACTIVE" }),
//!     ],
//! );
//! let engine = Engine::new(Arc::new(api), EngineConfig::new("RegionOne"))?;
//! for handle in engine.describe() {
//!     println!("{}: {:?}", handle.full_name(), handle.labels());
//! }
//!
//! let (sink, report) = engine.scrape();
//! report.into_result()?;
//! let mut buffer = String::new();
//! sink.encode(&mut buffer, Format::OpenMetricsForPrometheus)?;
//! assert!(buffer.contains(
//!     "openstack_neutron_floating_ips_associated_not_active{region_name=\"RegionOne\"} 1.0"
//! ));
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod api;
mod catalog;
mod collectors;
pub mod descriptors;
mod emit;
mod engine;
pub mod fetch;
mod format;
pub mod join;
mod registry;
pub mod resources;
mod sink;
pub mod validation;

pub use crate::{
    catalog::{DEFAULT_PREFIX, NEUTRON_METRICS},
    collectors::{CollectContext, CollectError},
    descriptors::{
        Collector, CollectorFn, MetricDescriptor, ValueKind, Version, VersionGate,
        VersionParseError,
    },
    emit::{DerivedValue, Emitter},
    engine::{default_id_generator, Engine, EngineConfig, IdGenerationError, IdGenerator},
    format::Format,
    registry::{
        CollectorOutcome, LookupError, MetricHandle, Parallelism, Registry, RegistryError,
        ScrapeError, ScrapeReport,
    },
    sink::{Sample, ScrapeSink},
};
