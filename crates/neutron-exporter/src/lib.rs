//! Prometheus exporter for networking metrics, based on the `hyper` web server.
//!
//! Each HTTP request triggers a full scrape of the wrapped [`Engine`](neutron_metrics::Engine).
//! Collector failures are logged and counted, but don't fail the request; observations of
//! successful collectors are still served. A scrape that exceeds the configured deadline
//! is answered with 503 Service Unavailable.
//!
//! # Examples
//!
//! ```no_run
//! use neutron_exporter::MetricsExporter;
//! use neutron_metrics::{api::FixtureApi, Engine, EngineConfig};
//! use tokio::{signal::ctrl_c, sync::oneshot};
//!
//! use std::{net::Ipv4Addr, sync::Arc, time::Duration};
//!
//! # async fn test() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(Arc::new(FixtureApi::default()), EngineConfig::new("RegionOne"))?;
//! let exporter = MetricsExporter::new(Arc::new(engine))
//!     .with_scrape_timeout(Duration::from_secs(10))
//!     .with_graceful_shutdown(async {
//!         ctrl_c().await.ok();
//!     });
//! exporter.start((Ipv4Addr::UNSPECIFIED, 9180).into()).await?;
//! # Ok(())
//! # }
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

mod exporter;
mod metrics;

pub use crate::exporter::{MetricsExporter, MetricsServer};
