//! `MetricsExporter` and closely related types.

use hyper::{
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
    Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use tokio::{
    io,
    net::TcpListener,
    sync::{watch, Mutex},
};

use std::{
    convert::Infallible,
    fmt,
    future::{self, Future},
    net::SocketAddr,
    panic,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::metrics::EXPORTER_METRICS;
use neutron_metrics::{Engine, Format, ScrapeReport, ScrapeSink};


/// Default deadline for a single scrape.
const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct MetricsExporterInner {
    engine: Arc<Engine>,
    format: Format,
    scrape_timeout: Duration,
    /// Held for the entire duration of a scrape, including after a timeout.
    scrape_lock: Arc<Mutex<()>>,
}

impl MetricsExporterInner {
    /// Runs all collectors. Returns `None` if the scrape doesn't complete in time (including waiting
    /// for the previous scrape to finish).
    async fn scrape(&self) -> Option<(ScrapeSink, ScrapeReport)> {
        let started_at = Instant::now();
        let scrape = async {
            let guard = Arc::clone(&self.scrape_lock).lock_owned().await;
            let engine = Arc::clone(&self.engine);
            // Collectors perform blocking I/O, so they cannot run on the async runtime.
            tokio::task::spawn_blocking(move || {
                let output = engine.scrape();
                drop(guard);
                output
            })
            .await
        };

        let (sink, report) = match tokio::time::timeout(self.scrape_timeout, scrape).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => panic::resume_unwind(err.into_panic()),
            Err(_) => {
                EXPORTER_METRICS.observe_timeout();
                tracing::warn!(
                    timeout = ?self.scrape_timeout,
                    "Scraping networking metrics timed out"
                );
                return None;
            }
        };

        let latency = started_at.elapsed();
        EXPORTER_METRICS.observe_latency(latency);
        EXPORTER_METRICS.observe_report(&report);
        for (collector, err) in report.failures() {
            tracing::warn!(collector, %err, "Networking metrics collector failed");
        }
        tracing::debug!(
            latency_sec = latency.as_secs_f64(),
            observation_count = report.observation_count(),
            "Scraped networking metrics in {latency:?}"
        );
        Some((sink, report))
    }

    async fn render_body(&self) -> Option<Result<String, fmt::Error>> {
        let (sink, _) = self.scrape().await?;
        let mut buffer = String::with_capacity(4_096);
        let encoded = sink.encode_with(&mut buffer, self.format, |registry| {
            EXPORTER_METRICS.register(registry);
        });

        let scraped_size = buffer.len();
        EXPORTER_METRICS.observe_size(scraped_size);
        tracing::debug!(scraped_size, "Encoded networking metrics ({scraped_size}B)");
        Some(encoded.map(|()| buffer))
    }

    async fn render(&self) -> Response<String> {
        let (status, body) = match self.render_body().await {
            Some(Ok(body)) => (StatusCode::OK, body),
            Some(Err(err)) => {
                tracing::error!(%err, "Failed encoding networking metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Scraping networking metrics timed out\n".to_owned(),
            ),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        if status.is_success() {
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(self.format.content_type()),
            );
        }
        response
    }
}

/// Metrics exporter to Prometheus.
///
/// An exporter runs a full scrape of the wrapped [`Engine`] on each HTTP request and serves
/// the observations together with the exporter's own metrics (scrape latency, exposition size,
/// collector failures and scrape timeouts).
///
/// # Examples
///
/// See crate-level docs for the examples of usage.
pub struct MetricsExporter<'a> {
    inner: MetricsExporterInner,
    shutdown_future: Pin<Box<dyn Future<Output = ()> + Send + 'a>>,
}

impl fmt::Debug for MetricsExporter<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsExporter")
            .field("engine", &self.inner.engine)
            .field("format", &self.inner.format)
            .field("scrape_timeout", &self.inner.scrape_timeout)
            .finish_non_exhaustive()
    }
}

impl<'a> MetricsExporter<'a> {
    /// Creates an exporter based on the provided metrics [`Engine`].
    pub fn new(engine: Arc<Engine>) -> Self {
        let registry = engine.registry();
        tracing::info!(
            "Created networking metrics exporter with {} metrics and {} collectors",
            registry.handles().len(),
            registry.collectors().len()
        );

        Self {
            inner: MetricsExporterInner {
                engine,
                format: Format::OpenMetricsForPrometheus,
                scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
                scrape_lock: Arc::default(),
            },
            shutdown_future: Box::pin(future::pending()),
        }
    }

    /// Sets the export [`Format`]. By default, [`Format::OpenMetricsForPrometheus`] is used
    /// (i.e., OpenMetrics text format with minor changes so that it is fully parsed by Prometheus).
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.inner.format = format;
        self
    }

    /// Sets the deadline for a single scrape; 30 seconds by default. If collectors don't finish
    /// in time, the request is answered with 503 Service Unavailable.
    ///
    /// Only one scrape runs at a time. A timed-out scrape continues in the background, and
    /// subsequent scrapes wait for it to finish (within their own deadline).
    #[must_use]
    pub fn with_scrape_timeout(mut self, timeout: Duration) -> Self {
        self.inner.scrape_timeout = timeout;
        self
    }

    /// Configures graceful shutdown for the exporter server.
    #[must_use]
    pub fn with_graceful_shutdown<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'a,
    {
        self.shutdown_future = Box::pin(shutdown);
        self
    }

    /// Starts the server on the specified address. This future resolves when the server is shut down.
    ///
    /// The server will expose the following endpoints:
    ///
    /// - `GET` on any path: serves the metrics in the text format configured using [`Self::with_format()`]
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn start(self, bind_address: SocketAddr) -> io::Result<()> {
        tracing::info!("Starting networking metrics exporter on {bind_address}");
        self.bind(bind_address).await?.start().await?;
        tracing::info!("Networking metrics exporter shut down");
        Ok(())
    }

    /// Creates an HTTP exporter server and binds it to the specified address.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn bind(mut self, bind_address: SocketAddr) -> io::Result<MetricsServer<'a>> {
        let listener = TcpListener::bind(bind_address).await?;
        let local_addr = listener.local_addr()?;
        let server = async move {
            let (started_shutdown_sender, started_shutdown) = watch::channel(());
            loop {
                let stream = tokio::select! {
                    res = listener.accept() => res?.0,
                    () = &mut self.shutdown_future => break,
                };

                let io = TokioIo::new(stream);
                let inner = self.inner.clone();
                let mut started_shutdown = started_shutdown.clone();
                tokio::spawn(async move {
                    let conn = http1::Builder::new().serve_connection(
                        io,
                        service_fn(|_| async { Ok::<_, Infallible>(inner.render().await) }),
                    );
                    tokio::pin!(conn);

                    let res = tokio::select! {
                        _ = started_shutdown.changed() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                        res = conn.as_mut() => res,
                    };
                    if let Err(err) = res {
                        tracing::warn!(%err, "Error serving connection");
                    }
                });
            }

            tracing::info!("Stop signal received, networking metrics exporter is shutting down");
            drop(started_shutdown);
            started_shutdown_sender.send_replace(());
            // Wait until all connections are dropped.
            started_shutdown_sender.closed().await;

            Ok(())
        };

        Ok(MetricsServer {
            server: Box::pin(server),
            local_addr,
        })
    }
}

/// Metrics server bound to a certain local address returned by [`MetricsExporter::bind()`].
///
/// Useful e.g. if you need to find out which port the server was bound to if the 0th port was specified.
#[must_use = "Server should be `start()`ed"]
pub struct MetricsServer<'a> {
    server: Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>,
    local_addr: SocketAddr,
}

impl fmt::Debug for MetricsServer<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsServer")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl MetricsServer<'_> {
    /// Returns the local address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts this server. Resolves once the server is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if starting the server operation fails.
    pub async fn start(self) -> io::Result<()> {
        self.server.await
    }
}
