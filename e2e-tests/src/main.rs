//! Mock app serving networking metrics of a fixture cloud with the Prometheus exporter.

use std::{env, io, net::SocketAddr, sync::Arc};

use neutron_exporter::MetricsExporter;
use neutron_metrics::{api::FixtureApi, Engine, EngineConfig, Format};

const FIXTURE: &str = include_str!("../fixtures/neutron.json");

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout is reserved for the bound address
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let mut args: Vec<_> = env::args().skip(1).collect();
    let export_format = if !args.is_empty() && args[0] == "--format-prometheus" {
        args.remove(0);
        Some(Format::Prometheus)
    } else {
        None
    };

    let bind_address = args
        .first()
        .expect("Bind address must be provided as first command-line arg");
    let bind_address: SocketAddr = bind_address.parse().expect("Bind address is invalid");

    let api = FixtureApi::from_json(FIXTURE).expect("Invalid networking API fixture");
    let engine = Engine::new(Arc::new(api), EngineConfig::new("RegionOne"))
        .expect("Invalid metrics catalog");
    let mut exporter = MetricsExporter::new(Arc::new(engine));
    if let Some(format) = export_format {
        exporter = exporter.with_format(format);
    }

    let exporter_server = exporter
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .bind(bind_address)
        .await
        .unwrap_or_else(|err| panic!("Failed binding to `{bind_address}`: {err}"));
    println!("local_addr={}", exporter_server.local_addr());
    // ^ Print the local server address so that it can be used in integration tests
    exporter_server
        .start()
        .await
        .expect("Metrics exporter server failed");
}
