//! Prometheus metrics export. Off by default; enabled by setting
//! `server.metrics_port`.

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::task::JoinHandle;

/// Installs the global metrics recorder and serves `/metrics` on `port`.
/// Call at most once per process, before any `metrics::` macro fires.
pub fn run(port: u16) -> JoinHandle<()> {
    let addr = ([0, 0, 0, 0], port);
    let (recorder, exporter) = PrometheusBuilder::new()
        .listen_address(addr)
        .build_with_exporter()
        .expect("failed to install Prometheus recorder");
    metrics::set_boxed_recorder(Box::new(recorder)).expect("failed to set metrics recorder");

    tokio::spawn(async move {
        tokio::pin!(exporter);
        loop {
            tokio::select! {
                _ = &mut exporter => {}
            }
        }
    })
}
