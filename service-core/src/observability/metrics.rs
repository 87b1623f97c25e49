use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process.
///
/// Later calls (several test apps in one binary) reuse the first handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus recorder already installed elsewhere");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Prometheus text exposition of every recorded metric.
pub fn render_metrics() -> String {
    init_metrics().render()
}
