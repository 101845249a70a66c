use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total availability requests. Labels: endpoint, status.
pub const REQUESTS_TOTAL: &str = "freebusy_requests_total";

/// Histogram: request latency in seconds. Labels: endpoint.
pub const REQUEST_DURATION_SECONDS: &str = "freebusy_request_duration_seconds";

// ── USE metrics (work done per request) ─────────────────────────

/// Histogram: availability-table build duration in seconds.
pub const TABLE_BUILD_DURATION_SECONDS: &str = "freebusy_table_build_duration_seconds";

/// Histogram: minutes materialized per table build (agents × window length).
pub const TABLE_MINUTES_MATERIALIZED: &str = "freebusy_table_minutes_materialized";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
