use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests. Labels: route, method, status.
pub const HTTP_REQUESTS_TOTAL: &str = "ovenbook_http_requests_total";

/// Histogram: request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "ovenbook_http_request_duration_seconds";

/// Counter: admin requests rejected for a missing/bad token.
pub const AUTH_FAILURES_TOTAL: &str = "ovenbook_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of loaded storefront engines.
pub const STORES_ACTIVE: &str = "ovenbook_stores_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "ovenbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "ovenbook_wal_flush_batch_size";

/// Counters: per-date outcomes of admin bulk actions.
pub const BULK_DATES_OK_TOTAL: &str = "ovenbook_bulk_dates_ok_total";
pub const BULK_DATES_FAILED_TOTAL: &str = "ovenbook_bulk_dates_failed_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
