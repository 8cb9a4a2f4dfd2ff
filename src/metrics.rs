//! Observability counters for ingestion runs
//!
//! Uses the `metrics` crate for low-overhead collection with an opt-in
//! Prometheus scrape endpoint. Counter emission never blocks the pipeline;
//! without an installed exporter the macros degrade to no-ops.

use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use tracing::info;

/// Fetch errors by taxonomy class (`class` label: timeout, connection,
/// status, content_type, unknown).
pub const FETCH_ERRORS: &str = "ingestor_fetch_errors_total";

/// Pages whose pipeline failed and was absorbed.
pub const PAGES_FAILED: &str = "ingestor_pages_failed_total";

/// Records committed to the store.
pub const RECORDS_INGESTED: &str = "ingestor_records_ingested_total";

/// Report files refused by the upload-path allow-list.
pub const REPORTS_DISALLOWED: &str = "ingestor_reports_disallowed_total";

/// Report files skipped as unparseable.
pub const REPORTS_SKIPPED: &str = "ingestor_reports_skipped_total";

/// Rows dropped by normalization.
pub const ROWS_REJECTED: &str = "ingestor_rows_rejected_total";

/// Register metric descriptions.
///
/// Idempotent; call once at startup for better Prometheus output.
pub fn describe() {
    describe_counter!(FETCH_ERRORS, Unit::Count, "HTTP fetch errors by class");
    describe_counter!(PAGES_FAILED, Unit::Count, "Page pipelines that failed");
    describe_counter!(RECORDS_INGESTED, Unit::Count, "Trade records persisted");
    describe_counter!(
        REPORTS_DISALLOWED,
        Unit::Count,
        "Report files refused by the allow-list"
    );
    describe_counter!(REPORTS_SKIPPED, Unit::Count, "Unparseable report files skipped");
    describe_counter!(ROWS_REJECTED, Unit::Count, "Rows dropped by validation");
}

/// Install the Prometheus exporter on the given scrape address.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}
