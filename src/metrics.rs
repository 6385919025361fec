use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

static GLOBAL: OnceCell<Metrics> = OnceCell::new();

impl Metrics {
    /// Install the Prometheus recorder once per process and describe our series.
    pub fn global() -> Result<&'static Metrics> {
        GLOBAL.get_or_try_init(|| {
            // Use default buckets to avoid API differences across crate versions.
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("prometheus: install recorder")?;
            describe_all();
            Ok(Self { handle })
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_all() {
    describe_counter!("ocr_requests_total", "Text detection requests.");
    describe_counter!(
        "ocr_unavailable_total",
        "Detections answered empty because engines could not be acquired."
    );
    describe_counter!(
        "ocr_recognition_errors_total",
        "Detections answered empty because an engine call failed."
    );
    describe_counter!(
        "ocr_engine_acquire_failures_total",
        "Failed engine acquisition sequences."
    );
    describe_histogram!("ocr_detect_ms", "End-to-end detection time in milliseconds.");
    describe_counter!(
        "credibility_rows_skipped_total",
        "Dataset rows skipped during aggregation, by reason."
    );
    describe_counter!("classifier_requests_total", "Requests forwarded to the classifier.");
    describe_counter!("classifier_errors_total", "Classifier calls that failed.");
    describe_gauge!("credibility_domains", "Visible domains in the current report.");

    // Present from the first scrape even before any upload.
    gauge!("credibility_domains").set(0.0);
}
