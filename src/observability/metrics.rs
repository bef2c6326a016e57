//! Metrics collection and exposition.
//!
//! # Metrics
//! - `entra_phishing_detection_image_hits_total` (counter): image requests by
//!   host, language and decision reason (`status` label)
//! - `entra_phishing_detection_errors_total` (counter): handler errors by host
//! - `entra_phishing_detection_http_requests_total` (counter): requests by
//!   code, method, host, path
//! - `entra_phishing_detection_http_request_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - The Prometheus recorder is owned by `MetricsSet` and never installed as
//!   the global recorder; every update goes through `with_local_recorder`
//! - Rendering happens on the separate metrics listener only

use metrics::{counter, describe_counter, describe_histogram, histogram, with_local_recorder, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Duration;

pub const IMAGE_HITS: &str = "entra_phishing_detection_image_hits_total";
pub const ERRORS: &str = "entra_phishing_detection_errors_total";
pub const HTTP_REQUESTS: &str = "entra_phishing_detection_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "entra_phishing_detection_http_request_duration_seconds";

/// Prometheus client default buckets.
const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// All application metrics, backed by a private Prometheus recorder.
pub struct MetricsSet {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl MetricsSet {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(HTTP_REQUEST_DURATION.to_string()), DURATION_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        with_local_recorder(&recorder, || {
            describe_counter!(
                IMAGE_HITS,
                "How many requests were made to the image handler, by request host, language and decision."
            );
            describe_counter!(ERRORS, "How many requests ended in a handler error, by request host.");
            describe_counter!(
                HTTP_REQUESTS,
                "How many HTTP requests processed, partitioned by status code and HTTP method."
            );
            describe_histogram!(
                HTTP_REQUEST_DURATION,
                Unit::Seconds,
                "The HTTP request latencies in seconds."
            );
        });

        Ok(Self { recorder, handle })
    }

    /// Count one image decision.
    pub fn record_image_hit(&self, host: &str, language: &str, reason: &str) {
        with_local_recorder(&self.recorder, || {
            counter!(
                IMAGE_HITS,
                "host" => host.to_owned(),
                "language" => language.to_owned(),
                "status" => reason.to_owned()
            )
            .increment(1);
        });
    }

    /// Count one handler error.
    pub fn record_error(&self, host: &str) {
        with_local_recorder(&self.recorder, || {
            counter!(ERRORS, "host" => host.to_owned()).increment(1);
        });
    }

    /// Record a completed HTTP request.
    pub fn record_request(&self, code: u16, method: &str, host: &str, path: &str, duration: Duration) {
        let labels = [
            ("code", code.to_string()),
            ("method", method.to_owned()),
            ("host", host.to_owned()),
            ("path", path.to_owned()),
        ];
        with_local_recorder(&self.recorder, || {
            counter!(HTTP_REQUESTS, &labels).increment(1);
            histogram!(HTTP_REQUEST_DURATION, &labels).record(duration.as_secs_f64());
        });
    }

    /// Prometheus text exposition of every metric recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSet").finish_non_exhaustive()
    }
}

/// Value of the first rendered sample of `name` whose line contains every label.
#[cfg(test)]
pub(crate) fn sample(rendered: &str, name: &str, labels: &[&str]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| line.starts_with(name))
        .find(|line| labels.iter().all(|label| line.contains(label)))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
