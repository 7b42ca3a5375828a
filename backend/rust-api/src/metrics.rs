use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Progress store metrics
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_store_operations_total",
        "Total number of progress store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "progress_store_operation_duration_seconds",
        "Progress store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Business metrics
    pub static ref ENGINES_OPEN: IntGauge = register_int_gauge!(
        "participant_engines_open",
        "Number of participant progression engines currently open"
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Total number of answers submitted for judgment",
        &["round"]
    )
    .unwrap();

    pub static ref VERDICTS_APPLIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "verdicts_applied_total",
        "Total number of judge verdicts applied by the progression engine",
        &["verdict"]
    )
    .unwrap();

    pub static ref STALE_VERDICTS_DISCARDED_TOTAL: IntCounter = register_int_counter!(
        "stale_verdicts_discarded_total",
        "Verdict observations discarded because a newer local transition superseded them"
    )
    .unwrap();

    pub static ref TIMERS_EXPIRED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "timers_expired_total",
        "Total number of question timers that ran out",
        &["round"]
    )
    .unwrap();

    pub static ref QUESTIONS_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_skipped_total",
        "Total number of skip actions",
        &["round"]
    )
    .unwrap();

    pub static ref VERDICT_POLLS_ACTIVE: IntGauge = register_int_gauge!(
        "verdict_polls_active",
        "Number of verdict poll loops currently running"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a progress store operation with metrics
pub async fn track_store_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = SUBMISSIONS_TOTAL.with_label_values(&["easy"]).get();
    }

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn track_store_operation_counts_errors() {
        let before = STORE_OPERATIONS_TOTAL
            .with_label_values(&["upsert", "error"])
            .get();
        let res: Result<(), anyhow::Error> =
            track_store_operation("upsert", async { Err(anyhow::anyhow!("boom")) }).await;
        assert!(res.is_err());
        let after = STORE_OPERATIONS_TOTAL
            .with_label_values(&["upsert", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
