//! Prometheus metrics helpers
//!
//! Standardized naming with a shared prefix; helpers keep label sets
//! consistent across call sites.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ChatDock metrics
pub const METRICS_PREFIX: &str = "chatdock";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total similarity queries run by the answering flow"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_counter!(
        format!("{}_chunks_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total document chunks upserted into the vector index"
    );

    describe_counter!(
        format!("{}_whatsapp_messages_sent_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound WhatsApp dispatch attempts by outcome"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one retrieval pass of the answering flow
pub fn record_retrieval(duration_secs: f64, strategy: &str, match_count: usize) {
    counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        "strategy" => strategy.to_string(),
        "matched" => (match_count > 0).to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .record(duration_secs);
}

/// Record one embedding API call
pub fn record_embedding(model: &str, batch_size: usize, success: bool) {
    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(batch_size.max(1) as u64);
}

/// Record chunks upserted during ingestion
pub fn record_ingestion(namespace: &str, chunks: usize) {
    counter!(
        format!("{}_chunks_ingested_total", METRICS_PREFIX),
        "namespace" => namespace.to_string()
    )
    .increment(chunks as u64);
}

/// Record an outbound WhatsApp dispatch attempt
pub fn record_whatsapp_send(success: bool) {
    counter!(
        format!("{}_whatsapp_messages_sent_total", METRICS_PREFIX),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/webhook");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_record_helpers_run() {
        record_retrieval(0.01, "retrieval", 3);
        record_embedding("mock-embedding", 10, true);
        record_ingestion("tenant_x", 42);
        record_whatsapp_send(false);
    }
}
