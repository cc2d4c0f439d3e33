use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// Request-level instruments. Recording is a no-op unless a meter provider
/// has been installed (see `common::TelemetryGuard`).
pub struct Metrics {
    duration_histogram: Histogram<f64>,
    requests_counter: Counter<u64>,
    detections_counter: Counter<u64>,
}

impl Metrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];
        let duration_histogram = meter
            .f64_histogram("inference_request_duration_seconds")
            .with_description("Time to serve /predict (decode + infer + normalize)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build();
        let requests_counter = meter
            .u64_counter("inference_requests_total")
            .with_description("Total /predict requests by outcome")
            .build();
        let detections_counter = meter
            .u64_counter("inference_detections_total")
            .with_description("Total detections returned")
            .build();

        Self {
            duration_histogram,
            requests_counter,
            detections_counter,
        }
    }

    pub fn record_success(&self, elapsed_secs: f64, detections: usize) {
        let attrs = [KeyValue::new("outcome", "ok")];
        self.duration_histogram.record(elapsed_secs, &attrs);
        self.requests_counter.add(1, &attrs);
        self.detections_counter.add(detections as u64, &[]);
    }

    pub fn record_failure(&self, elapsed_secs: f64, kind: &'static str) {
        let attrs = [KeyValue::new("outcome", kind)];
        self.duration_histogram.record(elapsed_secs, &attrs);
        self.requests_counter.add(1, &attrs);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new("inference")
    }
}
