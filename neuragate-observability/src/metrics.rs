//! Prometheus metrics for the data plane: request counts, latency
//! histograms, and live circuit-breaker state gauges.

use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

pub struct MetricsCollector {
    registry: Registry,
    requests_total: IntCounterVec,
    request_latency_ms: HistogramVec,
    upstream_latency_ms: HistogramVec,
    breaker_state: IntGaugeVec,
    rate_limited_total: IntCounterVec,
    retries_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Total requests handled per route and status"),
            &["route_id", "status"],
        )
        .expect("metric names are static and valid");

        let request_latency_ms = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "gateway_request_latency_ms",
                "End-to-end request latency in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]),
            &["route_id"],
        )
        .expect("metric names are static and valid");

        let upstream_latency_ms = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "gateway_upstream_latency_ms",
                "Upstream call latency in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]),
            &["route_id"],
        )
        .expect("metric names are static and valid");

        let breaker_state = IntGaugeVec::new(
            Opts::new("gateway_circuit_breaker_state", "0=Closed 1=Open 2=HalfOpen"),
            &["route_id"],
        )
        .expect("metric names are static and valid");

        let rate_limited_total = IntCounterVec::new(
            Opts::new("gateway_rate_limited_total", "Requests rejected by the rate limiter"),
            &["route_id"],
        )
        .expect("metric names are static and valid");

        let retries_total = IntCounterVec::new(
            Opts::new("gateway_retries_total", "Retry attempts issued per route"),
            &["route_id"],
        )
        .expect("metric names are static and valid");

        for c in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(request_latency_ms.clone()),
            Box::new(upstream_latency_ms.clone()),
            Box::new(breaker_state.clone()),
            Box::new(rate_limited_total.clone()),
            Box::new(retries_total.clone()),
        ] {
            registry.register(c).expect("collector names are unique");
        }

        Self {
            registry,
            requests_total,
            request_latency_ms,
            upstream_latency_ms,
            breaker_state,
            rate_limited_total,
            retries_total,
        }
    }

    pub fn observe_request(&self, route_id: &str, status: u16, latency_ms: f64) {
        self.requests_total
            .with_label_values(&[route_id, &status.to_string()])
            .inc();
        self.request_latency_ms.with_label_values(&[route_id]).observe(latency_ms);
    }

    pub fn observe_upstream_latency(&self, route_id: &str, latency_ms: f64) {
        self.upstream_latency_ms.with_label_values(&[route_id]).observe(latency_ms);
    }

    pub fn set_breaker_state(&self, route_id: &str, state_code: i64) {
        self.breaker_state.with_label_values(&[route_id]).set(state_code);
    }

    pub fn inc_rate_limited(&self, route_id: &str) {
        self.rate_limited_total.with_label_values(&[route_id]).inc();
    }

    pub fn inc_retry(&self, route_id: &str) {
        self.retries_total.with_label_values(&[route_id]).inc();
    }

    /// Renders the current state in the Prometheus text exposition
    /// format, for mounting at `/admin/metrics`.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
