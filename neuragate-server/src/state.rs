use neuragate_observability::{HealthProbe, MetricsCollector, TelemetryPublisher};
use neuragate_proxy::GatewayRouter;
use neuragate_resilience::circuit_breaker::BreakerRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Everything the gateway request surface needs per request, wired up
/// once by C13 at startup and shared behind `Arc`s.
pub struct GatewayState {
    pub router: Arc<GatewayRouter>,
    pub publisher: Arc<TelemetryPublisher>,
    pub metrics: Arc<MetricsCollector>,
    pub health_probe: Arc<HealthProbe>,
    pub breaker_registry: Arc<BreakerRegistry>,
    /// Upper bound on how long a request may occupy the filter chain
    /// (connect + read timeout, with headroom for retries/backoff).
    pub request_budget: Duration,
}
