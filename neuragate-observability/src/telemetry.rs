//! Telemetry Capture (C10): the shapes recorded for every request and
//! every route-store change, independent of how they're delivered.

use neuragate_resilience::filter::{FilterContext, FilterOutcome};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub route_id: String,
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub status: u16,
    pub timestamp: String,
    pub latency_ms: f64,
    pub rate_limited: bool,
    pub circuit_breaker_triggered: bool,
    pub retry_count: usize,
    pub error: Option<String>,
}

impl TelemetryEvent {
    pub fn is_error(&self) -> bool {
        self.status >= 500 || self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteChangeEvent {
    pub route_id: String,
    pub operation: RouteChangeOp,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteChangeOp {
    Put,
    Delete,
}

/// Records `timestamp` on entry and `latency-ms` on exit; a status is
/// synthesized even on an uncaught error (500) so every request
/// produces exactly one event.
pub struct TelemetryCapture {
    entered_at_wall: chrono::DateTime<chrono::Utc>,
    entered_at_monotonic: Instant,
}

impl TelemetryCapture {
    pub fn enter() -> Self {
        Self {
            entered_at_wall: chrono::Utc::now(),
            entered_at_monotonic: Instant::now(),
        }
    }

    pub fn finish(self, ctx: &FilterContext, outcome: &FilterOutcome) -> TelemetryEvent {
        let latency_ms = self.entered_at_monotonic.elapsed().as_secs_f64() * 1000.0;
        let (status, error) = match outcome {
            Ok(resp) => (resp.status.as_u16(), None),
            Err(e) => (u16::try_from(e.status_code()).unwrap_or(500), Some(e.to_string())),
        };

        TelemetryEvent {
            route_id: ctx.route.id.to_string(),
            correlation_id: ctx.correlation_id.clone(),
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            client_ip: ctx.client_ip.clone(),
            user_agent: ctx.user_agent.clone(),
            status,
            timestamp: self.entered_at_wall.to_rfc3339(),
            latency_ms,
            rate_limited: ctx.rate_limited,
            circuit_breaker_triggered: ctx.circuit_breaker_triggered,
            retry_count: ctx.retry_count,
            error,
        }
    }
}
