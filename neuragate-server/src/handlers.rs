//! The gateway request surface (§6): the catch-all that resolves a
//! request through C3 and runs its filter chain, plus the reserved
//! `/fallback/*` and `/actuator/health` endpoints that never touch C3.

use crate::correlation::CorrelationId;
use crate::response::{error_to_response, filter_response_to_response, not_found, outcome_to_response};
use crate::state::GatewayState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use neuragate_core::error::GatewayError;
use neuragate_observability::TelemetryCapture;
use neuragate_resilience::fallback::FallbackRouter;
use neuragate_resilience::filter::FilterContext;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Caps request bodies buffered for the upstream call; large uploads
/// are out of scope for this gateway's data plane.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const RESERVED_PREFIXES: &[&str] = &["/admin", "/auth", "/dashboard"];

fn is_reserved(path: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn client_ip_of(headers: &axum::http::HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| remote.ip().to_string())
}

pub async fn gateway_handler(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let correlation_id = req
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if is_reserved(&path) {
        return not_found();
    }

    let Some(resolved) = state.router.resolve(method.as_str(), &path) else {
        tracing::debug!(%path, %method, %correlation_id, "no route matched, 404");
        return not_found();
    };

    let headers = req.headers().clone();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let client_ip = client_ip_of(&headers, remote);

    let body = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => return error_to_response(&GatewayError::Config(format!("body read failed: {e}"))),
    };

    let mut ctx = FilterContext {
        route: resolved.route.clone(),
        method,
        path,
        headers,
        body,
        client_ip,
        user_agent,
        correlation_id,
        deadline: Instant::now() + state.request_budget,
        retry_count: 0,
        rate_limited: false,
        circuit_breaker_triggered: false,
    };

    let capture = TelemetryCapture::enter();
    let outcome = resolved.chain.execute(&mut ctx).await;
    let event = capture.finish(&ctx, &outcome);

    state
        .metrics
        .observe_request(&event.route_id, event.status, event.latency_ms);
    if event.rate_limited {
        state.metrics.inc_rate_limited(&event.route_id);
    }
    if event.retry_count > 0 {
        state.metrics.inc_retry(&event.route_id);
    }
    state.publisher.submit_telemetry(event);

    outcome_to_response(outcome)
}

pub async fn fallback_message() -> Response {
    filter_response_to_response(FallbackRouter::message())
}

pub async fn fallback_backend() -> Response {
    filter_response_to_response(FallbackRouter::backend())
}

pub async fn fallback_critical() -> Response {
    filter_response_to_response(FallbackRouter::critical())
}

/// `GET /actuator/health` (§6): store health (C12) plus the live state
/// of every named circuit breaker, for load balancers and operators.
pub async fn health_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let status = state.health_probe.check().await;
    let breakers: serde_json::Map<String, serde_json::Value> = state
        .breaker_registry
        .snapshot()
        .into_iter()
        .map(|(name, circuit_state)| (name, json!(format!("{circuit_state:?}"))))
        .collect();

    let body = json!({
        "status": status.as_str(),
        "components": {
            "gateway": { "status": status.as_str() },
            "circuitBreakers": breakers,
        }
    });

    // §6 pins this endpoint's wire status to 200 unconditionally; only
    // the JSON `status` field communicates UP/DEGRADED/DOWN.
    (axum::http::StatusCode::OK, axum::Json(body)).into_response()
}
