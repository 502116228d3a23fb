//! Fallback router (C7): synchronous local handlers that never invoke
//! the proxy (C8). Reached by the circuit breaker on a denied permit,
//! and exposed as the same paths by the admin server for direct calls.

use crate::filter::FilterResponse;
use http::StatusCode;
use serde_json::json;

pub struct FallbackRouter;

impl FallbackRouter {
    pub fn respond(path: &str) -> FilterResponse {
        match path {
            "/fallback/backend" => Self::backend(),
            "/fallback/critical" => Self::critical(),
            _ => Self::message(),
        }
    }

    pub fn message() -> FilterResponse {
        FilterResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unavailable",
                "message": "Service is temporarily unavailable, please try again later.",
                "timestamp": now_rfc3339(),
                "reason": "circuit_open",
            }),
        )
    }

    pub fn backend() -> FilterResponse {
        FilterResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unavailable",
                "message": "Service is temporarily unavailable, please try again later.",
                "timestamp": now_rfc3339(),
                "reason": "circuit_open",
                "service": "backend",
            }),
        )
    }

    pub fn critical() -> FilterResponse {
        FilterResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unavailable",
                "message": "Service is temporarily unavailable, please try again later.",
                "timestamp": now_rfc3339(),
                "reason": "circuit_open",
                "service": "critical",
                "severity": "critical",
            }),
        )
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
