//! Admin service's own liveness — distinct from the gateway's
//! `/actuator/health` (C12), which probes the route store itself.

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "UP" }))
}
