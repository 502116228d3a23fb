//! `GET/POST /admin/routes`, `DELETE /admin/routes/{id}` (§6): thin
//! wrappers over `RouteStore` — validation and persistence both live
//! there, this layer only translates HTTP in and out.

use crate::server::AdminState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use neuragate_core::route::RouteDefinition;
use std::sync::Arc;

pub async fn list_routes(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    Json(state.store.all())
}

pub async fn put_route(
    State(state): State<Arc<AdminState>>,
    Json(def): Json<RouteDefinition>,
) -> Response {
    match state.store.put(def.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(def)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, route_id = %def.id, "admin: put_route failed");
            error_response(&e)
        }
    }
}

pub async fn delete_route(
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, route_id = %id, "admin: delete_route failed");
            error_response(&e)
        }
    }
}

fn error_response(e: &neuragate_core::error::GatewayError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, e.to_json_body()).into_response()
}
