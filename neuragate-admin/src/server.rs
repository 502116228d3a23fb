use crate::handlers;
use axum::routing::{delete, get, post};
use axum::Router as AxumRouter;
use neuragate_core::config::AdminConfig;
use neuragate_observability::MetricsCollector;
use neuragate_store::RouteStore;
use std::sync::Arc;
use tracing::info;

/// Shared state for the admin API — just the route store and the
/// process-wide metrics registry, both owned by C13 and handed down.
pub struct AdminState {
    pub store: Arc<RouteStore>,
    pub metrics: Arc<MetricsCollector>,
}

pub fn build_router(state: Arc<AdminState>) -> AxumRouter {
    AxumRouter::new()
        .route("/admin/health", get(handlers::health::liveness))
        .route(
            "/admin/routes",
            get(handlers::routes::list_routes).post(handlers::routes::put_route),
        )
        .route("/admin/routes/{id}", delete(handlers::routes::delete_route))
        .route("/admin/metrics", get(handlers::metrics::render))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Admin API server (§6): bound on its own address, toggled by
/// `admin.enabled`, run alongside the gateway surface by C13.
pub struct AdminServer {
    config: AdminConfig,
    state: Arc<AdminState>,
}

impl AdminServer {
    pub fn new(config: AdminConfig, store: Arc<RouteStore>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            config,
            state: Arc::new(AdminState { store, metrics }),
        }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("admin API disabled");
            return Ok(());
        }

        let addr = self.config.addr;
        let app = build_router(self.state.clone());

        info!(%addr, "starting admin API server");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
