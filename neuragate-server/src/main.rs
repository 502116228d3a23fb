//! NeuraGate gateway binary (C13, Lifecycle): parses CLI flags, loads
//! layered config, wires C1 (route store) through C12 (health probe)
//! into a shared [`state::GatewayState`], then runs the gateway
//! surface and the admin surface side by side on one multi-threaded
//! tokio runtime until a shutdown signal is observed.

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod correlation;
mod handlers;
mod response;
mod shutdown;
mod state;

use axum::routing::get;
use axum::Router as AxumRouter;
use clap::Parser;
use correlation::correlation_middleware;
use neuragate_admin::AdminServer;
use neuragate_core::config::NeuraGateConfig;
use neuragate_observability::{
    init_logging, BusSink, HealthProbe, LogFormat, LoggingSink, MetricsCollector, TelemetryPublisher,
    TopicNames,
};
use neuragate_proxy::{FilterServices, GatewayRouter, HttpProxySink};
use neuragate_resilience::circuit_breaker::BreakerRegistry;
use neuragate_resilience::clock::MonotonicClock;
use neuragate_resilience::rate_limit::InMemoryBucketStore;
use neuragate_store::backend::StoreBackend;
use neuragate_store::{FileBackend, RouteStore};
use state::GatewayState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "neuragate", version, about = "NeuraGate — reverse-proxy API gateway")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overridden by `RUST_LOG` when set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON instead of the human-readable default.
    #[arg(long)]
    log_json: bool,

    /// Standalone-mode persistence file, overriding `store.state_file`.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Gateway listen address, overriding `proxy.addr`.
    #[arg(long)]
    addr: Option<SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Pretty };
    init_logging(&cli.log_level, format);

    let mut config = NeuraGateConfig::load(cli.config.as_deref().and_then(|p| p.to_str()))?;
    if let Some(state_file) = cli.state_file {
        config.store.state_file = state_file.to_string_lossy().into_owned();
    }
    if let Some(addr) = cli.addr {
        config.proxy.addr = addr;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "NeuraGate starting");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: NeuraGateConfig) -> anyhow::Result<()> {
    let clock = Arc::new(MonotonicClock::new());

    let backend: Arc<dyn StoreBackend> = build_backend(&config).await?;

    let filter_services = FilterServices {
        bucket_store: Arc::new(InMemoryBucketStore::new(clock.clone())),
        breaker_registry: Arc::new(BreakerRegistry::with_clock(clock.clone())),
        clock: clock.clone(),
    };
    let breaker_registry = filter_services.breaker_registry.clone();

    let sink = Arc::new(HttpProxySink::new(
        Duration::from_millis(config.proxy.connect_timeout_ms),
        Duration::from_millis(config.proxy.read_timeout_ms),
        config.proxy.pool_idle_per_host,
    ));
    let router = Arc::new(GatewayRouter::new(filter_services, sink));

    // Standalone mode: the same file backs both the primary store and
    // the fallback set, so the fallback defs are whatever it already
    // holds at startup (§4.1).
    let fallback_defs = backend.load_all().await.unwrap_or_default();
    let store = Arc::new(RouteStore::init(backend, router.clone(), fallback_defs).await);

    let metrics = Arc::new(MetricsCollector::new());
    let health_probe = Arc::new(HealthProbe::new(store.clone()));
    let publisher = Arc::new(TelemetryPublisher::start(
        build_bus_sink(&config),
        config.telemetry.queue_capacity,
        TopicNames {
            telemetry: config.telemetry.topic_telemetry.clone(),
            errors: config.telemetry.topic_errors.clone(),
            routes: config.telemetry.topic_routes.clone(),
        },
    ));

    spawn_breaker_gauge_sync(metrics.clone(), breaker_registry.clone());
    spawn_route_change_forwarder(store.clone(), publisher.clone());

    let gateway_state = Arc::new(GatewayState {
        router,
        publisher,
        metrics: metrics.clone(),
        health_probe,
        breaker_registry,
        request_budget: Duration::from_millis(
            config.proxy.connect_timeout_ms + config.proxy.read_timeout_ms,
        ),
    });

    let gateway_app = build_gateway_router(gateway_state);
    let gateway_addr = config.proxy.addr;
    let gateway_listener = tokio::net::TcpListener::bind(gateway_addr).await?;
    info!(addr = %gateway_addr, "gateway listening");

    let admin_server = AdminServer::new(config.admin.clone(), store.clone(), metrics.clone());
    let admin_task = tokio::spawn(async move {
        if let Err(e) = admin_server.start().await {
            tracing::error!(error = %e, "admin server exited with error");
        }
    });

    let drain_timeout_ms = config.shutdown.drain_timeout_ms;
    let gateway_task = async {
        axum::serve(
            gateway_listener,
            gateway_app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown::signal())
        .await
    };

    // The drain deadline only starts counting once a shutdown signal is
    // actually observed — it bounds how long `with_graceful_shutdown`
    // above is allowed to wait for in-flight requests, not the
    // process's total uptime.
    let forced_shutdown = async {
        shutdown::signal().await;
        shutdown::drain_deadline(drain_timeout_ms).await;
    };

    tokio::select! {
        result = gateway_task => {
            result?;
        }
        _ = forced_shutdown => {}
    }

    admin_task.abort();
    info!("NeuraGate stopped");
    Ok(())
}

fn build_gateway_router(state: Arc<GatewayState>) -> AxumRouter {
    AxumRouter::new()
        .route("/actuator/health", get(handlers::health_handler))
        .route("/fallback/message", get(handlers::fallback_message))
        .route("/fallback/backend", get(handlers::fallback_backend))
        .route("/fallback/critical", get(handlers::fallback_critical))
        .fallback(handlers::gateway_handler)
        .with_state(state)
        .layer(axum::middleware::from_fn(correlation_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn build_backend(config: &NeuraGateConfig) -> anyhow::Result<Arc<dyn StoreBackend>> {
    #[cfg(feature = "etcd")]
    if !config.store.etcd_endpoints.is_empty() {
        let backend = neuragate_store::EtcdBackend::connect(
            &config.store.etcd_endpoints,
            &config.store.route_key_prefix,
        )
        .await?;
        return Ok(Arc::new(backend));
    }
    Ok(Arc::new(FileBackend::new(&config.store.state_file)))
}

fn build_bus_sink(config: &NeuraGateConfig) -> Arc<dyn BusSink> {
    #[cfg(feature = "kafka")]
    if let Some(bootstrap) = &config.telemetry.bus_bootstrap {
        use rdkafka::config::ClientConfig;
        use rdkafka::producer::FutureProducer;
        match ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create::<FutureProducer>()
        {
            Ok(producer) => return Arc::new(neuragate_observability::KafkaSink::new(producer)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to connect to kafka bootstrap, falling back to log-only telemetry");
            }
        }
    }
    let _ = config;
    Arc::new(LoggingSink)
}

/// Forwards C1's route-changed notifications to C11's `gateway-routes`
/// topic (§4.11) — the store crate can't depend on the observability
/// crate directly, so this glue lives here, at the one place that
/// depends on both.
fn spawn_route_change_forwarder(store: Arc<RouteStore>, publisher: Arc<TelemetryPublisher>) {
    use neuragate_core::install::RouteChangeKind;
    use neuragate_observability::RouteChangeOp;

    let mut changes = store.subscribe_changes();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok((id, kind)) => {
                    let op = match kind {
                        RouteChangeKind::Put => RouteChangeOp::Put,
                        RouteChangeKind::Delete => RouteChangeOp::Delete,
                    };
                    publisher.submit_route_change(id, op);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "route-change forwarder lagged, some notifications dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Circuit breaker state doesn't change without a request observing
/// it, so periodically mirror each named breaker into the gauge the
/// admin `/admin/metrics` endpoint exposes.
fn spawn_breaker_gauge_sync(metrics: Arc<MetricsCollector>, registry: Arc<BreakerRegistry>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            for (name, state) in registry.snapshot() {
                let code = match state {
                    neuragate_resilience::circuit_breaker::CircuitState::Closed => 0,
                    neuragate_resilience::circuit_breaker::CircuitState::Open => 1,
                    neuragate_resilience::circuit_breaker::CircuitState::HalfOpen => 2,
                };
                metrics.set_breaker_state(&name, code);
            }
        }
    });
}
