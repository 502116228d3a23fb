//! End-to-end: install a route, resolve it, run its chain against a
//! real `HttpProxySink`-shaped sink, then remove it.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use neuragate_core::install::RouteInstaller;
use neuragate_core::route::{FilterSpec, Predicate, RouteDefinition};
use neuragate_proxy::{FilterServices, GatewayRouter};
use neuragate_resilience::circuit_breaker::BreakerRegistry;
use neuragate_resilience::clock::MonotonicClock;
use neuragate_resilience::filter::{FilterContext, FilterOutcome, FilterResponse, ProxySink};
use neuragate_resilience::rate_limit::InMemoryBucketStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

struct RecordingSink {
    calls: Arc<std::sync::atomic::AtomicUsize>,
}

#[async_trait]
impl ProxySink for RecordingSink {
    async fn call(&self, _ctx: &mut FilterContext) -> FilterOutcome {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(FilterResponse {
            status: StatusCode::OK,
            headers: vec![],
            body: Bytes::from("upstream-ok"),
        })
    }
}

fn route_def() -> RouteDefinition {
    RouteDefinition {
        id: "inventory-lookup".into(),
        uri: "http://inventory:9001".into(),
        predicates: vec![Predicate {
            name: "Path".into(),
            args: [("pattern".into(), "/inventory/**".into())].into_iter().collect(),
        }],
        filters: vec![FilterSpec {
            name: "Retry".into(),
            args: [("retries".into(), "1".into()), ("base_ms".into(), "1".into())]
                .into_iter()
                .collect(),
        }],
        order: 1,
        metadata: HashMap::new(),
        enabled: true,
    }
}

fn ctx_for(route: Arc<neuragate_core::compiler::CompiledRoute>) -> FilterContext {
    FilterContext {
        route,
        method: Method::GET,
        path: "/inventory/42".into(),
        headers: HeaderMap::new(),
        body: Bytes::new(),
        client_ip: "10.0.0.1".into(),
        user_agent: None,
        correlation_id: "corr-1".into(),
        deadline: Instant::now() + std::time::Duration::from_secs(5),
        retry_count: 0,
        rate_limited: false,
        circuit_breaker_triggered: false,
    }
}

#[tokio::test]
async fn installed_route_resolves_and_reaches_upstream_sink() {
    let clock = Arc::new(MonotonicClock::new());
    let services = FilterServices {
        bucket_store: Arc::new(InMemoryBucketStore::new(clock.clone())),
        breaker_registry: Arc::new(BreakerRegistry::with_clock(clock.clone())),
        clock,
    };
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = Arc::new(RecordingSink { calls: calls.clone() });
    let router = GatewayRouter::new(services, sink);

    router.install(route_def()).expect("route installs cleanly");

    let resolved = router
        .resolve("GET", "/inventory/42")
        .expect("route resolves after install");
    assert_eq!(resolved.route.id.as_ref(), "inventory-lookup");

    let mut ctx = ctx_for(resolved.route.clone());
    let resp = resolved.chain.execute(&mut ctx).await.unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    router.uninstall("inventory-lookup");
    assert!(router.resolve("GET", "/inventory/42").is_none());
}

fn rate_limited_route_def() -> RouteDefinition {
    let mut metadata = HashMap::new();
    metadata.insert("rate-limit-enabled".into(), "true".into());
    RouteDefinition {
        id: "rate-limited".into(),
        uri: "http://inventory:9001".into(),
        predicates: vec![Predicate {
            name: "Path".into(),
            args: [("pattern".into(), "/limited/**".into())].into_iter().collect(),
        }],
        filters: vec![],
        order: 1,
        metadata,
        enabled: true,
    }
}

/// §8 scenario 2: a route with no explicit `RequestRateLimiter` filter
/// but `metadata.rate-limit-enabled=true` must install cleanly (the
/// default-injected filter's `key=client-ip` must resolve through the
/// real `ChainBuilder`) and then actually reject once its burst is
/// exhausted.
#[tokio::test]
async fn rate_limit_enabled_route_installs_and_trips_on_burst() {
    let clock = Arc::new(MonotonicClock::new());
    let services = FilterServices {
        bucket_store: Arc::new(InMemoryBucketStore::new(clock.clone())),
        breaker_registry: Arc::new(BreakerRegistry::with_clock(clock.clone())),
        clock,
    };
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = Arc::new(RecordingSink { calls: calls.clone() });
    let router = GatewayRouter::new(services, sink);

    router
        .install(rate_limited_route_def())
        .expect("rate-limit-enabled route installs cleanly with the default-injected filter");

    let resolved = router.resolve("GET", "/limited/1").expect("route resolves after install");

    let mut saw_429 = false;
    for _ in 0..25 {
        let mut ctx = ctx_for(resolved.route.clone());
        ctx.path = "/limited/1".into();
        let resp = resolved.chain.execute(&mut ctx).await.unwrap();
        if resp.status == StatusCode::TOO_MANY_REQUESTS {
            saw_429 = true;
            assert!(ctx.rate_limited);
            assert!(resp.headers.iter().any(|(k, _)| k == "X-RateLimit-Remaining"));
            assert!(resp.headers.iter().any(|(k, _)| k == "X-RateLimit-Replenish-Rate"));
            assert!(resp.headers.iter().any(|(k, _)| k == "X-RateLimit-Burst-Capacity"));
        }
    }
    assert!(saw_429, "default burst of 20 must trip within 25 requests on one key");
}

#[tokio::test]
async fn unreachable_upstream_surfaces_as_upstream_unavailable_after_retries() {
    struct FailingSink;
    #[async_trait]
    impl ProxySink for FailingSink {
        async fn call(&self, _ctx: &mut FilterContext) -> FilterOutcome {
            Err(neuragate_core::error::GatewayError::UpstreamUnavailable(
                "connection refused".into(),
            ))
        }
    }

    let clock = Arc::new(MonotonicClock::new());
    let services = FilterServices {
        bucket_store: Arc::new(InMemoryBucketStore::new(clock.clone())),
        breaker_registry: Arc::new(BreakerRegistry::with_clock(clock.clone())),
        clock,
    };
    let router = GatewayRouter::new(services, Arc::new(FailingSink));
    router.install(route_def()).unwrap();

    let resolved = router.resolve("GET", "/inventory/42").unwrap();
    let mut ctx = ctx_for(resolved.route.clone());
    let err = resolved.chain.execute(&mut ctx).await.unwrap_err();
    assert!(matches!(
        err,
        neuragate_core::error::GatewayError::RetryExhausted { .. }
            | neuragate_core::error::GatewayError::UpstreamUnavailable(_)
    ));
}
