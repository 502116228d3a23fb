//! Rate limiter (C4): token bucket keyed by client IP, a request
//! header, the request path, or a combination, backed by a pluggable
//! `BucketStore` (in-memory by default, swappable for a distributed
//! store without touching the filter itself).

use crate::clock::{Clock, MonotonicClock};
use crate::filter::{Filter, FilterContext, FilterOutcome, FilterResponse, Next};
use async_trait::async_trait;
use dashmap::DashMap;
use http::StatusCode;
use neuragate_core::route::FilterSpec;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub enum BucketDecision {
    Allowed { remaining: u64 },
    Denied { remaining: u64 },
}

/// Storage abstraction for bucket state — the default is an in-memory
/// `DashMap`; a distributed store can implement this trait without any
/// change to `RateLimitFilter`.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn acquire(
        &self,
        key: &str,
        replenish_per_sec: f64,
        burst_capacity: f64,
        now_millis: u64,
    ) -> Result<BucketDecision, String>;

    /// Evict buckets untouched for longer than `idle_ttl_ms`.
    fn sweep_idle(&self, idle_ttl_ms: u64, now_millis: u64);
}

struct Bucket {
    tokens: f64,
    last_refill_millis: u64,
    last_touched_millis: u64,
}

/// Default in-process store. Buckets are created lazily per key and
/// refilled lazily on access (no background ticker needed).
pub struct InMemoryBucketStore {
    buckets: DashMap<String, Mutex<Bucket>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBucketStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }
}

impl Default for InMemoryBucketStore {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock::new()))
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn acquire(
        &self,
        key: &str,
        replenish_per_sec: f64,
        burst_capacity: f64,
        now_millis: u64,
    ) -> Result<BucketDecision, String> {
        let entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            Mutex::new(Bucket {
                tokens: burst_capacity,
                last_refill_millis: now_millis,
                last_touched_millis: now_millis,
            })
        });
        let mut bucket = entry.lock().map_err(|_| "bucket lock poisoned".to_string())?;

        let elapsed_ms = now_millis.saturating_sub(bucket.last_refill_millis) as f64;
        let refilled = bucket.tokens + (elapsed_ms / 1000.0) * replenish_per_sec;
        bucket.tokens = refilled.min(burst_capacity);
        bucket.last_refill_millis = now_millis;
        bucket.last_touched_millis = now_millis;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(BucketDecision::Allowed {
                remaining: bucket.tokens as u64,
            })
        } else {
            Ok(BucketDecision::Denied {
                remaining: bucket.tokens as u64,
            })
        }
    }

    fn sweep_idle(&self, idle_ttl_ms: u64, now_millis: u64) {
        self.buckets
            .retain(|_, b| match b.lock() {
                Ok(bucket) => now_millis.saturating_sub(bucket.last_touched_millis) <= idle_ttl_ms,
                Err(_) => false,
            });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyResolver {
    ClientIp,
    Path,
    IpAndPath,
    UserHeader(String),
}

pub struct RateLimitFilter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    replenish_per_sec: f64,
    burst_capacity: f64,
    resolver: KeyResolver,
    next_sweep_millis: AtomicU64,
    idle_ttl_ms: u64,
}

impl RateLimitFilter {
    pub fn from_spec(
        spec: &FilterSpec,
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, neuragate_core::error::GatewayError> {
        let replenish_per_sec = spec
            .args
            .get("replenish")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10.0);
        let burst_capacity = spec
            .args
            .get("burst")
            .and_then(|v| v.parse().ok())
            .unwrap_or(20.0);
        let resolver = match spec.args.get("key").map(|s| s.as_str()) {
            None | Some("ip") | Some("client-ip") => KeyResolver::ClientIp,
            Some("path") => KeyResolver::Path,
            Some("ip+path") => KeyResolver::IpAndPath,
            Some("user-header") => {
                let header = spec
                    .args
                    .get("header")
                    .cloned()
                    .unwrap_or_else(|| "x-user-id".to_string());
                KeyResolver::UserHeader(header)
            }
            Some(other) => {
                return Err(neuragate_core::error::GatewayError::Config(format!(
                    "RequestRateLimiter: unknown key resolver '{other}' (expected ip, client-ip, user-header, path, or ip+path)"
                )))
            }
        };
        let idle_ttl_ms = spec
            .args
            .get("idle_ttl_secs")
            .and_then(|v| v.parse::<u64>().ok())
            .map(|s| s * 1000)
            .unwrap_or(600_000);

        Ok(Self {
            store,
            clock,
            replenish_per_sec,
            burst_capacity,
            resolver,
            next_sweep_millis: AtomicU64::new(0),
            idle_ttl_ms,
        })
    }

    fn bucket_key(&self, ctx: &FilterContext) -> String {
        match &self.resolver {
            KeyResolver::ClientIp => format!("ip:{}:{}", ctx.route.id, ctx.client_ip),
            KeyResolver::Path => format!("path:{}:{}", ctx.route.id, ctx.path),
            KeyResolver::IpAndPath => format!("ip+path:{}:{}:{}", ctx.route.id, ctx.client_ip, ctx.path),
            KeyResolver::UserHeader(header) => {
                let value = ctx
                    .headers
                    .get(header.as_str())
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("anonymous");
                format!("user:{}:{}:{}", ctx.route.id, header, value)
            }
        }
    }

    fn maybe_sweep(&self, now: u64) {
        let next = self.next_sweep_millis.load(Ordering::Relaxed);
        if now >= next {
            self.store.sweep_idle(self.idle_ttl_ms, now);
            self.next_sweep_millis
                .store(now + self.idle_ttl_ms, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Filter for RateLimitFilter {
    fn name(&self) -> &str {
        "RequestRateLimiter"
    }

    async fn execute(&self, ctx: &mut FilterContext, next: Next<'_>) -> FilterOutcome {
        let now = self.clock.now_millis();
        self.maybe_sweep(now);
        let key = self.bucket_key(ctx);

        match self
            .store
            .acquire(&key, self.replenish_per_sec, self.burst_capacity, now)
            .await
        {
            Ok(BucketDecision::Allowed { remaining }) => {
                let mut outcome = next.run(ctx).await;
                if let Ok(resp) = &mut outcome {
                    resp.headers
                        .push(("X-RateLimit-Remaining".into(), remaining.to_string()));
                }
                outcome
            }
            Ok(BucketDecision::Denied { remaining }) => {
                ctx.rate_limited = true;
                let mut resp = FilterResponse::json(
                    StatusCode::TOO_MANY_REQUESTS,
                    json!({"error": "rate limit exceeded", "status": 429}),
                );
                resp.headers
                    .push(("X-RateLimit-Remaining".into(), remaining.to_string()));
                resp.headers.push((
                    "X-RateLimit-Replenish-Rate".into(),
                    self.replenish_per_sec.to_string(),
                ));
                resp.headers.push((
                    "X-RateLimit-Burst-Capacity".into(),
                    self.burst_capacity.to_string(),
                ));
                Ok(resp)
            }
            Err(e) => {
                warn!(error = %e, "rate limit store unavailable, failing open");
                ctx.rate_limited = false;
                next.run(ctx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::filter::{FilterChain, ProxySink};
    use bytes::Bytes;
    use neuragate_core::compiler::CompiledRoute;
    use neuragate_core::route::{Predicate, RouteDefinition};
    use std::collections::HashMap;
    use std::time::Instant;

    fn ctx() -> FilterContext {
        let def = RouteDefinition {
            id: "r1".into(),
            uri: "http://u".into(),
            predicates: vec![Predicate {
                name: "Path".into(),
                args: [("pattern".into(), "/x".into())].into_iter().collect(),
            }],
            filters: vec![],
            order: 0,
            metadata: HashMap::new(),
            enabled: true,
        };
        let route = Arc::new(CompiledRoute::compile(def).unwrap());
        FilterContext {
            route,
            method: http::Method::GET,
            path: "/x".into(),
            headers: http::HeaderMap::new(),
            body: Bytes::new(),
            client_ip: "1.2.3.4".into(),
            user_agent: None,
            correlation_id: "c1".into(),
            deadline: Instant::now() + std::time::Duration::from_secs(5),
            retry_count: 0,
            rate_limited: false,
            circuit_breaker_triggered: false,
        }
    }

    struct OkSink;
    #[async_trait]
    impl ProxySink for OkSink {
        async fn call(&self, _ctx: &mut FilterContext) -> FilterOutcome {
            Ok(FilterResponse {
                status: StatusCode::OK,
                headers: vec![],
                body: Bytes::new(),
            })
        }
    }

    fn spec(replenish: &str, burst: &str) -> FilterSpec {
        FilterSpec {
            name: "RequestRateLimiter".into(),
            args: [
                ("replenish".into(), replenish.into()),
                ("burst".into(), burst.into()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[tokio::test]
    async fn allows_up_to_burst_capacity_then_denies() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryBucketStore::new(clock.clone()));
        let filter = RateLimitFilter::from_spec(&spec("10", "3"), store, clock).unwrap();
        let chain = FilterChain::new(vec![Arc::new(filter)], Arc::new(OkSink));

        for _ in 0..3 {
            let mut c = ctx();
            let resp = chain.execute(&mut c).await.unwrap();
            assert_eq!(resp.status, StatusCode::OK);
            assert!(!c.rate_limited);
        }

        let mut c = ctx();
        let resp = chain.execute(&mut c).await.unwrap();
        assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(c.rate_limited);
        assert!(resp
            .headers
            .iter()
            .any(|(k, _)| k == "X-RateLimit-Replenish-Rate"));
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryBucketStore::new(clock.clone()));
        let filter = RateLimitFilter::from_spec(&spec("10", "1"), store, clock.clone()).unwrap();
        let chain = FilterChain::new(vec![Arc::new(filter)], Arc::new(OkSink));

        let mut c1 = ctx();
        assert_eq!(chain.execute(&mut c1).await.unwrap().status, StatusCode::OK);
        let mut c2 = ctx();
        assert_eq!(
            chain.execute(&mut c2).await.unwrap().status,
            StatusCode::TOO_MANY_REQUESTS
        );

        clock.advance(200); // 10/sec => 1 token every 100ms
        let mut c3 = ctx();
        assert_eq!(chain.execute(&mut c3).await.unwrap().status, StatusCode::OK);
    }

    #[tokio::test]
    async fn different_keys_get_independent_buckets() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryBucketStore::new(clock.clone()));
        let filter = RateLimitFilter::from_spec(&spec("10", "1"), store, clock).unwrap();
        let chain = FilterChain::new(vec![Arc::new(filter)], Arc::new(OkSink));

        let mut c1 = ctx();
        c1.client_ip = "1.1.1.1".into();
        assert_eq!(chain.execute(&mut c1).await.unwrap().status, StatusCode::OK);

        let mut c2 = ctx();
        c2.client_ip = "2.2.2.2".into();
        assert_eq!(chain.execute(&mut c2).await.unwrap().status, StatusCode::OK);
    }

    struct UnavailableStore;
    #[async_trait]
    impl BucketStore for UnavailableStore {
        async fn acquire(
            &self,
            _key: &str,
            _replenish_per_sec: f64,
            _burst_capacity: f64,
            _now_millis: u64,
        ) -> Result<BucketDecision, String> {
            Err("store down".into())
        }
        fn sweep_idle(&self, _idle_ttl_ms: u64, _now_millis: u64) {}
    }

    #[tokio::test]
    async fn fails_open_when_store_unavailable() {
        let clock = Arc::new(ManualClock::new());
        let filter = RateLimitFilter::from_spec(&spec("10", "1"), Arc::new(UnavailableStore), clock).unwrap();
        let chain = FilterChain::new(vec![Arc::new(filter)], Arc::new(OkSink));
        let mut c = ctx();
        let resp = chain.execute(&mut c).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert!(!c.rate_limited);
    }

    fn spec_with_key(burst: &str, key: &str, header: Option<&str>) -> FilterSpec {
        let mut args = spec("10", burst).args;
        args.insert("key".into(), key.into());
        if let Some(h) = header {
            args.insert("header".into(), h.into());
        }
        FilterSpec {
            name: "RequestRateLimiter".into(),
            args,
        }
    }

    #[tokio::test]
    async fn user_header_key_buckets_by_header_value() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryBucketStore::new(clock.clone()));
        let filter =
            RateLimitFilter::from_spec(&spec_with_key("1", "user-header", Some("x-user-id")), store, clock)
                .unwrap();
        let chain = FilterChain::new(vec![Arc::new(filter)], Arc::new(OkSink));

        let mut c1 = ctx();
        c1.headers.insert("x-user-id", "alice".parse().unwrap());
        assert_eq!(chain.execute(&mut c1).await.unwrap().status, StatusCode::OK);

        // Same header value, same client: second request exhausts the burst of 1.
        let mut c1b = ctx();
        c1b.headers.insert("x-user-id", "alice".parse().unwrap());
        assert_eq!(
            chain.execute(&mut c1b).await.unwrap().status,
            StatusCode::TOO_MANY_REQUESTS
        );

        // Different header value gets an independent bucket even from the same IP.
        let mut c2 = ctx();
        c2.headers.insert("x-user-id", "bob".parse().unwrap());
        assert_eq!(chain.execute(&mut c2).await.unwrap().status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_key_resolver_is_rejected_at_construction() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryBucketStore::new(clock.clone()));
        let err = RateLimitFilter::from_spec(&spec_with_key("1", "bogus", None), store, clock).unwrap_err();
        assert!(matches!(err, neuragate_core::error::GatewayError::Config(_)));
    }
}
