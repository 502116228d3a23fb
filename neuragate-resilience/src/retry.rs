//! Retry filter (C5): bounded retries with exponential backoff and
//! jitter, gated by status/method whitelists.

use crate::backoff::Backoff;
use crate::filter::{Filter, FilterContext, FilterOutcome, Next};
use async_trait::async_trait;
use http::Method;
use neuragate_core::error::GatewayError;
use neuragate_core::route::FilterSpec;
use std::collections::HashSet;
use std::time::Duration;

pub struct RetryFilter {
    retries: usize,
    statuses: HashSet<u16>,
    methods: HashSet<Method>,
    backoff: Backoff,
}

impl RetryFilter {
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let retries = spec
            .args
            .get("retries")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let statuses = spec
            .args
            .get("statuses")
            .map(|v| parse_status_set(v))
            .unwrap_or_else(|| [502u16, 503u16].into_iter().collect());
        let methods = spec
            .args
            .get("methods")
            .map(|v| parse_method_set(v))
            .unwrap_or_else(|| {
                [Method::GET, Method::POST, Method::PUT, Method::DELETE]
                    .into_iter()
                    .collect()
            });
        let base_ms = spec
            .args
            .get("base_ms")
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let multiplier = spec
            .args
            .get("multiplier")
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        Self {
            retries,
            statuses,
            methods,
            backoff: Backoff::new(Duration::from_millis(base_ms), multiplier),
        }
    }
}

fn parse_status_set(s: &str) -> HashSet<u16> {
    s.split(',').filter_map(|v| v.trim().parse().ok()).collect()
}

fn parse_method_set(s: &str) -> HashSet<Method> {
    s.split(',')
        .filter_map(|v| v.trim().parse::<Method>().ok())
        .collect()
}

#[async_trait]
impl Filter for RetryFilter {
    fn name(&self) -> &str {
        "Retry"
    }

    async fn execute(&self, ctx: &mut FilterContext, next: Next<'_>) -> FilterOutcome {
        if !self.methods.contains(&ctx.method) {
            return next.run(ctx).await;
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let outcome = next.run(ctx).await;

            let retryable = if ctx.circuit_breaker_triggered {
                false
            } else {
                match &outcome {
                    Ok(resp) => self.statuses.contains(&resp.status.as_u16()),
                    Err(_) => true,
                }
            };

            if !retryable || attempt > self.retries {
                return match (retryable, &outcome) {
                    (true, Err(e)) if attempt > self.retries => Err(GatewayError::RetryExhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    }),
                    _ => outcome,
                };
            }

            if ctx.deadline_exceeded() {
                return outcome;
            }

            ctx.retry_count += 1;
            let delay = self.backoff.delay_with_jitter(attempt);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, FilterChain, FilterResponse, ProxySink};
    use bytes::Bytes;
    use http::StatusCode;
    use neuragate_core::compiler::CompiledRoute;
    use neuragate_core::route::{Predicate, RouteDefinition};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
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
            method: Method::GET,
            path: "/x".into(),
            headers: http::HeaderMap::new(),
            body: Bytes::new(),
            client_ip: "1.2.3.4".into(),
            user_agent: None,
            correlation_id: "c1".into(),
            deadline: Instant::now() + Duration::from_secs(5),
            retry_count: 0,
            rate_limited: false,
            circuit_breaker_triggered: false,
        }
    }

    struct FlakySink {
        fail_times: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProxySink for FlakySink {
        async fn call(&self, _ctx: &mut FilterContext) -> FilterOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(GatewayError::UpstreamUnavailable("connection reset".into()))
            } else {
                Ok(FilterResponse {
                    status: StatusCode::OK,
                    headers: vec![],
                    body: Bytes::from("ok"),
                })
            }
        }
    }

    fn retry_filter(retries: usize) -> RetryFilter {
        RetryFilter::from_spec(&FilterSpec {
            name: "Retry".into(),
            args: [
                ("retries".into(), retries.to_string()),
                ("base_ms".into(), "1".into()),
            ]
            .into_iter()
            .collect(),
        })
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure_with_retry_count_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(FlakySink {
            fail_times: 1,
            calls: calls.clone(),
        });
        let chain = FilterChain::new(vec![Arc::new(retry_filter(3))], sink);
        let mut c = ctx();
        let resp = chain.execute(&mut c).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(c.retry_count, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_retry_exhausted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(FlakySink {
            fail_times: 100,
            calls: calls.clone(),
        });
        let chain = FilterChain::new(vec![Arc::new(retry_filter(2))], sink);
        let mut c = ctx();
        let result = chain.execute(&mut c).await;
        assert!(matches!(result, Err(GatewayError::RetryExhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_passes_through_immediately() {
        struct NotFoundSink;
        #[async_trait]
        impl ProxySink for NotFoundSink {
            async fn call(&self, _ctx: &mut FilterContext) -> FilterOutcome {
                Ok(FilterResponse {
                    status: StatusCode::NOT_FOUND,
                    headers: vec![],
                    body: Bytes::new(),
                })
            }
        }
        let chain = FilterChain::new(vec![Arc::new(retry_filter(3))], Arc::new(NotFoundSink));
        let mut c = ctx();
        let resp = chain.execute(&mut c).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(c.retry_count, 0);
    }

    #[tokio::test]
    async fn breaker_open_short_circuit_is_never_retried() {
        struct OpenBreakerFilter {
            calls: Arc<AtomicUsize>,
        }
        #[async_trait]
        impl Filter for OpenBreakerFilter {
            fn name(&self) -> &str {
                "CircuitBreaker"
            }
            async fn execute(&self, ctx: &mut FilterContext, _next: Next<'_>) -> FilterOutcome {
                self.calls.fetch_add(1, Ordering::SeqCst);
                ctx.circuit_breaker_triggered = true;
                Ok(FilterResponse {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    headers: vec![],
                    body: Bytes::new(),
                })
            }
        }

        struct UnreachableSink;
        #[async_trait]
        impl ProxySink for UnreachableSink {
            async fn call(&self, _ctx: &mut FilterContext) -> FilterOutcome {
                panic!("proxy sink must not be reached when the breaker short-circuits")
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FilterChain::new(
            vec![
                Arc::new(retry_filter(3)),
                Arc::new(OpenBreakerFilter { calls: calls.clone() }),
            ],
            Arc::new(UnreachableSink),
        );
        let mut c = ctx();
        let resp = chain.execute(&mut c).await.unwrap();
        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(c.retry_count, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "breaker short-circuit must not be retried");
    }

    #[tokio::test]
    async fn disallowed_method_never_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(FlakySink {
            fail_times: 100,
            calls: calls.clone(),
        });
        let filter = RetryFilter::from_spec(&FilterSpec {
            name: "Retry".into(),
            args: [("methods".into(), "POST".into())].into_iter().collect(),
        });
        let chain = FilterChain::new(vec![Arc::new(filter)], sink);
        let mut c = ctx(); // method is GET
        let result = chain.execute(&mut c).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
