//! The around-advice filter chain (§9 design notes): an ordered list
//! of filters, each able to short-circuit with a response or hand off
//! to the remainder of the chain, terminating at the proxy sink.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use neuragate_core::compiler::CompiledRoute;
use neuragate_core::error::GatewayError;
use std::sync::Arc;
use std::time::Instant;

/// Per-request mutable state threaded through the whole chain.
pub struct FilterContext {
    pub route: Arc<CompiledRoute>,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub correlation_id: String,
    pub deadline: Instant,

    // Telemetry flags (C10 reads these after the chain completes).
    pub retry_count: usize,
    pub rate_limited: bool,
    pub circuit_breaker_triggered: bool,
}

impl FilterContext {
    pub fn deadline_exceeded(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[derive(Debug, Clone)]
pub struct FilterResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl FilterResponse {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::from(body.to_string()),
        }
    }
}

pub type FilterOutcome = Result<FilterResponse, GatewayError>;

/// The terminal stage of every chain — the proxy engine (C8). A
/// trait so the resilience crate has no dependency on the HTTP client
/// used to actually reach an upstream.
#[async_trait]
pub trait ProxySink: Send + Sync {
    async fn call(&self, ctx: &mut FilterContext) -> FilterOutcome;
}

/// One stage of the chain. `next` represents everything downstream,
/// including the terminal `ProxySink` — a filter invokes it zero or
/// more times (zero to short-circuit, more than once to retry).
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, ctx: &mut FilterContext, next: Next<'_>) -> FilterOutcome;
}

#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Filter>],
    sink: &'a (dyn ProxySink + Send + Sync),
}

impl<'a> Next<'a> {
    pub async fn run(&self, ctx: &mut FilterContext) -> FilterOutcome {
        match self.remaining.split_first() {
            Some((filter, rest)) => {
                let next = Next {
                    remaining: rest,
                    sink: self.sink,
                };
                filter.execute(ctx, next).await
            }
            None => self.sink.call(ctx).await,
        }
    }
}

/// An ordered, immutable filter chain built from a `CompiledRoute`'s
/// filter specs (see `neuragate_core::compiler`), terminating at a
/// `ProxySink`.
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
    sink: Arc<dyn ProxySink>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>, sink: Arc<dyn ProxySink>) -> Self {
        Self { filters, sink }
    }

    pub async fn execute(&self, ctx: &mut FilterContext) -> FilterOutcome {
        let next = Next {
            remaining: &self.filters,
            sink: self.sink.as_ref(),
        };
        next.run(ctx).await
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }
}
