//! Route compiler (C2): turns a `RouteDefinition` into a `CompiledRoute`
//! — a matcher plus an ordered, immutable filter chain — injecting
//! default resilience filters when the definition doesn't name them.

use crate::error::GatewayError;
use crate::matcher::CompiledPredicate;
use crate::route::{FilterSpec, RouteDefinition};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const RATE_LIMITER: &str = "RequestRateLimiter";
pub const RETRY: &str = "Retry";
pub const CIRCUIT_BREAKER: &str = "CircuitBreaker";

/// A definition turned into something C3 can match against and C4–C8
/// can execute, without touching the network to build it.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub id: Arc<str>,
    pub order: i64,
    pub definition: Arc<RouteDefinition>,
    pub predicates: Arc<[CompiledPredicate]>,
    /// Outermost first: RateLimiter → Retry → CircuitBreaker → user
    /// filters → (Proxy is implicit, always last).
    pub filter_chain: Arc<[FilterSpec]>,
    /// `(id, content_hash)` identity — any definition change produces
    /// a distinct hash, and therefore a distinct `CompiledRoute`.
    pub content_hash: u64,
}

impl CompiledRoute {
    pub fn compile(def: RouteDefinition) -> Result<Self, GatewayError> {
        if def.id.trim().is_empty() {
            return Err(GatewayError::Config("route id must not be empty".into()));
        }
        if def.predicates.is_empty() {
            return Err(GatewayError::Config(format!(
                "route {} has no predicates",
                def.id
            )));
        }
        let predicates: Vec<CompiledPredicate> = def
            .predicates
            .iter()
            .map(CompiledPredicate::compile)
            .collect::<Result<_, _>>()?;

        let filter_chain = build_filter_chain(&def)?;
        let content_hash = hash_definition(&def);
        let id: Arc<str> = Arc::from(def.id.as_str());

        Ok(CompiledRoute {
            id,
            order: def.order,
            definition: Arc::new(def),
            predicates: predicates.into(),
            filter_chain: filter_chain.into(),
            content_hash,
        })
    }

    /// All predicates must accept the request (AND semantics).
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.predicates.iter().all(|p| p.matches(method, path))
    }

    pub fn is_enabled(&self) -> bool {
        self.definition.enabled
    }
}

/// Build the ordered chain per §4.2: RateLimiter → Retry →
/// CircuitBreaker → user filters (anything else the definition
/// named), defaults prepended only when absent.
fn build_filter_chain(def: &RouteDefinition) -> Result<Vec<FilterSpec>, GatewayError> {
    let mut chain = Vec::with_capacity(def.filters.len() + 3);

    match def.find_filter(RATE_LIMITER) {
        Some(spec) => chain.push(spec.clone()),
        None if def.rate_limit_enabled() => chain.push(FilterSpec {
            name: RATE_LIMITER.into(),
            args: [
                ("replenish".into(), "10".into()),
                ("burst".into(), "20".into()),
                ("key".into(), "client-ip".into()),
            ]
            .into_iter()
            .collect(),
        }),
        None => {}
    }

    match def.find_filter(RETRY) {
        Some(spec) => chain.push(spec.clone()),
        None => chain.push(FilterSpec {
            name: RETRY.into(),
            args: [
                ("retries".into(), "3".into()),
                ("statuses".into(), "502,503".into()),
                ("methods".into(), "GET,POST,PUT,DELETE".into()),
            ]
            .into_iter()
            .collect(),
        }),
    }

    match def.find_filter(CIRCUIT_BREAKER) {
        Some(spec) => chain.push(spec.clone()),
        None => chain.push(FilterSpec {
            name: CIRCUIT_BREAKER.into(),
            args: [
                ("name".into(), "dynamicRoute".into()),
                ("fallback".into(), "/fallback/message".into()),
            ]
            .into_iter()
            .collect(),
        }),
    }

    for f in &def.filters {
        if f.name != RATE_LIMITER && f.name != RETRY && f.name != CIRCUIT_BREAKER {
            chain.push(f.clone());
        }
    }

    Ok(chain)
}

fn hash_definition(def: &RouteDefinition) -> u64 {
    let mut hasher = DefaultHasher::new();
    // serde_json::Value has a stable Hash-friendly string form; content
    // identity only needs to change whenever any field does.
    if let Ok(json) = serde_json::to_string(def) {
        json.hash(&mut hasher);
    } else {
        def.id.hash(&mut hasher);
    }
    hasher.finish()
}
