//! Turns the `FilterSpec` list C2 attaches to a `CompiledRoute` into
//! real `Filter` instances (design notes §9: "dynamic reflection on
//! route filter names" → a registry over a closed set of names;
//! unknown names are a config error, never a runtime surprise).

use neuragate_core::compiler::{CIRCUIT_BREAKER, RATE_LIMITER, RETRY};
use neuragate_core::error::GatewayError;
use neuragate_core::route::FilterSpec;
use neuragate_resilience::circuit_breaker::{BreakerRegistry, CircuitBreakerFilter};
use neuragate_resilience::clock::Clock;
use neuragate_resilience::filter::Filter;
use neuragate_resilience::rate_limit::{BucketStore, RateLimitFilter};
use neuragate_resilience::retry::RetryFilter;
use std::sync::Arc;

/// Shared, process-wide services the filter factories close over.
/// Owned by C13 (lifecycle) and handed down to every `ChainBuilder`.
#[derive(Clone)]
pub struct FilterServices {
    pub bucket_store: Arc<dyn BucketStore>,
    pub breaker_registry: Arc<BreakerRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// Builds the ordered, executable `Vec<Arc<dyn Filter>>` for one route
/// from its compiled `FilterSpec` chain. Pure with respect to the
/// network: constructing a filter registers it in the shared breaker/
/// bucket registries but performs no I/O.
pub struct ChainBuilder {
    services: FilterServices,
}

impl ChainBuilder {
    pub fn new(services: FilterServices) -> Self {
        Self { services }
    }

    pub fn build(&self, specs: &[FilterSpec]) -> Result<Vec<Arc<dyn Filter>>, GatewayError> {
        specs.iter().map(|spec| self.build_one(spec)).collect()
    }

    fn build_one(&self, spec: &FilterSpec) -> Result<Arc<dyn Filter>, GatewayError> {
        match spec.name.as_str() {
            RATE_LIMITER => Ok(Arc::new(RateLimitFilter::from_spec(
                spec,
                self.services.bucket_store.clone(),
                self.services.clock.clone(),
            )?)),
            RETRY => Ok(Arc::new(RetryFilter::from_spec(spec))),
            CIRCUIT_BREAKER => Ok(Arc::new(CircuitBreakerFilter::from_spec(
                spec,
                &self.services.breaker_registry,
            ))),
            other => Err(GatewayError::Config(format!(
                "unknown filter: {other} (closed registry: {RATE_LIMITER}, {RETRY}, {CIRCUIT_BREAKER})"
            ))),
        }
    }
}
