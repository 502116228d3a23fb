//! `GatewayRouter`: the live, executable route table — C2's filter
//! instantiation plus C3's resolution, composed on top of
//! `neuragate_core::Router` (which owns matching and the immutable
//! `RouteSnapshot`).

use crate::registry::{ChainBuilder, FilterServices};
use dashmap::DashMap;
use neuragate_core::compiler::CompiledRoute;
use neuragate_core::error::GatewayError;
use neuragate_core::install::RouteInstaller;
use neuragate_core::route::RouteDefinition;
use neuragate_core::snapshot::Router;
use neuragate_resilience::filter::{FilterChain, ProxySink};
use std::sync::Arc;

pub struct ResolvedRoute {
    pub route: Arc<CompiledRoute>,
    pub chain: Arc<FilterChain>,
}

pub struct GatewayRouter {
    core: Arc<Router>,
    chains: DashMap<String, Arc<FilterChain>>,
    chain_builder: ChainBuilder,
    sink: Arc<dyn ProxySink>,
}

impl GatewayRouter {
    pub fn new(services: FilterServices, sink: Arc<dyn ProxySink>) -> Self {
        Self {
            core: Arc::new(Router::new()),
            chains: DashMap::new(),
            chain_builder: ChainBuilder::new(services),
            sink,
        }
    }

    pub fn core(&self) -> Arc<Router> {
        self.core.clone()
    }

    /// C3: resolve a request to its compiled route and executable chain.
    pub fn resolve(&self, method: &str, path: &str) -> Option<ResolvedRoute> {
        let snapshot = self.core.snapshot();
        let route = snapshot.resolve(method, path)?;
        let chain = self.chains.get(route.id.as_ref())?.clone();
        Some(ResolvedRoute { route, chain })
    }

    pub fn route_count(&self) -> usize {
        self.core.route_count()
    }

    pub fn all_definitions(&self) -> Vec<RouteDefinition> {
        self.core.all_definitions()
    }

    pub fn get_definition(&self, id: &str) -> Option<RouteDefinition> {
        self.core.get(id).map(|r| (*r.definition).clone())
    }
}

impl RouteInstaller for GatewayRouter {
    /// Validate-then-commit: compile and build the filter chain first
    /// (pure, no I/O); only on full success is anything installed, so
    /// a definition that fails either step never reaches a snapshot.
    fn install(&self, def: RouteDefinition) -> Result<(), GatewayError> {
        let compiled = CompiledRoute::compile(def.clone())?;
        let filters = self.chain_builder.build(&compiled.filter_chain)?;
        let chain = Arc::new(FilterChain::new(filters, self.sink.clone()));

        let id = compiled.id.to_string();
        self.core.put(def)?;
        self.chains.insert(id, chain);
        Ok(())
    }

    fn uninstall(&self, id: &str) {
        self.core.delete(id);
        self.chains.remove(id);
    }
}
