//! The storage seam (§4.1): a primary key/value backing for
//! `RouteDefinition`s, swappable between a remote etcd-compatible
//! store and a local file, without touching `RouteStore` itself.

use async_trait::async_trait;
use neuragate_core::error::GatewayError;
use neuragate_core::route::RouteDefinition;

#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Load every definition currently in the backing store.
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, GatewayError>;

    async fn put(&self, def: &RouteDefinition) -> Result<(), GatewayError>;

    async fn delete(&self, id: &str) -> Result<(), GatewayError>;

    /// A PING-class call; `Health()` wraps this with a 2s timeout.
    async fn ping(&self) -> Result<(), GatewayError>;
}
