//! The seam between the route store (C1) and whatever owns the live,
//! executable router (C2/C3, built in `neuragate-proxy` once filter
//! instances are involved). Kept here, rather than in the store crate,
//! so the store never needs to depend on the proxy crate to notify it.

use crate::error::GatewayError;
use crate::route::RouteDefinition;

/// Something that can accept a validated `RouteDefinition` and make it
/// live, or remove one. `install` must validate and build everything a
/// request needs (matcher, filter chain) before returning `Ok` — a
/// definition that fails here must never reach the store either.
pub trait RouteInstaller: Send + Sync {
    fn install(&self, def: RouteDefinition) -> Result<(), GatewayError>;
    fn uninstall(&self, id: &str);
}

/// What kind of mutation produced a route-changed notification (§4.1,
/// §4.11's `gateway-routes` topic). Kept alongside the installer seam
/// rather than in `neuragate-observability` so the store crate can
/// notify without depending on the telemetry crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeKind {
    Put,
    Delete,
}

/// Installer used where no live router is wired up (unit tests,
/// store-only scenarios): validates via the plain compiler and
/// discards the result.
#[derive(Default)]
pub struct NullInstaller;

impl RouteInstaller for NullInstaller {
    fn install(&self, def: RouteDefinition) -> Result<(), GatewayError> {
        crate::compiler::CompiledRoute::compile(def)?;
        Ok(())
    }

    fn uninstall(&self, _id: &str) {}
}
