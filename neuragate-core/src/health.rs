//! Shared health vocabulary: C1 reports it about the route store, C12
//! derives the process-wide probe from it plus fallback-set state.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Down => "DOWN",
        }
    }

    pub fn is_healthy_enough_for_rotation(&self) -> bool {
        !matches!(self, HealthStatus::Down)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What C12 polls: a route store's own health plus whether it has a
/// fallback set loaded. Implemented by `neuragate_store::RouteStore`.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn health(&self) -> HealthStatus;
    fn fallback_loaded(&self) -> bool;
}
