//! Health Probe (C12): wraps whatever implements C1's `HealthSource`
//! with its own hard timeout, so a wedged store can never hang the
//! admin `/health` endpoint.

use neuragate_core::health::{HealthSource, HealthStatus};
use std::sync::Arc;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HealthProbe {
    source: Arc<dyn HealthSource>,
}

impl HealthProbe {
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        Self { source }
    }

    /// Up when C1 reports Up; Degraded when C1 reports Down but the
    /// fallback set is loaded; Down otherwise. A timed-out probe counts
    /// as Down regardless of fallback state, since it means even the
    /// health check itself could not complete.
    pub async fn check(&self) -> HealthStatus {
        match tokio::time::timeout(PROBE_TIMEOUT, self.source.health()).await {
            Ok(HealthStatus::Up) => HealthStatus::Up,
            Ok(HealthStatus::Down) if self.source.fallback_loaded() => HealthStatus::Degraded,
            Ok(status) => status,
            Err(_) => HealthStatus::Down,
        }
    }
}
