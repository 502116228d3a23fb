pub mod compiler;
pub mod config;
pub mod error;
pub mod health;
pub mod install;
pub mod matcher;
pub mod route;
pub mod snapshot;

pub use compiler::CompiledRoute;
pub use config::NeuraGateConfig;
pub use error::GatewayError;
pub use health::HealthStatus;
pub use install::RouteInstaller;
pub use route::RouteDefinition;
pub use snapshot::{Router, RouteSnapshot};
