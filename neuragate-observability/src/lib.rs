pub mod bus;
pub mod health_probe;
pub mod logging;
pub mod metrics;
pub mod publisher;
pub mod telemetry;

pub use bus::{BusSink, LoggingSink};
#[cfg(feature = "kafka")]
pub use bus::KafkaSink;
pub use health_probe::HealthProbe;
pub use logging::{init as init_logging, LogFormat};
pub use metrics::MetricsCollector;
pub use publisher::{TelemetryPublisher, TopicNames};
pub use telemetry::{RouteChangeEvent, RouteChangeOp, TelemetryCapture, TelemetryEvent};
