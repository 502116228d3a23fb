pub mod http_sink;
pub mod registry;
pub mod router;

pub use http_sink::HttpProxySink;
pub use registry::{ChainBuilder, FilterServices};
pub use router::{GatewayRouter, ResolvedRoute};
