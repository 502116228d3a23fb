pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod fallback;
pub mod filter;
pub mod rate_limit;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, BreakerRegistry, BreakerState, CircuitState};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use fallback::FallbackRouter;
pub use filter::{Filter, FilterChain, FilterContext, FilterOutcome, FilterResponse, Next, ProxySink};
pub use rate_limit::{BucketDecision, BucketStore, InMemoryBucketStore, RateLimitFilter};
pub use retry::RetryFilter;
