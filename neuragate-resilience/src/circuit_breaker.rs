//! Circuit breaker (C6): per-name sliding-window breaker with
//! CLOSED/OPEN/HALF_OPEN states. State transitions are serialized per
//! breaker name behind a mutex guarding the outcome ring; the current
//! state itself is a lock-free atomic read.

use crate::clock::{Clock, MonotonicClock};
use crate::fallback::FallbackRouter;
use crate::filter::{Filter, FilterContext, FilterOutcome, Next};
use async_trait::async_trait;
use dashmap::DashMap;
use neuragate_core::route::FilterSpec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            OPEN => CircuitState::Open,
            HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_rate_threshold: f64,
    pub wait_duration_in_open_state_ms: u64,
    pub sliding_window_size: usize,
    pub minimum_number_of_calls: usize,
    pub permitted_calls_in_half_open: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.6,
            wait_duration_in_open_state_ms: 15_000,
            sliding_window_size: 15,
            minimum_number_of_calls: 5,
            permitted_calls_in_half_open: 3,
        }
    }
}

impl BreakerConfig {
    pub fn backend_service() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            wait_duration_in_open_state_ms: 10_000,
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            permitted_calls_in_half_open: 3,
        }
    }

    pub fn critical_service() -> Self {
        Self {
            failure_rate_threshold: 0.7,
            wait_duration_in_open_state_ms: 30_000,
            sliding_window_size: 20,
            minimum_number_of_calls: 10,
            permitted_calls_in_half_open: 3,
        }
    }
}

struct BreakerInner {
    outcomes: VecDeque<bool>,
    half_open_issued: usize,
    half_open_successes: usize,
}

pub struct BreakerState {
    pub name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    state: AtomicU8,
    opened_at_millis: AtomicU64,
    inner: Mutex<BreakerInner>,
}

enum Permit {
    Allow,
    Deny,
}

impl BreakerState {
    pub fn new(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            state: AtomicU8::new(CLOSED),
            opened_at_millis: AtomicU64::new(0),
            inner: Mutex::new(BreakerInner {
                outcomes: VecDeque::new(),
                half_open_issued: 0,
                half_open_successes: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.load(Ordering::Acquire).into()
    }

    fn acquire_permit(&self) -> Permit {
        loop {
            match self.state.load(Ordering::Acquire) {
                CLOSED => return Permit::Allow,
                OPEN => {
                    let opened_at = self.opened_at_millis.load(Ordering::Acquire);
                    let now = self.clock.now_millis();
                    if now.saturating_sub(opened_at) >= self.config.wait_duration_in_open_state_ms {
                        if self
                            .state
                            .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            let mut inner = self.inner.lock().unwrap();
                            inner.half_open_issued = 0;
                            inner.half_open_successes = 0;
                            continue;
                        }
                        continue;
                    }
                    return Permit::Deny;
                }
                HALF_OPEN => {
                    let mut inner = self.inner.lock().unwrap();
                    if inner.half_open_issued < self.config.permitted_calls_in_half_open {
                        inner.half_open_issued += 1;
                        return Permit::Allow;
                    }
                    return Permit::Deny;
                }
                _ => unreachable!("invalid breaker state byte"),
            }
        }
    }

    fn open_now(&self) {
        self.state.store(OPEN, Ordering::Release);
        self.opened_at_millis
            .store(self.clock.now_millis(), Ordering::Release);
        let mut inner = self.inner.lock().unwrap();
        inner.half_open_issued = 0;
        inner.half_open_successes = 0;
    }

    fn record_outcome(&self, success: bool) {
        if self.state.load(Ordering::Acquire) == HALF_OPEN {
            if !success {
                self.open_now();
                return;
            }
            let close_now = {
                let mut inner = self.inner.lock().unwrap();
                inner.half_open_successes += 1;
                inner.half_open_successes >= self.config.permitted_calls_in_half_open
            };
            if close_now {
                let mut inner = self.inner.lock().unwrap();
                inner.outcomes.clear();
                inner.half_open_issued = 0;
                inner.half_open_successes = 0;
                drop(inner);
                self.state.store(CLOSED, Ordering::Release);
            }
            return;
        }

        let should_open = {
            let mut inner = self.inner.lock().unwrap();
            inner.outcomes.push_back(success);
            if inner.outcomes.len() > self.config.sliding_window_size {
                inner.outcomes.pop_front();
            }
            let total = inner.outcomes.len();
            if total >= self.config.minimum_number_of_calls {
                let failures = inner.outcomes.iter().filter(|o| !**o).count();
                (failures as f64 / total as f64) >= self.config.failure_rate_threshold
            } else {
                false
            }
        };
        if should_open {
            self.open_now();
        }
    }
}

/// Process-wide breaker registry (design notes §9: dependency-injected,
/// lifecycle owned by C13 — not an ambient global).
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<BreakerState>>,
    clock: Option<Arc<dyn Clock>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            clock: None,
        }
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            clock: Some(clock),
        }
    }

    pub fn get_or_create(&self, name: &str, config: BreakerConfig) -> Arc<BreakerState> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        let clock: Arc<dyn Clock> = self
            .clock
            .clone()
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let state = Arc::new(BreakerState::new(name, config, clock));
        self.breakers.insert(name.to_string(), state.clone());
        state
    }

    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().state()))
            .collect()
    }
}

pub struct CircuitBreakerFilter {
    breaker: Arc<BreakerState>,
    fallback_path: String,
}

impl CircuitBreakerFilter {
    pub fn from_spec(spec: &FilterSpec, registry: &BreakerRegistry) -> Self {
        let name = spec.args.get("name").cloned().unwrap_or_else(|| "dynamicRoute".into());
        let config = named_defaults(&name);
        let fallback_path = spec
            .args
            .get("fallback")
            .cloned()
            .unwrap_or_else(|| "/fallback/message".into());
        Self {
            breaker: registry.get_or_create(&name, config),
            fallback_path,
        }
    }
}

fn named_defaults(name: &str) -> BreakerConfig {
    match name {
        "backendService" => BreakerConfig::backend_service(),
        "criticalService" => BreakerConfig::critical_service(),
        _ => BreakerConfig::default(),
    }
}

#[async_trait]
impl Filter for CircuitBreakerFilter {
    fn name(&self) -> &str {
        "CircuitBreaker"
    }

    async fn execute(&self, ctx: &mut FilterContext, next: Next<'_>) -> FilterOutcome {
        match self.breaker.acquire_permit() {
            Permit::Deny => {
                ctx.circuit_breaker_triggered = true;
                Ok(FallbackRouter::respond(&self.fallback_path))
            }
            Permit::Allow => {
                let outcome = next.run(ctx).await;
                let success = matches!(&outcome, Ok(r) if r.status.as_u16() < 500);
                self.breaker.record_outcome(success);
                outcome
            }
        }
    }
}
