//! Layered configuration (§10.2): a base YAML file, overridden by
//! `NEURAGATE_`-prefixed environment variables (`__` nesting), every
//! field defaulted so a zero-config binary is runnable.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuraGateConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub breaker: BreakerDefaults,
    #[serde(default)]
    pub retry: RetryDefaults,
    #[serde(default)]
    pub rate_limit: RateLimitDefaults,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Default for NeuraGateConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            admin: AdminConfig::default(),
            store: StoreConfig::default(),
            telemetry: TelemetryConfig::default(),
            breaker: BreakerDefaults::default(),
            retry: RetryDefaults::default(),
            rate_limit: RateLimitDefaults::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl NeuraGateConfig {
    /// Load from an optional YAML file, then environment overrides,
    /// falling back to compiled-in defaults throughout.
    pub fn load(path: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(NeuraGateConfig::default()));
        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }
        figment = figment.merge(Env::prefixed("NEURAGATE_").split("__"));
        figment.extract()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_addr")]
    pub addr: SocketAddr,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_pool_idle_per_host")]
    pub pool_idle_per_host: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            addr: default_proxy_addr(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            pool_idle_per_host: default_pool_idle_per_host(),
        }
    }
}

fn default_proxy_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}
fn default_connect_timeout_ms() -> u64 {
    2_000
}
fn default_read_timeout_ms() -> u64 {
    10_000
}
fn default_pool_idle_per_host() -> usize {
    32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_enabled")]
    pub enabled: bool,
    #[serde(default = "default_admin_addr")]
    pub addr: SocketAddr,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: default_admin_enabled(),
            addr: default_admin_addr(),
        }
    }
}

fn default_admin_enabled() -> bool {
    true
}
fn default_admin_addr() -> SocketAddr {
    "0.0.0.0:9180".parse().unwrap()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// etcd endpoints; only consulted when built with the `etcd` feature.
    #[serde(default)]
    pub etcd_endpoints: Vec<String>,
    #[serde(default = "default_route_key_prefix")]
    pub route_key_prefix: String,
    /// Standalone-mode persistence file; used when no etcd endpoints
    /// are configured (or the feature is off).
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_store_health_timeout_ms")]
    pub health_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            etcd_endpoints: Vec::new(),
            route_key_prefix: default_route_key_prefix(),
            state_file: default_state_file(),
            health_timeout_ms: default_store_health_timeout_ms(),
        }
    }
}

fn default_route_key_prefix() -> String {
    "routes.hash".into()
}
fn default_state_file() -> String {
    "./data/neuragate-state.json".into()
}
fn default_store_health_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub bus_bootstrap: Option<String>,
    #[serde(default = "default_topic_telemetry")]
    pub topic_telemetry: String,
    #[serde(default = "default_topic_errors")]
    pub topic_errors: String,
    #[serde(default = "default_topic_routes")]
    pub topic_routes: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            bus_bootstrap: None,
            topic_telemetry: default_topic_telemetry(),
            topic_errors: default_topic_errors(),
            topic_routes: default_topic_routes(),
        }
    }
}

fn default_queue_capacity() -> usize {
    8192
}
fn default_topic_telemetry() -> String {
    "gateway-telemetry".into()
}
fn default_topic_errors() -> String {
    "gateway-errors".into()
}
fn default_topic_routes() -> String {
    "gateway-routes".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerDefaults {
    #[serde(default = "default_breaker_threshold")]
    pub failure_rate_threshold: f64,
    #[serde(default = "default_breaker_wait_ms")]
    pub wait_duration_in_open_state_ms: u64,
    #[serde(default = "default_breaker_window")]
    pub sliding_window_size: usize,
    #[serde(default = "default_breaker_min_calls")]
    pub minimum_number_of_calls: usize,
    #[serde(default = "default_breaker_half_open_permits")]
    pub permitted_calls_in_half_open: usize,
}

impl Default for BreakerDefaults {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_breaker_threshold(),
            wait_duration_in_open_state_ms: default_breaker_wait_ms(),
            sliding_window_size: default_breaker_window(),
            minimum_number_of_calls: default_breaker_min_calls(),
            permitted_calls_in_half_open: default_breaker_half_open_permits(),
        }
    }
}

fn default_breaker_threshold() -> f64 {
    0.6
}
fn default_breaker_wait_ms() -> u64 {
    15_000
}
fn default_breaker_window() -> usize {
    15
}
fn default_breaker_min_calls() -> usize {
    5
}
fn default_breaker_half_open_permits() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefaults {
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: u32,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            base_delay_ms: default_retry_base_ms(),
            multiplier: default_retry_multiplier(),
        }
    }
}

fn default_retries() -> usize {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_retry_multiplier() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitDefaults {
    #[serde(default = "default_rl_replenish")]
    pub replenish_per_sec: u32,
    #[serde(default = "default_rl_burst")]
    pub burst_capacity: u32,
    #[serde(default = "default_rl_ttl_secs")]
    pub idle_ttl_secs: u64,
}

impl Default for RateLimitDefaults {
    fn default() -> Self {
        Self {
            replenish_per_sec: default_rl_replenish(),
            burst_capacity: default_rl_burst(),
            idle_ttl_secs: default_rl_ttl_secs(),
        }
    }
}

fn default_rl_replenish() -> u32 {
    10
}
fn default_rl_burst() -> u32 {
    20
}
fn default_rl_ttl_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}
