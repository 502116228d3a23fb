use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Admin-facing route record — the unit of configuration stored at
/// `routes.hash` and mutated through the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub id: String,

    /// Upstream base, e.g. `http://inventory:9001`.
    pub uri: String,

    /// Ordered predicates; at least one is required for the
    /// definition to compile.
    pub predicates: Vec<Predicate>,

    /// Ordered filters. May be empty — the compiler injects
    /// defaults per §4.2.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    /// Lower wins ties on predicate match.
    #[serde(default)]
    pub order: i64,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
}

impl RouteDefinition {
    /// `metadata.rate-limit-enabled`, tolerant of missing/malformed values.
    pub fn rate_limit_enabled(&self) -> bool {
        self.metadata
            .get("rate-limit-enabled")
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// `metadata.critical`, used by the fallback set loader.
    pub fn critical(&self) -> bool {
        self.metadata
            .get("critical")
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub fn find_filter(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.name == name)
    }
}
