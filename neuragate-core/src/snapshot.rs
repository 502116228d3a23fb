//! Route resolver (C3) and the `Router` that owns the source-of-truth
//! map plus the atomically-swapped snapshot C3 reads from.

use crate::compiler::CompiledRoute;
use crate::error::GatewayError;
use crate::route::RouteDefinition;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The set of all enabled `CompiledRoute`s, sorted by `(order, id)`.
/// Immutable; swapped atomically on every change.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    routes: Vec<Arc<CompiledRoute>>,
}

impl RouteSnapshot {
    fn build(mut routes: Vec<Arc<CompiledRoute>>) -> Self {
        routes.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Self { routes }
    }

    /// C3: first match wins, snapshot already sorted by `(order, id)`.
    pub fn resolve(&self, method: &str, path: &str) -> Option<Arc<CompiledRoute>> {
        self.routes
            .iter()
            .find(|r| r.matches(method, path))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledRoute>> {
        self.routes.iter()
    }
}

/// Owns the route source-of-truth (a concurrent map keyed by route
/// id) and the atomically-swapped `RouteSnapshot` derived from it.
///
/// Single writer path (C1/C2 via `put`/`delete`), many concurrent
/// readers (C3 via `snapshot`) that never block the writer.
pub struct Router {
    compiled: DashMap<String, Arc<CompiledRoute>>,
    snapshot: ArcSwap<RouteSnapshot>,
    version: AtomicU64,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            compiled: DashMap::new(),
            snapshot: ArcSwap::new(Arc::new(RouteSnapshot::default())),
            version: AtomicU64::new(0),
        }
    }

    /// Compile and upsert a definition, then rebuild the snapshot.
    /// A definition that fails to compile is rejected and the
    /// previous snapshot remains authoritative for that id.
    pub fn put(&self, def: RouteDefinition) -> Result<Arc<CompiledRoute>, GatewayError> {
        let compiled = Arc::new(CompiledRoute::compile(def)?);
        self.compiled.insert(compiled.id.to_string(), compiled.clone());
        self.rebuild();
        Ok(compiled)
    }

    pub fn delete(&self, id: &str) -> bool {
        let existed = self.compiled.remove(id).is_some();
        if existed {
            self.rebuild();
        }
        existed
    }

    pub fn get(&self, id: &str) -> Option<Arc<CompiledRoute>> {
        self.compiled.get(id).map(|e| e.value().clone())
    }

    pub fn all_definitions(&self) -> Vec<RouteDefinition> {
        self.compiled
            .iter()
            .map(|e| (*e.value().definition).clone())
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.compiled.len()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.snapshot.load_full()
    }

    fn rebuild(&self) {
        let routes: Vec<Arc<CompiledRoute>> = self
            .compiled
            .iter()
            .filter(|e| e.value().is_enabled())
            .map(|e| e.value().clone())
            .collect();
        self.snapshot.store(Arc::new(RouteSnapshot::build(routes)));
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Predicate;
    use std::collections::HashMap;

    fn def(id: &str, pattern: &str, order: i64) -> RouteDefinition {
        RouteDefinition {
            id: id.into(),
            uri: "http://u:9001".into(),
            predicates: vec![Predicate {
                name: "Path".into(),
                args: [("pattern".into(), pattern.into())].into_iter().collect(),
            }],
            filters: vec![],
            order,
            metadata: HashMap::new(),
            enabled: true,
        }
    }

    #[test]
    fn put_then_resolve() {
        let router = Router::new();
        router.put(def("inv", "/inventory/**", 1)).unwrap();
        let snap = router.snapshot();
        let hit = snap.resolve("GET", "/inventory/1");
        assert_eq!(hit.unwrap().id.as_ref(), "inv");
    }

    #[test]
    fn delete_removes_from_snapshot() {
        let router = Router::new();
        router.put(def("inv", "/inventory/**", 1)).unwrap();
        assert!(router.delete("inv"));
        let snap = router.snapshot();
        assert!(snap.resolve("GET", "/inventory/1").is_none());
    }

    #[test]
    fn lowest_order_wins_on_overlap() {
        let router = Router::new();
        router.put(def("b", "/x/**", 5)).unwrap();
        router.put(def("a", "/x/**", 1)).unwrap();
        let snap = router.snapshot();
        let hit = snap.resolve("GET", "/x/1").unwrap();
        assert_eq!(hit.id.as_ref(), "a");
    }

    #[test]
    fn equal_order_breaks_tie_lexicographically_by_id() {
        let router = Router::new();
        router.put(def("zzz", "/x/**", 1)).unwrap();
        router.put(def("aaa", "/x/**", 1)).unwrap();
        let snap = router.snapshot();
        let hit = snap.resolve("GET", "/x/1").unwrap();
        assert_eq!(hit.id.as_ref(), "aaa");
    }

    #[test]
    fn disabled_routes_are_excluded_from_snapshot() {
        let router = Router::new();
        let mut d = def("inv", "/inventory/**", 1);
        d.enabled = false;
        router.put(d).unwrap();
        let snap = router.snapshot();
        assert!(snap.resolve("GET", "/inventory/1").is_none());
    }

    #[test]
    fn version_bumps_on_every_mutation() {
        let router = Router::new();
        assert_eq!(router.version(), 0);
        router.put(def("inv", "/inventory/**", 1)).unwrap();
        assert_eq!(router.version(), 1);
        router.delete("inv");
        assert_eq!(router.version(), 2);
    }

    #[test]
    fn in_flight_snapshot_reference_survives_concurrent_delete() {
        // Scenario 5 (live reload): holding a prior snapshot reference
        // keeps the old route resolvable even after a delete rebuilds
        // the live snapshot.
        let router = Router::new();
        router.put(def("a", "/a/**", 1)).unwrap();
        let held = router.snapshot();
        router.delete("a");

        assert!(held.resolve("GET", "/a/x").is_some());
        assert!(router.snapshot().resolve("GET", "/a/x").is_none());
    }

    #[test]
    fn rejected_definition_does_not_disturb_existing_snapshot() {
        let router = Router::new();
        router.put(def("a", "/a/**", 1)).unwrap();
        let mut bad = def("bad", "/b/**", 1);
        bad.predicates.clear();
        assert!(router.put(bad).is_err());
        assert_eq!(router.route_count(), 1);
        assert!(router.snapshot().resolve("GET", "/a/x").is_some());
    }
}
