//! Route Store (C1): owns the backing `StoreBackend`, the in-memory
//! fallback set, and the route-changed notification that drives live
//! reload. Validation and chain-building happen in whoever implements
//! `RouteInstaller` (C2/C3, `neuragate-proxy::GatewayRouter` in
//! production) — this crate never depends on that wiring.

use crate::backend::StoreBackend;
use async_trait::async_trait;
use neuragate_core::error::GatewayError;
use neuragate_core::health::{HealthSource, HealthStatus};
use neuragate_core::install::{RouteChangeKind, RouteInstaller};
use neuragate_core::route::RouteDefinition;
use neuragate_core::snapshot::{Router, RouteSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// Broadcast capacity for route-changed notifications (§4.11). Sized
/// generously; a lagging subscriber (the telemetry forwarder is the
/// only one in production) drops the oldest entries rather than
/// blocking a `put`/`delete` call.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

pub struct RouteStore {
    backend: Arc<dyn StoreBackend>,
    installer: Arc<dyn RouteInstaller>,
    /// Local bookkeeping router, kept purely so `snapshot_stream` can
    /// hand out `RouteSnapshot`s without this crate depending on
    /// whatever owns the live, filter-chain-attached router.
    router: Arc<Router>,
    fallback_set: dashmap::DashMap<String, RouteDefinition>,
    fallback_loaded: AtomicBool,
    last_ping_ok: AtomicBool,
    snapshot_tx: watch::Sender<Arc<RouteSnapshot>>,
    change_tx: broadcast::Sender<(String, RouteChangeKind)>,
}

impl RouteStore {
    /// `fallback_defs` is the set loaded from a local source at process
    /// start (§4.1); in standalone mode the caller passes the same
    /// definitions the primary store was just loaded from.
    pub async fn init(
        backend: Arc<dyn StoreBackend>,
        installer: Arc<dyn RouteInstaller>,
        fallback_defs: Vec<RouteDefinition>,
    ) -> Self {
        let router = Arc::new(Router::new());
        let fallback_set = dashmap::DashMap::new();
        for def in &fallback_defs {
            if def.critical() {
                fallback_set.insert(def.id.clone(), def.clone());
            }
        }
        let fallback_loaded = AtomicBool::new(!fallback_set.is_empty());

        let (snapshot_tx, _rx) = watch::channel(router.snapshot());
        let (change_tx, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let store = Self {
            backend,
            installer,
            router,
            fallback_set,
            fallback_loaded,
            last_ping_ok: AtomicBool::new(true),
            snapshot_tx,
            change_tx,
        };

        match store.backend.load_all().await {
            Ok(defs) => {
                for def in defs {
                    store.install_locally(def);
                }
                store.last_ping_ok.store(true, Ordering::Release);
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial route load failed, serving fallback set only");
                for def in fallback_defs.iter().filter(|d| d.critical()) {
                    store.install_locally(def.clone());
                }
                store.last_ping_ok.store(false, Ordering::Release);
            }
        }
        store
    }

    fn install_locally(&self, def: RouteDefinition) {
        if let Err(e) = self.router.put(def.clone()) {
            tracing::warn!(error = %e, route_id = %def.id, "rejected invalid route at load time");
            return;
        }
        if let Err(e) = self.installer.install(def) {
            tracing::warn!(error = %e, "route installer rejected a definition the local router accepted");
        }
        self.notify_changed();
    }

    fn notify_changed(&self) {
        let _ = self.snapshot_tx.send(self.router.snapshot());
    }

    /// `Put(def) → Ok | Fail<StoreUnavailable|Serialize>`. Validated
    /// locally first, then through the installer (the only thing that
    /// also knows the closed set of filter names), so a definition
    /// that fails either check never reaches the backend or a
    /// snapshot.
    pub async fn put(&self, def: RouteDefinition) -> Result<(), GatewayError> {
        neuragate_core::compiler::CompiledRoute::compile(def.clone())?;
        self.installer.install(def.clone())?;
        let id = def.id.clone();
        self.backend.put(&def).await?;
        self.router.put(def)?;
        self.notify_changed();
        let _ = self.change_tx.send((id, RouteChangeKind::Put));
        Ok(())
    }

    /// `Delete(id) → Ok | Fail<StoreUnavailable>`.
    pub async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.backend.delete(id).await?;
        self.router.delete(id);
        self.installer.uninstall(id);
        self.notify_changed();
        let _ = self.change_tx.send((id.to_string(), RouteChangeKind::Delete));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<RouteDefinition> {
        self.router.get(id).map(|r| (*r.definition).clone())
    }

    pub fn all(&self) -> Vec<RouteDefinition> {
        self.router.all_definitions()
    }

    pub fn fallback_loaded(&self) -> bool {
        self.fallback_loaded.load(Ordering::Acquire)
    }

    pub fn fallback_set(&self) -> Vec<RouteDefinition> {
        self.fallback_set.iter().map(|e| e.value().clone()).collect()
    }

    /// `Health() → {Up | Degraded | Down}`: Up iff a PING-class call
    /// succeeds within 2s; otherwise Degraded if the fallback set is
    /// loaded, Down if not.
    pub async fn health(&self) -> HealthStatus {
        let ping = tokio::time::timeout(Duration::from_secs(2), self.backend.ping()).await;
        match ping {
            Ok(Ok(())) => {
                self.last_ping_ok.store(true, Ordering::Release);
                HealthStatus::Up
            }
            _ => {
                self.last_ping_ok.store(false, Ordering::Release);
                if self.fallback_loaded() {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Down
                }
            }
        }
    }

    /// `SnapshotStream() → lazy infinite sequence of RouteSnapshot`.
    pub fn snapshot_stream(&self) -> impl Stream<Item = Arc<RouteSnapshot>> {
        WatchStream::new(self.snapshot_tx.subscribe())
    }

    /// Per-mutation route-changed notifications (§4.1, fed to C11's
    /// `gateway-routes` topic by whoever owns the telemetry publisher).
    /// Unlike `snapshot_stream`, this only fires on an explicit
    /// `put`/`delete`, never on the initial load.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<(String, RouteChangeKind)> {
        self.change_tx.subscribe()
    }
}

#[async_trait]
impl HealthSource for RouteStore {
    async fn health(&self) -> HealthStatus {
        RouteStore::health(self).await
    }

    fn fallback_loaded(&self) -> bool {
        RouteStore::fallback_loaded(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_backend::FileBackend;
    use neuragate_core::install::NullInstaller;
    use neuragate_core::route::Predicate;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tokio_stream::StreamExt;

    fn def(id: &str, critical: bool) -> RouteDefinition {
        let mut metadata = HashMap::new();
        if critical {
            metadata.insert("critical".into(), "true".into());
        }
        RouteDefinition {
            id: id.into(),
            uri: "http://u:9001".into(),
            predicates: vec![Predicate {
                name: "Path".into(),
                args: [("pattern".into(), "/x/**".into())].into_iter().collect(),
            }],
            filters: vec![],
            order: 1,
            metadata,
            enabled: true,
        }
    }

    async fn store(path: &std::path::Path) -> RouteStore {
        let backend: Arc<dyn StoreBackend> = Arc::new(FileBackend::new(path));
        RouteStore::init(backend, Arc::new(NullInstaller), vec![]).await
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let s = store(&dir.path().join("state.json")).await;
        s.put(def("r1", false)).await.unwrap();
        assert_eq!(s.get("r1").unwrap().id, "r1");
    }

    #[tokio::test]
    async fn delete_removes_route() {
        let dir = tempdir().unwrap();
        let s = store(&dir.path().join("state.json")).await;
        s.put(def("r1", false)).await.unwrap();
        s.delete("r1").await.unwrap();
        assert!(s.get("r1").is_none());
    }

    struct RejectingInstaller;

    impl RouteInstaller for RejectingInstaller {
        fn install(&self, _def: RouteDefinition) -> Result<(), GatewayError> {
            Err(GatewayError::Config("unknown filter: LuaScript".into()))
        }

        fn uninstall(&self, _id: &str) {}
    }

    #[tokio::test]
    async fn installer_rejection_blocks_backend_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let backend: Arc<dyn StoreBackend> = Arc::new(FileBackend::new(&path));
        let s = RouteStore::init(backend, Arc::new(RejectingInstaller), vec![]).await;

        assert!(s.put(def("r1", false)).await.is_err());
        assert!(s.get("r1").is_none());

        let backend = FileBackend::new(&path);
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_definition_is_rejected_before_backend_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let s = store(&path).await;
        let mut bad = def("bad", false);
        bad.predicates.clear();
        assert!(s.put(bad).await.is_err());
        assert!(s.get("bad").is_none());

        let backend = FileBackend::new(&path);
        assert!(backend.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn critical_fallback_routes_are_loaded_and_marked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let backend: Arc<dyn StoreBackend> = Arc::new(FileBackend::new(&path));
        let s = RouteStore::init(backend, Arc::new(NullInstaller), vec![def("critical-1", true), def("noncritical", false)]).await;
        assert!(s.fallback_loaded());
        assert_eq!(s.fallback_set().len(), 1);
    }

    #[tokio::test]
    async fn health_is_up_when_ping_succeeds() {
        let dir = tempdir().unwrap();
        let s = store(&dir.path().join("state.json")).await;
        assert_eq!(s.health().await, HealthStatus::Up);
    }

    #[tokio::test]
    async fn subscribe_changes_emits_put_then_delete() {
        let dir = tempdir().unwrap();
        let s = store(&dir.path().join("state.json")).await;
        let mut changes = s.subscribe_changes();

        s.put(def("r1", false)).await.unwrap();
        let (id, kind) = changes.recv().await.unwrap();
        assert_eq!(id, "r1");
        assert_eq!(kind, RouteChangeKind::Put);

        s.delete("r1").await.unwrap();
        let (id, kind) = changes.recv().await.unwrap();
        assert_eq!(id, "r1");
        assert_eq!(kind, RouteChangeKind::Delete);
    }

    #[tokio::test]
    async fn snapshot_stream_emits_on_put() {
        let dir = tempdir().unwrap();
        let s = store(&dir.path().join("state.json")).await;
        let mut stream = Box::pin(s.snapshot_stream());
        let initial = stream.next().await.unwrap();
        assert!(initial.is_empty());

        s.put(def("r1", false)).await.unwrap();
        let next = stream.next().await.unwrap();
        assert_eq!(next.len(), 1);
    }
}
