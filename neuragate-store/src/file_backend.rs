//! Standalone-mode backend (§4.1): the primary store and the fallback
//! set coincide — both are this same file, persisted atomically
//! (tmp-file + rename) on every mutation and reloaded at startup.

use crate::backend::StoreBackend;
use async_trait::async_trait;
use neuragate_core::error::GatewayError;
use neuragate_core::route::RouteDefinition;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct PersistedState {
    #[serde(default)]
    routes: HashMap<String, RouteDefinition>,
}

pub struct FileBackend {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load_from_disk(&path).unwrap_or_default();
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn persist(&self) -> Result<(), GatewayError> {
        let state = self.state.lock().expect("state mutex poisoned");
        let json = serde_json::to_string_pretty(&*state)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn load_from_disk(path: &Path) -> Option<PersistedState> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "store: no state file found, starting fresh");
        return None;
    }
    let data = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "store: failed to read state file");
            return None;
        }
    };
    match serde_json::from_str(&data) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "store: state file is malformed, ignoring");
            None
        }
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, GatewayError> {
        Ok(self.state.lock().expect("state mutex poisoned").routes.values().cloned().collect())
    }

    async fn put(&self, def: &RouteDefinition) -> Result<(), GatewayError> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .routes
            .insert(def.id.clone(), def.clone());
        self.persist()
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.state.lock().expect("state mutex poisoned").routes.remove(id);
        self.persist()
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
