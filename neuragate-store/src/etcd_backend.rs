//! Remote backend (`etcd` feature): the primary store is an
//! etcd-compatible key/value store reached over gRPC, keyed under
//! `{prefix}/{route_id}`.

use crate::backend::StoreBackend;
use async_trait::async_trait;
use neuragate_core::error::GatewayError;
use neuragate_core::route::RouteDefinition;
use tokio::sync::Mutex;

pub struct EtcdBackend {
    client: Mutex<etcd_client::Client>,
    prefix: String,
}

impl EtcdBackend {
    pub async fn connect(endpoints: &[String], prefix: &str) -> Result<Self, GatewayError> {
        let client = etcd_client::Client::connect(endpoints, None)
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;
        tracing::info!(?endpoints, "connected to etcd route store");
        Ok(Self {
            client: Mutex::new(client),
            prefix: prefix.trim_end_matches('/').to_string(),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}/{}", self.prefix, id)
    }
}

#[async_trait]
impl StoreBackend for EtcdBackend {
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, GatewayError> {
        let mut client = self.client.lock().await;
        let resp = client
            .get(
                self.prefix.as_bytes(),
                Some(etcd_client::GetOptions::new().with_prefix()),
            )
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;

        let mut defs = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            match serde_json::from_slice::<RouteDefinition>(kv.value()) {
                Ok(def) => defs.push(def),
                Err(e) => tracing::warn!(error = %e, "skipping malformed route in etcd"),
            }
        }
        Ok(defs)
    }

    async fn put(&self, def: &RouteDefinition) -> Result<(), GatewayError> {
        let value = serde_json::to_vec(def)?;
        let mut client = self.client.lock().await;
        client
            .put(self.key(&def.id), value, None)
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        let mut client = self.client.lock().await;
        client
            .delete(self.key(id), None)
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let mut client = self.client.lock().await;
        client
            .get(self.prefix.as_bytes(), Some(etcd_client::GetOptions::new().with_limit(1)))
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}
