use super::{EtcdKvStore, KvStore, MemoryKvStore};
use crate::error::{HodgeError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct KvStoreBuilder {
    backend: Option<String>,
    etcd_endpoints: Option<Vec<String>>,
}

impl KvStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn etcd_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.etcd_endpoints = Some(endpoints);
        self
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(HodgeError::Config("store backend cannot be empty".to_string()));
        }

        Ok(backend)
    }

    fn resolve_endpoints(&self) -> Result<Vec<String>> {
        let endpoints: Vec<String> = self
            .etcd_endpoints
            .clone()
            .ok_or_else(|| {
                HodgeError::Config("etcd endpoints are required for etcd backend".to_string())
            })?
            .into_iter()
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .collect();

        if endpoints.is_empty() {
            return Err(HodgeError::Config(
                "etcd endpoints cannot be empty for etcd backend".to_string(),
            ));
        }

        Ok(endpoints)
    }

    pub async fn build(&self) -> Result<Arc<dyn KvStore>> {
        let backend = self.resolve_backend()?;

        match backend.as_str() {
            "etcd" | "etcdv3" => {
                let endpoints = self.resolve_endpoints()?;
                let store = EtcdKvStore::new(&endpoints).await?;
                Ok(Arc::new(store))
            }
            "memory" => Ok(Arc::new(MemoryKvStore::new())),
            other => Err(HodgeError::Config(format!(
                "unsupported store backend: {}",
                other
            ))),
        }
    }
}
