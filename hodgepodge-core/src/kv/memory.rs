use super::{KvPair, KvStore, Version};
use crate::error::{HodgeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
    revision: i64,
    entries: HashMap<String, (Vec<u8>, i64)>,
}

/// In-memory store with etcd-like revisions.
///
/// Every write bumps a store-wide revision, which becomes the written
/// key's version. Not persisted; used by tests and dry runs.
#[derive(Default)]
pub struct MemoryKvStore {
    inner: RwLock<MemoryInner>,
    closed: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HodgeError::StoreClosed);
        }
        Ok(())
    }

    fn write(inner: &mut MemoryInner, key: &str, value: &[u8]) {
        inner.revision += 1;
        let revision = inner.revision;
        inner
            .entries
            .insert(key.to_string(), (value.to_vec(), revision));
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<KvPair>> {
        self.ensure_open()?;
        let inner = self.inner.read().await;

        Ok(inner.entries.get(key).map(|(value, revision)| KvPair {
            key: key.to_string(),
            value: value.clone(),
            version: Version::new(*revision),
        }))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let mut inner = self.inner.write().await;
        Self::write(&mut inner, key, value);
        Ok(())
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: &[u8],
        expected: Option<Version>,
    ) -> Result<bool> {
        self.ensure_open()?;
        let mut inner = self.inner.write().await;

        let current = inner
            .entries
            .get(key)
            .map(|(_, revision)| Version::new(*revision));
        if current != expected {
            return Ok(false);
        }

        Self::write(&mut inner, key, value);
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryKvStore::new();
        assert!(store.get("hodgepodge/c1/clusterdata").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_bumps_version() {
        let store = MemoryKvStore::new();
        store.put("a", b"one").await.unwrap();
        let first = store.get("a").await.unwrap().unwrap();
        store.put("b", b"other").await.unwrap();
        store.put("a", b"two").await.unwrap();
        let second = store.get("a").await.unwrap().unwrap();

        assert_eq!(first.value, b"one");
        assert_eq!(second.value, b"two");
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_put_if_version() {
        let store = MemoryKvStore::new();

        assert!(store.put_if_version("k", b"v1", None).await.unwrap());
        assert!(!store.put_if_version("k", b"v2", None).await.unwrap());

        let pair = store.get("k").await.unwrap().unwrap();
        assert!(
            store
                .put_if_version("k", b"v2", Some(pair.version))
                .await
                .unwrap()
        );
        // stale version is rejected
        assert!(
            !store
                .put_if_version("k", b"v3", Some(pair.version))
                .await
                .unwrap()
        );
        assert_eq!(store.get("k").await.unwrap().unwrap().value, b"v2");
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = MemoryKvStore::new();
        store.put("k", b"v").await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(store.get("k").await, Err(HodgeError::StoreClosed)));
        assert!(matches!(
            store.put("k", b"v").await,
            Err(HodgeError::StoreClosed)
        ));
    }
}
