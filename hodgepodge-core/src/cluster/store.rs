use super::types::{ClusterData, Master, Masters, RepGroup, RepGroups};
use crate::error::{HodgeError, Result};
use crate::group::MasterSource;
use crate::kv::{KvStore, Version};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const DEFAULT_STORE_PREFIX: &str = "hodgepodge";

const CLUSTER_DATA_KEY: &str = "clusterdata";
const REP_GROUPS_KEY: &str = "repgroups";
const MASTERS_KEY: &str = "masters";

/// A decoded document and the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// Key layout of one cluster: `<prefix>/<cluster-name>/<document>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    cluster_name: String,
    root: String,
}

impl StoreLayout {
    pub fn new(prefix: &str, cluster_name: &str) -> Result<Self> {
        let cluster_name = cluster_name.trim();
        if cluster_name.is_empty() || cluster_name.contains('/') {
            return Err(HodgeError::Config(format!(
                "invalid cluster name '{}'",
                cluster_name
            )));
        }

        let prefix = prefix.trim().trim_matches('/');
        let root = if prefix.is_empty() {
            cluster_name.to_string()
        } else {
            format!("{}/{}", prefix, cluster_name)
        };

        Ok(Self {
            cluster_name: cluster_name.to_string(),
            root,
        })
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn cluster_data_key(&self) -> String {
        format!("{}/{}", self.root, CLUSTER_DATA_KEY)
    }

    pub fn rep_groups_key(&self) -> String {
        format!("{}/{}", self.root, REP_GROUPS_KEY)
    }

    pub fn masters_key(&self) -> String {
        format!("{}/{}", self.root, MASTERS_KEY)
    }
}

/// Typed access to the cluster's metadata documents.
pub struct ClusterStore {
    kv: Arc<dyn KvStore>,
    layout: StoreLayout,
}

impl ClusterStore {
    pub fn new(kv: Arc<dyn KvStore>, layout: StoreLayout) -> Self {
        Self { kv, layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    async fn get_document<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Versioned<T>>> {
        let pair = match self.kv.get(key).await? {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let value = serde_json::from_slice(&pair.value).map_err(|e| HodgeError::decode(key, e))?;
        Ok(Some(Versioned {
            value,
            version: pair.version,
        }))
    }

    async fn put_document<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.kv.put(key, &payload).await?;
        tracing::debug!("stored {} ({} bytes)", key, payload.len());
        Ok(())
    }

    /// Get global cluster data
    pub async fn get_cluster_data(&self) -> Result<Option<Versioned<ClusterData>>> {
        self.get_document(&self.layout.cluster_data_key()).await
    }

    /// Put global cluster data
    pub async fn put_cluster_data(&self, cldata: &ClusterData) -> Result<()> {
        self.put_document(&self.layout.cluster_data_key(), cldata)
            .await
    }

    /// Put global cluster data only if it is still at `version`.
    pub async fn put_cluster_data_if(&self, cldata: &ClusterData, version: Version) -> Result<bool> {
        let key = self.layout.cluster_data_key();
        let payload = serde_json::to_vec(cldata)?;
        self.kv.put_if_version(&key, &payload, Some(version)).await
    }

    /// Get replication groups directory
    pub async fn get_rep_groups(&self) -> Result<Option<Versioned<RepGroups>>> {
        self.get_document(&self.layout.rep_groups_key()).await
    }

    /// Put replication groups directory
    pub async fn put_rep_groups(&self, rgs: &RepGroups) -> Result<()> {
        self.put_document(&self.layout.rep_groups_key(), rgs).await
    }

    /// Get current masters for each replication group
    pub async fn get_masters(&self) -> Result<Option<Versioned<Masters>>> {
        self.get_document(&self.layout.masters_key()).await
    }

    /// Save current masters for each replication group
    pub async fn put_masters(&self, masters: &Masters) -> Result<()> {
        self.put_document(&self.layout.masters_key(), masters).await
    }

    pub async fn close(&self) -> Result<()> {
        self.kv.close().await
    }
}

/// Masters as recorded in this cluster's `masters` document, not read from
/// the group's own stolon store.
#[async_trait]
impl MasterSource for ClusterStore {
    async fn get_master(&self, rgid: i32, _rg: &RepGroup) -> Result<Option<Master>> {
        let masters = self.get_masters().await?;
        Ok(masters.and_then(|mut masters| masters.value.remove(&rgid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    fn store_on(kv: Arc<dyn KvStore>, cluster: &str) -> ClusterStore {
        ClusterStore::new(kv, StoreLayout::new(DEFAULT_STORE_PREFIX, cluster).unwrap())
    }

    #[test]
    fn test_layout_keys() {
        let layout = StoreLayout::new("/hodgepodge/", "main").unwrap();
        assert_eq!(layout.cluster_data_key(), "hodgepodge/main/clusterdata");
        assert_eq!(layout.rep_groups_key(), "hodgepodge/main/repgroups");
        assert_eq!(layout.masters_key(), "hodgepodge/main/masters");

        assert!(StoreLayout::new("hodgepodge", " ").is_err());
        assert!(StoreLayout::new("hodgepodge", "a/b").is_err());
    }

    #[tokio::test]
    async fn test_not_found_differs_from_empty_document() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let store = store_on(kv.clone(), "main");

        assert!(store.get_cluster_data().await.unwrap().is_none());

        kv.put("hodgepodge/main/clusterdata", b"{}").await.unwrap();
        let read = store.get_cluster_data().await.unwrap().unwrap();
        assert_eq!(read.value, ClusterData::default());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_decode_error() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let store = store_on(kv.clone(), "main");
        kv.put("hodgepodge/main/repgroups", b"not json").await.unwrap();

        let err = store.get_rep_groups().await.unwrap_err();
        match err {
            HodgeError::Decode { what, .. } => assert_eq!(what, "hodgepodge/main/repgroups"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_clusters_are_isolated() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let first = store_on(kv.clone(), "first");
        let second = store_on(kv, "second");

        let cldata = ClusterData {
            pg_su_username: "postgres".to_string(),
            ..Default::default()
        };
        first.put_cluster_data(&cldata).await.unwrap();

        assert_eq!(first.get_cluster_data().await.unwrap().unwrap().value, cldata);
        assert!(second.get_cluster_data().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let store = store_on(Arc::new(MemoryKvStore::new()), "main");
        store.put_cluster_data(&ClusterData::default()).await.unwrap();
        let read = store.get_cluster_data().await.unwrap().unwrap();

        let mut updated = read.value.clone();
        updated.replicas = 2;
        assert!(store.put_cluster_data_if(&updated, read.version).await.unwrap());
        // second write with the same stale version loses
        assert!(!store.put_cluster_data_if(&updated, read.version).await.unwrap());
    }

    #[tokio::test]
    async fn test_masters_directory() {
        let store = store_on(Arc::new(MemoryKvStore::new()), "main");
        let rg = RepGroup::default();
        assert_eq!(store.get_master(1, &rg).await.unwrap(), None);

        let masters = Masters::from([(
            1,
            Master {
                listen_address: "10.0.0.1".to_string(),
                port: "5432".to_string(),
            },
        )]);
        store.put_masters(&masters).await.unwrap();

        assert_eq!(store.get_master(1, &rg).await.unwrap(), masters.get(&1).cloned());
        assert_eq!(store.get_master(2, &rg).await.unwrap(), None);
    }
}
