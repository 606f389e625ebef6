use super::{KvPair, KvStore, Version};
use crate::error::{HodgeError, Result};
use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, Txn, TxnOp};
use std::sync::atomic::{AtomicBool, Ordering};

/// etcd v3 backed store
pub struct EtcdKvStore {
    client: Client,
    closed: AtomicBool,
}

impl EtcdKvStore {
    pub async fn new(endpoints: &[String]) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;
        tracing::debug!("connected to etcd endpoints={:?}", endpoints);

        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }

    fn client(&self) -> Result<Client> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HodgeError::StoreClosed);
        }
        Ok(self.client.clone())
    }
}

#[async_trait]
impl KvStore for EtcdKvStore {
    async fn get(&self, key: &str) -> Result<Option<KvPair>> {
        let mut client = self.client()?;
        let resp = client.get(key, None).await?;

        Ok(resp.kvs().first().map(|kv| KvPair {
            key: key.to_string(),
            value: kv.value().to_vec(),
            version: Version::new(kv.mod_revision()),
        }))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut client = self.client()?;
        client.put(key, value, None).await?;
        Ok(())
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: &[u8],
        expected: Option<Version>,
    ) -> Result<bool> {
        let mut client = self.client()?;

        let compare = match expected {
            Some(version) => Compare::mod_revision(key, CompareOp::Equal, version.revision()),
            // a key that was never created has create_revision 0
            None => Compare::create_revision(key, CompareOp::Equal, 0),
        };
        let txn = Txn::new()
            .when(vec![compare])
            .and_then(vec![TxnOp::put(key, value, None)]);

        let resp = client.txn(txn).await?;
        Ok(resp.succeeded())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
