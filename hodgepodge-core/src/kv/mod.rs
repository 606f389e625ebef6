//! Versioned key-value backends for cluster metadata documents
//!
//! A thin, retry-free layer over a remote linearizable store. Values are
//! opaque bytes; encoding and schema belong to the callers.

pub mod etcd;
pub mod factory;
pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

pub use etcd::EtcdKvStore;
pub use factory::KvStoreBuilder;
pub use memory::MemoryKvStore;

/// Opaque revision token identifying the state of a key at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(i64);

impl Version {
    pub fn new(revision: i64) -> Self {
        Self(revision)
    }

    pub fn revision(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value read from the store together with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
    pub version: Version,
}

/// Trait for versioned store implementations
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key. A missing key is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<KvPair>>;

    /// Unconditionally write a key.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write a key only if its current version matches `expected`.
    ///
    /// `expected == None` requires the key to be absent. Returns `false`
    /// when the precondition does not hold and nothing was written.
    async fn put_if_version(
        &self,
        key: &str,
        value: &[u8],
        expected: Option<Version>,
    ) -> Result<bool>;

    /// Release the backend handle. Later calls fail with `StoreClosed`.
    async fn close(&self) -> Result<()>;
}

/// Type alias for dynamic store
pub type DynKvStore = dyn KvStore;
