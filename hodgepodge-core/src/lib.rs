//! Hodgepodge Core - metadata coordination for sharded stolon clusters
//!
//! Stores the cluster-wide documents (cluster data, replication group
//! directory, current masters) in a versioned key-value store and
//! propagates stolon spec changes to every replication group.

pub mod cluster;
pub mod error;
pub mod group;
pub mod kv;
pub mod operations;
pub mod spec;

pub use cluster::store::DEFAULT_STORE_PREFIX;
pub use cluster::*;
pub use error::{HodgeError, Result};
pub use group::{GroupSpecUpdater, MasterSource, StolonctlUpdater};
pub use kv::{DynKvStore, EtcdKvStore, KvPair, KvStore, KvStoreBuilder, MemoryKvStore, Version};
pub use operations::*;
pub use spec::{
    ListStrategy, MergeSchema, StrategicMerge, decode_value, merge_documents, patch_typed,
    strategic_merge,
};
