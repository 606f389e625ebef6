//! Collaborators that live on the replication groups' side

pub mod stolonctl;

use crate::cluster::{Master, RepGroup, StolonSpec};
use crate::error::Result;
use async_trait::async_trait;

pub use stolonctl::StolonctlUpdater;

/// Pushes a spec into one replication group's own store.
#[async_trait]
pub trait GroupSpecUpdater: Send + Sync {
    async fn apply_spec(
        &self,
        rgid: i32,
        rg: &RepGroup,
        patch: bool,
        spec: &StolonSpec,
    ) -> Result<()>;
}

/// Reads the current leader of a replication group.
#[async_trait]
pub trait MasterSource: Send + Sync {
    async fn get_master(&self, rgid: i32, rg: &RepGroup) -> Result<Option<Master>>;
}
