use crate::cluster::{ClusterStore, StolonSpec};
use crate::error::{HodgeError, Result};
use crate::group::GroupSpecUpdater;
use crate::spec::{decode_value, patch_typed};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_CONFLICT_RETRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecUpdateMode {
    Replace,
    Patch,
}

#[derive(Debug, Clone)]
pub struct UpdateSpecOperationRequest {
    pub spec: Value,
    pub mode: SpecUpdateMode,
}

#[derive(Debug, Clone)]
pub struct UpdateSpecOperationResult {
    pub spec: StolonSpec,
    pub updated_groups: Vec<i32>,
    pub attempts: usize,
}

/// Broadcasts a new stolon spec to every replication group, then records it
/// in the cluster data.
///
/// Not transactional: groups are pushed in ascending id order and the first
/// failure aborts, leaving earlier groups on the new spec while cluster data
/// keeps the old one. The commit is conditional on the cluster data version
/// read at the start; a lost race reruns the whole sequence.
#[derive(Clone)]
pub struct UpdateSpecOperation {
    store: Arc<ClusterStore>,
    updater: Arc<dyn GroupSpecUpdater>,
    max_conflict_retries: usize,
}

impl UpdateSpecOperation {
    pub fn new(store: Arc<ClusterStore>, updater: Arc<dyn GroupSpecUpdater>) -> Self {
        Self {
            store,
            updater,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: usize) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub async fn run(&self, request: UpdateSpecOperationRequest) -> Result<UpdateSpecOperationResult> {
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            if let Some((spec, updated_groups)) = self.attempt(&request).await? {
                tracing::info!(
                    "spec updated: cluster={} groups={} attempts={}",
                    self.store.layout().cluster_name(),
                    updated_groups.len(),
                    attempts
                );
                return Ok(UpdateSpecOperationResult {
                    spec,
                    updated_groups,
                    attempts,
                });
            }

            if attempts > self.max_conflict_retries {
                return Err(HodgeError::VersionConflict {
                    key: self.store.layout().cluster_data_key(),
                });
            }
            tracing::warn!(
                "cluster data changed during spec update, retrying: cluster={} attempt={}",
                self.store.layout().cluster_name(),
                attempts
            );
        }
    }

    /// One read-merge-fanout-commit pass. `None` means the commit lost a race.
    async fn attempt(
        &self,
        request: &UpdateSpecOperationRequest,
    ) -> Result<Option<(StolonSpec, Vec<i32>)>> {
        let current = self.store.get_cluster_data().await?.ok_or_else(|| {
            HodgeError::ClusterNotInitialized {
                cluster: self.store.layout().cluster_name().to_string(),
            }
        })?;
        let mut cldata = current.value;

        let new_spec = match request.mode {
            SpecUpdateMode::Patch => {
                let base = cldata.stolon_spec.clone().unwrap_or_default();
                patch_typed(&base, &request.spec)?
            }
            SpecUpdateMode::Replace => decode_value("requested spec", &request.spec)?,
        };

        let rgs = self
            .store
            .get_rep_groups()
            .await?
            .map(|rgs| rgs.value)
            .unwrap_or_default();

        let mut updated_groups = Vec::with_capacity(rgs.len());
        for (rgid, rg) in &rgs {
            // always patch so group-local defaults such as initMode survive
            self.updater
                .apply_spec(*rgid, rg, true, &new_spec)
                .await
                .map_err(|error| {
                    tracing::error!(
                        "spec push failed: rgid={} updated_before={:?} error={}",
                        rgid,
                        updated_groups,
                        error
                    );
                    HodgeError::GroupUpdateFailed {
                        rgid: *rgid,
                        source: Box::new(error),
                    }
                })?;
            tracing::debug!("pushed spec to replication group {}", rgid);
            updated_groups.push(*rgid);
        }

        cldata.stolon_spec = Some(new_spec.clone());
        if !self
            .store
            .put_cluster_data_if(&cldata, current.version)
            .await?
        {
            return Ok(None);
        }

        Ok(Some((new_spec, updated_groups)))
    }
}
